use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::AppState;
use healthguard_core::config::{CircuitBreakerConfig, ENV_REST_ADDR, ENV_SEED_FILE};
use healthguard_core::constants::DEFAULT_REST_ADDR;
use healthguard_core::events::{
    BroadcastSink, EventSink, FanoutSink, GuardedSink, LoggingEscalation, TracingSink,
};
use healthguard_core::seed::SeedData;
use healthguard_core::{DispatchConfig, DispatchCoordinator, EntityStore};

/// Capacity of the in-process transition broadcast channel.
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Main entry point for the HealthGuard service
///
/// Builds the entity store from a seed, starts the pending-case sweeper and serves the REST API
/// until interrupted.
///
/// # Environment Variables
/// - `HG_REST_ADDR`: REST server address (default: "0.0.0.0:8000")
/// - `HG_SEED_FILE`: YAML seed with hospitals and ambulances (default: built-in demo fleet)
/// - `HG_*` tuning overrides, see `DispatchConfig::from_lookup`
///
/// # Errors
/// Returns an error if:
/// - the logging/tracing configuration cannot be initialised,
/// - a configuration override or the seed file is invalid,
/// - the server address cannot be bound, or
/// - the HTTP server fails while running.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("healthguard_run=info".parse()?)
                .add_directive("healthguard_core=info".parse()?)
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = DispatchConfig::from_lookup(|key| std::env::var(key).ok())?;
    let rest_addr = std::env::var(ENV_REST_ADDR).unwrap_or_else(|_| DEFAULT_REST_ADDR.into());

    let seed = match std::env::var(ENV_SEED_FILE).ok().map(PathBuf::from) {
        Some(path) => {
            tracing::info!("-- Loading seed from {}", path.display());
            SeedData::load(&path)?
        }
        None => {
            tracing::info!("-- No {} set, using the demo fleet", ENV_SEED_FILE);
            SeedData::demo()?
        }
    };
    let store = Arc::new(EntityStore::new());
    seed.apply(&store)?;
    tracing::info!(
        hospitals = store.hospitals().len(),
        ambulances = store.ambulances().len(),
        "entity store ready"
    );

    let broadcast = Arc::new(BroadcastSink::new(EVENT_CHANNEL_CAPACITY));
    let sinks: Vec<Arc<dyn EventSink>> = vec![Arc::new(TracingSink), broadcast.clone()];
    let sink = GuardedSink::new(
        Arc::new(FanoutSink::new(sinks)),
        CircuitBreakerConfig::default(),
    );
    let sweep_interval = config.sweep_interval;
    let coordinator = Arc::new(DispatchCoordinator::new(
        store,
        config,
        Arc::new(sink),
        Arc::new(LoggingEscalation),
    ));

    // Pending-case sweeper
    let sweeper = {
        let coordinator = Arc::clone(&coordinator);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(sweep_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                coordinator.retry_pending().await;
            }
        })
    };

    // Transition feed for in-process subscribers
    let mut events = broadcast.subscribe();
    let event_tail = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => tracing::debug!(
                    kind = %event.entity_kind,
                    id = %event.entity_id,
                    to = %event.to_state,
                    "transition received"
                ),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "transition feed lagged")
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    let app = api_rest::router(AppState::new(coordinator));

    tracing::info!("++ Starting HealthGuard REST on {}", rest_addr);
    let listener = tokio::net::TcpListener::bind(&rest_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.abort();
    event_tail.abort();
    tracing::info!("-- HealthGuard stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "could not listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
