//! Notification Sink contract.
//!
//! Every committed state transition is published as a [`TransitionEvent`]. The transport is
//! the sink's business; this module ships in-process implementations only:
//! - [`TracingSink`]: one structured log line per event
//! - [`BroadcastSink`]: `tokio::sync::broadcast` fan-out to in-process subscribers
//! - [`MemorySink`]: records events, for tests and the CLI simulator
//! - [`FanoutSink`]: publishes to several sinks
//! - [`GuardedSink`]: wraps any sink with a [`CircuitBreaker`]
//!
//! Publication is best effort. A failing sink never fails the domain operation that produced
//! the event.

use crate::config::CircuitBreakerConfig;
use crate::error::EntityKind;
use crate::models::EmergencyCase;
use crate::resilience::{CircuitBreaker, CircuitState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::broadcast;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionEvent {
    pub entity_kind: EntityKind,
    pub entity_id: String,
    pub from_state: String,
    pub to_state: String,
    pub timestamp: DateTime<Utc>,
}

impl TransitionEvent {
    pub fn new(
        entity_kind: EntityKind,
        entity_id: impl Into<String>,
        from_state: impl fmt::Display,
        to_state: impl fmt::Display,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            entity_kind,
            entity_id: entity_id.into(),
            from_state: from_state.to_string(),
            to_state: to_state.to_string(),
            timestamp,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SinkError {
    #[error("sink {sink} unavailable: {reason}")]
    Unavailable { sink: String, reason: String },

    #[error("circuit open for sink {sink}")]
    CircuitOpen { sink: String },
}

/// An external observer of state transitions.
pub trait EventSink: Send + Sync {
    fn name(&self) -> &str;

    /// # Errors
    ///
    /// Returns [`SinkError`] if the event could not be delivered.
    fn publish(&self, event: &TransitionEvent) -> Result<(), SinkError>;
}

// ============================================================================
// In-process sinks
// ============================================================================

#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn name(&self) -> &str {
        "tracing"
    }

    fn publish(&self, event: &TransitionEvent) -> Result<(), SinkError> {
        tracing::info!(
            target: "healthguard::events",
            entity_kind = %event.entity_kind,
            entity_id = %event.entity_id,
            from = %event.from_state,
            to = %event.to_state,
            "state transition"
        );
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<TransitionEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<TransitionEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Events for one entity, in publication order.
    pub fn events_for(&self, entity_id: &str) -> Vec<TransitionEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.entity_id == entity_id)
            .collect()
    }
}

impl EventSink for MemorySink {
    fn name(&self) -> &str {
        "memory"
    }

    fn publish(&self, event: &TransitionEvent) -> Result<(), SinkError> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
        Ok(())
    }
}

/// Fan-out to in-process subscribers. Having no subscribers is not an error; a lagging
/// subscriber loses the oldest events.
#[derive(Debug, Clone)]
pub struct BroadcastSink {
    tx: broadcast::Sender<TransitionEvent>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TransitionEvent> {
        self.tx.subscribe()
    }
}

impl EventSink for BroadcastSink {
    fn name(&self) -> &str {
        "broadcast"
    }

    fn publish(&self, event: &TransitionEvent) -> Result<(), SinkError> {
        // send only fails when nobody is listening
        let _ = self.tx.send(event.clone());
        Ok(())
    }
}

pub struct FanoutSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl FanoutSink {
    pub fn new(sinks: Vec<Arc<dyn EventSink>>) -> Self {
        Self { sinks }
    }
}

impl EventSink for FanoutSink {
    fn name(&self) -> &str {
        "fanout"
    }

    /// Delivers to every sink even if an earlier one fails; reports the first failure.
    fn publish(&self, event: &TransitionEvent) -> Result<(), SinkError> {
        let mut first_error = None;
        for sink in &self.sinks {
            if let Err(err) = sink.publish(event) {
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

/// Fails fast with [`SinkError::CircuitOpen`] once the wrapped sink keeps failing.
pub struct GuardedSink {
    inner: Arc<dyn EventSink>,
    breaker: CircuitBreaker,
}

impl GuardedSink {
    pub fn new(inner: Arc<dyn EventSink>, config: CircuitBreakerConfig) -> Self {
        let breaker = CircuitBreaker::new(format!("sink:{}", inner.name()), config);
        Self { inner, breaker }
    }

    pub fn circuit_state(&self) -> CircuitState {
        self.breaker.state()
    }
}

impl EventSink for GuardedSink {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn publish(&self, event: &TransitionEvent) -> Result<(), SinkError> {
        if !self.breaker.allow() {
            return Err(SinkError::CircuitOpen {
                sink: self.inner.name().to_owned(),
            });
        }
        match self.inner.publish(event) {
            Ok(()) => {
                self.breaker.record_success();
                Ok(())
            }
            Err(err) => {
                self.breaker.record_failure();
                Err(err)
            }
        }
    }
}

// ============================================================================
// Escalation
// ============================================================================

/// Resource exhaustion that leaves a case waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Exhaustion {
    NoCapacity,
    NoAmbulanceAvailable,
}

impl fmt::Display for Exhaustion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Exhaustion::NoCapacity => "no_capacity",
            Exhaustion::NoAmbulanceAvailable => "no_ambulance_available",
        })
    }
}

/// Mutual-aid / overflow escalation. Called after the case has been left in a retryable state.
pub trait EscalationHook: Send + Sync {
    fn escalate(&self, case: &EmergencyCase, reason: Exhaustion);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingEscalation;

impl EscalationHook for LoggingEscalation {
    fn escalate(&self, case: &EmergencyCase, reason: Exhaustion) {
        tracing::warn!(
            case_id = %case.id,
            severity = ?case.severity,
            status = %case.status,
            %reason,
            "local resources exhausted, mutual aid requested"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    struct FailingSink {
        calls: AtomicU32,
    }

    impl EventSink for FailingSink {
        fn name(&self) -> &str {
            "failing"
        }

        fn publish(&self, _: &TransitionEvent) -> Result<(), SinkError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(SinkError::Unavailable {
                sink: "failing".into(),
                reason: "connection refused".into(),
            })
        }
    }

    fn event() -> TransitionEvent {
        TransitionEvent::new(EntityKind::Ambulance, "AMB-001", "available", "dispatched", Utc::now())
    }

    #[test]
    fn memory_sink_records_in_order() {
        let sink = MemorySink::new();
        sink.publish(&event()).unwrap();
        sink.publish(&TransitionEvent::new(
            EntityKind::Ambulance,
            "AMB-001",
            "dispatched",
            "enroute",
            Utc::now(),
        ))
        .unwrap();
        let states: Vec<String> = sink.events_for("AMB-001").into_iter().map(|e| e.to_state).collect();
        assert_eq!(states, vec!["dispatched", "enroute"]);
    }

    #[tokio::test]
    async fn broadcast_reaches_subscribers() {
        let sink = BroadcastSink::new(8);
        let mut rx = sink.subscribe();
        let sent = event();
        sink.publish(&sent).unwrap();
        assert_eq!(rx.recv().await.unwrap(), sent);
    }

    #[test]
    fn broadcast_without_subscribers_is_ok() {
        assert!(BroadcastSink::new(1).publish(&event()).is_ok());
    }

    #[test]
    fn guarded_sink_opens_after_threshold() {
        let inner = Arc::new(FailingSink {
            calls: AtomicU32::new(0),
        });
        let guarded = GuardedSink::new(
            inner.clone(),
            CircuitBreakerConfig {
                failure_threshold: 3,
                window: Duration::from_secs(30),
                cooldown: Duration::from_secs(60),
            },
        );

        for _ in 0..3 {
            assert!(matches!(
                guarded.publish(&event()),
                Err(SinkError::Unavailable { .. })
            ));
        }
        assert_eq!(guarded.circuit_state(), CircuitState::Open);
        assert!(matches!(
            guarded.publish(&event()),
            Err(SinkError::CircuitOpen { .. })
        ));
        assert_eq!(inner.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn fanout_delivers_to_all_and_reports_failure() {
        let memory = Arc::new(MemorySink::new());
        let failing: Arc<dyn EventSink> = Arc::new(FailingSink {
            calls: AtomicU32::new(0),
        });
        let fanout = FanoutSink::new(vec![failing, memory.clone()]);
        assert!(fanout.publish(&event()).is_err());
        assert_eq!(memory.events().len(), 1);
    }
}
