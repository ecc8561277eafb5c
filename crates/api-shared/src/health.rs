use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
    pub version: String,
    pub timestamp: DateTime<Utc>,
}

/// Simple health service shared by the REST API and the CLI.
///
/// Provides a standardised liveness payload for HealthGuard.
#[derive(Clone, Default)]
pub struct HealthService;

impl HealthService {
    pub fn new() -> Self {
        Self
    }

    /// Static method to check health without creating an instance.
    ///
    /// # Returns
    /// A `HealthRes` indicating the service is healthy, stamped with the crate version and the
    /// current time.
    pub fn check_health() -> HealthRes {
        HealthRes {
            ok: true,
            message: "HealthGuard is alive".into(),
            version: env!("CARGO_PKG_VERSION").into(),
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_reports_ok_with_version() {
        let res = HealthService::check_health();
        assert!(res.ok);
        assert_eq!(res.version, env!("CARGO_PKG_VERSION"));
        assert!(res.message.contains("alive"));
    }
}
