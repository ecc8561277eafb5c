//! # API Shared
//!
//! Wire types for the HealthGuard APIs.
//!
//! Contains:
//! - Request and response bodies for the emergency, hospital and ambulance routes
//! - Shared services like `HealthService`
//!
//! Every type derives `serde` and `utoipa::ToSchema` so the REST crate can publish an OpenAPI
//! document without restating field lists. Enumerated values travel as their snake_case wire
//! strings; the REST layer parses them into domain types.

pub mod ambulance;
pub mod emergency;
pub mod health;
pub mod hospital;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub use ambulance::*;
pub use emergency::*;
pub use health::{HealthRes, HealthService};
pub use hospital::*;

/// Latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

/// Error body returned with every non-2xx response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    /// Stable error kind, e.g. `not_found`, `no_capacity`, `policy_violation`.
    pub error: String,
    pub message: String,
    /// Name of the failed business rule, present for policy violations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule: Option<String>,
}
