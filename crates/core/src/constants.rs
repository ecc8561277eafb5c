//! Constants used throughout the HealthGuard core crate.
//!
//! Defaults here are the values `DispatchConfig::default()` resolves to; every one of them can
//! be overridden at startup.

/// Default REST listen address.
pub const DEFAULT_REST_ADDR: &str = "0.0.0.0:8000";

/// Maximum allocation attempts (initial try plus conflict retries).
pub const DEFAULT_MAX_ALLOCATION_ATTEMPTS: u32 = 3;

/// Base delay before the first conflict retry.
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 20;

/// Upper bound for a single backoff delay.
pub const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 500;

/// Upper bound for the random jitter added to each backoff delay.
pub const DEFAULT_RETRY_JITTER_MS: u64 = 15;

/// Per-request bed ceiling enforced by the policy guard.
pub const DEFAULT_MAX_BEDS_PER_REQUEST: u32 = 4;

/// Score weight per kilometre of straight-line distance.
pub const DEFAULT_WEIGHT_DISTANCE: f64 = 1.0;

/// Score weight applied to `1 / available_beds`.
pub const DEFAULT_WEIGHT_AVAILABILITY: f64 = 10.0;

/// Score weight applied to the trauma-level bonus (subtracted).
pub const DEFAULT_WEIGHT_CAPABILITY: f64 = 2.0;

/// Flat score penalty for hospitals on partial diversion.
pub const DEFAULT_PARTIAL_DIVERSION_PENALTY: f64 = 25.0;

/// Average ambulance speed used for ETA estimates.
pub const DEFAULT_AVERAGE_SPEED_KMH: f64 = 50.0;

/// Interval between pending-case sweeps.
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 15;

/// Event-sink failures tolerated inside the breaker window before it opens.
pub const DEFAULT_BREAKER_FAILURE_THRESHOLD: u32 = 5;

/// Sliding window for counting event-sink failures.
pub const DEFAULT_BREAKER_WINDOW_SECS: u64 = 30;

/// Time an open breaker waits before letting a probe through.
pub const DEFAULT_BREAKER_COOLDOWN_SECS: u64 = 10;

/// Maximum length of hospital and ambulance identifiers.
pub const MAX_ENTITY_KEY_LEN: usize = 64;
