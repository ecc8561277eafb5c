//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and passed into the components that need
//! it. Nothing in this crate reads environment variables during request handling; the binary
//! calls [`DispatchConfig::from_lookup`] with an environment lookup and hands the result on.

use crate::constants::*;
use crate::error::{DispatchError, DispatchResult};
use crate::resilience::RetryPolicy;
use std::str::FromStr;
use std::time::Duration;

pub const ENV_REST_ADDR: &str = "HG_REST_ADDR";
pub const ENV_SEED_FILE: &str = "HG_SEED_FILE";
pub const ENV_MAX_ALLOCATION_ATTEMPTS: &str = "HG_MAX_ALLOCATION_ATTEMPTS";
pub const ENV_RETRY_BASE_DELAY_MS: &str = "HG_RETRY_BASE_DELAY_MS";
pub const ENV_MAX_BEDS_PER_REQUEST: &str = "HG_MAX_BEDS_PER_REQUEST";
pub const ENV_WEIGHT_DISTANCE: &str = "HG_WEIGHT_DISTANCE";
pub const ENV_WEIGHT_AVAILABILITY: &str = "HG_WEIGHT_AVAILABILITY";
pub const ENV_WEIGHT_CAPABILITY: &str = "HG_WEIGHT_CAPABILITY";
pub const ENV_AVERAGE_SPEED_KMH: &str = "HG_AVERAGE_SPEED_KMH";
pub const ENV_SWEEP_INTERVAL_SECS: &str = "HG_SWEEP_INTERVAL_SECS";

/// Weights of the composite bed score `w1·distance + w2·(1/available) − w3·level_bonus`.
/// Lower scores win.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringWeights {
    pub distance: f64,
    pub availability: f64,
    pub capability: f64,
    /// Added to the score of hospitals on partial diversion.
    pub partial_diversion_penalty: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            distance: DEFAULT_WEIGHT_DISTANCE,
            availability: DEFAULT_WEIGHT_AVAILABILITY,
            capability: DEFAULT_WEIGHT_CAPABILITY,
            partial_diversion_penalty: DEFAULT_PARTIAL_DIVERSION_PENALTY,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicyLimits {
    pub max_beds_per_request: u32,
}

impl Default for PolicyLimits {
    fn default() -> Self {
        Self {
            max_beds_per_request: DEFAULT_MAX_BEDS_PER_REQUEST,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub window: Duration,
    pub cooldown: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_BREAKER_FAILURE_THRESHOLD,
            window: Duration::from_secs(DEFAULT_BREAKER_WINDOW_SECS),
            cooldown: Duration::from_secs(DEFAULT_BREAKER_COOLDOWN_SECS),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ALLOCATION_ATTEMPTS,
            base_delay: Duration::from_millis(DEFAULT_RETRY_BASE_DELAY_MS),
            max_delay: Duration::from_millis(DEFAULT_RETRY_MAX_DELAY_MS),
            jitter: Duration::from_millis(DEFAULT_RETRY_JITTER_MS),
        }
    }
}

/// Dispatch configuration resolved at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchConfig {
    pub weights: ScoringWeights,
    pub retry: RetryPolicy,
    pub limits: PolicyLimits,
    pub breaker: CircuitBreakerConfig,
    pub average_speed_kmh: f64,
    pub sweep_interval: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self::defaults()
    }
}

impl DispatchConfig {
    /// Defaults with every `HG_*` override found by `lookup` applied, then validated.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::InvalidConfig`] naming the variable if a value does not parse,
    /// or if the resulting configuration fails [`validate`](Self::validate).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> DispatchResult<Self> {
        let mut cfg = Self::defaults();

        if let Some(v) = parse_override(&lookup, ENV_MAX_ALLOCATION_ATTEMPTS)? {
            cfg.retry.max_attempts = v;
        }
        if let Some(v) = parse_override::<u64>(&lookup, ENV_RETRY_BASE_DELAY_MS)? {
            cfg.retry.base_delay = Duration::from_millis(v);
        }
        if let Some(v) = parse_override(&lookup, ENV_MAX_BEDS_PER_REQUEST)? {
            cfg.limits.max_beds_per_request = v;
        }
        if let Some(v) = parse_override(&lookup, ENV_WEIGHT_DISTANCE)? {
            cfg.weights.distance = v;
        }
        if let Some(v) = parse_override(&lookup, ENV_WEIGHT_AVAILABILITY)? {
            cfg.weights.availability = v;
        }
        if let Some(v) = parse_override(&lookup, ENV_WEIGHT_CAPABILITY)? {
            cfg.weights.capability = v;
        }
        if let Some(v) = parse_override(&lookup, ENV_AVERAGE_SPEED_KMH)? {
            cfg.average_speed_kmh = v;
        }
        if let Some(v) = parse_override::<u64>(&lookup, ENV_SWEEP_INTERVAL_SECS)? {
            cfg.sweep_interval = Duration::from_secs(v);
        }

        cfg.validate()?;
        Ok(cfg)
    }

    /// The built-in defaults from [`crate::constants`].
    pub fn defaults() -> Self {
        Self {
            weights: ScoringWeights::default(),
            retry: RetryPolicy::default(),
            limits: PolicyLimits::default(),
            breaker: CircuitBreakerConfig::default(),
            average_speed_kmh: DEFAULT_AVERAGE_SPEED_KMH,
            sweep_interval: Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
        }
    }

    /// # Errors
    ///
    /// Returns [`DispatchError::InvalidConfig`] if any value is out of range.
    pub fn validate(&self) -> DispatchResult<()> {
        if self.retry.max_attempts == 0 {
            return Err(DispatchError::InvalidConfig(format!(
                "{ENV_MAX_ALLOCATION_ATTEMPTS} must be at least 1"
            )));
        }
        if self.limits.max_beds_per_request == 0 {
            return Err(DispatchError::InvalidConfig(format!(
                "{ENV_MAX_BEDS_PER_REQUEST} must be at least 1"
            )));
        }
        let weights = [
            (ENV_WEIGHT_DISTANCE, self.weights.distance),
            (ENV_WEIGHT_AVAILABILITY, self.weights.availability),
            (ENV_WEIGHT_CAPABILITY, self.weights.capability),
            ("partial_diversion_penalty", self.weights.partial_diversion_penalty),
        ];
        for (name, value) in weights {
            if !value.is_finite() || value < 0.0 {
                return Err(DispatchError::InvalidConfig(format!(
                    "{name} must be a finite, non-negative number (got {value})"
                )));
            }
        }
        if !self.average_speed_kmh.is_finite() || self.average_speed_kmh <= 0.0 {
            return Err(DispatchError::InvalidConfig(format!(
                "{ENV_AVERAGE_SPEED_KMH} must be positive (got {})",
                self.average_speed_kmh
            )));
        }
        if self.sweep_interval.is_zero() {
            return Err(DispatchError::InvalidConfig(format!(
                "{ENV_SWEEP_INTERVAL_SECS} must be at least 1"
            )));
        }
        if self.breaker.failure_threshold == 0 {
            return Err(DispatchError::InvalidConfig(
                "circuit breaker failure threshold must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Whole minutes to cover `distance_km` at the configured average speed, rounded up.
    pub fn eta_minutes(&self, distance_km: f64) -> u32 {
        (distance_km / self.average_speed_kmh * 60.0).ceil().max(0.0) as u32
    }
}

fn parse_override<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> DispatchResult<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|e| {
            DispatchError::InvalidConfig(format!("{key}='{raw}' could not be parsed: {e}"))
        }),
    }
}
