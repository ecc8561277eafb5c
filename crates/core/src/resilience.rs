//! Bounded retry with jittered backoff, and a circuit breaker for external dependencies.

use crate::config::CircuitBreakerConfig;
use rand::Rng;
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Retry budget for conflict-prone operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one. Never zero.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: Duration,
}

impl RetryPolicy {
    /// Exponential delay for the given zero-based retry number, capped at `max_delay`.
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// [`backoff`](Self::backoff) plus a uniformly random jitter in `[0, jitter]`.
    pub fn jittered(&self, retry: u32) -> Duration {
        let jitter_ms = self.jitter.as_millis() as u64;
        let extra = if jitter_ms == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=jitter_ms)
        };
        self.backoff(retry) + Duration::from_millis(extra)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug)]
struct BreakerState {
    failures: VecDeque<Instant>,
    opened_at: Option<Instant>,
    probing: bool,
}

/// Fails fast after repeated failures against one dependency.
///
/// The breaker opens once `failure_threshold` failures land within `window`. While open, calls
/// are refused until `cooldown` has elapsed; then exactly one probe is let through
/// (half-open). A successful probe closes the breaker, a failed one re-opens it.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    state: Mutex<BreakerState>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            state: Mutex::new(BreakerState {
                failures: VecDeque::new(),
                opened_at: None,
                probing: false,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> CircuitState {
        self.state_at(Instant::now())
    }

    pub fn state_at(&self, now: Instant) -> CircuitState {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match state.opened_at {
            None => CircuitState::Closed,
            Some(opened) if now.duration_since(opened) >= self.config.cooldown => {
                CircuitState::HalfOpen
            }
            Some(_) => CircuitState::Open,
        }
    }

    /// Whether a call may proceed now.
    pub fn allow(&self) -> bool {
        self.allow_at(Instant::now())
    }

    pub fn allow_at(&self, now: Instant) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match state.opened_at {
            None => true,
            Some(opened) if now.duration_since(opened) >= self.config.cooldown => {
                if state.probing {
                    false
                } else {
                    state.probing = true;
                    true
                }
            }
            Some(_) => false,
        }
    }

    pub fn record_success(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.failures.clear();
        state.opened_at = None;
        state.probing = false;
    }

    pub fn record_failure(&self) {
        self.record_failure_at(Instant::now());
    }

    pub fn record_failure_at(&self, now: Instant) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        if state.probing {
            state.probing = false;
            state.opened_at = Some(now);
            tracing::warn!(breaker = %self.name, "probe failed, circuit re-opened");
            return;
        }

        state.failures.push_back(now);
        while let Some(&oldest) = state.failures.front() {
            if now.duration_since(oldest) > self.config.window {
                state.failures.pop_front();
            } else {
                break;
            }
        }

        if state.opened_at.is_none() && state.failures.len() as u32 >= self.config.failure_threshold
        {
            state.opened_at = Some(now);
            tracing::warn!(
                breaker = %self.name,
                failures = state.failures.len(),
                "circuit opened"
            );
        }
    }
}
