//! # Circuit Breaker Module
//!
//! This module implements the circuit breaker pattern for calls to external
//! Google services. When a service fails repeatedly, the breaker opens and
//! calls fail fast until the reset timeout elapses.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::config::RecoveryConfig;

#[derive(Debug, Default)]
struct BreakerState {
    failure_count: u32,
    last_failure_time: Option<Instant>,
    half_open: bool,
}

/// Circuit breaker guarding one external service
///
/// # State Machine
///
/// - **Closed**: Normal operation, requests pass through
/// - **Open**: Failure threshold exceeded, requests fail fast
/// - **Half-Open**: Reset timeout elapsed, the next request is let through
///   and its outcome decides whether the breaker closes again
#[derive(Debug)]
pub struct CircuitBreaker {
    name: &'static str,
    state: Mutex<BreakerState>,
    threshold: u32,
    reset_after: Duration,
}

impl CircuitBreaker {
    /// Create a new circuit breaker for the named service
    pub fn new(name: &'static str, config: &RecoveryConfig) -> Self {
        Self {
            name,
            state: Mutex::new(BreakerState::default()),
            threshold: config.circuit_breaker_threshold,
            reset_after: Duration::from_secs(config.circuit_breaker_reset_secs),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BreakerState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Check if the circuit breaker is open (blocking requests)
    ///
    /// Returns `true` when the failure count has reached the threshold and
    /// the reset time hasn't elapsed. Once it has, the breaker goes
    /// half-open: requests pass again, and the first failure reopens it.
    pub fn is_open(&self) -> bool {
        let mut state = self.lock();

        if state.failure_count >= self.threshold {
            if let Some(last_time) = state.last_failure_time {
                if last_time.elapsed() < self.reset_after {
                    return true;
                }
                tracing::info!(service = self.name, "Circuit breaker half-open, allowing probe");
                state.failure_count = 0;
                state.half_open = true;
            }
        }
        false
    }

    /// Record a failed call
    pub fn record_failure(&self) {
        let mut state = self.lock();
        state.last_failure_time = Some(Instant::now());
        if state.half_open {
            state.half_open = false;
            state.failure_count = self.threshold;
            tracing::warn!(service = self.name, "Probe failed, circuit breaker reopened");
            return;
        }
        state.failure_count += 1;
        if state.failure_count == self.threshold {
            tracing::warn!(
                service = self.name,
                failures = state.failure_count,
                "Circuit breaker opened"
            );
        }
    }

    /// Record a successful call, closing the breaker
    pub fn record_success(&self) {
        *self.lock() = BreakerState::default();
    }

    pub fn failure_count(&self) -> u32 {
        self.lock().failure_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(threshold: u32, reset_secs: u64) -> RecoveryConfig {
        RecoveryConfig {
            circuit_breaker_threshold: threshold,
            circuit_breaker_reset_secs: reset_secs,
            ..Default::default()
        }
    }

    #[test]
    fn test_opens_after_threshold() {
        let breaker = CircuitBreaker::new("speech", &config(2, 60));
        assert!(!breaker.is_open());

        breaker.record_failure();
        assert!(!breaker.is_open());

        breaker.record_failure();
        assert!(breaker.is_open());
    }

    #[test]
    fn test_success_resets_failures() {
        let breaker = CircuitBreaker::new("vision", &config(3, 60));
        breaker.record_failure();
        breaker.record_failure();
        breaker.record_success();
        assert_eq!(breaker.failure_count(), 0);
        assert!(!breaker.is_open());
    }

    #[test]
    fn test_half_open_after_reset_timeout() {
        let breaker = CircuitBreaker::new("sheets", &config(1, 0));
        breaker.record_failure();
        // Zero reset timeout: the breaker immediately lets a probe through
        assert!(!breaker.is_open());
        assert_eq!(breaker.failure_count(), 0);
    }

    #[test]
    fn test_failed_probe_reopens_at_once() {
        let breaker = CircuitBreaker::new("speech", &config(3, 0));
        for _ in 0..3 {
            breaker.record_failure();
        }
        assert!(!breaker.is_open());

        breaker.record_failure();
        assert_eq!(breaker.failure_count(), 3);
    }

    #[test]
    fn test_successful_probe_closes() {
        let breaker = CircuitBreaker::new("vision", &config(2, 0));
        breaker.record_failure();
        breaker.record_failure();
        assert!(!breaker.is_open());

        breaker.record_success();
        breaker.record_failure();
        assert_eq!(breaker.failure_count(), 1);
    }
}
