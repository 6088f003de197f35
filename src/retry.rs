//! Retry with exponential backoff for idempotent recognition calls.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, warn};

use crate::circuit_breaker::CircuitBreaker;
use crate::config::RecoveryConfig;
use crate::errors::RecognitionError;

/// Delay before retry number `attempt` (1-based): exponential, capped, with
/// up to 25% random jitter on top.
pub fn backoff_delay(attempt: u32, config: &RecoveryConfig) -> Duration {
    let exponent = attempt.saturating_sub(1).min(16);
    let base = config
        .base_retry_delay_ms
        .saturating_mul(1u64 << exponent)
        .min(config.max_retry_delay_ms);
    let jitter = if base > 0 {
        rand::thread_rng().gen_range(0..=base / 4)
    } else {
        0
    };
    Duration::from_millis(base.saturating_add(jitter).min(config.max_retry_delay_ms))
}

fn is_transient(err: &RecognitionError) -> bool {
    matches!(
        err,
        RecognitionError::Request(_) | RecognitionError::Timeout(_)
    )
}

/// Run `operation` behind `breaker`, retrying transient failures.
///
/// Only use this for calls that are safe to repeat.
pub async fn with_retry<T, F, Fut>(
    breaker: &CircuitBreaker,
    config: &RecoveryConfig,
    mut operation: F,
) -> Result<T, RecognitionError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RecognitionError>>,
{
    let max_attempts = config.max_retries.max(1);
    let mut attempt = 1;

    loop {
        if breaker.is_open() {
            warn!(service = breaker.name(), "Circuit breaker open, failing fast");
            return Err(RecognitionError::CircuitOpen);
        }

        match operation().await {
            Ok(value) => {
                breaker.record_success();
                return Ok(value);
            }
            Err(err) => {
                // A rejected request means the service is up
                if !is_transient(&err) {
                    return Err(err);
                }
                breaker.record_failure();
                if attempt >= max_attempts {
                    return Err(err);
                }
                let delay = backoff_delay(attempt, config);
                debug!(
                    service = breaker.name(),
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Retrying after transient failure"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_config() -> RecoveryConfig {
        RecoveryConfig {
            max_retries: 3,
            base_retry_delay_ms: 0,
            max_retry_delay_ms: 0,
            circuit_breaker_threshold: 10,
            circuit_breaker_reset_secs: 60,
        }
    }

    #[test]
    fn test_backoff_is_capped() {
        let config = RecoveryConfig::default();
        for attempt in 1..10 {
            assert!(backoff_delay(attempt, &config) <= Duration::from_millis(config.max_retry_delay_ms));
        }
        assert!(backoff_delay(1, &config) >= Duration::from_millis(config.base_retry_delay_ms));
    }

    #[tokio::test]
    async fn test_transient_errors_are_retried() {
        let config = fast_config();
        let breaker = CircuitBreaker::new("test", &config);
        let calls = AtomicU32::new(0);

        let result = with_retry(&breaker, &config, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(RecognitionError::Request("reset".into()))
                } else {
                    Ok("text")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "text");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(breaker.failure_count(), 0);
    }

    #[tokio::test]
    async fn test_api_errors_are_not_retried() {
        let config = fast_config();
        let breaker = CircuitBreaker::new("test", &config);
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = with_retry(&breaker, &config, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(RecognitionError::Api("bad audio".into())) }
        })
        .await;

        assert!(matches!(result, Err(RecognitionError::Api(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(breaker.failure_count(), 0);
    }

    #[tokio::test]
    async fn test_open_breaker_fails_fast() {
        let config = RecoveryConfig {
            circuit_breaker_threshold: 1,
            ..fast_config()
        };
        let breaker = CircuitBreaker::new("test", &config);
        breaker.record_failure();

        let result: Result<(), _> = with_retry(&breaker, &config, || async { Ok(()) }).await;
        assert!(matches!(result, Err(RecognitionError::CircuitOpen)));
    }
}
