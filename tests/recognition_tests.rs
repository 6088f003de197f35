//! # Recognition Resilience Tests
//!
//! Retry and circuit-breaker behaviour shared by the speech and OCR clients.

use std::sync::atomic::{AtomicU32, Ordering};

use taskdraft::circuit_breaker::CircuitBreaker;
use taskdraft::config::RecoveryConfig;
use taskdraft::errors::RecognitionError;
use taskdraft::retry::with_retry;

fn fast_recovery() -> RecoveryConfig {
    RecoveryConfig {
        max_retries: 3,
        base_retry_delay_ms: 1,
        max_retry_delay_ms: 5,
        circuit_breaker_threshold: 5,
        circuit_breaker_reset_secs: 60,
    }
}

#[tokio::test]
async fn test_transient_failure_recovers_on_retry() {
    let config = fast_recovery();
    let breaker = CircuitBreaker::new("speech", &config);
    let calls = AtomicU32::new(0);

    let result = with_retry(&breaker, &config, || async {
        if calls.fetch_add(1, Ordering::SeqCst) == 0 {
            Err(RecognitionError::Request("connection reset".into()))
        } else {
            Ok(Some("hello".to_string()))
        }
    })
    .await;

    assert_eq!(result.unwrap().as_deref(), Some("hello"));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(breaker.failure_count(), 0);
}

#[tokio::test]
async fn test_api_errors_are_not_retried() {
    let config = fast_recovery();
    let breaker = CircuitBreaker::new("vision", &config);
    let calls = AtomicU32::new(0);

    let result: Result<Option<String>, _> = with_retry(&breaker, &config, || async {
        calls.fetch_add(1, Ordering::SeqCst);
        Err(RecognitionError::Api("Bad image data.".into()))
    })
    .await;

    assert!(matches!(result, Err(RecognitionError::Api(_))));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(breaker.failure_count(), 0);
}

#[tokio::test]
async fn test_rejected_inputs_never_open_breaker() {
    let config = fast_recovery();
    let breaker = CircuitBreaker::new("speech", &config);

    for _ in 0..config.circuit_breaker_threshold * 2 {
        let result: Result<(), _> = with_retry(&breaker, &config, || async {
            Err(RecognitionError::Api("Invalid recognition 'config': bad encoding".into()))
        })
        .await;
        assert!(matches!(result, Err(RecognitionError::Api(_))));
    }

    assert!(!breaker.is_open());
    assert_eq!(breaker.failure_count(), 0);
}

#[tokio::test]
async fn test_retries_stop_at_limit() {
    let config = fast_recovery();
    let breaker = CircuitBreaker::new("speech", &config);
    let calls = AtomicU32::new(0);

    let result: Result<(), _> = with_retry(&breaker, &config, || async {
        calls.fetch_add(1, Ordering::SeqCst);
        Err(RecognitionError::Timeout("deadline exceeded".into()))
    })
    .await;

    assert!(matches!(result, Err(RecognitionError::Timeout(_))));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(breaker.failure_count(), 3);
}

#[tokio::test]
async fn test_open_breaker_fails_fast() {
    let config = fast_recovery();
    let breaker = CircuitBreaker::new("vision", &config);
    for _ in 0..config.circuit_breaker_threshold {
        breaker.record_failure();
    }
    let calls = AtomicU32::new(0);

    let result: Result<(), _> = with_retry(&breaker, &config, || async {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    })
    .await;

    assert!(matches!(result, Err(RecognitionError::CircuitOpen)));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_error_message_formatting() {
    assert_eq!(
        RecognitionError::UnsupportedFormat("Gif".into()).to_string(),
        "Unsupported format: Gif"
    );
    assert_eq!(
        RecognitionError::CircuitOpen.to_string(),
        "Circuit breaker is open"
    );
}
