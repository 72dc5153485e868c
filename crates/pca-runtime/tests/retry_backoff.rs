use std::cell::{Cell, RefCell};
use std::time::Duration;

use pca_core::error::{ErrorCategory, ErrorClassifier, RawError};
use pca_runtime::{RetryPolicy, retry_with_backoff};
use pretty_assertions::assert_eq;
use tokio::time::Instant;

fn unavailable() -> RawError {
    RawError::with_code(503u16, "Service Unavailable")
}

#[tokio::test(start_paused = true)]
async fn network_failure_retries_once_then_rethrows() {
    let attempts = Cell::new(0u32);
    let retries = RefCell::new(Vec::new());
    let start = Instant::now();

    let result: Result<(), RawError> = retry_with_backoff(
        &RetryPolicy::default(),
        || {
            attempts.set(attempts.get() + 1);
            async { Err(unavailable()) }
        },
        |attempt, total| retries.borrow_mut().push((attempt, total)),
    )
    .await;

    assert_eq!(result, Err(unavailable()));
    assert_eq!(attempts.get(), 2);
    assert_eq!(*retries.borrow(), vec![(1, 2)]);
    let waited = start.elapsed();
    assert!(waited >= Duration::from_millis(2000));
    assert!(waited < Duration::from_millis(2100));
}

#[tokio::test(start_paused = true)]
async fn delays_grow_linearly() {
    let start = Instant::now();
    let seen = RefCell::new(Vec::new());

    let result: Result<(), RawError> = retry_with_backoff(
        &RetryPolicy::linear(3, 1000),
        || async { Err(unavailable()) },
        |attempt, _| seen.borrow_mut().push((attempt, start.elapsed().as_millis())),
    )
    .await;

    assert!(result.is_err());
    assert_eq!(*seen.borrow(), vec![(1, 1000), (2, 3000), (3, 6000)]);
}

#[tokio::test(start_paused = true)]
async fn non_network_errors_are_not_retried() {
    let attempts = Cell::new(0u32);
    let result: Result<(), RawError> = retry_with_backoff(
        &RetryPolicy::linear(5, 2000),
        || {
            attempts.set(attempts.get() + 1);
            async { Err(RawError::with_code("23505", "duplicate key")) }
        },
        |_, _| panic!("must not retry"),
    )
    .await;

    assert!(result.is_err());
    assert_eq!(attempts.get(), 1);
}

#[tokio::test(start_paused = true)]
async fn recovers_when_a_retry_succeeds() {
    let attempts = Cell::new(0u32);
    let value = retry_with_backoff(
        &RetryPolicy::linear(2, 500),
        || {
            let n = attempts.get() + 1;
            attempts.set(n);
            async move {
                if n < 2 {
                    Err(RawError::with_code("ECONNREFUSED", "connect ECONNREFUSED"))
                } else {
                    Ok(n)
                }
            }
        },
        |_, _| {},
    )
    .await;

    assert_eq!(value, Ok(2));
}

#[tokio::test(start_paused = true)]
async fn classified_results_retry_too() {
    let classifier = ErrorClassifier::new(false);
    let attempts = Cell::new(0u32);
    let result: Result<(), _> = retry_with_backoff(
        &RetryPolicy::linear(1, 10),
        || {
            attempts.set(attempts.get() + 1);
            let err = classifier.handle(&unavailable());
            async move { Err(err) }
        },
        |_, _| {},
    )
    .await;

    let err = result.unwrap_err();
    assert_eq!(err.category, ErrorCategory::Network);
    assert_eq!(attempts.get(), 2);
}
