#![forbid(unsafe_code)]

//! Remote call instrumentation.
//!
//! Every controller call to a store goes through [`trace_store_call`],
//! which wraps the future in a `store.call` span carrying `resource`, `op`,
//! `duration_us` and `result`, and bumps two process-wide counters.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

use pca_core::error::{RawError, classify};
use pca_core::store::StoreOp;
use tracing::Instrument;
use web_time::Instant;

static STORE_CALLS_TOTAL: AtomicU64 = AtomicU64::new(0);
static STORE_FAILURES_TOTAL: AtomicU64 = AtomicU64::new(0);

/// Store calls issued (monotonic counter).
#[must_use]
pub fn store_calls_total() -> u64 {
    STORE_CALLS_TOTAL.load(Ordering::Relaxed)
}

/// Store calls that failed (monotonic counter).
#[must_use]
pub fn store_failures_total() -> u64 {
    STORE_FAILURES_TOTAL.load(Ordering::Relaxed)
}

/// Await a store call inside a `store.call` span.
pub async fn trace_store_call<T, Fut>(resource: &str, op: StoreOp, call: Fut) -> Result<T, RawError>
where
    Fut: Future<Output = Result<T, RawError>>,
{
    STORE_CALLS_TOTAL.fetch_add(1, Ordering::Relaxed);

    let span = tracing::debug_span!(
        "store.call",
        resource = %resource,
        op = op.as_str(),
        duration_us = tracing::field::Empty,
        result = tracing::field::Empty,
    );
    let start = Instant::now();
    let result = call.instrument(span.clone()).await;
    let duration_us = start.elapsed().as_micros() as u64;

    span.record("duration_us", duration_us);
    match &result {
        Ok(_) => {
            span.record("result", "ok");
            tracing::debug!(
                target: "pca.store",
                parent: &span,
                resource = %resource,
                op = op.as_str(),
                duration_us,
                "store call completed"
            );
        }
        Err(err) => {
            STORE_FAILURES_TOTAL.fetch_add(1, Ordering::Relaxed);
            span.record("result", "error");
            tracing::warn!(
                target: "pca.store",
                parent: &span,
                resource = %resource,
                op = op.as_str(),
                duration_us,
                category = classify(err).as_str(),
                code = ?err.code,
                "store call failed: {}",
                err.message
            );
        }
    }
    result
}
