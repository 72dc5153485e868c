#![forbid(unsafe_code)]

//! Controllers that keep local state in sync with a remote store.
//!
//! Both controllers follow the confirmed-write model: local state changes
//! only after the store reports success. Every store failure is classified
//! into an [`ErrorResult`] before it reaches the caller.
//!
//! Operations take `&self` and may overlap. There is no queueing, so
//! whichever call completes last decides the final state for a given id.

mod collection;
mod singleton;

pub use collection::{CollectionController, CollectionState, InsertPosition};
pub use singleton::{SingletonController, SingletonState};

use std::future::Future;

use pca_core::error::{ErrorClassifier, ErrorResult, HandleOptions, RawError};
use pca_core::store::StoreOp;

use crate::effect::trace_store_call;

/// Run one traced store call and classify its failure.
pub(crate) async fn guarded<T>(
    classifier: &ErrorClassifier,
    resource: &str,
    op: StoreOp,
    call: impl Future<Output = Result<T, RawError>>,
) -> Result<T, ErrorResult> {
    trace_store_call(resource, op, call).await.map_err(|err| {
        let context = format!("{op} {resource}");
        classifier.handle_with(
            &err,
            HandleOptions {
                context: &context,
                debug: None,
            },
        )
    })
}
