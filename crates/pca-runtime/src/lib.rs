#![forbid(unsafe_code)]

//! Runtime: reactive state, remote-synchronized controllers, the form
//! engine and retry.
//!
//! # Role in the PCA client
//! `pca-runtime` is the stateful layer between pages and the remote store.
//! Everything runs on one cooperative thread: state is `Rc`-shared and
//! futures are `?Send`.
//!
//! # Primary responsibilities
//! - **Reactivity**: [`Observable`] values with [`BatchScope`] deferral.
//! - **Controllers**: [`CollectionController`] and [`SingletonController`]
//!   apply confirmed writes and classify every store failure.
//! - **Forms**: [`FormEngine`] tracks values, errors, touched flags and the
//!   submit lifecycle.
//! - **Retry**: [`retry_with_backoff`] retries network failures with a
//!   [`RetryPolicy`].
//! - **Instrumentation**: `store.call` spans and call counters in
//!   [`effect`].
//!
//! # How it fits in the system
//! Built on `pca-core` records, rules and store traits. Pages feed
//! controller items into `pca-widgets` tables and bind form controls to a
//! [`FormEngine`] whose submit callback calls a controller.

pub mod controller;
pub mod effect;
pub mod form;
pub mod reactive;
pub mod retry;

pub use controller::{
    CollectionController, CollectionState, InsertPosition, SingletonController, SingletonState,
};
pub use effect::{store_calls_total, store_failures_total};
pub use form::{FieldInput, FormConfig, FormEngine, FormFlags, FormState, SubmitEvent, SubmitOutcome};
pub use reactive::{BatchScope, Observable, Subscription};
pub use retry::{BackoffStrategy, RetryPolicy, retry_with_backoff};
