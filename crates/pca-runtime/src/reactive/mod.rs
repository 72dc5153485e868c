#![forbid(unsafe_code)]

//! Single-threaded reactive state.
//!
//! - [`Observable`]: shared value with change notification.
//! - [`BatchScope`]: defers notifications and scheduled work until the
//!   outermost scope closes.

pub mod batch;
pub mod observable;

pub use batch::{BatchScope, defer_or_run, defer_or_run_keyed, is_batching};
pub use observable::{Observable, Subscription};
