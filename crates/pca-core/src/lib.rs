#![forbid(unsafe_code)]

//! Core: domain records, validation rules, error classification and store
//! contracts.
//!
//! # Role in the PCA client
//! `pca-core` is the bottom layer. It knows nothing about reactivity or
//! async runtimes beyond the `?Send` store traits, so everything here can be
//! used from pages, tests and tools alike.
//!
//! # Primary responsibilities
//! - **Records**: [`Record`] field lookup and [`Entity`] identity, plus the
//!   typed domain model in [`model`].
//! - **Validation**: composable [`Rule`]s and [`validate_form`].
//! - **Errors**: [`RawError`] → [`ErrorCategory`] + pt-BR message via
//!   [`ErrorClassifier`].
//! - **Stores**: [`RemoteStore`] / [`SingletonStore`] contracts and the
//!   in-memory [`MemoryStore`].
//! - **Reports**: totals and breakdowns over demands.
//!
//! # How it fits in the system
//! `pca-runtime` builds the controllers and the form engine on these types;
//! `pca-widgets` sorts and filters anything implementing [`Record`].

pub mod error;
pub mod format;
pub mod memory;
pub mod model;
pub mod record;
pub mod report;
pub mod store;
pub mod validation;
pub mod value;

pub use error::{
    Classify, ErrorCategory, ErrorClassifier, ErrorCode, ErrorResult, HandleOptions, RawError,
    classify, translate,
};
pub use memory::MemoryStore;
pub use model::{
    Demanda, DemandaStatus, Pca, PcaStatus, Prioridade, Quarter, UnidadeGestora, UnidadeRef,
};
pub use record::{Document, Entity, Record};
pub use store::{RemoteStore, ResourceStatus, SingletonStore, StatusChange, StoreOp};
pub use validation::{FieldErrors, Rule, ValidationRules, validate_form};
pub use value::Fields;
