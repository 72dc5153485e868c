#![forbid(unsafe_code)]

//! Client core of the annual procurement plan (PCA) application.
//!
//! This is the public facade. It re-exports the three layers and adds the
//! application-level pieces: [`AppConfig`], [`logging::init`] and the
//! current-year plan wiring in [`plan`].
//!
//! - [`pca_core`]: records, validation rules, error classification, stores.
//! - [`pca_runtime`]: controllers, the form engine, retry, reactivity.
//! - [`pca_widgets`]: the table view engine and record filters.
//!
//! ```no_run
//! use std::rc::Rc;
//! use pca::prelude::*;
//!
//! # async fn run() -> pca::Result<()> {
//! let config = AppConfig::default().validated()?;
//! pca::logging::init(&config.logging)?;
//!
//! let store = Rc::new(MemoryStore::<Demanda>::new("demandas"));
//! let demandas = CollectionController::open(store, config.classifier()).await;
//! let table = TableView::new(demandas.items(), config.table_config());
//! assert_eq!(table.current_page(), 1);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod plan;

pub use pca_core;
pub use pca_runtime;
pub use pca_widgets;

pub use config::AppConfig;
pub use error::{ConfigError, Error, Result};

/// Everything a page usually needs.
pub mod prelude {
    pub use crate::config::AppConfig;
    pub use crate::plan::{PCA_NOT_FOUND, current_year, open_current_pca, open_pca};
    pub use pca_core::validation::{
        email, max_len, max_value, min_len, non_negative, not_past_date, phone, positive,
        required,
    };
    pub use pca_core::{
        Demanda, DemandaStatus, Document, Entity, ErrorCategory, ErrorClassifier, ErrorResult,
        Fields, MemoryStore, Pca, PcaStatus, Prioridade, RawError, Record, RemoteStore, Rule,
        SingletonStore, UnidadeGestora, ValidationRules, validate_form,
    };
    pub use pca_runtime::{
        CollectionController, FieldInput, FormConfig, FormEngine, InsertPosition, RetryPolicy,
        SingletonController, SubmitEvent, SubmitOutcome, retry_with_backoff,
    };
    pub use pca_widgets::{RecordFilter, SortDirection, TableConfig, TableView};
}
