#![forbid(unsafe_code)]

//! Wiring for the plan of the current year.

use std::rc::Rc;

use chrono::{Datelike, Local};
use pca_core::error::ErrorClassifier;
use pca_core::store::SingletonStore;
use pca_runtime::SingletonController;

/// Returned by status changes when the current year has no plan.
pub const PCA_NOT_FOUND: &str = "PCA do ano atual não encontrado.";

/// Calendar year in local time.
#[must_use]
pub fn current_year() -> i32 {
    Local::now().year()
}

/// Controller for the plan of `ano`, loaded before returning.
pub async fn open_pca<S>(store: Rc<S>, ano: i32, classifier: ErrorClassifier) -> SingletonController<S>
where
    S: SingletonStore<Key = i32>,
{
    SingletonController::open(store, ano, classifier)
        .await
        .missing_message(PCA_NOT_FOUND)
}

/// [`open_pca`] for [`current_year`].
pub async fn open_current_pca<S>(store: Rc<S>, classifier: ErrorClassifier) -> SingletonController<S>
where
    S: SingletonStore<Key = i32>,
{
    open_pca(store, current_year(), classifier).await
}
