#![forbid(unsafe_code)]

//! One keyed resource with a status transition, e.g. the plan of the
//! current year.

use std::rc::Rc;

use chrono::Utc;
use pca_core::error::{ErrorCategory, ErrorClassifier, ErrorResult};
use pca_core::record::Entity;
use pca_core::store::{SingletonStore, StatusChange, StoreOp};
use tracing::debug;

use super::guarded;
use crate::reactive::Observable;

/// Message returned by `update_status` when nothing is loaded.
pub const DEFAULT_MISSING_MESSAGE: &str = "Recurso não encontrado.";

/// Snapshot published by a [`SingletonController`].
#[derive(Debug, Clone, PartialEq)]
pub struct SingletonState<R> {
    /// `None` until loaded, or when the store has nothing for the key.
    pub resource: Option<R>,
    pub loading: bool,
    pub error: Option<String>,
}

impl<R> Default for SingletonState<R> {
    fn default() -> Self {
        Self {
            resource: None,
            loading: false,
            error: None,
        }
    }
}

pub struct SingletonController<S: SingletonStore> {
    store: Rc<S>,
    key: S::Key,
    classifier: ErrorClassifier,
    missing_message: String,
    state: Observable<SingletonState<S::Resource>>,
}

impl<S: SingletonStore> std::fmt::Debug for SingletonController<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SingletonController")
            .field("resource", &self.store.resource())
            .field("key", &self.key)
            .field("state", &self.state)
            .finish()
    }
}

impl<S: SingletonStore> SingletonController<S> {
    pub fn new(store: Rc<S>, key: S::Key, classifier: ErrorClassifier) -> Self {
        Self {
            store,
            key,
            classifier,
            missing_message: DEFAULT_MISSING_MESSAGE.to_string(),
            state: Observable::new(SingletonState::default()),
        }
    }

    /// Create the controller and run the initial load.
    pub async fn open(store: Rc<S>, key: S::Key, classifier: ErrorClassifier) -> Self {
        let controller = Self::new(store, key, classifier);
        let _ = controller.refresh().await;
        controller
    }

    /// Message for `update_status` calls made with nothing loaded.
    #[must_use]
    pub fn missing_message(mut self, message: impl Into<String>) -> Self {
        self.missing_message = message.into();
        self
    }

    /// Reload the resource for the current key.
    ///
    /// A key with no resource is not an error: `resource` becomes `None`.
    pub async fn refresh(&self) -> Result<(), ErrorResult> {
        self.state.update(|s| {
            s.loading = true;
            s.error = None;
        });
        let result = guarded(
            &self.classifier,
            self.store.resource(),
            StoreOp::Fetch,
            self.store.fetch(&self.key),
        )
        .await;
        match result {
            Ok(resource) => {
                debug!(
                    target: "pca.store",
                    resource = self.store.resource(),
                    key = ?self.key,
                    found = resource.is_some(),
                    "singleton loaded"
                );
                self.state.update(|s| {
                    s.resource = resource;
                    s.loading = false;
                });
                Ok(())
            }
            Err(err) => {
                self.state.update(|s| {
                    s.error = Some(err.message.clone());
                    s.loading = false;
                });
                Err(err)
            }
        }
    }

    /// Move the loaded resource to `status` and keep the server's copy.
    ///
    /// Fails with [`ErrorCategory::NotFound`] without calling the store
    /// when nothing is loaded.
    pub async fn update_status(&self, status: S::Status) -> Result<S::Resource, ErrorResult> {
        let Some(id) = self.state.with(|s| s.resource.as_ref().map(|r| r.id().to_string())) else {
            return Err(ErrorResult::local(
                ErrorCategory::NotFound,
                self.missing_message.clone(),
            ));
        };
        let change = StatusChange::new(status, Utc::now());
        let updated = guarded(
            &self.classifier,
            self.store.resource(),
            StoreOp::UpdateStatus,
            self.store.update_status(&id, change),
        )
        .await?;
        let stored = updated.clone();
        self.state.update(move |s| s.resource = Some(stored));
        Ok(updated)
    }

    #[must_use]
    pub fn resource(&self) -> Option<S::Resource> {
        self.state.with(|s| s.resource.clone())
    }

    #[must_use]
    pub fn loading(&self) -> bool {
        self.state.with(|s| s.loading)
    }

    #[must_use]
    pub fn error(&self) -> Option<String> {
        self.state.with(|s| s.error.clone())
    }

    #[must_use]
    pub fn key(&self) -> &S::Key {
        &self.key
    }

    #[must_use]
    pub fn state(&self) -> &Observable<SingletonState<S::Resource>> {
        &self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pca_core::error::RawError;
    use pca_core::memory::MemoryStore;
    use pca_core::model::{Pca, PcaStatus};

    fn pca(id: &str, ano: i32) -> Pca {
        Pca {
            id: id.into(),
            ano,
            titulo: format!("PCA {ano}"),
            valor_total: 0.0,
            status: PcaStatus::Rascunho,
            created_at: None,
            published_at: None,
        }
    }

    #[tokio::test]
    async fn publishing_stamps_timestamp_from_server_copy() {
        let store = Rc::new(MemoryStore::new("pca").with_rows([pca("p1", 2026)]));
        let controller =
            SingletonController::open(store, 2026, ErrorClassifier::new(false)).await;

        let updated = controller.update_status(PcaStatus::Publicado).await.unwrap();
        assert_eq!(updated.status, PcaStatus::Publicado);
        assert!(updated.published_at.is_some());
        assert_eq!(controller.resource(), Some(updated));
    }

    #[tokio::test]
    async fn other_statuses_leave_timestamp_unset() {
        let store = Rc::new(MemoryStore::new("pca").with_rows([pca("p1", 2026)]));
        let controller =
            SingletonController::open(store, 2026, ErrorClassifier::new(false)).await;
        let updated = controller.update_status(PcaStatus::EmAnalise).await.unwrap();
        assert_eq!(updated.published_at, None);
    }

    #[tokio::test]
    async fn missing_resource_fails_fast() {
        let store = Rc::new(MemoryStore::new("pca").with_rows([pca("p1", 2025)]));
        let controller =
            SingletonController::open(Rc::clone(&store), 2026, ErrorClassifier::new(false))
                .await
                .missing_message("PCA do ano atual não encontrado.");
        assert_eq!(controller.resource(), None);
        assert_eq!(controller.error(), None);

        let err = controller.update_status(PcaStatus::Publicado).await.unwrap_err();
        assert_eq!(err.category, ErrorCategory::NotFound);
        assert_eq!(err.message, "PCA do ano atual não encontrado.");
        assert_eq!(store.call_count(StoreOp::UpdateStatus), 0);
    }

    #[tokio::test]
    async fn failed_status_write_keeps_resource() {
        let store = Rc::new(MemoryStore::new("pca").with_rows([pca("p1", 2026)]));
        let controller =
            SingletonController::open(Rc::clone(&store), 2026, ErrorClassifier::new(false))
                .await;
        store.fail_next(
            StoreOp::UpdateStatus,
            RawError::with_code("42501", "permission denied for table pca"),
        );
        let err = controller.update_status(PcaStatus::Aprovado).await.unwrap_err();
        assert!(err.is_permission());
        assert_eq!(controller.resource().map(|p| p.status), Some(PcaStatus::Rascunho));
        assert_eq!(controller.error(), None);
    }

    #[tokio::test]
    async fn failed_refresh_keeps_resource_and_sets_error() {
        let store = Rc::new(MemoryStore::new("pca").with_rows([pca("p1", 2026)]));
        let controller =
            SingletonController::open(Rc::clone(&store), 2026, ErrorClassifier::new(false))
                .await;
        store.fail_next(StoreOp::Fetch, RawError::with_code(503u16, "Service Unavailable"));

        let err = controller.refresh().await.unwrap_err();
        assert_eq!(err.category, ErrorCategory::Network);
        assert_eq!(controller.error(), Some(err.message));
        assert_eq!(controller.resource().map(|p| p.id), Some("p1".to_string()));
        assert!(!controller.loading());

        controller.refresh().await.unwrap();
        assert_eq!(controller.error(), None);
    }
}
