#![forbid(unsafe_code)]

//! List-shaped resources: load, create, update, delete.

use std::rc::Rc;

use pca_core::error::{ErrorClassifier, ErrorResult};
use pca_core::record::Entity;
use pca_core::store::{RemoteStore, StoreOp};
use tracing::debug;

use super::guarded;
use crate::reactive::Observable;

/// Where a newly created entity lands in the local list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InsertPosition {
    /// Newest first.
    #[default]
    Front,
    Back,
}

/// Snapshot published by a [`CollectionController`].
///
/// `loading` is true only while a refresh is outstanding. `error` holds the
/// message of the last failed refresh; mutation failures never touch it.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionState<E> {
    pub items: Vec<E>,
    pub loading: bool,
    pub error: Option<String>,
}

impl<E> Default for CollectionState<E> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            loading: false,
            error: None,
        }
    }
}

/// Owns the local copy of one list-shaped resource.
pub struct CollectionController<S: RemoteStore> {
    store: Rc<S>,
    classifier: ErrorClassifier,
    insert_position: InsertPosition,
    state: Observable<CollectionState<S::Entity>>,
}

impl<S: RemoteStore> std::fmt::Debug for CollectionController<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionController")
            .field("resource", &self.store.resource())
            .field("insert_position", &self.insert_position)
            .field("state", &self.state)
            .finish()
    }
}

impl<S: RemoteStore> CollectionController<S> {
    /// Controller with an empty list. Nothing is fetched until
    /// [`refresh`](Self::refresh).
    pub fn new(store: Rc<S>, classifier: ErrorClassifier) -> Self {
        Self {
            store,
            classifier,
            insert_position: InsertPosition::default(),
            state: Observable::new(CollectionState::default()),
        }
    }

    /// Create the controller and run the initial load.
    ///
    /// A failed load is recorded in [`error`](Self::error); the controller
    /// is returned either way.
    pub async fn open(store: Rc<S>, classifier: ErrorClassifier) -> Self {
        let controller = Self::new(store, classifier);
        // Failure is already recorded in the state.
        let _ = controller.refresh().await;
        controller
    }

    #[must_use]
    pub fn insert_position(mut self, position: InsertPosition) -> Self {
        self.insert_position = position;
        self
    }

    /// Reload the whole list, replacing `items` on success.
    pub async fn refresh(&self) -> Result<(), ErrorResult> {
        self.state.update(|s| {
            s.loading = true;
            s.error = None;
        });
        let result = guarded(
            &self.classifier,
            self.store.resource(),
            StoreOp::GetAll,
            self.store.get_all(),
        )
        .await;
        match result {
            Ok(items) => {
                debug!(
                    target: "pca.store",
                    resource = self.store.resource(),
                    count = items.len(),
                    "collection loaded"
                );
                self.state.update(|s| {
                    s.items = items;
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

    /// Create an entity and insert the stored copy locally.
    pub async fn create(&self, draft: S::Draft) -> Result<S::Entity, ErrorResult> {
        let created = guarded(
            &self.classifier,
            self.store.resource(),
            StoreOp::Create,
            self.store.create(draft),
        )
        .await?;
        let position = self.insert_position;
        let inserted = created.clone();
        self.state.update(move |s| match position {
            InsertPosition::Front => s.items.insert(0, inserted),
            InsertPosition::Back => s.items.push(inserted),
        });
        Ok(created)
    }

    /// Update an entity and replace the local copy in place.
    pub async fn update(&self, id: &str, patch: S::Patch) -> Result<S::Entity, ErrorResult> {
        let updated = guarded(
            &self.classifier,
            self.store.resource(),
            StoreOp::Update,
            self.store.update(id, patch),
        )
        .await?;
        self.state.update(|s| {
            for item in s.items.iter_mut().filter(|item| item.id() == id) {
                *item = updated.clone();
            }
        });
        Ok(updated)
    }

    /// Delete an entity and drop the local copy.
    pub async fn delete(&self, id: &str) -> Result<(), ErrorResult> {
        guarded(
            &self.classifier,
            self.store.resource(),
            StoreOp::Delete,
            self.store.delete(id),
        )
        .await?;
        self.state.update(|s| s.items.retain(|item| item.id() != id));
        Ok(())
    }

    #[must_use]
    pub fn items(&self) -> Vec<S::Entity> {
        self.state.with(|s| s.items.clone())
    }

    #[must_use]
    pub fn loading(&self) -> bool {
        self.state.with(|s| s.loading)
    }

    #[must_use]
    pub fn error(&self) -> Option<String> {
        self.state.with(|s| s.error.clone())
    }

    /// Observable state for subscribers.
    #[must_use]
    pub fn state(&self) -> &Observable<CollectionState<S::Entity>> {
        &self.state
    }

    #[must_use]
    pub fn store(&self) -> &Rc<S> {
        &self.store
    }
}
