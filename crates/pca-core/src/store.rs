#![forbid(unsafe_code)]

//! Contracts for the remote side of the application.
//!
//! Controllers depend only on these traits. Production builds plug in an
//! HTTP-backed implementation per resource kind; tests use
//! [`MemoryStore`](crate::memory::MemoryStore).
//!
//! All futures are `?Send`: the client runs on a single cooperative thread
//! and stores may hold `Rc` state.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::RawError;
use crate::record::Entity;

/// Remote operation kind, used for logging and failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StoreOp {
    GetAll,
    Create,
    Update,
    Delete,
    Fetch,
    UpdateStatus,
}

impl StoreOp {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::GetAll => "get_all",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Fetch => "fetch",
            Self::UpdateStatus => "update_status",
        }
    }
}

impl fmt::Display for StoreOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A list-shaped remote resource.
///
/// `create` returns the stored entity with the identity and any computed
/// fields filled in by the server.
#[async_trait(?Send)]
pub trait RemoteStore {
    type Entity: Entity;
    /// Input accepted by `create`.
    type Draft;
    /// Partial input accepted by `update`.
    type Patch;

    /// Resource name used in logs, e.g. `"demandas"`.
    fn resource(&self) -> &str;

    async fn get_all(&self) -> Result<Vec<Self::Entity>, RawError>;
    async fn create(&self, draft: Self::Draft) -> Result<Self::Entity, RawError>;
    async fn update(&self, id: &str, patch: Self::Patch) -> Result<Self::Entity, RawError>;
    async fn delete(&self, id: &str) -> Result<(), RawError>;
}

/// Lifecycle status of a singleton resource.
pub trait ResourceStatus: Clone + fmt::Debug + PartialEq + 'static {
    /// Whether moving to this status also stamps the completion timestamp.
    fn stamps_completion(&self) -> bool;
}

/// A status write, optionally carrying the completion timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusChange<S> {
    pub status: S,
    pub completed_at: Option<DateTime<Utc>>,
}

impl<S: ResourceStatus> StatusChange<S> {
    /// Build the write for `status`, stamping `now` when the status calls
    /// for it.
    pub fn new(status: S, now: DateTime<Utc>) -> Self {
        let completed_at = status.stamps_completion().then_some(now);
        Self {
            status,
            completed_at,
        }
    }
}

/// A single remote resource selected by a key, e.g. the plan of a year.
///
/// `fetch` resolves to `Ok(None)` when no resource exists for the key.
#[async_trait(?Send)]
pub trait SingletonStore {
    type Resource: Entity;
    type Key: Clone + fmt::Debug;
    type Status: ResourceStatus;

    fn resource(&self) -> &str;

    async fn fetch(&self, key: &Self::Key) -> Result<Option<Self::Resource>, RawError>;
    async fn update_status(
        &self,
        id: &str,
        change: StatusChange<Self::Status>,
    ) -> Result<Self::Resource, RawError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PcaStatus;
    use chrono::TimeZone;

    #[test]
    fn only_completing_statuses_carry_a_timestamp() {
        let now = Utc.with_ymd_and_hms(2026, 5, 1, 12, 0, 0).unwrap();
        let published = StatusChange::new(PcaStatus::Publicado, now);
        assert_eq!(published.completed_at, Some(now));
        let draft = StatusChange::new(PcaStatus::Aprovado, now);
        assert_eq!(draft.completed_at, None);
    }

    #[test]
    fn op_names() {
        assert_eq!(StoreOp::GetAll.to_string(), "get_all");
        assert_eq!(StoreOp::UpdateStatus.as_str(), "update_status");
    }
}
