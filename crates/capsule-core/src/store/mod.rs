//! Record store contract.
//!
//! The core assumes a durable store with per-document atomic writes and an
//! atomic bulk-conditional update; it implements no locking of its own.
//! `capsule-daemon` provides the SQLite-backed implementation;
//! [`MemoryCapsuleStore`] here backs unit tests and lightweight embedders.

mod memory;

pub use memory::MemoryCapsuleStore;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::capsule::{Capsule, CapsuleId, OwnerId};

/// Errors surfaced by a store backend.
///
/// Carries backend detail for logging; [`crate::CapsuleError`] wraps it
/// with a generic display so the detail never reaches callers.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    /// The backend rejected or failed the operation.
    #[error("store backend error: {detail}")]
    Backend {
        /// Backend-specific failure description.
        detail: String,
    },

    /// A store lock was poisoned by a panic in another thread.
    #[error("store lock poisoned")]
    LockPoisoned,
}

/// Durable capsule storage.
///
/// Methods are synchronous; async hosts drive them from blocking-tolerant
/// tasks. Single-record writes and [`expire_older_than`] must be atomic in
/// the backend.
///
/// [`expire_older_than`]: CapsuleStore::expire_older_than
pub trait CapsuleStore: Send + Sync {
    /// Persists a new capsule.
    fn insert(&self, capsule: &Capsule) -> Result<(), StoreError>;

    /// Fetches a capsule by id, `None` if absent.
    fn fetch(&self, id: &CapsuleId) -> Result<Option<Capsule>, StoreError>;

    /// Replaces the stored record for `capsule.id`.
    ///
    /// Returns `false` if the record no longer exists.
    fn update(&self, capsule: &Capsule) -> Result<bool, StoreError>;

    /// Removes a capsule permanently.
    ///
    /// Returns `false` if the record did not exist.
    fn delete(&self, id: &CapsuleId) -> Result<bool, StoreError>;

    /// Lists `owner`'s capsules ordered by `unlock_at` ascending, skipping
    /// `skip` records and returning at most `limit`.
    fn list_by_owner(
        &self,
        owner: &OwnerId,
        skip: u64,
        limit: u64,
    ) -> Result<Vec<Capsule>, StoreError>;

    /// Bulk-conditionally retires capsules: sets `is_expired = true` on
    /// every record with `unlock_at < threshold` that is not yet expired.
    ///
    /// Returns the number of records transitioned. Must be idempotent and
    /// atomic per matching record.
    fn expire_older_than(&self, threshold: DateTime<Utc>) -> Result<u64, StoreError>;
}

/// Shared handles store like the stores they wrap.
impl<S: CapsuleStore + ?Sized> CapsuleStore for std::sync::Arc<S> {
    fn insert(&self, capsule: &Capsule) -> Result<(), StoreError> {
        (**self).insert(capsule)
    }

    fn fetch(&self, id: &CapsuleId) -> Result<Option<Capsule>, StoreError> {
        (**self).fetch(id)
    }

    fn update(&self, capsule: &Capsule) -> Result<bool, StoreError> {
        (**self).update(capsule)
    }

    fn delete(&self, id: &CapsuleId) -> Result<bool, StoreError> {
        (**self).delete(id)
    }

    fn list_by_owner(
        &self,
        owner: &OwnerId,
        skip: u64,
        limit: u64,
    ) -> Result<Vec<Capsule>, StoreError> {
        (**self).list_by_owner(owner, skip, limit)
    }

    fn expire_older_than(&self, threshold: DateTime<Utc>) -> Result<u64, StoreError> {
        (**self).expire_older_than(threshold)
    }
}
