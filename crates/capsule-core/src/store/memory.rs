//! In-memory store implementation.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};

use super::{CapsuleStore, StoreError};
use crate::capsule::{Capsule, CapsuleId, OwnerId};

/// `HashMap`-backed store for unit tests and lightweight embedders.
///
/// Write atomicity comes from holding the map's write lock for the whole
/// mutation, mirroring the per-document atomicity the contract requires of
/// durable backends.
#[derive(Debug, Default)]
pub struct MemoryCapsuleStore {
    records: RwLock<HashMap<CapsuleId, Capsule>>,
}

impl MemoryCapsuleStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored capsules.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::LockPoisoned`] if a writer panicked.
    pub fn len(&self) -> Result<usize, StoreError> {
        Ok(self
            .records
            .read()
            .map_err(|_| StoreError::LockPoisoned)?
            .len())
    }

    /// Whether the store is empty.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::LockPoisoned`] if a writer panicked.
    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }
}

impl CapsuleStore for MemoryCapsuleStore {
    fn insert(&self, capsule: &Capsule) -> Result<(), StoreError> {
        let mut records = self.records.write().map_err(|_| StoreError::LockPoisoned)?;
        records.insert(capsule.id.clone(), capsule.clone());
        Ok(())
    }

    fn fetch(&self, id: &CapsuleId) -> Result<Option<Capsule>, StoreError> {
        let records = self.records.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(records.get(id).cloned())
    }

    fn update(&self, capsule: &Capsule) -> Result<bool, StoreError> {
        let mut records = self.records.write().map_err(|_| StoreError::LockPoisoned)?;
        match records.get_mut(&capsule.id) {
            Some(slot) => {
                *slot = capsule.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn delete(&self, id: &CapsuleId) -> Result<bool, StoreError> {
        let mut records = self.records.write().map_err(|_| StoreError::LockPoisoned)?;
        Ok(records.remove(id).is_some())
    }

    fn list_by_owner(
        &self,
        owner: &OwnerId,
        skip: u64,
        limit: u64,
    ) -> Result<Vec<Capsule>, StoreError> {
        let records = self.records.read().map_err(|_| StoreError::LockPoisoned)?;
        let mut owned: Vec<Capsule> = records
            .values()
            .filter(|c| c.owner == *owner)
            .cloned()
            .collect();
        // Secondary key keeps ordering stable when unlock times collide.
        owned.sort_by(|a, b| {
            a.unlock_at
                .cmp(&b.unlock_at)
                .then_with(|| a.id.as_str().cmp(b.id.as_str()))
        });
        Ok(owned
            .into_iter()
            .skip(usize::try_from(skip).unwrap_or(usize::MAX))
            .take(usize::try_from(limit).unwrap_or(usize::MAX))
            .collect())
    }

    fn expire_older_than(&self, threshold: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut records = self.records.write().map_err(|_| StoreError::LockPoisoned)?;
        let mut transitioned = 0u64;
        for capsule in records.values_mut() {
            if !capsule.is_expired && capsule.unlock_at < threshold {
                capsule.is_expired = true;
                transitioned += 1;
            }
        }
        Ok(transitioned)
    }
}
