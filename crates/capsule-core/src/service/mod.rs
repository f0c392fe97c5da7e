//! Capsule operations service.
//!
//! Composes the authorization gate and the lifecycle evaluator over a
//! [`CapsuleStore`]. Operations are independent and stateless with respect
//! to each other; the store's per-document atomicity is the only write
//! coordination. The injected [`Clock`] is the single source of "now" for
//! every phase decision.


use chrono::{DateTime, Utc};
use tracing::debug;

use crate::authz;
use crate::capsule::{Capsule, CapsuleId, OwnerId, UnlockCode};
use crate::clock::{Clock, SystemClock};
use crate::error::CapsuleError;
use crate::lifecycle::{self, Phase};
use crate::store::CapsuleStore;

/// Default page number when the caller supplies none (or zero).
pub const DEFAULT_PAGE: u32 = 1;

/// Default page size when the caller supplies none (or zero).
pub const DEFAULT_LIMIT: u32 = 10;

/// Creation receipt: the only response that ever carries the unlock code.
#[derive(Debug, Clone)]
pub struct CreateReceipt {
    /// Identifier of the new capsule.
    pub id: CapsuleId,
    /// The secret the owner must present for read/update/delete.
    pub unlock_code: UnlockCode,
}

/// A successfully unlocked capsule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnlockedCapsule {
    pub id: CapsuleId,
    pub message: String,
    pub unlock_at: DateTime<Utc>,
}

/// One entry of a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapsuleSummary {
    pub id: CapsuleId,
    pub unlock_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    /// The sweeper's retired flag, surfaced as listing metadata.
    pub expired: bool,
    /// Present once the unlock time has passed.
    ///
    /// Deliberately gated on the unlock time alone, not the phase: a
    /// retired capsule's message stays visible in listings even though a
    /// direct read returns `Gone`. Documented contract, pinned by tests.
    pub message: Option<String>,
}

/// A page of listing results.
#[derive(Debug, Clone)]
pub struct CapsulePage {
    /// Effective page number (after defaulting).
    pub page: u32,
    /// Effective page size (after defaulting).
    pub limit: u32,
    pub items: Vec<CapsuleSummary>,
}

/// Partial update request.
///
/// Explicit optional fields rather than omission/truthiness checks: `None`
/// keeps the stored value, `Some` replaces it, and an empty replacement
/// message is a validation error instead of a silent keep.
#[derive(Debug, Clone, Default)]
pub struct CapsuleUpdate {
    pub message: Option<String>,
    pub unlock_at: Option<DateTime<Utc>>,
}

/// The capsule operations service.
pub struct CapsuleService<S, C = SystemClock> {
    store: S,
    clock: C,
}

impl<S: CapsuleStore> CapsuleService<S> {
    /// Creates a service on the system clock.
    pub fn new(store: S) -> Self {
        Self {
            store,
            clock: SystemClock,
        }
    }
}

impl<S: CapsuleStore, C: Clock> CapsuleService<S, C> {
    /// Creates a service with an injected clock.
    pub fn with_clock(store: S, clock: C) -> Self {
        Self { store, clock }
    }

    /// Access to the underlying store, for privileged maintenance paths.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Creates a capsule owned by `owner`, sealed until `unlock_at`.
    ///
    /// Returns the id and the freshly generated unlock code; the code is
    /// never exposed again after this receipt.
    ///
    /// # Errors
    ///
    /// [`CapsuleError::Validation`] if `message` is empty, or a store
    /// failure.
    pub fn create(
        &self,
        owner: &OwnerId,
        message: &str,
        unlock_at: DateTime<Utc>,
    ) -> Result<CreateReceipt, CapsuleError> {
        if message.is_empty() {
            return Err(CapsuleError::Validation {
                field: "message",
                reason: "must not be empty",
            });
        }

        let capsule = Capsule::new(
            owner.clone(),
            message.to_string(),
            unlock_at,
            self.clock.now(),
        );
        self.store.insert(&capsule)?;

        debug!(capsule_id = %capsule.id, unlock_at = %capsule.unlock_at, "capsule created");

        Ok(CreateReceipt {
            id: capsule.id,
            unlock_code: capsule.unlock_code,
        })
    }

    /// Reads a capsule's content.
    ///
    /// # Errors
    ///
    /// Gate failures ([`NotFound`], [`Forbidden`], [`Unauthorized`]), then
    /// [`Gone`] for a retired capsule and [`Forbidden`] while still
    /// locked.
    ///
    /// [`NotFound`]: CapsuleError::NotFound
    /// [`Forbidden`]: CapsuleError::Forbidden
    /// [`Unauthorized`]: CapsuleError::Unauthorized
    /// [`Gone`]: CapsuleError::Gone
    pub fn read(
        &self,
        id: &CapsuleId,
        caller: &OwnerId,
        code: Option<&str>,
    ) -> Result<UnlockedCapsule, CapsuleError> {
        let record = self.store.fetch(id)?;
        let capsule = authz::authorize(record.as_ref(), id, caller, code)?;

        let phase = lifecycle::phase_of(capsule, self.clock.now());
        debug!(capsule_id = %id, phase = phase.as_str(), "read gate passed");

        // Retirement wins over the still-locked answer once the gate has
        // passed.
        match phase {
            Phase::Expired => Err(CapsuleError::Gone {
                id: id.as_str().to_string(),
            }),
            Phase::Locked => Err(CapsuleError::Forbidden {
                reason: "capsule is still locked",
            }),
            Phase::Unlockable => Ok(UnlockedCapsule {
                id: capsule.id.clone(),
                message: capsule.message.clone(),
                unlock_at: capsule.unlock_at,
            }),
        }
    }

    /// Lists `caller`'s capsules, ordered by `unlock_at` ascending.
    ///
    /// Metadata only gates on ownership; no unlock code is required.
    /// `page` and `limit` fall back to [`DEFAULT_PAGE`] / [`DEFAULT_LIMIT`]
    /// when absent or zero.
    ///
    /// # Errors
    ///
    /// Store failures only.
    pub fn list(
        &self,
        caller: &OwnerId,
        page: Option<u32>,
        limit: Option<u32>,
    ) -> Result<CapsulePage, CapsuleError> {
        let page = match page {
            Some(p) if p >= 1 => p,
            _ => DEFAULT_PAGE,
        };
        let limit = match limit {
            Some(l) if l >= 1 => l,
            _ => DEFAULT_LIMIT,
        };
        let skip = u64::from(page - 1) * u64::from(limit);

        let now = self.clock.now();
        let records = self.store.list_by_owner(caller, skip, u64::from(limit))?;

        let items = records
            .into_iter()
            .map(|capsule| {
                // Unlock time alone decides message visibility here; see
                // the field docs on `CapsuleSummary::message`.
                let still_locked = now < capsule.unlock_at;
                CapsuleSummary {
                    id: capsule.id,
                    unlock_at: capsule.unlock_at,
                    created_at: capsule.created_at,
                    expired: capsule.is_expired,
                    message: if still_locked {
                        None
                    } else {
                        Some(capsule.message)
                    },
                }
            })
            .collect();

        Ok(CapsulePage { page, limit, items })
    }

    /// Applies a partial update to a still-locked capsule.
    ///
    /// # Errors
    ///
    /// Gate failures, [`CapsuleError::Forbidden`] once the capsule is no
    /// longer locked (unlocked or expired), and
    /// [`CapsuleError::Validation`] for an empty replacement message.
    pub fn update(
        &self,
        id: &CapsuleId,
        caller: &OwnerId,
        code: Option<&str>,
        update: CapsuleUpdate,
    ) -> Result<(), CapsuleError> {
        let record = self.store.fetch(id)?;
        let capsule = authz::authorize(record.as_ref(), id, caller, code)?;

        if lifecycle::phase_of(capsule, self.clock.now()) != Phase::Locked {
            return Err(CapsuleError::Forbidden {
                reason: "capsule already unlocked, cannot update",
            });
        }

        if let Some(message) = &update.message {
            if message.is_empty() {
                return Err(CapsuleError::Validation {
                    field: "message",
                    reason: "must not be empty",
                });
            }
        }

        let mut revised = capsule.clone();
        if let Some(message) = update.message {
            revised.message = message;
        }
        if let Some(unlock_at) = update.unlock_at {
            revised.unlock_at = unlock_at;
        }

        if !self.store.update(&revised)? {
            // Deleted between fetch and write; uniform NotFound.
            return Err(CapsuleError::NotFound {
                id: id.as_str().to_string(),
            });
        }

        debug!(capsule_id = %id, "capsule updated");
        Ok(())
    }

    /// Permanently deletes a still-locked capsule.
    ///
    /// Not idempotent by design: a repeated delete reports `NotFound`.
    ///
    /// # Errors
    ///
    /// Gate failures, or [`CapsuleError::Forbidden`] once the capsule is
    /// no longer locked.
    pub fn delete(
        &self,
        id: &CapsuleId,
        caller: &OwnerId,
        code: Option<&str>,
    ) -> Result<(), CapsuleError> {
        let record = self.store.fetch(id)?;
        let capsule = authz::authorize(record.as_ref(), id, caller, code)?;

        if lifecycle::phase_of(capsule, self.clock.now()) != Phase::Locked {
            return Err(CapsuleError::Forbidden {
                reason: "capsule already unlocked, cannot delete",
            });
        }

        if !self.store.delete(id)? {
            return Err(CapsuleError::NotFound {
                id: id.as_str().to_string(),
            });
        }

        debug!(capsule_id = %id, "capsule deleted");
        Ok(())
    }
}
