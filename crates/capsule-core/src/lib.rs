//! Core domain logic for the capsule service.
//!
//! A capsule is a user-authored message that stays sealed until its
//! `unlock_at` timestamp passes, then becomes readable to its owner (with
//! the unlock code issued at creation), and is permanently retired a fixed
//! duration after it became readable.
//!
//! This crate holds everything with real temporal-state or authorization
//! logic:
//!
//! - [`capsule`] — the record type and its identifiers
//! - [`lifecycle`] — the pure phase evaluator (Locked / Unlockable / Expired)
//! - [`authz`] — the ownership + unlock-code gate
//! - [`service`] — create/read/list/update/delete composed from the above
//! - [`store`] — the record-store contract and an in-memory implementation
//!
//! Transport, identity, and process concerns live with the embedding
//! process (see `capsule-daemon`). The core trusts the caller identity it
//! is handed and never reads the wall clock directly; every time-dependent
//! path takes a [`clock::Clock`].

pub mod authz;
pub mod capsule;
pub mod clock;
pub mod error;
pub mod lifecycle;
pub mod service;
pub mod store;

pub use capsule::{Capsule, CapsuleId, OwnerId, UnlockCode};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::CapsuleError;
pub use lifecycle::Phase;
pub use service::{
    CapsulePage, CapsuleService, CapsuleSummary, CapsuleUpdate, CreateReceipt, UnlockedCapsule,
};
pub use store::{CapsuleStore, MemoryCapsuleStore, StoreError};
