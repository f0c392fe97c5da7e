//! Capsule operation error taxonomy.
//!
//! Every variant is a terminal outcome for the transport layer to map to a
//! wire status; no operation retries internally. No variant ever carries a
//! capsule's message content, its unlock code, or the owner identity of a
//! record the caller is not authorized to see.

use thiserror::Error;

use crate::store::StoreError;

/// Errors returned by the capsule operations service.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CapsuleError {
    /// Malformed or missing input; the caller must correct the request.
    #[error("invalid {field}: {reason}")]
    Validation {
        /// The offending input field.
        field: &'static str,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// No record for the given id. Returned uniformly whether the id never
    /// existed or was deleted, so ids cannot be enumerated.
    #[error("capsule not found: {id}")]
    NotFound {
        /// The id the caller asked for.
        id: String,
    },

    /// The caller is not the owner, or the capsule's phase forbids the
    /// requested action.
    #[error("forbidden: {reason}")]
    Forbidden {
        /// Why the action was refused.
        reason: &'static str,
    },

    /// Missing or incorrect unlock code.
    #[error("invalid unlock code")]
    Unauthorized,

    /// The capsule has been retired; its content is permanently withheld.
    #[error("capsule expired: {id}")]
    Gone {
        /// The id of the retired capsule.
        id: String,
    },

    /// The underlying store call failed. Transient; safe for the caller to
    /// retry. Backend detail goes to the logs, not the caller.
    #[error("capsule store failure")]
    Store(#[from] StoreError),
}

impl CapsuleError {
    /// Whether a retry of the same request may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Store(_))
    }
}
