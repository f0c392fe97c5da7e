//! The capsule record and its identifiers.
//!
//! `Capsule` is pure data: immutable identity and provenance set at
//! creation, a message and unlock time that are mutable only while the
//! capsule is still locked, and a monotonic expired flag that only the
//! expiration sweeper ever sets. All behaviour lives in [`crate::lifecycle`]
//! and [`crate::service`].

use std::fmt;

use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

/// Number of random bytes behind an unlock code (hex-encoded to 8 chars).
pub const UNLOCK_CODE_BYTES: usize = 4;

/// Unique capsule identifier (UUID v4, opaque to callers).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapsuleId(String);

impl CapsuleId {
    /// Generates a fresh random identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Wraps an identifier received from a caller or the store.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CapsuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque owner identity supplied by the identity provider.
///
/// The core trusts this verbatim; it never issues or validates credentials.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(String);

impl OwnerId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The secret required, in addition to ownership, to read, update, or
/// delete a capsule.
///
/// Generated once at creation from the OS CSPRNG and returned exactly once
/// in the creation receipt. `Debug` is redacted so the code never leaks
/// through logs; comparison is constant-time.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnlockCode(String);

impl UnlockCode {
    /// Generates a fresh code: [`UNLOCK_CODE_BYTES`] random bytes,
    /// lowercase-hex encoded.
    #[must_use]
    pub fn generate() -> Self {
        use std::fmt::Write;

        let mut bytes = [0u8; UNLOCK_CODE_BYTES];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        let mut code = String::with_capacity(UNLOCK_CODE_BYTES * 2);
        for byte in bytes {
            // Writing to a String cannot fail.
            let _ = write!(code, "{byte:02x}");
        }
        Self(code)
    }

    /// Wraps a code loaded from the store.
    #[must_use]
    pub fn from_stored(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Constant-time comparison against a caller-supplied code.
    ///
    /// `ct_eq` rejects length mismatches without inspecting content, so a
    /// wrong-length guess learns nothing about the secret either.
    #[must_use]
    pub fn verify(&self, supplied: &str) -> bool {
        bool::from(self.0.as_bytes().ct_eq(supplied.as_bytes()))
    }

    /// Exposes the code for the one-time creation receipt and for
    /// persistence. Call sites outside the store and the creation path
    /// should not need this.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for UnlockCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("UnlockCode(<redacted>)")
    }
}

/// A stored capsule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capsule {
    /// Immutable identity, assigned at creation.
    pub id: CapsuleId,

    /// The identity that created the capsule. Never changes.
    pub owner: OwnerId,

    /// The sealed message. Non-empty; mutable only while locked.
    pub message: String,

    /// When the capsule becomes readable. Mutable only while locked.
    pub unlock_at: DateTime<Utc>,

    /// The secret gate for read/update/delete. Immutable.
    pub unlock_code: UnlockCode,

    /// Creation instant. Immutable.
    pub created_at: DateTime<Utc>,

    /// Monotonic false-to-true flag, set only by the expiration sweeper.
    pub is_expired: bool,
}

impl Capsule {
    /// Assembles a new capsule with a fresh id and unlock code.
    ///
    /// Field validation (non-empty message) is the operations service's
    /// job; this is plain construction.
    #[must_use]
    pub fn new(
        owner: OwnerId,
        message: String,
        unlock_at: DateTime<Utc>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: CapsuleId::generate(),
            owner,
            message,
            unlock_at,
            unlock_code: UnlockCode::generate(),
            created_at,
            is_expired: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_code_is_fixed_length_lowercase_hex() {
        for _ in 0..32 {
            let code = UnlockCode::generate();
            assert_eq!(code.expose().len(), UNLOCK_CODE_BYTES * 2);
            assert!(
                code.expose()
                    .chars()
                    .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase())
            );
        }
    }

    #[test]
    fn verify_accepts_exact_match_only() {
        let code = UnlockCode::from_stored("a1b2c3d4");
        assert!(code.verify("a1b2c3d4"));
        assert!(!code.verify("A1B2C3D4"));
        assert!(!code.verify("a1b2c3d5"));
        assert!(!code.verify("a1b2c3d"));
        assert!(!code.verify(""));
    }

    #[test]
    fn debug_output_is_redacted() {
        let code = UnlockCode::from_stored("deadbeef");
        let rendered = format!("{code:?}");
        assert!(!rendered.contains("deadbeef"));
        assert!(rendered.contains("redacted"));
    }

    #[test]
    fn capsule_ids_are_unique() {
        let a = CapsuleId::generate();
        let b = CapsuleId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn capsule_serde_round_trip_preserves_fields() {
        let capsule = Capsule::new(
            OwnerId::new("user-1"),
            "hello, future".to_string(),
            chrono::Utc::now() + chrono::Duration::hours(1),
            chrono::Utc::now(),
        );
        let json = serde_json::to_string(&capsule).expect("serialize");
        let back: Capsule = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(capsule, back);
    }
}
