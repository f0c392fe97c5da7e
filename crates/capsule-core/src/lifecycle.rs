//! Pure lifecycle evaluation.
//!
//! A capsule's phase is a function of its fields and a caller-supplied
//! instant. Nothing here reads the clock or touches the store, which keeps
//! the state machine exhaustively testable.

use chrono::{DateTime, Utc};

use crate::capsule::Capsule;

/// Derived lifecycle state of a capsule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Before `unlock_at`: content sealed, record mutable.
    Locked,
    /// At or past `unlock_at`: content readable, record frozen.
    Unlockable,
    /// Retired by the sweeper: terminal, content permanently withheld
    /// from direct reads.
    Expired,
}

impl Phase {
    /// Human-readable name, used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Locked => "locked",
            Self::Unlockable => "unlockable",
            Self::Expired => "expired",
        }
    }
}

/// Computes the phase of a capsule at `now`.
///
/// The expired flag overrides the time comparison: once the sweeper has
/// retired a capsule it stays [`Phase::Expired`] regardless of `unlock_at`.
#[must_use]
pub fn phase(unlock_at: DateTime<Utc>, is_expired: bool, now: DateTime<Utc>) -> Phase {
    if is_expired {
        Phase::Expired
    } else if now < unlock_at {
        Phase::Locked
    } else {
        Phase::Unlockable
    }
}

/// Convenience wrapper over [`phase`] for a whole record.
#[must_use]
pub fn phase_of(capsule: &Capsule, now: DateTime<Utc>) -> Phase {
    phase(capsule.unlock_at, capsule.is_expired, now)
}
