//! Ownership and unlock-code gate.
//!
//! Every per-record operation runs this gate before any phase-specific
//! logic. Check order is load-bearing: existence, then ownership, then
//! code. A missing record returns the same `NotFound` whether the id never
//! existed or belongs to nobody the caller can see, so ids cannot be
//! enumerated; a wrong code never short-circuits ahead of the ownership
//! check.

use crate::capsule::{Capsule, CapsuleId, OwnerId};
use crate::error::CapsuleError;

/// Reason string for ownership failures.
pub const NOT_OWNER: &str = "caller is not the capsule owner";

/// Validates that `caller` owns the record and holds its unlock code.
///
/// `record` is the store's fetch result for `id`. On success the record is
/// handed back for phase evaluation.
///
/// # Errors
///
/// - [`CapsuleError::NotFound`] if `record` is `None`.
/// - [`CapsuleError::Forbidden`] if the caller is not the owner.
/// - [`CapsuleError::Unauthorized`] if the code is absent or wrong. The
///   comparison is constant-time (see [`crate::capsule::UnlockCode`]).
pub fn authorize<'a>(
    record: Option<&'a Capsule>,
    id: &CapsuleId,
    caller: &OwnerId,
    code: Option<&str>,
) -> Result<&'a Capsule, CapsuleError> {
    let Some(capsule) = record else {
        return Err(CapsuleError::NotFound {
            id: id.as_str().to_string(),
        });
    };

    if capsule.owner != *caller {
        return Err(CapsuleError::Forbidden { reason: NOT_OWNER });
    }

    match code {
        Some(supplied) if capsule.unlock_code.verify(supplied) => Ok(capsule),
        _ => Err(CapsuleError::Unauthorized),
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;

    fn sealed_capsule() -> Capsule {
        let now = Utc::now();
        Capsule::new(
            OwnerId::new("alice"),
            "sealed".to_string(),
            now + Duration::hours(1),
            now,
        )
    }

    #[test]
    fn missing_record_is_not_found() {
        let id = CapsuleId::generate();
        let err = authorize(None, &id, &OwnerId::new("alice"), Some("whatever")).unwrap_err();
        assert!(matches!(err, CapsuleError::NotFound { .. }));
    }

    #[test]
    fn wrong_owner_is_forbidden() {
        let capsule = sealed_capsule();
        let code = capsule.unlock_code.expose().to_string();
        let err = authorize(
            Some(&capsule),
            &capsule.id,
            &OwnerId::new("mallory"),
            Some(&code),
        )
        .unwrap_err();
        assert!(matches!(err, CapsuleError::Forbidden { .. }));
    }

    #[test]
    fn ownership_is_checked_before_the_code() {
        // Wrong owner AND wrong code: the ownership failure must win.
        let capsule = sealed_capsule();
        let err = authorize(
            Some(&capsule),
            &capsule.id,
            &OwnerId::new("mallory"),
            Some("wrong"),
        )
        .unwrap_err();
        assert!(matches!(err, CapsuleError::Forbidden { .. }));
    }

    #[test]
    fn missing_or_wrong_code_is_unauthorized() {
        let capsule = sealed_capsule();
        let owner = OwnerId::new("alice");

        let err = authorize(Some(&capsule), &capsule.id, &owner, None).unwrap_err();
        assert!(matches!(err, CapsuleError::Unauthorized));

        let err = authorize(Some(&capsule), &capsule.id, &owner, Some("00000000")).unwrap_err();
        assert!(matches!(err, CapsuleError::Unauthorized));
    }

    #[test]
    fn owner_with_correct_code_passes() {
        let capsule = sealed_capsule();
        let code = capsule.unlock_code.expose().to_string();
        let passed = authorize(
            Some(&capsule),
            &capsule.id,
            &OwnerId::new("alice"),
            Some(&code),
        )
        .unwrap();
        assert_eq!(passed.id, capsule.id);
    }
}
