//! Boundary validation for identifiers, locators and durations.
//!
//! Everything here runs before the store is touched. A malformed request is
//! a `ValidationError`, never a `NotFound`.

use crate::clock::MILLIS_PER_SEC;
use crate::error::ValidationError;

/// Maximum length of a user id, content id or purchase reference, in bytes.
pub const MAX_ID_LEN: usize = 256;

/// Maximum length of a content locator, in bytes.
pub const MAX_LOCATOR_LEN: usize = 4096;

/// Maximum length of a content type label, in bytes.
pub const MAX_CONTENT_TYPE_LEN: usize = 128;

/// Maximum length of a revocation reason, in bytes.
pub const MAX_REASON_LEN: usize = 512;

/// Validate an identifier field.
///
/// Rules:
/// - not empty
/// - at most [`MAX_ID_LEN`] bytes
/// - no control characters
/// - no leading or trailing whitespace
pub fn validate_identifier(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Err(ValidationError::Empty { field });
    }
    if value.len() > MAX_ID_LEN {
        return Err(ValidationError::TooLong {
            field,
            max: MAX_ID_LEN,
        });
    }
    if value.chars().any(char::is_control) {
        return Err(ValidationError::ControlCharacter { field });
    }
    if value.trim() != value {
        return Err(ValidationError::SurroundingWhitespace { field });
    }
    Ok(())
}

/// Validate a content locator before sealing it.
pub fn validate_locator(locator: &str) -> Result<(), ValidationError> {
    let field = "content_locator";
    if locator.trim().is_empty() {
        return Err(ValidationError::Empty { field });
    }
    if locator.len() > MAX_LOCATOR_LEN {
        return Err(ValidationError::TooLong {
            field,
            max: MAX_LOCATOR_LEN,
        });
    }
    if locator.chars().any(char::is_control) {
        return Err(ValidationError::ControlCharacter { field });
    }
    Ok(())
}

/// Validate the purchase correlation reference.
pub fn validate_purchase_ref(purchase_ref: &str) -> Result<(), ValidationError> {
    validate_identifier("purchase_ref", purchase_ref)
}

/// Validate the informational content type. Empty is allowed.
pub fn validate_content_type(content_type: &str) -> Result<(), ValidationError> {
    let field = "content_type";
    if content_type.len() > MAX_CONTENT_TYPE_LEN {
        return Err(ValidationError::TooLong {
            field,
            max: MAX_CONTENT_TYPE_LEN,
        });
    }
    if content_type.chars().any(char::is_control) {
        return Err(ValidationError::ControlCharacter { field });
    }
    Ok(())
}

/// Validate a revocation reason. Empty is allowed.
pub fn validate_reason(reason: &str) -> Result<(), ValidationError> {
    if reason.len() > MAX_REASON_LEN {
        return Err(ValidationError::TooLong {
            field: "reason",
            max: MAX_REASON_LEN,
        });
    }
    Ok(())
}

/// Convert a positive duration in seconds to milliseconds, enforcing `max`.
pub fn secs_to_millis(field: &'static str, secs: u64, max: u64) -> Result<i64, ValidationError> {
    if secs == 0 {
        return Err(ValidationError::ZeroDuration { field });
    }
    if secs > max {
        return Err(ValidationError::DurationTooLong { field, max });
    }
    secs.checked_mul(MILLIS_PER_SEC as u64)
        .and_then(|ms| i64::try_from(ms).ok())
        .ok_or(ValidationError::DurationTooLong { field, max })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_rules() {
        assert!(validate_identifier("user_id", "user-123").is_ok());
        assert!(validate_identifier("user_id", "ünïcødé").is_ok());

        assert_eq!(
            validate_identifier("user_id", ""),
            Err(ValidationError::Empty { field: "user_id" })
        );
        assert_eq!(
            validate_identifier("user_id", &"x".repeat(MAX_ID_LEN + 1)),
            Err(ValidationError::TooLong {
                field: "user_id",
                max: MAX_ID_LEN
            })
        );
        assert!(validate_identifier("user_id", &"x".repeat(MAX_ID_LEN)).is_ok());
        assert_eq!(
            validate_identifier("user_id", "a\u{0}b"),
            Err(ValidationError::ControlCharacter { field: "user_id" })
        );
        assert_eq!(
            validate_identifier("user_id", " alice"),
            Err(ValidationError::SurroundingWhitespace { field: "user_id" })
        );
    }

    #[test]
    fn test_locator_rules() {
        assert!(validate_locator("ipfs://bafybeigdyrzt5sfp7udm7hu76uh7y26nf3efuylqabf3oclgtqy55fbzdi").is_ok());
        assert!(validate_locator("   ").is_err());
        assert!(validate_locator(&"a".repeat(MAX_LOCATOR_LEN + 1)).is_err());
        assert!(validate_locator("https://x/\r\n").is_err());
    }

    #[test]
    fn test_content_type_rules() {
        assert!(validate_content_type("").is_ok());
        assert!(validate_content_type("video/mp4").is_ok());
        assert!(validate_content_type(&"v".repeat(MAX_CONTENT_TYPE_LEN + 1)).is_err());
    }

    #[test]
    fn test_reason_rules() {
        assert!(validate_reason("chargeback").is_ok());
        assert!(validate_reason(&"r".repeat(MAX_REASON_LEN + 1)).is_err());
    }

    #[test]
    fn test_secs_to_millis() {
        assert_eq!(secs_to_millis("duration", 1, 10), Ok(1_000));
        assert_eq!(
            secs_to_millis("duration", 0, 10),
            Err(ValidationError::ZeroDuration { field: "duration" })
        );
        assert_eq!(
            secs_to_millis("duration", 11, 10),
            Err(ValidationError::DurationTooLong {
                field: "duration",
                max: 10
            })
        );
        assert!(secs_to_millis("duration", u64::MAX, u64::MAX).is_err());
    }
}
