use crate::error::ValidationError;
use regex::Regex;
use std::sync::LazyLock;

/// Longest device identifier accepted for client-side throttling.
pub const MAX_DEVICE_ID_LENGTH: usize = 128;

/// Lazy-loaded email validation regex
///
/// Validates a practical subset of RFC 5322, compiled once and reused.
static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
        .expect("Invalid email regex pattern")
});

/// Validates an email address
///
/// # Examples
///
/// ```rust
/// use tripwire_core::validation::validate_email;
///
/// assert!(validate_email("analyst@example.com").is_ok());
/// assert!(validate_email("invalid-email").is_err());
/// ```
pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    if email.is_empty() {
        return Err(ValidationError::MissingField(
            "Email is required".to_string(),
        ));
    }

    if email.len() > 254 {
        return Err(ValidationError::InvalidEmail(
            "longer than 254 characters".to_string(),
        ));
    }

    if EMAIL_REGEX.is_match(email) {
        Ok(())
    } else {
        Err(ValidationError::InvalidEmail(
            "expected name@domain.tld".to_string(),
        ))
    }
}

/// Validates a client device identifier.
///
/// Device identifiers are opaque, but must be non-empty, printable and no
/// longer than [`MAX_DEVICE_ID_LENGTH`].
pub fn validate_device_id(device_id: &str) -> Result<(), ValidationError> {
    if device_id.is_empty() {
        return Err(ValidationError::MissingField(
            "Device identifier is required".to_string(),
        ));
    }

    if device_id.len() > MAX_DEVICE_ID_LENGTH {
        return Err(ValidationError::InvalidIdentity(
            "Device identifier is too long".to_string(),
        ));
    }

    if device_id.chars().any(|c| c.is_control() || c.is_whitespace()) {
        return Err(ValidationError::InvalidIdentity(
            "Device identifier contains whitespace or control characters".to_string(),
        ));
    }

    Ok(())
}
