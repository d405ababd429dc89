//! Identities that failed-attempt history is tracked against.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    error::ValidationError,
    validation::{validate_device_id, validate_email},
};

const DEVICE_PREFIX: &str = "device:";

/// Normalized identity key for an [`AttemptRecord`](crate::AttemptRecord).
///
/// Emails are trimmed and lower-cased so `Analyst@Example.com` and
/// `analyst@example.com` share one history. Device keys are namespaced with a
/// `device:` prefix and can never collide with an email key.
///
/// Device keys exist for the untrusted-client variant: a browser or desktop
/// client may throttle itself to give early feedback, but that history lives
/// on a machine the attacker controls and is advisory only. Enforcement
/// always happens against email keys in server-side storage.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttemptKey(String);

impl AttemptKey {
    /// Build a key from an email address.
    pub fn email(email: &str) -> Result<Self, ValidationError> {
        let normalized = email.trim().to_lowercase();
        validate_email(&normalized)?;
        Ok(Self(normalized))
    }

    /// Build a key from a client device identifier.
    pub fn device(device_id: &str) -> Result<Self, ValidationError> {
        let trimmed = device_id.trim();
        validate_device_id(trimmed)?;
        Ok(Self(format!("{DEVICE_PREFIX}{trimmed}")))
    }

    /// Parse user input: `device:<id>` builds a device key, anything else is
    /// treated as an email.
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        match input.trim().strip_prefix(DEVICE_PREFIX) {
            Some(device_id) => Self::device(device_id),
            None => Self::email(input),
        }
    }

    pub fn is_device(&self) -> bool {
        self.0.starts_with(DEVICE_PREFIX)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AttemptKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for AttemptKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_key_is_normalized() {
        let key = AttemptKey::email("  Analyst@Example.COM ").unwrap();
        assert_eq!(key.as_str(), "analyst@example.com");
        assert!(!key.is_device());
    }

    #[test]
    fn test_email_key_rejects_invalid() {
        assert!(AttemptKey::email("not-an-email").is_err());
        assert!(AttemptKey::email("   ").is_err());
    }

    #[test]
    fn test_device_key_is_namespaced() {
        let key = AttemptKey::device(" tab-91ac ").unwrap();
        assert_eq!(key.as_str(), "device:tab-91ac");
        assert!(key.is_device());
    }

    #[test]
    fn test_device_and_email_keys_never_collide() {
        let email = AttemptKey::email("device@example.com").unwrap();
        let device = AttemptKey::device("device@example.com").unwrap();
        assert_ne!(email, device);
    }

    #[test]
    fn test_parse_dispatches_on_prefix() {
        assert_eq!(
            AttemptKey::parse("Analyst@Example.com").unwrap(),
            AttemptKey::email("analyst@example.com").unwrap()
        );
        assert_eq!(
            AttemptKey::parse("device:tab-91ac").unwrap(),
            AttemptKey::device("tab-91ac").unwrap()
        );
        assert!(AttemptKey::parse("device:").is_err());
    }

    #[test]
    fn test_key_serializes_as_string() {
        let key = AttemptKey::email("analyst@example.com").unwrap();
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, "\"analyst@example.com\"");
    }
}
