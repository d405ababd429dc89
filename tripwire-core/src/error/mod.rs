use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Connection error: {0}")]
    Connection(String),
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid email format: {0}")]
    InvalidEmail(String),

    #[error("Invalid identity: {0}")]
    InvalidIdentity(String),

    #[error("Missing required field: {0}")]
    MissingField(String),
}

impl Error {
    pub fn is_storage_error(&self) -> bool {
        matches!(self, Error::Storage(_))
    }

    pub fn is_validation_error(&self) -> bool {
        matches!(self, Error::Validation(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let validation_error =
            Error::Validation(ValidationError::InvalidEmail("test@".to_string()));
        assert_eq!(
            validation_error.to_string(),
            "Validation error: Invalid email format: test@"
        );

        let storage_error = Error::Storage(StorageError::Database("locked".to_string()));
        assert_eq!(
            storage_error.to_string(),
            "Storage error: Database error: locked"
        );
    }

    #[test]
    fn test_validation_error_variants() {
        let missing = ValidationError::MissingField("email".to_string());
        assert_eq!(missing.to_string(), "Missing required field: email");

        let identity = ValidationError::InvalidIdentity("too long".to_string());
        assert_eq!(identity.to_string(), "Invalid identity: too long");
    }

    #[test]
    fn test_error_predicates() {
        assert!(Error::Storage(StorageError::Connection("refused".to_string())).is_storage_error());
        assert!(!Error::Storage(StorageError::Migration("v1".to_string())).is_validation_error());
        assert!(
            Error::Validation(ValidationError::MissingField("email".to_string()))
                .is_validation_error()
        );
    }

    #[test]
    fn test_error_from_conversions() {
        let error: Error = StorageError::Database("boom".to_string()).into();
        assert!(matches!(error, Error::Storage(StorageError::Database(_))));

        let error: Error = ValidationError::InvalidEmail("x".to_string()).into();
        assert!(matches!(
            error,
            Error::Validation(ValidationError::InvalidEmail(_))
        ));
    }
}
