//! Tripwire is a login throttle for sign-in endpoints.
//!
//! It counts consecutive failed sign-in attempts per identity and locks the
//! identity for a fixed period once the count reaches a threshold. While an
//! identity is locked, credentials are not even checked.
//!
//! # Example
//!
//! ```rust,no_run
//! use tripwire::{AttemptOutcome, TripwireBuilder};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let tripwire = TripwireBuilder::new()
//!         .with_sqlite("sqlite://tripwire.db")
//!         .await?
//!         .apply_migrations(true)
//!         .build()
//!         .await?;
//!
//!     let key = tripwire::AttemptKey::email("analyst@example.com")?;
//!     let outcome = tripwire
//!         .throttle()
//!         .attempt(&key, || async { Ok::<_, tripwire::CoreError>(Some("analyst")) })
//!         .await?;
//!
//!     match outcome {
//!         AttemptOutcome::Authenticated(user) => println!("welcome {user}"),
//!         AttemptOutcome::Rejected { .. } => println!("Invalid credentials"),
//!         AttemptOutcome::Denied { retry_after } => {
//!             println!("locked, try again in {} minutes", retry_after.num_minutes() + 1)
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Storage Backends
//!
//! - SQLite (`sqlite` feature, enabled by default)
//! - In memory, for tests and for advisory client-side throttling

pub mod builder;

use std::sync::Arc;

pub use builder::{NoStorage, TripwireBuilder, TripwireBuilderError, WithStorage};
pub use tripwire_core::{
    AttemptKey, AttemptOutcome, AttemptRecord, AttemptRepository, Decision,
    Error as CoreError, InMemoryAttemptRepository, LockoutStatus, LoginThrottle,
    ThrottleConfig, ThrottleService,
};

/// Re-export SQLite storage types
#[cfg(feature = "sqlite")]
pub mod sqlite {
    pub use tripwire_storage_sqlite::{SqliteAttemptRepository, SqliteStorage};
}

/// Error type for the tripwire facade.
#[derive(Debug, thiserror::Error)]
pub enum TripwireError {
    /// The identity could not be parsed into an attempt key
    #[error("Validation error: {0}")]
    ValidationError(String),
    /// Error when interacting with storage
    #[error("Storage error: {0}")]
    StorageError(String),
}

impl From<CoreError> for TripwireError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(e) => TripwireError::ValidationError(e.to_string()),
            CoreError::Storage(e) => TripwireError::StorageError(e.to_string()),
        }
    }
}

/// A throttle bound to a storage backend.
///
/// The identity-taking methods accept either an email or `device:<id>` and
/// normalize it with [`AttemptKey::parse`]. Use [`Tripwire::throttle`] for the
/// key-based API and [`ThrottleService::attempt`].
pub struct Tripwire<R: AttemptRepository> {
    repository: Arc<R>,
    throttle: Arc<ThrottleService<R>>,
}

impl<R: AttemptRepository> Tripwire<R> {
    /// Create a Tripwire with the default throttle configuration
    /// (5 attempts, 15 minute lockout).
    pub fn new(repository: Arc<R>) -> Self {
        Self::with_config(repository, ThrottleConfig::default())
    }

    pub fn with_config(repository: Arc<R>, config: ThrottleConfig) -> Self {
        let throttle = Arc::new(ThrottleService::new(repository.clone(), config));
        Self {
            repository,
            throttle,
        }
    }

    /// The throttle service, for sharing with request handlers.
    pub fn throttle(&self) -> Arc<ThrottleService<R>> {
        self.throttle.clone()
    }

    pub fn config(&self) -> &ThrottleConfig {
        self.throttle.config()
    }

    /// Run storage migrations
    pub async fn migrate(&self) -> Result<(), TripwireError> {
        self.repository
            .migrate()
            .await
            .map_err(|e| TripwireError::StorageError(e.to_string()))
    }

    /// Health check for the attempt storage
    pub async fn health_check(&self) -> Result<(), TripwireError> {
        self.repository
            .health_check()
            .await
            .map_err(|e| TripwireError::StorageError(e.to_string()))
    }

    /// Decide whether a sign-in attempt for `identity` may proceed.
    pub async fn check(&self, identity: &str) -> Result<Decision, TripwireError> {
        let key = AttemptKey::parse(identity).map_err(CoreError::from)?;
        Ok(self.throttle.check(&key).await?)
    }

    /// Record a failed sign in for `identity`.
    pub async fn record_failure(&self, identity: &str) -> Result<AttemptRecord, TripwireError> {
        let key = AttemptKey::parse(identity).map_err(CoreError::from)?;
        Ok(self.throttle.record_failure(&key).await?)
    }

    /// Record a successful sign in for `identity`, clearing its history.
    pub async fn record_success(&self, identity: &str) -> Result<(), TripwireError> {
        let key = AttemptKey::parse(identity).map_err(CoreError::from)?;
        Ok(self.throttle.record_success(&key).await?)
    }

    /// Get the lockout status for `identity`.
    pub async fn status(&self, identity: &str) -> Result<LockoutStatus, TripwireError> {
        let key = AttemptKey::parse(identity).map_err(CoreError::from)?;
        Ok(self.throttle.status(&key).await?)
    }

    /// Unlock `identity` ahead of its lockout expiry.
    ///
    /// # Returns
    ///
    /// `true` if the identity was locked.
    pub async fn unlock(&self, identity: &str) -> Result<bool, TripwireError> {
        let key = AttemptKey::parse(identity).map_err(CoreError::from)?;
        Ok(self.throttle.unlock(&key).await?)
    }

    /// Delete attempt records older than the lockout period.
    pub async fn purge_stale(&self) -> Result<u64, TripwireError> {
        Ok(self.throttle.purge_stale_at(chrono::Utc::now()).await?)
    }

    /// Start the background retention sweep. See
    /// [`ThrottleService::start_cleanup_task`].
    pub fn start_cleanup_task(
        &self,
        shutdown: tokio::sync::watch::Receiver<bool>,
    ) -> tokio::task::JoinHandle<()> {
        self.throttle.start_cleanup_task(shutdown)
    }
}
