//! Builder pattern for constructing Tripwire instances
//!
//! The builder uses a type-state pattern so a [`Tripwire`] can only be built
//! once storage is configured.
//!
//! # Example
//!
//! ```rust,no_run
//! use chrono::Duration;
//! use tripwire::TripwireBuilder;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // SQLite with auto-migration and a stricter policy
//!     let tripwire = TripwireBuilder::new()
//!         .with_sqlite("sqlite::memory:")
//!         .await?
//!         .with_max_failed_attempts(3)
//!         .with_lockout_period(Duration::minutes(30))
//!         .apply_migrations(true)
//!         .build()
//!         .await?;
//!
//!     // In memory, e.g. for tests
//!     let tripwire = TripwireBuilder::new().with_memory().build().await?;
//!
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use chrono::Duration;
use tripwire_core::{AttemptRepository, InMemoryAttemptRepository, ThrottleConfig};

use crate::Tripwire;

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur when building a Tripwire instance.
#[derive(Debug, thiserror::Error)]
pub enum TripwireBuilderError {
    /// Failed to connect to storage backend
    #[error("Storage connection failed: {0}")]
    StorageConnection(String),

    /// Failed to run database migrations
    #[error("Migration failed: {0}")]
    Migration(String),

    /// Invalid configuration provided
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

// ============================================================================
// Type-State Markers
// ============================================================================

/// Marker type indicating no storage has been configured yet.
pub struct NoStorage;

/// Marker type indicating storage has been configured.
pub struct WithStorage<R: AttemptRepository> {
    repository: Arc<R>,
}

// ============================================================================
// Builder Implementation
// ============================================================================

/// A type-safe builder for constructing [`Tripwire`] instances.
///
/// # Type States
///
/// - [`NoStorage`]: Initial state, storage must be configured
/// - [`WithStorage<R>`]: Storage configured, ready to build
pub struct TripwireBuilder<Storage> {
    storage: Storage,
    throttle_config: ThrottleConfig,
    apply_migrations: bool,
}

impl Default for TripwireBuilder<NoStorage> {
    fn default() -> Self {
        Self::new()
    }
}

impl TripwireBuilder<NoStorage> {
    /// Create a new builder with default configuration.
    ///
    /// # Defaults
    ///
    /// - Throttling: enabled (5 attempts, 15 min lockout, hourly cleanup)
    /// - Apply migrations: false
    pub fn new() -> Self {
        Self {
            storage: NoStorage,
            throttle_config: ThrottleConfig::default(),
            apply_migrations: false,
        }
    }

    /// Use an existing repository.
    pub fn with_repository<R: AttemptRepository>(
        self,
        repository: Arc<R>,
    ) -> TripwireBuilder<WithStorage<R>> {
        TripwireBuilder {
            storage: WithStorage { repository },
            throttle_config: self.throttle_config,
            apply_migrations: self.apply_migrations,
        }
    }

    /// Keep attempt history in process memory.
    ///
    /// History is lost on restart and is not shared between processes.
    pub fn with_memory(self) -> TripwireBuilder<WithStorage<InMemoryAttemptRepository>> {
        self.with_repository(Arc::new(InMemoryAttemptRepository::new()))
    }
}

#[cfg(feature = "sqlite")]
impl TripwireBuilder<NoStorage> {
    /// Configure SQLite storage by connecting to the given URL.
    ///
    /// # Arguments
    ///
    /// * `url` - SQLite connection URL (e.g., "sqlite::memory:" or "sqlite://path/to/db.sqlite")
    pub async fn with_sqlite(
        self,
        url: &str,
    ) -> Result<
        TripwireBuilder<WithStorage<tripwire_storage_sqlite::SqliteAttemptRepository>>,
        TripwireBuilderError,
    > {
        let storage = tripwire_storage_sqlite::SqliteStorage::connect(url)
            .await
            .map_err(|e| TripwireBuilderError::StorageConnection(e.to_string()))?;
        Ok(self.with_sqlite_storage(storage))
    }

    /// Configure SQLite storage from an existing connection.
    pub fn with_sqlite_storage(
        self,
        storage: tripwire_storage_sqlite::SqliteStorage,
    ) -> TripwireBuilder<WithStorage<tripwire_storage_sqlite::SqliteAttemptRepository>> {
        self.with_repository(Arc::new(storage.into_repository()))
    }
}

// ============================================================================
// Configuration Methods (available in any state)
// ============================================================================

impl<S> TripwireBuilder<S> {
    /// Replace the whole throttle configuration.
    pub fn with_throttle_config(mut self, config: ThrottleConfig) -> Self {
        self.throttle_config = config;
        self
    }

    /// Set how many consecutive failures lock an identity.
    pub fn with_max_failed_attempts(mut self, max_failed_attempts: u32) -> Self {
        self.throttle_config.max_failed_attempts = max_failed_attempts;
        self
    }

    /// Set how long a lockout lasts.
    pub fn with_lockout_period(mut self, lockout_period: Duration) -> Self {
        self.throttle_config.lockout_period = lockout_period;
        self
    }

    /// Set how often stale attempt records are purged.
    pub fn with_cleanup_interval(mut self, cleanup_interval: std::time::Duration) -> Self {
        self.throttle_config.cleanup_interval = cleanup_interval;
        self
    }

    /// Turn throttling off entirely. Every attempt is allowed.
    pub fn disable_throttling(mut self) -> Self {
        self.throttle_config.enabled = false;
        self
    }

    /// Run migrations when [`build`](TripwireBuilder::build) is called.
    pub fn apply_migrations(mut self, apply: bool) -> Self {
        self.apply_migrations = apply;
        self
    }
}

// ============================================================================
// Build Method (only available with storage)
// ============================================================================

impl<R: AttemptRepository> TripwireBuilder<WithStorage<R>> {
    /// Build the Tripwire instance.
    ///
    /// # Errors
    ///
    /// - [`TripwireBuilderError::InvalidConfiguration`] when throttling is
    ///   enabled with a zero threshold or a negative lockout period
    /// - [`TripwireBuilderError::Migration`] when migrations were requested
    ///   and failed
    pub async fn build(self) -> Result<Tripwire<R>, TripwireBuilderError> {
        validate_config(&self.throttle_config)?;

        if self.apply_migrations {
            self.storage
                .repository
                .migrate()
                .await
                .map_err(|e| TripwireBuilderError::Migration(e.to_string()))?;
        }

        if self.throttle_config.enabled {
            tracing::info!(
                max_failed_attempts = self.throttle_config.max_failed_attempts,
                lockout_secs = self.throttle_config.lockout_period.num_seconds(),
                "Login throttling enabled"
            );
        } else {
            tracing::warn!("Login throttling disabled, every sign-in attempt is allowed");
        }

        Ok(Tripwire::with_config(
            self.storage.repository,
            self.throttle_config,
        ))
    }
}

fn validate_config(config: &ThrottleConfig) -> Result<(), TripwireBuilderError> {
    if !config.enabled {
        return Ok(());
    }
    if config.max_failed_attempts == 0 {
        return Err(TripwireBuilderError::InvalidConfiguration(
            "max_failed_attempts must be at least 1".to_string(),
        ));
    }
    if config.lockout_period < Duration::zero() {
        return Err(TripwireBuilderError::InvalidConfiguration(
            "lockout_period must not be negative".to_string(),
        ));
    }
    Ok(())
}
