//! SQLite storage backend for tripwire.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tripwire_core::{ThrottleConfig, ThrottleService};
//! use tripwire_storage_sqlite::SqliteStorage;
//!
//! # async fn example() -> Result<(), tripwire_core::Error> {
//! let storage = SqliteStorage::connect("sqlite://tripwire.db").await?;
//! storage.migrate().await?;
//!
//! let service = ThrottleService::new(
//!     Arc::new(storage.into_repository()),
//!     ThrottleConfig::default(),
//! );
//! # Ok(())
//! # }
//! ```

pub mod migrations;
pub mod repositories;

use std::str::FromStr;

use sqlx::SqlitePool;
use sqlx::sqlite::SqliteConnectOptions;
use tripwire_core::{Error, error::StorageError, repositories::AttemptRepository};

pub use migrations::SqliteMigrator;
pub use repositories::SqliteAttemptRepository;

/// Connection to a SQLite database holding tripwire's tables.
#[derive(Debug, Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to `url`, creating the database file if it does not exist.
    pub async fn connect(url: &str) -> Result<Self, Error> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| StorageError::Connection(format!("Invalid SQLite URL: {e}")))?
            .create_if_missing(true);

        let pool = SqlitePool::connect_with(options).await.map_err(|e| {
            tracing::error!(error = %e, "Failed to connect to SQLite");
            StorageError::Connection("Failed to connect to SQLite".to_string())
        })?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Apply all pending migrations.
    pub async fn migrate(&self) -> Result<(), Error> {
        self.attempt_repository().migrate().await
    }

    /// A repository sharing this storage's pool.
    pub fn attempt_repository(&self) -> SqliteAttemptRepository {
        SqliteAttemptRepository::new(self.pool.clone())
    }

    pub fn into_repository(self) -> SqliteAttemptRepository {
        SqliteAttemptRepository::new(self.pool)
    }
}
