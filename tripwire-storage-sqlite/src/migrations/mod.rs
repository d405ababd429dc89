//! Forward-only schema migrations for the SQLite backend.
//!
//! Each [`SchemaChange`] is applied once, inside a transaction, and recorded in
//! `_tripwire_schema` by version. There is no rollback.

use sqlx::{Sqlite, SqlitePool, Transaction};
use tripwire_core::{Error, error::StorageError};

const SCHEMA_TABLE: &str = "_tripwire_schema";

/// One versioned schema change.
pub struct SchemaChange {
    pub version: i64,
    pub name: &'static str,
    pub statements: &'static [&'static str],
}

/// All schema changes, oldest first. Append only.
pub const SCHEMA_CHANGES: &[SchemaChange] = &[
    SchemaChange {
        version: 1,
        name: "create_login_attempts",
        // last_failure_at is unix milliseconds.
        statements: &[r#"
            CREATE TABLE IF NOT EXISTS login_attempts (
                identity TEXT PRIMARY KEY,
                failure_count INTEGER NOT NULL DEFAULT 0,
                last_failure_at INTEGER,
                created_at INTEGER DEFAULT (unixepoch()),
                updated_at INTEGER DEFAULT (unixepoch())
            )"#],
    },
    SchemaChange {
        version: 2,
        name: "index_login_attempts_last_failure_at",
        statements: &[
            "CREATE INDEX IF NOT EXISTS idx_login_attempts_last_failure_at ON login_attempts(last_failure_at)",
        ],
    },
];

/// Applies pending [`SCHEMA_CHANGES`] to a SQLite database.
pub struct SqliteMigrator {
    pool: SqlitePool,
}

impl SqliteMigrator {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Apply every schema change newer than the current version.
    ///
    /// # Returns
    ///
    /// The number of changes applied. Zero when the schema is up to date.
    pub async fn run(&self) -> Result<usize, Error> {
        self.run_changes(SCHEMA_CHANGES).await
    }

    /// Highest applied version, or 0 for an empty database.
    pub async fn current_version(&self) -> Result<i64, Error> {
        self.ensure_schema_table().await?;

        let version: Option<i64> =
            sqlx::query_scalar(&format!("SELECT MAX(version) FROM {SCHEMA_TABLE}"))
                .fetch_one(&self.pool)
                .await
                .map_err(|e| migration_error("Failed to read schema version", e))?;

        Ok(version.unwrap_or(0))
    }

    async fn run_changes(&self, changes: &[SchemaChange]) -> Result<usize, Error> {
        let current = self.current_version().await?;
        let mut applied = 0;

        for change in changes.iter().filter(|change| change.version > current) {
            tracing::info!(
                version = change.version,
                name = change.name,
                "Applying schema change"
            );

            let mut tx = self
                .pool
                .begin()
                .await
                .map_err(|e| migration_error("Failed to start migration", e))?;

            if let Err(e) = apply(&mut tx, change).await {
                let _ = tx.rollback().await;
                return Err(migration_error(change.name, e));
            }

            tx.commit()
                .await
                .map_err(|e| migration_error(change.name, e))?;
            applied += 1;
        }

        Ok(applied)
    }

    async fn ensure_schema_table(&self) -> Result<(), Error> {
        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {SCHEMA_TABLE} (
                version INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                applied_at INTEGER NOT NULL DEFAULT (unixepoch())
            )"#
        ))
        .execute(&self.pool)
        .await
        .map_err(|e| migration_error("Failed to create schema table", e))?;

        Ok(())
    }
}

async fn apply(
    tx: &mut Transaction<'_, Sqlite>,
    change: &SchemaChange,
) -> Result<(), sqlx::Error> {
    for statement in change.statements {
        sqlx::query(statement).execute(&mut **tx).await?;
    }

    sqlx::query(&format!(
        "INSERT INTO {SCHEMA_TABLE} (version, name) VALUES (?, ?)"
    ))
    .bind(change.version)
    .bind(change.name)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

fn migration_error(context: &str, e: sqlx::Error) -> Error {
    tracing::error!(error = %e, context, "SQLite migration failed");
    StorageError::Migration(format!("{context}: {e}")).into()
}
