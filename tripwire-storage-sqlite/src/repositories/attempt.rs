//! SQLite implementation of the attempt repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tripwire_core::{
    AttemptKey, AttemptRecord, Error, error::StorageError, repositories::AttemptRepository,
};

use crate::migrations::SqliteMigrator;

/// SQLite repository for failed-attempt history.
///
/// Every write is a single statement, so SQLite's write lock serializes
/// concurrent updates to one identity.
pub struct SqliteAttemptRepository {
    pool: SqlitePool,
}

impl SqliteAttemptRepository {
    /// Create a new SQLite attempt repository.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// Internal struct for query results
#[derive(Debug, sqlx::FromRow)]
struct SqliteAttemptRecord {
    failure_count: i64,
    last_failure_at: Option<i64>,
}

impl TryFrom<SqliteAttemptRecord> for AttemptRecord {
    type Error = Error;

    fn try_from(row: SqliteAttemptRecord) -> Result<Self, Self::Error> {
        let last_failure_at = row
            .last_failure_at
            .map(|ms| {
                DateTime::from_timestamp_millis(ms).ok_or_else(|| {
                    StorageError::Database(format!("Invalid last_failure_at timestamp: {ms}"))
                })
            })
            .transpose()?;
        let failure_count = u32::try_from(row.failure_count.max(0)).unwrap_or(u32::MAX);

        Ok(AttemptRecord::from_parts(failure_count, last_failure_at))
    }
}

#[async_trait]
impl AttemptRepository for SqliteAttemptRepository {
    async fn get(&self, key: &AttemptKey) -> Result<Option<AttemptRecord>, Error> {
        let row = sqlx::query_as::<_, SqliteAttemptRecord>(
            "SELECT failure_count, last_failure_at FROM login_attempts WHERE identity = ?",
        )
        .bind(key.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to get attempt record");
            StorageError::Database("Failed to get attempt record".to_string())
        })?;

        row.map(AttemptRecord::try_from).transpose()
    }

    async fn record_failure(
        &self,
        key: &AttemptKey,
        at: DateTime<Utc>,
    ) -> Result<AttemptRecord, Error> {
        let row = sqlx::query_as::<_, SqliteAttemptRecord>(
            r#"
            INSERT INTO login_attempts (identity, failure_count, last_failure_at, updated_at)
            VALUES (?, 1, ?, unixepoch())
            ON CONFLICT(identity) DO UPDATE SET
                failure_count = CASE
                    WHEN login_attempts.last_failure_at IS NULL THEN 1
                    ELSE login_attempts.failure_count + 1
                END,
                last_failure_at = excluded.last_failure_at,
                updated_at = excluded.updated_at
            RETURNING failure_count, last_failure_at
            "#,
        )
        .bind(key.as_str())
        .bind(at.timestamp_millis())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to record failed attempt");
            StorageError::Database("Failed to record failed attempt".to_string())
        })?;

        row.try_into()
    }

    async fn clear(&self, key: &AttemptKey) -> Result<bool, Error> {
        let result = sqlx::query("DELETE FROM login_attempts WHERE identity = ?")
            .bind(key.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to clear attempt record");
                StorageError::Database("Failed to clear attempt record".to_string())
            })?;

        Ok(result.rows_affected() > 0)
    }

    async fn reset_if_unchanged(
        &self,
        key: &AttemptKey,
        expected: &AttemptRecord,
    ) -> Result<bool, Error> {
        let result = sqlx::query(
            r#"
            DELETE FROM login_attempts
            WHERE identity = ?
            AND failure_count = ?
            AND last_failure_at IS ?
            "#,
        )
        .bind(key.as_str())
        .bind(i64::from(expected.failure_count()))
        .bind(expected.last_failure_at().map(|dt| dt.timestamp_millis()))
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to reset attempt record");
            StorageError::Database("Failed to reset attempt record".to_string())
        })?;

        Ok(result.rows_affected() > 0)
    }

    async fn purge_stale(
        &self,
        before: DateTime<Utc>,
        max_failed_attempts: u32,
    ) -> Result<u64, Error> {
        let result = sqlx::query(
            r#"
            DELETE FROM login_attempts
            WHERE last_failure_at IS NULL
            OR failure_count <= 0
            OR (failure_count >= ? AND last_failure_at < ?)
            "#,
        )
        .bind(i64::from(max_failed_attempts))
        .bind(before.timestamp_millis())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to purge stale attempt records");
            StorageError::Database("Failed to purge stale attempt records".to_string())
        })?;

        Ok(result.rows_affected())
    }

    async fn migrate(&self) -> Result<(), Error> {
        SqliteMigrator::new(self.pool.clone()).run().await?;
        Ok(())
    }

    async fn health_check(&self) -> Result<(), Error> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "SQLite health check failed");
                StorageError::Connection("SQLite health check failed".to_string())
            })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
    use std::sync::Arc;

    async fn migrate(pool: &SqlitePool) {
        SqliteAttemptRepository::new(pool.clone())
            .migrate()
            .await
            .expect("Failed to run migrations");
    }

    async fn setup_test_db() -> SqlitePool {
        let pool = SqlitePool::connect("sqlite::memory:")
            .await
            .expect("Failed to create pool");
        migrate(&pool).await;
        pool
    }

    fn key(email: &str) -> AttemptKey {
        AttemptKey::email(email).unwrap()
    }

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    #[tokio::test]
    async fn test_record_failure_creates_and_increments() {
        let repo = SqliteAttemptRepository::new(setup_test_db().await);

        let first = repo
            .record_failure(&key("analyst@example.com"), t0())
            .await
            .expect("Failed to record attempt");
        assert_eq!(first, AttemptRecord::from_parts(1, Some(t0())));

        let later = t0() + Duration::seconds(30);
        let second = repo
            .record_failure(&key("analyst@example.com"), later)
            .await
            .expect("Failed to record attempt");
        assert_eq!(second, AttemptRecord::from_parts(2, Some(later)));

        let stored = repo.get(&key("analyst@example.com")).await.unwrap();
        assert_eq!(stored, Some(second));
    }

    #[tokio::test]
    async fn test_get_missing_returns_none() {
        let repo = SqliteAttemptRepository::new(setup_test_db().await);
        assert!(repo.get(&key("nobody@example.com")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_millisecond_precision_is_kept() {
        let repo = SqliteAttemptRepository::new(setup_test_db().await);
        let at = t0() + Duration::milliseconds(250);

        let record = repo.record_failure(&key("a@example.com"), at).await.unwrap();
        assert_eq!(record.last_failure_at(), Some(at));
    }

    #[tokio::test]
    async fn test_clear_attempts() {
        let repo = SqliteAttemptRepository::new(setup_test_db().await);

        for _ in 0..3 {
            repo.record_failure(&key("test1@example.com"), t0())
                .await
                .unwrap();
            repo.record_failure(&key("test2@example.com"), t0())
                .await
                .unwrap();
        }

        assert!(repo.clear(&key("test1@example.com")).await.unwrap());
        assert!(!repo.clear(&key("test1@example.com")).await.unwrap());

        assert!(repo.get(&key("test1@example.com")).await.unwrap().is_none());
        assert_eq!(
            repo.get(&key("test2@example.com"))
                .await
                .unwrap()
                .unwrap()
                .failure_count(),
            3
        );
    }

    #[tokio::test]
    async fn test_reset_if_unchanged() {
        let repo = SqliteAttemptRepository::new(setup_test_db().await);
        let observed = repo
            .record_failure(&key("a@example.com"), t0())
            .await
            .unwrap();
        repo.record_failure(&key("a@example.com"), t0() + Duration::seconds(1))
            .await
            .unwrap();

        assert!(
            !repo
                .reset_if_unchanged(&key("a@example.com"), &observed)
                .await
                .unwrap()
        );

        let current = repo.get(&key("a@example.com")).await.unwrap().unwrap();
        assert!(
            repo.reset_if_unchanged(&key("a@example.com"), &current)
                .await
                .unwrap()
        );
        assert!(repo.get(&key("a@example.com")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_malformed_row_is_restarted_by_next_failure() {
        let pool = setup_test_db().await;
        sqlx::query(
            "INSERT INTO login_attempts (identity, failure_count, last_failure_at) VALUES (?, 9, NULL)",
        )
        .bind("a@example.com")
        .execute(&pool)
        .await
        .unwrap();
        let repo = SqliteAttemptRepository::new(pool);

        let stored = repo.get(&key("a@example.com")).await.unwrap().unwrap();
        assert_eq!(stored.effective_failure_count(), 0);

        let record = repo
            .record_failure(&key("a@example.com"), t0())
            .await
            .unwrap();
        assert_eq!(record, AttemptRecord::from_parts(1, Some(t0())));
    }

    #[tokio::test]
    async fn test_purge_stale() {
        let pool = setup_test_db().await;
        let repo = SqliteAttemptRepository::new(pool.clone());
        let old = t0() - Duration::hours(2);

        for _ in 0..5 {
            repo.record_failure(&key("expired@example.com"), old)
                .await
                .unwrap();
            repo.record_failure(&key("locked@example.com"), t0())
                .await
                .unwrap();
        }
        for _ in 0..4 {
            repo.record_failure(&key("streak@example.com"), old)
                .await
                .unwrap();
        }
        sqlx::query("INSERT INTO login_attempts (identity, failure_count) VALUES (?, 0)")
            .bind("broken@example.com")
            .execute(&pool)
            .await
            .unwrap();

        let deleted = repo
            .purge_stale(t0() - Duration::hours(1), 5)
            .await
            .unwrap();
        assert_eq!(deleted, 2);
        assert!(repo.get(&key("expired@example.com")).await.unwrap().is_none());
        assert!(repo.get(&key("locked@example.com")).await.unwrap().is_some());
        assert_eq!(
            repo.get(&key("streak@example.com"))
                .await
                .unwrap()
                .unwrap()
                .failure_count(),
            4
        );
    }

    #[tokio::test]
    async fn test_health_check() {
        let repo = SqliteAttemptRepository::new(setup_test_db().await);
        assert!(repo.health_check().await.is_ok());
    }

    #[tokio::test]
    async fn test_concurrent_failures_are_not_lost() {
        let path = std::env::temp_dir().join(format!(
            "tripwire-concurrency-{}-{}.db",
            std::process::id(),
            Utc::now().timestamp_nanos_opt().unwrap_or_default()
        ));
        let options = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true)
            .busy_timeout(std::time::Duration::from_secs(30));
        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(options)
            .await
            .expect("Failed to create pool");
        migrate(&pool).await;

        let repo = Arc::new(SqliteAttemptRepository::new(pool.clone()));
        let handles: Vec<_> = (0..32)
            .map(|_| {
                let repo = Arc::clone(&repo);
                tokio::spawn(async move {
                    repo.record_failure(&key("target@example.com"), Utc::now())
                        .await
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        let record = repo.get(&key("target@example.com")).await.unwrap().unwrap();
        assert_eq!(record.failure_count(), 32);

        pool.close().await;
        let _ = std::fs::remove_file(&path);
    }
}
