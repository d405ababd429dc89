//! Tests for the Tripwire builder pattern

use std::sync::Arc;

use chrono::Duration;
use tripwire::{InMemoryAttemptRepository, ThrottleConfig, TripwireBuilder, TripwireBuilderError};

#[cfg(feature = "sqlite")]
#[tokio::test]
async fn test_builder_with_sqlite() {
    let tripwire = TripwireBuilder::new()
        .with_sqlite("sqlite::memory:")
        .await
        .expect("Failed to connect to SQLite")
        .apply_migrations(true)
        .build()
        .await
        .expect("Failed to build Tripwire");

    tripwire.health_check().await.expect("Health check failed");
    tripwire
        .record_failure("analyst@example.com")
        .await
        .expect("Table should exist after migrations");
}

#[cfg(feature = "sqlite")]
#[tokio::test]
async fn test_builder_manual_migration() {
    let tripwire = TripwireBuilder::new()
        .with_sqlite("sqlite::memory:")
        .await
        .expect("Failed to connect to SQLite")
        .build()
        .await
        .expect("Failed to build Tripwire");

    // Nothing has created the table yet
    assert!(tripwire.record_failure("analyst@example.com").await.is_err());

    tripwire.migrate().await.expect("Migration failed");
    tripwire
        .record_failure("analyst@example.com")
        .await
        .expect("Table should exist after migrations");
}

#[cfg(feature = "sqlite")]
#[tokio::test]
async fn test_builder_with_sqlite_storage() {
    // Share an existing pool with the application
    let pool = sqlx::SqlitePool::connect("sqlite::memory:")
        .await
        .expect("Failed to connect to SQLite");

    let tripwire = TripwireBuilder::new()
        .with_sqlite_storage(tripwire::sqlite::SqliteStorage::new(pool.clone()))
        .apply_migrations(true)
        .build()
        .await
        .expect("Failed to build Tripwire");

    tripwire.record_failure("analyst@example.com").await.unwrap();

    let count: i64 =
        sqlx::query_scalar("SELECT failure_count FROM login_attempts WHERE identity = ?")
            .bind("analyst@example.com")
            .fetch_one(&pool)
            .await
            .expect("Row should be visible through the shared pool");
    assert_eq!(count, 1);
}

#[tokio::test]
async fn test_builder_with_memory() {
    let tripwire = TripwireBuilder::new()
        .with_memory()
        .apply_migrations(true)
        .build()
        .await
        .expect("Failed to build Tripwire");

    tripwire.health_check().await.expect("Health check failed");
    assert_eq!(tripwire.config(), &ThrottleConfig::default());
}

#[tokio::test]
async fn test_builder_with_custom_policy() {
    let tripwire = TripwireBuilder::new()
        .with_max_failed_attempts(3)
        .with_lockout_period(Duration::minutes(30))
        .with_memory()
        .build()
        .await
        .expect("Failed to build Tripwire");

    for _ in 0..3 {
        tripwire.record_failure("analyst@example.com").await.unwrap();
    }

    let status = tripwire.status("analyst@example.com").await.unwrap();
    assert!(status.is_locked);
    let retry_after = status.retry_after_seconds().unwrap();
    assert!(retry_after > 1790 && retry_after <= 1800);
}

#[tokio::test]
async fn test_builder_with_shared_repository() {
    let repository = Arc::new(InMemoryAttemptRepository::new());
    let tripwire = TripwireBuilder::new()
        .with_repository(repository.clone())
        .build()
        .await
        .expect("Failed to build Tripwire");

    tripwire.record_failure("analyst@example.com").await.unwrap();
    assert_eq!(repository.len(), 1);
}

#[tokio::test]
async fn test_builder_disabled_throttling() {
    let tripwire = TripwireBuilder::new()
        .with_memory()
        .disable_throttling()
        .build()
        .await
        .expect("Failed to build Tripwire");

    for _ in 0..10 {
        tripwire.record_failure("analyst@example.com").await.unwrap();
    }
    assert!(tripwire.check("analyst@example.com").await.unwrap().is_allowed());
}

#[tokio::test]
async fn test_builder_rejects_zero_threshold() {
    let result = TripwireBuilder::new()
        .with_memory()
        .with_max_failed_attempts(0)
        .build()
        .await;

    assert!(matches!(
        result,
        Err(TripwireBuilderError::InvalidConfiguration(_))
    ));
}

#[tokio::test]
async fn test_builder_rejects_negative_lockout() {
    let result = TripwireBuilder::new()
        .with_memory()
        .with_lockout_period(Duration::minutes(-1))
        .build()
        .await;

    assert!(matches!(
        result,
        Err(TripwireBuilderError::InvalidConfiguration(_))
    ));
}
