//! In-process attempt repository backed by a concurrent map.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::{AttemptKey, AttemptRecord, Error, repositories::AttemptRepository};

/// [`AttemptRepository`] that keeps records in memory.
///
/// Each write holds the map shard lock for its key, which serializes updates
/// per identity. Records do not survive a restart, so a server should only use
/// this store when a single process enforces the lockout. It is also the
/// natural store for the advisory client-side variant keyed by
/// [`AttemptKey::device`].
#[derive(Debug, Default)]
pub struct InMemoryAttemptRepository {
    records: DashMap<AttemptKey, AttemptRecord>,
}

impl InMemoryAttemptRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of identities currently tracked.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl AttemptRepository for InMemoryAttemptRepository {
    async fn get(&self, key: &AttemptKey) -> Result<Option<AttemptRecord>, Error> {
        Ok(self.records.get(key).map(|entry| *entry.value()))
    }

    async fn record_failure(
        &self,
        key: &AttemptKey,
        at: DateTime<Utc>,
    ) -> Result<AttemptRecord, Error> {
        let mut entry = self.records.entry(key.clone()).or_default();
        let updated = AttemptRecord::from_parts(
            entry.effective_failure_count().saturating_add(1),
            Some(at),
        );
        *entry = updated;
        Ok(updated)
    }

    async fn clear(&self, key: &AttemptKey) -> Result<bool, Error> {
        Ok(self.records.remove(key).is_some())
    }

    async fn reset_if_unchanged(
        &self,
        key: &AttemptKey,
        expected: &AttemptRecord,
    ) -> Result<bool, Error> {
        Ok(self
            .records
            .remove_if(key, |_, current| current == expected)
            .is_some())
    }

    async fn purge_stale(
        &self,
        before: DateTime<Utc>,
        max_failed_attempts: u32,
    ) -> Result<u64, Error> {
        let before_len = self.records.len();
        self.records.retain(|_, record| match record.last_failure_at() {
            Some(last_failure_at) if record.failure_count() > 0 => {
                record.failure_count() < max_failed_attempts || last_failure_at >= before
            }
            _ => false,
        });
        Ok(before_len.saturating_sub(self.records.len()) as u64)
    }

    async fn health_check(&self) -> Result<(), Error> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::sync::Arc;

    fn key(email: &str) -> AttemptKey {
        AttemptKey::email(email).unwrap()
    }

    #[tokio::test]
    async fn test_record_failure_creates_and_increments() {
        let repo = InMemoryAttemptRepository::new();
        let now = Utc::now();

        let first = repo.record_failure(&key("a@example.com"), now).await.unwrap();
        assert_eq!(first, AttemptRecord::from_parts(1, Some(now)));

        let second = repo
            .record_failure(&key("a@example.com"), now + Duration::seconds(1))
            .await
            .unwrap();
        assert_eq!(second.failure_count(), 2);
        assert_eq!(second.last_failure_at(), Some(now + Duration::seconds(1)));
    }

    #[tokio::test]
    async fn test_get_missing_returns_none() {
        let repo = InMemoryAttemptRepository::new();
        assert!(repo.get(&key("nobody@example.com")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_clear_removes_record() {
        let repo = InMemoryAttemptRepository::new();
        repo.record_failure(&key("a@example.com"), Utc::now())
            .await
            .unwrap();

        assert!(repo.clear(&key("a@example.com")).await.unwrap());
        assert!(!repo.clear(&key("a@example.com")).await.unwrap());
        assert!(repo.is_empty());
    }

    #[tokio::test]
    async fn test_reset_if_unchanged_is_compare_and_set() {
        let repo = InMemoryAttemptRepository::new();
        let now = Utc::now();
        let observed = repo.record_failure(&key("a@example.com"), now).await.unwrap();

        // Another failure lands between the read and the reset.
        repo.record_failure(&key("a@example.com"), now).await.unwrap();
        assert!(
            !repo
                .reset_if_unchanged(&key("a@example.com"), &observed)
                .await
                .unwrap()
        );
        assert_eq!(
            repo.get(&key("a@example.com"))
                .await
                .unwrap()
                .unwrap()
                .failure_count(),
            2
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
    async fn test_purge_stale_removes_only_expired_lockouts() {
        let repo = InMemoryAttemptRepository::new();
        let now = Utc::now();
        let old = now - Duration::hours(2);
        for _ in 0..5 {
            repo.record_failure(&key("expired@example.com"), old)
                .await
                .unwrap();
            repo.record_failure(&key("locked@example.com"), now)
                .await
                .unwrap();
        }
        for _ in 0..4 {
            repo.record_failure(&key("streak@example.com"), old)
                .await
                .unwrap();
        }

        let purged = repo.purge_stale(now - Duration::hours(1), 5).await.unwrap();
        assert_eq!(purged, 1);
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
    async fn test_concurrent_failures_are_not_lost() {
        let repo = Arc::new(InMemoryAttemptRepository::new());
        let now = Utc::now();

        let handles: Vec<_> = (0..64)
            .map(|_| {
                let repo = Arc::clone(&repo);
                tokio::spawn(async move {
                    repo.record_failure(&key("target@example.com"), now)
                        .await
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        let record = repo.get(&key("target@example.com")).await.unwrap().unwrap();
        assert_eq!(record.failure_count(), 64);
    }
}
