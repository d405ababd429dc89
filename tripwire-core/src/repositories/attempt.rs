//! Repository trait for failed-attempt history.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{AttemptKey, AttemptRecord, Error};

/// Keyed storage for [`AttemptRecord`]s.
///
/// The read-evaluate-write sequence of a sign in is not atomic, so every
/// write operation here must be serialized per key by the implementation:
///
/// - [`record_failure`](Self::record_failure) is an atomic increment. N
///   concurrent calls for one key starting from no record must leave
///   `failure_count == N`.
/// - [`reset_if_unchanged`](Self::reset_if_unchanged) is a compare-and-set, so
///   an expiry reset computed from a stale read cannot erase a failure
///   recorded in the meantime.
///
/// # Security Considerations
///
/// - Attempts should be recorded for every identity, existing or not, so the
///   stored history does not reveal which accounts exist.
/// - A repository living on the client (for example a browser-side cache of
///   device keys) is advisory only and must not be the enforcement point.
#[async_trait]
pub trait AttemptRepository: Send + Sync + 'static {
    /// Fetch the current record for `key`, if any.
    async fn get(&self, key: &AttemptKey) -> Result<Option<AttemptRecord>, Error>;

    /// Atomically apply one failure at `at` and return the updated record.
    ///
    /// Creates the record if none exists. A stored record without a failure
    /// timestamp is treated as having no failures.
    async fn record_failure(
        &self,
        key: &AttemptKey,
        at: DateTime<Utc>,
    ) -> Result<AttemptRecord, Error>;

    /// Remove the record for `key`.
    ///
    /// # Returns
    ///
    /// `true` if a record was removed.
    async fn clear(&self, key: &AttemptKey) -> Result<bool, Error>;

    /// Remove the record for `key` only if it still equals `expected`.
    ///
    /// # Returns
    ///
    /// `true` if the record was removed, `false` if it changed since it was read
    /// (or no longer exists).
    async fn reset_if_unchanged(
        &self,
        key: &AttemptKey,
        expected: &AttemptRecord,
    ) -> Result<bool, Error>;

    /// Delete expired lockouts: records with at least `max_failed_attempts`
    /// failures whose last failure is older than `before`. Malformed records
    /// (no failure timestamp, or a non-positive count) are deleted too.
    ///
    /// Streaks below the threshold are kept whatever their age, since the
    /// next failure must still count towards a lockout.
    ///
    /// # Returns
    ///
    /// The number of records deleted.
    async fn purge_stale(
        &self,
        before: DateTime<Utc>,
        max_failed_attempts: u32,
    ) -> Result<u64, Error>;

    /// Create or upgrade whatever schema the repository needs.
    ///
    /// Repositories without a schema keep the default no-op.
    async fn migrate(&self) -> Result<(), Error> {
        Ok(())
    }

    /// Storage health check
    async fn health_check(&self) -> Result<(), Error>;
}
