//! Login throttling service.
//!
//! This module binds the pure [`LoginThrottle`] policy to an
//! [`AttemptRepository`], giving the sign-in endpoint the whole
//! deny-before-check flow:
//!
//! 1. [`ThrottleService::check`] before touching credentials. A `Denied`
//!    decision means credential verification must not run at all.
//! 2. [`ThrottleService::record_failure`] or [`ThrottleService::record_success`]
//!    with the verification outcome.
//!
//! [`ThrottleService::attempt`] wraps both steps around a verification future.
//!
//! # Example
//!
//! ```rust,ignore
//! use tripwire_core::{AttemptKey, ThrottleConfig};
//! use tripwire_core::services::{AttemptOutcome, ThrottleService};
//!
//! let service = ThrottleService::new(repository, ThrottleConfig::default());
//! let key = AttemptKey::email("analyst@example.com")?;
//!
//! match service.attempt(&key, || verify_password(&key, password)).await? {
//!     AttemptOutcome::Authenticated(user) => { /* issue a token */ }
//!     AttemptOutcome::Rejected { .. } => { /* "Invalid credentials" */ }
//!     AttemptOutcome::Denied { retry_after } => { /* 429 with Retry-After */ }
//! }
//! ```

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::{
    AttemptKey, AttemptRecord, Decision, Error, LockoutStatus, LoginThrottle, ThrottleConfig,
    repositories::AttemptRepository,
};

/// How many times an expiry reset is retried when another request changes the
/// record between our read and our compare-and-set.
const MAX_RESET_ATTEMPTS: usize = 3;

/// Result of [`ThrottleService::attempt`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome<T> {
    /// Credentials verified; the failure history was cleared.
    Authenticated(T),
    /// Credentials rejected; one failure was recorded.
    Rejected { failed_attempts: u32 },
    /// The identity is locked; credentials were never checked.
    Denied { retry_after: Duration },
}

/// Service for throttling sign-in attempts per identity.
///
/// # Thread Safety
///
/// The service is `Send + Sync` and meant to be shared behind an `Arc`.
/// Per-identity serialization is delegated to the repository's atomic
/// operations.
pub struct ThrottleService<R: AttemptRepository> {
    repository: Arc<R>,
    config: ThrottleConfig,
    policy: LoginThrottle,
}

impl<R: AttemptRepository> ThrottleService<R> {
    /// Create a new ThrottleService.
    ///
    /// # Arguments
    ///
    /// * `repository` - Storage for attempt records
    /// * `config` - Threshold, lockout period and cleanup settings
    pub fn new(repository: Arc<R>, config: ThrottleConfig) -> Self {
        let policy = config.policy();
        Self {
            repository,
            config,
            policy,
        }
    }

    /// Get the current configuration.
    pub fn config(&self) -> &ThrottleConfig {
        &self.config
    }

    /// The policy derived from the configuration.
    pub fn policy(&self) -> LoginThrottle {
        self.policy
    }

    pub fn repository(&self) -> &Arc<R> {
        &self.repository
    }

    /// Check if throttling is enabled.
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Decide whether a sign-in attempt for `key` may proceed right now.
    pub async fn check(&self, key: &AttemptKey) -> Result<Decision, Error> {
        self.check_at(key, Utc::now()).await
    }

    /// Decide whether a sign-in attempt for `key` may proceed at `now`.
    ///
    /// When the stored lockout has expired, the record is cleared with a
    /// compare-and-set before `Allowed` is returned. If another request changed
    /// the record in the meantime the record is read and evaluated again. If
    /// the reset keeps losing, the attempt is denied with a zero retry-after
    /// so a stale locked record is never left behind an `Allowed`.
    pub async fn check_at(&self, key: &AttemptKey, now: DateTime<Utc>) -> Result<Decision, Error> {
        if !self.config.enabled {
            return Ok(Decision::Allowed);
        }

        for _ in 0..MAX_RESET_ATTEMPTS {
            let Some(stored) = self.repository.get(key).await? else {
                return Ok(Decision::Allowed);
            };

            let mut record = stored;
            let decision = self.policy.evaluate(&mut record, now);
            if record == stored {
                return Ok(decision);
            }

            if self.repository.reset_if_unchanged(key, &stored).await? {
                tracing::debug!(
                    identity = %key,
                    failures = stored.failure_count(),
                    "Lockout expired, failure history reset"
                );
                return Ok(decision);
            }

            tracing::debug!(identity = %key, "Attempt record changed during reset, re-evaluating");
        }

        // Never allow while an expired locked record is still stored.
        tracing::warn!(
            identity = %key,
            "Could not reset expired lockout, denying attempt"
        );
        Ok(Decision::Denied {
            retry_after: Duration::zero(),
        })
    }

    /// Record a failed verification for `key` now.
    pub async fn record_failure(&self, key: &AttemptKey) -> Result<AttemptRecord, Error> {
        self.record_failure_at(key, Utc::now()).await
    }

    /// Record a failed verification for `key` at `at`.
    ///
    /// If throttling is disabled this is a no-op that returns an empty record.
    /// Must not be called for attempts that [`check`](Self::check) denied.
    pub async fn record_failure_at(
        &self,
        key: &AttemptKey,
        at: DateTime<Utc>,
    ) -> Result<AttemptRecord, Error> {
        if !self.config.enabled {
            return Ok(AttemptRecord::default());
        }

        let record = self.repository.record_failure(key, at).await?;

        if record.effective_failure_count() == self.policy.max_failed_attempts() {
            tracing::warn!(
                identity = %key,
                failures = record.failure_count(),
                lockout_secs = self.policy.lockout_period().num_seconds(),
                "Identity locked after repeated failed sign-in attempts"
            );
        }

        Ok(record)
    }

    /// Clear the failure history for `key` after a successful sign in.
    pub async fn record_success(&self, key: &AttemptKey) -> Result<(), Error> {
        self.repository.clear(key).await?;
        Ok(())
    }

    /// Run the whole deny-before-check flow around `verify`.
    ///
    /// `verify` is only invoked when the identity is not locked. It resolves to
    /// `Some(principal)` for valid credentials and `None` for invalid ones.
    /// Errors from `verify` are returned as-is and record nothing.
    pub async fn attempt<T, E, F, Fut>(
        &self,
        key: &AttemptKey,
        verify: F,
    ) -> Result<AttemptOutcome<T>, E>
    where
        E: From<Error>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<T>, E>>,
    {
        if let Decision::Denied { retry_after } = self.check(key).await? {
            tracing::info!(identity = %key, "Sign-in attempt denied while locked");
            return Ok(AttemptOutcome::Denied { retry_after });
        }

        match verify().await? {
            Some(principal) => {
                self.record_success(key).await?;
                tracing::info!(identity = %key, "Sign-in succeeded");
                Ok(AttemptOutcome::Authenticated(principal))
            }
            None => {
                let record = self.record_failure(key).await?;
                let failed_attempts = record.effective_failure_count();
                tracing::info!(
                    identity = %key,
                    failures = failed_attempts,
                    "Sign-in rejected"
                );
                Ok(AttemptOutcome::Rejected { failed_attempts })
            }
        }
    }

    /// Get the current lockout status for `key`.
    pub async fn status(&self, key: &AttemptKey) -> Result<LockoutStatus, Error> {
        self.status_at(key, Utc::now()).await
    }

    /// Get the lockout status for `key` at `now`. Does not modify storage.
    pub async fn status_at(
        &self,
        key: &AttemptKey,
        now: DateTime<Utc>,
    ) -> Result<LockoutStatus, Error> {
        if !self.config.enabled {
            return Ok(LockoutStatus {
                identity: key.to_string(),
                failed_attempts: 0,
                is_locked: false,
                locked_until: None,
            });
        }

        let record = self.repository.get(key).await?.unwrap_or_default();
        Ok(self.policy.status(key.as_str(), &record, now))
    }

    /// Unlock an identity ahead of its lockout expiry (e.g. after an
    /// administrator verified the account owner).
    ///
    /// # Returns
    ///
    /// `true` if the identity was locked, `false` otherwise.
    pub async fn unlock(&self, key: &AttemptKey) -> Result<bool, Error> {
        let was_locked = self.status(key).await?.is_locked;
        self.repository.clear(key).await?;
        if was_locked {
            tracing::info!(identity = %key, "Identity unlocked");
        }
        Ok(was_locked)
    }

    /// Delete lockouts that expired before `now`, i.e. records that the next
    /// [`check`](Self::check) would reset anyway.
    ///
    /// Failure streaks below the threshold are never purged, so sweeping does
    /// not change any future decision.
    pub async fn purge_stale_at(&self, now: DateTime<Utc>) -> Result<u64, Error> {
        let before = now - self.policy.lockout_period();
        self.repository
            .purge_stale(before, self.policy.max_failed_attempts())
            .await
    }

    /// Storage health check
    pub async fn health_check(&self) -> Result<(), Error> {
        self.repository.health_check().await
    }

    /// Start the background retention task.
    ///
    /// Every `cleanup_interval` the task deletes expired lockouts, as
    /// [`purge_stale_at`](Self::purge_stale_at) does.
    ///
    /// # Arguments
    ///
    /// * `shutdown` - A watch receiver that signals when to stop the task
    pub fn start_cleanup_task(
        &self,
        mut shutdown: tokio::sync::watch::Receiver<bool>,
    ) -> tokio::task::JoinHandle<()> {
        let repository = Arc::clone(&self.repository);
        let policy = self.policy;
        // tokio::time::interval panics on a zero period.
        let cleanup_interval = self
            .config
            .cleanup_interval
            .max(std::time::Duration::from_secs(1));

        tokio::spawn(async move {
            let mut interval_timer = tokio::time::interval(cleanup_interval);

            loop {
                tokio::select! {
                    _ = interval_timer.tick() => {
                        let before = Utc::now() - policy.lockout_period();
                        match repository
                            .purge_stale(before, policy.max_failed_attempts())
                            .await
                        {
                            Ok(count) if count > 0 => {
                                tracing::info!(
                                    count = count,
                                    "Purged stale attempt records"
                                );
                            }
                            Err(e) => {
                                tracing::warn!(
                                    error = %e,
                                    "Failed to purge stale attempt records"
                                );
                            }
                            _ => {}
                        }
                    }
                    _ = shutdown.changed() => {
                        tracing::info!("Shutting down attempt record cleanup task");
                        break;
                    }
                }
            }
        })
    }
}
