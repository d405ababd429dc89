//! Login throttle policy.
//!
//! [`LoginThrottle`] is the pure decision function behind account lockout: given
//! an identity's [`AttemptRecord`] and the current time it decides whether a sign
//! in attempt may proceed to credential verification, and it evolves the record
//! when the attempt fails or succeeds.
//!
//! The policy has two logical states per identity:
//!
//! - **Open**: fewer than `max_failed_attempts` consecutive failures.
//! - **Locked**: at least `max_failed_attempts` failures, the most recent one
//!   less than `lockout_period` ago.
//!
//! Lockout is never stored. It is derived on every [`LoginThrottle::evaluate`]
//! call and expires on its own once the lockout period has elapsed.
//!
//! # Example
//!
//! ```rust
//! use chrono::{Duration, Utc};
//! use tripwire_core::{AttemptRecord, Decision, LoginThrottle};
//!
//! let throttle = LoginThrottle::new(5, Duration::minutes(15));
//! let now = Utc::now();
//!
//! let mut record = AttemptRecord::default();
//! for _ in 0..5 {
//!     record = throttle.record_failure(record, now);
//! }
//!
//! assert!(throttle.evaluate(&mut record, now).is_denied());
//! assert_eq!(
//!     throttle.evaluate(&mut record, now + Duration::minutes(16)),
//!     Decision::Allowed
//! );
//! assert_eq!(record, AttemptRecord::default());
//! ```

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Configuration for login throttling.
///
/// Durations deserialize from whole seconds (`lockout_period_secs`,
/// `cleanup_interval_secs`) so the struct can be embedded in an application's
/// own configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThrottleConfig {
    /// When false, every attempt is allowed and nothing is recorded.
    pub enabled: bool,
    /// Consecutive failures that lock an identity.
    pub max_failed_attempts: u32,
    /// How long a lockout lasts after the most recent failure. Also the age
    /// after which a stale failure streak is evicted by the retention sweep.
    #[serde(rename = "lockout_period_secs", with = "seconds::chrono_duration")]
    pub lockout_period: Duration,
    /// How often the background retention sweep runs.
    #[serde(rename = "cleanup_interval_secs", with = "seconds::std_duration")]
    pub cleanup_interval: std::time::Duration,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_failed_attempts: 5,
            lockout_period: Duration::minutes(15),
            cleanup_interval: std::time::Duration::from_secs(3600),
        }
    }
}

impl ThrottleConfig {
    /// A configuration with throttling turned off.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    /// The pure policy described by this configuration.
    pub fn policy(&self) -> LoginThrottle {
        LoginThrottle::new(self.max_failed_attempts, self.lockout_period)
    }
}

/// Failed-attempt history for one identity.
///
/// `last_failure_at` is present exactly when `failure_count > 0`. Records read
/// from storage that break this rule are treated as having no failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AttemptRecord {
    failure_count: u32,
    last_failure_at: Option<DateTime<Utc>>,
}

impl AttemptRecord {
    /// Build a record from stored values without normalizing them.
    pub fn from_parts(failure_count: u32, last_failure_at: Option<DateTime<Utc>>) -> Self {
        Self {
            failure_count,
            last_failure_at,
        }
    }

    pub fn failure_count(&self) -> u32 {
        self.failure_count
    }

    pub fn last_failure_at(&self) -> Option<DateTime<Utc>> {
        self.last_failure_at
    }

    /// The failure count the policy acts on. Malformed records count as zero.
    pub fn effective_failure_count(&self) -> u32 {
        match self.last_failure_at {
            Some(_) => self.failure_count,
            None => 0,
        }
    }

    /// True for the `(0, absent)` record.
    pub fn is_clear(&self) -> bool {
        self.failure_count == 0 && self.last_failure_at.is_none()
    }
}

/// Outcome of [`LoginThrottle::evaluate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The attempt may proceed to credential verification.
    Allowed,
    /// The identity is locked; do not verify credentials.
    Denied { retry_after: Duration },
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed)
    }

    pub fn is_denied(&self) -> bool {
        matches!(self, Decision::Denied { .. })
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Decision::Allowed => None,
            Decision::Denied { retry_after } => Some(*retry_after),
        }
    }

    /// Retry-after rounded up to whole seconds, suitable for a `Retry-After` header.
    pub fn retry_after_seconds(&self) -> Option<i64> {
        self.retry_after().map(ceil_seconds)
    }
}

/// Lockout state of an identity, for reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LockoutStatus {
    pub identity: String,
    pub failed_attempts: u32,
    pub is_locked: bool,
    pub locked_until: Option<DateTime<Utc>>,
}

impl LockoutStatus {
    /// Seconds until the lockout ends, relative to `now`.
    pub fn retry_after_seconds_at(&self, now: DateTime<Utc>) -> Option<i64> {
        self.locked_until
            .filter(|_| self.is_locked)
            .map(|until| ceil_seconds((until - now).max(Duration::zero())))
    }

    /// Seconds until the lockout ends.
    pub fn retry_after_seconds(&self) -> Option<i64> {
        self.retry_after_seconds_at(Utc::now())
    }
}

/// The throttling policy: a threshold and a lockout period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoginThrottle {
    max_failed_attempts: u32,
    lockout_period: Duration,
}

impl LoginThrottle {
    /// Create a policy. A threshold of zero is raised to one.
    pub fn new(max_failed_attempts: u32, lockout_period: Duration) -> Self {
        Self {
            max_failed_attempts: max_failed_attempts.max(1),
            lockout_period: lockout_period.max(Duration::zero()),
        }
    }

    pub fn max_failed_attempts(&self) -> u32 {
        self.max_failed_attempts
    }

    pub fn lockout_period(&self) -> Duration {
        self.lockout_period
    }

    /// Decide whether an attempt at `now` may proceed.
    ///
    /// If the record is locked but its lockout period has elapsed, the record
    /// is reset to `(0, absent)` in place before `Allowed` is returned. The
    /// caller is responsible for persisting that reset.
    pub fn evaluate(&self, record: &mut AttemptRecord, now: DateTime<Utc>) -> Decision {
        if record.effective_failure_count() < self.max_failed_attempts {
            return Decision::Allowed;
        }

        let Some(last_failure_at) = record.last_failure_at else {
            return Decision::Allowed;
        };

        // A clock that moved backwards must not stretch the lockout.
        let elapsed = (now - last_failure_at).max(Duration::zero());
        if elapsed < self.lockout_period {
            Decision::Denied {
                retry_after: self.lockout_period - elapsed,
            }
        } else {
            *record = AttemptRecord::default();
            Decision::Allowed
        }
    }

    /// Record a failed verification at `now`.
    ///
    /// Must only be called for attempts that [`evaluate`](Self::evaluate) allowed.
    pub fn record_failure(&self, record: AttemptRecord, now: DateTime<Utc>) -> AttemptRecord {
        AttemptRecord {
            failure_count: record.effective_failure_count().saturating_add(1),
            last_failure_at: Some(now),
        }
    }

    /// Record a successful verification.
    pub fn record_success(&self, _previous: AttemptRecord) -> AttemptRecord {
        AttemptRecord::default()
    }

    /// Report the lockout state of `record` at `now` without modifying it.
    pub fn status(&self, identity: &str, record: &AttemptRecord, now: DateTime<Utc>) -> LockoutStatus {
        let mut scratch = *record;
        let locked_until = match self.evaluate(&mut scratch, now) {
            Decision::Denied { retry_after } => Some(now + retry_after),
            Decision::Allowed => None,
        };

        LockoutStatus {
            identity: identity.to_string(),
            failed_attempts: scratch.effective_failure_count(),
            is_locked: locked_until.is_some(),
            locked_until,
        }
    }
}

fn ceil_seconds(duration: Duration) -> i64 {
    let millis = duration.num_milliseconds().max(0);
    (millis + 999) / 1000
}

mod seconds {
    pub mod chrono_duration {
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            duration: &chrono::Duration,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            serializer.serialize_i64(duration.num_seconds())
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<chrono::Duration, D::Error> {
            let secs = u32::deserialize(deserializer)?;
            Ok(chrono::Duration::seconds(i64::from(secs)))
        }
    }

    pub mod std_duration {
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            duration: &std::time::Duration,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            serializer.serialize_u64(duration.as_secs())
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<std::time::Duration, D::Error> {
            let secs = u64::deserialize(deserializer)?;
            Ok(std::time::Duration::from_secs(secs))
        }
    }
}
