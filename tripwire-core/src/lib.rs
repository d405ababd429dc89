//! Core functionality for the tripwire project
//!
//! This crate contains the login throttling policy used by the threat-indicator
//! dashboard's sign-in endpoint, the repository trait that persists
//! failed-attempt history, and the service that ties the two together.
//!
//! See [`LoginThrottle`] for the pure policy, [`AttemptRepository`](repositories::AttemptRepository)
//! for storage, and [`ThrottleService`](services::ThrottleService) for the
//! deny-before-check flow.
//!
pub mod error;
pub mod key;
pub mod repositories;
pub mod services;
pub mod throttle;
pub mod validation;

pub use error::Error;
pub use key::AttemptKey;
pub use repositories::{AttemptRepository, InMemoryAttemptRepository};
pub use services::{AttemptOutcome, ThrottleService};
pub use throttle::{AttemptRecord, Decision, LockoutStatus, LoginThrottle, ThrottleConfig};
