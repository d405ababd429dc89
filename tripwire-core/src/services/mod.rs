//! Services coordinating policy and storage

pub mod throttle;

pub use throttle::{AttemptOutcome, ThrottleService};
