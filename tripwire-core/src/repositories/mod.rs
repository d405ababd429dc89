//! Repository traits for the data access layer
//!
//! Services talk to storage only through these traits. Storage backends
//! (see `tripwire-storage-sqlite`) implement them; [`InMemoryAttemptRepository`]
//! is provided here for single-process deployments and tests.

pub mod attempt;
pub mod memory;

pub use attempt::AttemptRepository;
pub use memory::InMemoryAttemptRepository;
