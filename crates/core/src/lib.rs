//! Elly Core - Domain entities, detection logic and repository traits.
//!
//! This crate contains the core business logic for Elly.
//! It is storage-agnostic and defines traits that are implemented
//! by the `storage-memory` crate.

pub mod banking;
pub mod consents;
pub mod errors;
pub mod obligations;
pub mod onboarding;
pub mod payments;
pub mod users;

// Re-export error types
pub use errors::Error;
pub use errors::Result;
