//! In-memory storage implementation for Elly.
//!
//! Implements the repository traits defined in `elly-core` on top of
//! concurrent maps. State lives for the lifetime of the process.
//!
//! ```text
//! core (domain)          connect (onboarding)
//!       │                      │
//!       └──────────┬───────────┘
//!                  │
//!                  ▼
//!          storage-memory (this crate)
//! ```

pub mod consents;
pub mod obligations;
pub mod onboarding;
pub mod users;

pub use consents::ConsentRepository;
pub use obligations::ObligationRepository;
pub use onboarding::OnboardingJobRepository;
pub use users::UserRepository;

// Re-export from elly-core for convenience
pub use elly_core::errors::{Error, Result};
