//! Elly Connect - Open-banking aggregation for Elly.
//!
//! This crate talks to the sandbox banks (tokens, consents, accounts and
//! transactions) and drives the onboarding pipeline that turns a user's
//! transaction history into detected obligations.

pub mod bank;
pub mod client;
pub mod config;
pub mod mapping;
pub mod onboarding;

// Re-export commonly used types
pub use bank::{BankAccountsApi, BankTokenCache, BankTokenFetcher, ConsentsApi, FetchedToken};
pub use client::{OpenBankApiClient, OpenBankTokenFetcher};
pub use config::{BanksConfig, OnboardingConfig};
pub use onboarding::{
    DonePayload, FailedPayload, JobSubscription, NoOpProgressReporter, OnboardingEvent,
    OnboardingOrchestrator, OnboardingProgressReporter, OnboardingServices, ProgressPublisher,
};
