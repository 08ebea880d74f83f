//! Onboarding pipeline: consents, collection, detection and progress streaming.

mod collector;
mod consents;
mod orchestrator;
mod progress;

#[cfg(test)]
mod orchestrator_tests;

pub use collector::{lookback_window, LookbackWindow, TransactionCollector};
pub use consents::ConsentOrchestrator;
pub use orchestrator::{OnboardingOrchestrator, OnboardingServices};
pub use progress::{
    DonePayload, FailedPayload, JobSubscription, NoOpProgressReporter, OnboardingEvent,
    OnboardingProgressReporter, ProgressPayload, ProgressPublisher,
};
