//! Onboarding module - aggregation job state machine and repository trait.

mod onboarding_model;
mod onboarding_traits;

pub use onboarding_model::{OnboardingJob, OnboardingPhase, PROGRESS_COMPLETE};
pub use onboarding_traits::OnboardingRepositoryTrait;
