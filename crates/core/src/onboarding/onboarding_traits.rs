//! Onboarding job repository trait.

use async_trait::async_trait;

use super::onboarding_model::OnboardingJob;
use crate::errors::Result;

/// Persists snapshots of onboarding jobs.
#[async_trait]
pub trait OnboardingRepositoryTrait: Send + Sync {
    async fn create(&self, job: OnboardingJob) -> Result<OnboardingJob>;

    /// Replaces the stored snapshot. Fails with `NotFound` for unknown jobs.
    async fn update(&self, job: OnboardingJob) -> Result<OnboardingJob>;

    async fn get(&self, job_id: &str) -> Result<Option<OnboardingJob>>;
}
