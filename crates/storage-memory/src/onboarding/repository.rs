use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use log::debug;

use elly_core::errors::{Error, Result};
use elly_core::onboarding::{OnboardingJob, OnboardingRepositoryTrait};

/// Onboarding job snapshots keyed by job id.
#[derive(Default)]
pub struct OnboardingJobRepository {
    jobs: DashMap<String, OnboardingJob>,
}

impl OnboardingJobRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OnboardingRepositoryTrait for OnboardingJobRepository {
    async fn create(&self, job: OnboardingJob) -> Result<OnboardingJob> {
        match self.jobs.entry(job.job_id.clone()) {
            Entry::Occupied(_) => Err(Error::Repository(format!(
                "Onboarding job {} already exists",
                job.job_id
            ))),
            Entry::Vacant(slot) => {
                slot.insert(job.clone());
                Ok(job)
            }
        }
    }

    async fn update(&self, job: OnboardingJob) -> Result<OnboardingJob> {
        let Some(mut stored) = self.jobs.get_mut(&job.job_id) else {
            return Err(Error::NotFound(format!("Onboarding job {}", job.job_id)));
        };
        debug!(
            "Job[update]: job={} phase={} progress={}",
            job.job_id, job.phase, job.progress
        );
        *stored = job.clone();
        Ok(job)
    }

    async fn get(&self, job_id: &str) -> Result<Option<OnboardingJob>> {
        Ok(self.jobs.get(job_id).map(|job| job.clone()))
    }
}
