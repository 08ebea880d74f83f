//! Onboarding aggregation pipeline.
//!
//! A run walks the job through consents, transaction collection and
//! obligation detection, persisting every transition and publishing it to
//! the job's progress stream. `start` returns as soon as the job exists; the
//! run itself continues on the tokio runtime.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use log::{error, info};
use serde_json::json;
use uuid::Uuid;

use super::collector::{lookback_window, TransactionCollector};
use super::consents::ConsentOrchestrator;
use super::progress::{DonePayload, FailedPayload, OnboardingEvent, OnboardingProgressReporter};
use crate::bank::{BankAccountsApi, ConsentsApi};
use crate::config::{BanksConfig, OnboardingConfig};
use elly_core::banking::{BankCode, ClientId, UserId};
use elly_core::consents::ConsentRepositoryTrait;
use elly_core::errors::{Error, Result, ValidationError};
use elly_core::obligations::{
    detect_obligations, with_demo_transactions, DetectionInput, ObligationRepositoryTrait,
};
use elly_core::onboarding::{
    OnboardingJob, OnboardingPhase, OnboardingRepositoryTrait, PROGRESS_COMPLETE,
};
use elly_core::payments::payment_views;
use elly_core::users::{derive_client_id, UserRepositoryTrait};

const PROGRESS_STARTED: u8 = 5;
const PROGRESS_CONSENTS: u8 = 25;
const PROGRESS_COLLECTING: u8 = 30;
const PROGRESS_COLLECTED: u8 = 60;

/// Collaborators an onboarding run needs.
#[derive(Clone)]
pub struct OnboardingServices {
    pub jobs: Arc<dyn OnboardingRepositoryTrait>,
    pub obligations: Arc<dyn ObligationRepositoryTrait>,
    pub consents: Arc<dyn ConsentRepositoryTrait>,
    pub users: Arc<dyn UserRepositoryTrait>,
    pub consents_api: Arc<dyn ConsentsApi>,
    pub accounts_api: Arc<dyn BankAccountsApi>,
}

/// Orchestrates onboarding runs.
///
/// # Example
///
/// ```ignore
/// let publisher = Arc::new(ProgressPublisher::new(config.replay_capacity));
/// let orchestrator = OnboardingOrchestrator::new(services, publisher, banks, config);
/// let job = orchestrator.start(UserId(1), vec![BankCode::new("vbank")]).await?;
/// ```
pub struct OnboardingOrchestrator<P: OnboardingProgressReporter + 'static> {
    jobs: Arc<dyn OnboardingRepositoryTrait>,
    obligations: Arc<dyn ObligationRepositoryTrait>,
    users: Arc<dyn UserRepositoryTrait>,
    consents: Arc<ConsentOrchestrator>,
    collector: Arc<TransactionCollector>,
    progress_reporter: Arc<P>,
    banks: Arc<BanksConfig>,
    config: Arc<OnboardingConfig>,
}

impl<P: OnboardingProgressReporter + 'static> Clone for OnboardingOrchestrator<P> {
    fn clone(&self) -> Self {
        Self {
            jobs: Arc::clone(&self.jobs),
            obligations: Arc::clone(&self.obligations),
            users: Arc::clone(&self.users),
            consents: Arc::clone(&self.consents),
            collector: Arc::clone(&self.collector),
            progress_reporter: Arc::clone(&self.progress_reporter),
            banks: Arc::clone(&self.banks),
            config: Arc::clone(&self.config),
        }
    }
}

/// Reports the job finished when dropped, including when the run panics.
struct FinishOnDrop<P: OnboardingProgressReporter> {
    reporter: Arc<P>,
    job_id: String,
}

impl<P: OnboardingProgressReporter> Drop for FinishOnDrop<P> {
    fn drop(&mut self) {
        self.reporter.report_finished(&self.job_id);
    }
}

impl<P: OnboardingProgressReporter + 'static> OnboardingOrchestrator<P> {
    pub fn new(
        services: OnboardingServices,
        progress_reporter: Arc<P>,
        banks: BanksConfig,
        config: OnboardingConfig,
    ) -> Self {
        let consents = Arc::new(ConsentOrchestrator::new(
            services.consents_api,
            services.consents,
        ));
        let collector = Arc::new(TransactionCollector::new(
            services.accounts_api,
            Arc::clone(&consents),
        ));
        Self {
            jobs: services.jobs,
            obligations: services.obligations,
            users: services.users,
            consents,
            collector,
            progress_reporter,
            banks: Arc::new(banks),
            config: Arc::new(config),
        }
    }

    /// Creates a job for `user_id` over `banks` and starts it in the background.
    ///
    /// Bank codes are de-duplicated in request order. Returns the initial
    /// snapshot once it is persisted and its progress stream is open.
    pub async fn start(&self, user_id: UserId, banks: Vec<BankCode>) -> Result<OnboardingJob> {
        let banks = self.validate_banks(banks)?;

        let email = self.users.get_email(user_id).await?.ok_or_else(|| {
            ValidationError::InvalidInput(format!("Unknown user {}", user_id))
        })?;
        let client_id = derive_client_id(&email)?;

        let now = Utc::now();
        let job_id = format!(
            "onb_{}_{}",
            now.timestamp_millis(),
            &Uuid::new_v4().simple().to_string()[..8]
        );
        let job = self
            .jobs
            .create(OnboardingJob::new(&job_id, user_id, PROGRESS_STARTED, now))
            .await?;

        info!(
            "Onboarding started: job={} user={} client={} banks={:?}",
            job_id, user_id, client_id, banks
        );
        self.progress_reporter.report_started(&job_id);
        self.progress_reporter.report_event(
            &job_id,
            OnboardingEvent::progress(
                OnboardingPhase::ConsentsInProgress,
                PROGRESS_STARTED,
                Some(json!({ "banks": banks })),
            ),
        );

        let this = self.clone();
        let run_job = job.clone();
        tokio::spawn(async move {
            this.run(run_job, client_id, banks).await;
        });

        Ok(job)
    }

    /// Persisted snapshot of a job.
    pub async fn status(&self, job_id: &str) -> Result<OnboardingJob> {
        self.jobs
            .get(job_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Onboarding job {}", job_id)))
    }

    fn validate_banks(&self, banks: Vec<BankCode>) -> Result<Vec<BankCode>> {
        if banks.is_empty() {
            return Err(ValidationError::MissingField("banks".to_string()).into());
        }
        let mut seen = BTreeSet::new();
        let mut unique = Vec::with_capacity(banks.len());
        for bank in banks {
            if !self.banks.contains(&bank) {
                return Err(Error::Configuration(format!("Unknown bank: {}", bank)));
            }
            if seen.insert(bank.clone()) {
                unique.push(bank);
            }
        }
        Ok(unique)
    }

    /// Runs the pipeline and always closes the job's stream.
    async fn run(&self, mut job: OnboardingJob, client_id: ClientId, banks: Vec<BankCode>) {
        let job_id = job.job_id.clone();
        let _finished = FinishOnDrop {
            reporter: Arc::clone(&self.progress_reporter),
            job_id: job_id.clone(),
        };

        if let Err(err) = self.run_internal(&mut job, &client_id, &banks).await {
            error!("Onboarding failed: job={} error={}", job_id, err);
            job.fail(err.to_string(), Utc::now());
            if let Err(persist_err) = self.jobs.update(job.clone()).await {
                error!("Failed to persist failed job {}: {}", job_id, persist_err);
            }
            self.progress_reporter.report_event(
                &job_id,
                OnboardingEvent::progress(OnboardingPhase::Failed, PROGRESS_COMPLETE, None),
            );
            self.progress_reporter.report_event(
                &job_id,
                OnboardingEvent::Failed(FailedPayload {
                    error: err.to_string(),
                }),
            );
        }
    }

    async fn run_internal(
        &self,
        job: &mut OnboardingJob,
        client_id: &ClientId,
        banks: &[BankCode],
    ) -> Result<()> {
        let user_id = job.user_id;

        // Step 1: consents
        let per_bank = self
            .consents
            .request_consents(user_id, client_id, banks)
            .await;
        job.per_bank_consent = per_bank.clone();
        self.transition(
            job,
            OnboardingPhase::ConsentsInProgress,
            PROGRESS_CONSENTS,
            Some(json!({ "consents": per_bank })),
        )
        .await?;

        // Step 2: transactions
        self.transition(
            job,
            OnboardingPhase::TransactionsCollecting,
            PROGRESS_COLLECTING,
            None,
        )
        .await?;
        let window = lookback_window(Utc::now(), self.config.lookback_days);
        let transactions = self
            .collector
            .collect_all(user_id, client_id, &per_bank, &window)
            .await;
        self.transition(
            job,
            OnboardingPhase::TransactionsCollecting,
            PROGRESS_COLLECTED,
            Some(json!({ "transactions": transactions.len() })),
        )
        .await?;

        // Step 3: detection
        let today = Utc::now().date_naive();
        let transactions = if self.config.inject_demo_transactions {
            with_demo_transactions(transactions, today)
        } else {
            transactions
        };
        let input = DetectionInput::new(user_id, &transactions, today)
            .with_source(&self.config.source)
            .with_currency(&self.config.currency);
        let obligations = detect_obligations(&input);
        let payments = payment_views(&obligations, today);
        let detected = obligations.len();

        let written = self.obligations.upsert_all(obligations).await?;
        info!(
            "Obligations stored: job={} detected={} written={}",
            job.job_id, detected, written
        );

        let mut finished = job.clone();
        finished.complete(detected, Utc::now())?;
        *job = self.jobs.update(finished).await?;

        self.progress_reporter.report_event(
            &job.job_id,
            OnboardingEvent::progress(OnboardingPhase::Done, PROGRESS_COMPLETE, None),
        );
        self.progress_reporter.report_event(
            &job.job_id,
            OnboardingEvent::Done(DonePayload {
                obligations_detected: detected,
                payments,
            }),
        );
        info!("Onboarding done: job={} obligations={}", job.job_id, detected);
        Ok(())
    }

    /// Advances, persists and publishes one transition.
    async fn transition(
        &self,
        job: &mut OnboardingJob,
        phase: OnboardingPhase,
        progress: u8,
        detail: Option<serde_json::Value>,
    ) -> Result<()> {
        job.advance(phase, progress, Utc::now())?;
        *job = self.jobs.update(job.clone()).await?;
        self.progress_reporter.report_event(
            &job.job_id,
            OnboardingEvent::progress(phase, progress, detail),
        );
        Ok(())
    }
}
