#[cfg(test)]
mod tests {
    use std::collections::{HashMap, HashSet};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use chrono::{Datelike, Duration, Months, NaiveDateTime, Utc};

    use crate::bank::{BankAccountsApi, ConsentsApi};
    use crate::config::{BanksConfig, OnboardingConfig};
    use crate::onboarding::{
        NoOpProgressReporter, OnboardingEvent, OnboardingOrchestrator, OnboardingServices,
        ProgressPublisher,
    };
    use elly_core::banking::{AccountRef, BankCode, ClientId, ConsentId, TxRecord, UserId};
    use elly_core::consents::{AccountsConsent, ConsentRepositoryTrait, ConsentState};
    use elly_core::errors::{Error, ExternalServiceError, Result};
    use elly_core::obligations::{Obligation, ObligationRepositoryTrait};
    use elly_core::onboarding::{OnboardingJob, OnboardingPhase, OnboardingRepositoryTrait};
    use elly_core::users::UserRepositoryTrait;

    // ─────────────────────────────────────────────────────────────────────────
    // Mock repositories
    // ─────────────────────────────────────────────────────────────────────────

    #[derive(Default)]
    struct MockJobs {
        jobs: Mutex<HashMap<String, OnboardingJob>>,
    }

    #[async_trait]
    impl OnboardingRepositoryTrait for MockJobs {
        async fn create(&self, job: OnboardingJob) -> Result<OnboardingJob> {
            self.jobs
                .lock()
                .unwrap()
                .insert(job.job_id.clone(), job.clone());
            Ok(job)
        }

        async fn update(&self, job: OnboardingJob) -> Result<OnboardingJob> {
            let mut jobs = self.jobs.lock().unwrap();
            if !jobs.contains_key(&job.job_id) {
                return Err(Error::NotFound(job.job_id));
            }
            jobs.insert(job.job_id.clone(), job.clone());
            Ok(job)
        }

        async fn get(&self, job_id: &str) -> Result<Option<OnboardingJob>> {
            Ok(self.jobs.lock().unwrap().get(job_id).cloned())
        }
    }

    #[derive(Default)]
    struct MockObligations {
        stored: Mutex<Vec<Obligation>>,
        fail: bool,
        panic: bool,
    }

    #[async_trait]
    impl ObligationRepositoryTrait for MockObligations {
        async fn upsert_all(&self, obligations: Vec<Obligation>) -> Result<usize> {
            if self.panic {
                panic!("storage driver crashed");
            }
            if self.fail {
                return Err(Error::Repository("disk full".to_string()));
            }
            let written = obligations.len();
            self.stored.lock().unwrap().extend(obligations);
            Ok(written)
        }

        async fn list_active(&self, user_id: UserId) -> Result<Vec<Obligation>> {
            Ok(self
                .stored
                .lock()
                .unwrap()
                .iter()
                .filter(|o| o.user_id == user_id)
                .cloned()
                .collect())
        }
    }

    #[derive(Default)]
    struct MockConsentRepo {
        consents: Mutex<HashMap<(UserId, BankCode), AccountsConsent>>,
    }

    #[async_trait]
    impl ConsentRepositoryTrait for MockConsentRepo {
        async fn find(&self, user_id: UserId, bank: &BankCode) -> Result<Option<AccountsConsent>> {
            Ok(self
                .consents
                .lock()
                .unwrap()
                .get(&(user_id, bank.clone()))
                .cloned())
        }

        async fn upsert(&self, consent: AccountsConsent) -> Result<AccountsConsent> {
            self.consents
                .lock()
                .unwrap()
                .insert((consent.user_id, consent.bank.clone()), consent.clone());
            Ok(consent)
        }

        async fn delete(&self, user_id: UserId, bank: &BankCode) -> Result<()> {
            self.consents.lock().unwrap().remove(&(user_id, bank.clone()));
            Ok(())
        }
    }

    struct MockUsers {
        email: Option<String>,
    }

    #[async_trait]
    impl UserRepositoryTrait for MockUsers {
        async fn get_email(&self, _user_id: UserId) -> Result<Option<String>> {
            Ok(self.email.clone())
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Mock bank APIs
    // ─────────────────────────────────────────────────────────────────────────

    /// Consent status per bank; banks not listed fail.
    struct MockConsentsApi {
        statuses: HashMap<&'static str, &'static str>,
        requests: Mutex<Vec<(BankCode, ClientId)>>,
    }

    #[async_trait]
    impl ConsentsApi for MockConsentsApi {
        async fn ensure_accounts_consent(
            &self,
            bank: &BankCode,
            client_id: &ClientId,
            user_id: UserId,
        ) -> Result<AccountsConsent> {
            self.requests
                .lock()
                .unwrap()
                .push((bank.clone(), client_id.clone()));
            let status = self.statuses.get(bank.as_str()).ok_or_else(|| {
                ExternalServiceError::new("consents", "unavailable").with_status(503)
            })?;
            Ok(AccountsConsent {
                user_id,
                bank: bank.clone(),
                client_id: client_id.clone(),
                consent_id: ConsentId::from(format!("c-{}", bank).as_str()),
                status: status.to_string(),
                created_at: Utc::now(),
            })
        }
    }

    /// One account per bank holding four monthly bookings for `merchant_by_bank`.
    struct MockAccountsApi {
        merchant_by_bank: HashMap<&'static str, &'static str>,
        failing_banks: HashSet<&'static str>,
        listed: Mutex<Vec<BankCode>>,
    }

    fn monthly_bookings(account: &AccountRef, merchant: &str) -> Vec<TxRecord> {
        let today = Utc::now().date_naive();
        (1..=4)
            .map(|back| {
                let month = today
                    .checked_sub_months(Months::new(back))
                    .unwrap()
                    .with_day(10)
                    .unwrap();
                TxRecord {
                    account: account.clone(),
                    booking_at: NaiveDateTime::new(month, chrono::NaiveTime::MIN),
                    amount_minor: -79_000,
                    description: Some("Ежемесячный платёж".to_string()),
                    counterparty: Some(merchant.to_string()),
                }
            })
            .collect()
    }

    #[async_trait]
    impl BankAccountsApi for MockAccountsApi {
        async fn list_accounts(
            &self,
            bank: &BankCode,
            _client_id: &ClientId,
            _consent_id: &ConsentId,
        ) -> Result<Vec<AccountRef>> {
            self.listed.lock().unwrap().push(bank.clone());
            if self.failing_banks.contains(bank.as_str()) {
                return Err(ExternalServiceError::new("accounts", "boom").with_status(500).into());
            }
            Ok(vec![AccountRef::new(bank.clone(), format!("{}-acc", bank))])
        }

        async fn list_transactions(
            &self,
            account: &AccountRef,
            from_iso: &str,
            to_iso: &str,
            _consent_id: &ConsentId,
        ) -> Result<Vec<TxRecord>> {
            assert!(from_iso < to_iso);
            Ok(self
                .merchant_by_bank
                .get(account.bank.as_str())
                .map(|merchant| monthly_bookings(account, merchant))
                .unwrap_or_default())
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Fixture
    // ─────────────────────────────────────────────────────────────────────────

    struct Fixture {
        orchestrator: OnboardingOrchestrator<ProgressPublisher>,
        publisher: Arc<ProgressPublisher>,
        jobs: Arc<MockJobs>,
        obligations: Arc<MockObligations>,
        consents_api: Arc<MockConsentsApi>,
        accounts_api: Arc<MockAccountsApi>,
    }

    struct FixtureOptions {
        email: Option<String>,
        statuses: Vec<(&'static str, &'static str)>,
        merchants: Vec<(&'static str, &'static str)>,
        failing_banks: Vec<&'static str>,
        fail_upsert: bool,
        panic_on_upsert: bool,
    }

    impl Default for FixtureOptions {
        fn default() -> Self {
            Self {
                email: Some("Team200-1@example.com".to_string()),
                statuses: vec![("vbank", "approved"), ("abank", "approved"), ("sbank", "approved")],
                merchants: vec![("vbank", "Ростелеком")],
                failing_banks: Vec::new(),
                fail_upsert: false,
                panic_on_upsert: false,
            }
        }
    }

    fn fixture(options: FixtureOptions) -> Fixture {
        let banks = BanksConfig::new(
            "team200",
            "secret",
            ["vbank", "abank", "sbank"]
                .into_iter()
                .map(|code| (code.to_string(), format!("https://{}.example", code))),
        );
        let jobs = Arc::new(MockJobs::default());
        let obligations = Arc::new(MockObligations {
            stored: Mutex::new(Vec::new()),
            fail: options.fail_upsert,
            panic: options.panic_on_upsert,
        });
        let consents_api = Arc::new(MockConsentsApi {
            statuses: options.statuses.into_iter().collect(),
            requests: Mutex::new(Vec::new()),
        });
        let accounts_api = Arc::new(MockAccountsApi {
            merchant_by_bank: options.merchants.into_iter().collect(),
            failing_banks: options.failing_banks.into_iter().collect(),
            listed: Mutex::new(Vec::new()),
        });
        let publisher = Arc::new(ProgressPublisher::new(32));

        let services = OnboardingServices {
            jobs: jobs.clone(),
            obligations: obligations.clone(),
            consents: Arc::new(MockConsentRepo::default()),
            users: Arc::new(MockUsers {
                email: options.email,
            }),
            consents_api: consents_api.clone(),
            accounts_api: accounts_api.clone(),
        };
        let orchestrator = OnboardingOrchestrator::new(
            services,
            publisher.clone(),
            banks,
            OnboardingConfig::default(),
        );

        Fixture {
            orchestrator,
            publisher,
            jobs,
            obligations,
            consents_api,
            accounts_api,
        }
    }

    fn banks(codes: &[&str]) -> Vec<BankCode> {
        codes.iter().map(|c| BankCode::new(c)).collect()
    }

    /// Starts a job and collects its events until the stream closes.
    async fn run_to_end(fx: &Fixture, codes: &[&str]) -> (OnboardingJob, Vec<OnboardingEvent>) {
        let job = fx
            .orchestrator
            .start(UserId(7), banks(codes))
            .await
            .unwrap();
        let mut sub = fx.publisher.subscribe(&job.job_id).expect("stream is live");
        let mut events = std::mem::take(&mut sub.replay);
        while let Ok(event) = sub.receiver.recv().await {
            events.push(event);
        }
        let finished = fx.orchestrator.status(&job.job_id).await.unwrap();
        (finished, events)
    }

    fn progress_values(events: &[OnboardingEvent]) -> Vec<u8> {
        events
            .iter()
            .filter_map(|e| match e {
                OnboardingEvent::Progress(p) => Some(p.progress),
                _ => None,
            })
            .collect()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Tests
    // ─────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_happy_path_detects_and_stores_obligations() {
        let fx = fixture(FixtureOptions::default());
        let (job, events) = run_to_end(&fx, &["vbank"]).await;

        assert_eq!(job.phase, OnboardingPhase::Done);
        assert_eq!(job.progress, 100);
        assert_eq!(job.obligations_detected, Some(1));
        assert_eq!(job.error, None);
        assert_eq!(
            job.per_bank_consent.get(&BankCode::new("vbank")),
            Some(&ConsentState::Approved)
        );
        assert!(job.job_id.starts_with("onb_"));

        assert_eq!(progress_values(&events), vec![5, 25, 30, 60, 100]);
        match events.last() {
            Some(OnboardingEvent::Done(done)) => {
                assert_eq!(done.obligations_detected, 1);
                assert_eq!(done.payments.len(), 1);
                assert_eq!(done.payments[0].category, "Связь");
                assert_eq!(done.payments[0].day, 10);
            }
            other => panic!("expected done event, got {:?}", other),
        }

        let stored = fx.obligations.list_active(UserId(7)).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].merchant_key, "ростелеком");

        let requests = fx.consents_api.requests.lock().unwrap();
        assert_eq!(requests[0].1.as_str(), "team200-1");
        assert!(!fx.publisher.is_live(&job.job_id));
    }

    #[tokio::test]
    async fn test_one_failing_bank_does_not_abort_the_others() {
        let fx = fixture(FixtureOptions {
            merchants: vec![("vbank", "Ростелеком"), ("sbank", "Аренда ЖК")],
            failing_banks: vec!["abank"],
            ..FixtureOptions::default()
        });
        let (job, _) = run_to_end(&fx, &["vbank", "abank", "sbank"]).await;

        assert_eq!(job.phase, OnboardingPhase::Done);
        assert_eq!(job.obligations_detected, Some(2));
        let listed = fx.accounts_api.listed.lock().unwrap();
        assert_eq!(listed.len(), 3);
    }

    #[tokio::test]
    async fn test_pending_and_failed_consents_still_finish() {
        let fx = fixture(FixtureOptions {
            statuses: vec![("vbank", "approved"), ("abank", "AwaitingAuthorisation")],
            ..FixtureOptions::default()
        });
        let (job, events) = run_to_end(&fx, &["vbank", "abank", "sbank"]).await;

        assert_eq!(job.phase, OnboardingPhase::Done);
        assert_eq!(
            job.per_bank_consent.get(&BankCode::new("abank")),
            Some(&ConsentState::Pending)
        );
        // sbank's consent request failed outright.
        assert_eq!(
            job.per_bank_consent.get(&BankCode::new("sbank")),
            Some(&ConsentState::Pending)
        );
        let listed = fx.accounts_api.listed.lock().unwrap();
        assert_eq!(*listed, banks(&["vbank"]));
        assert!(matches!(events.last(), Some(OnboardingEvent::Done(_))));
    }

    #[tokio::test]
    async fn test_progress_never_decreases_and_ends_at_100() {
        let fx = fixture(FixtureOptions::default());
        let (_, events) = run_to_end(&fx, &["vbank", "abank"]).await;

        let values = progress_values(&events);
        assert!(values.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(values.last(), Some(&100));
        assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
    }

    #[tokio::test]
    async fn test_storage_failure_marks_job_failed() {
        let fx = fixture(FixtureOptions {
            fail_upsert: true,
            ..FixtureOptions::default()
        });
        let (job, events) = run_to_end(&fx, &["vbank"]).await;

        assert_eq!(job.phase, OnboardingPhase::Failed);
        assert_eq!(job.progress, 100);
        assert!(job.error.as_deref().unwrap().contains("disk full"));
        assert_eq!(progress_values(&events).last(), Some(&100));
        match events.last() {
            Some(OnboardingEvent::Failed(failed)) => assert!(failed.error.contains("disk full")),
            other => panic!("expected failed event, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_panicking_run_still_closes_the_stream() {
        let fx = fixture(FixtureOptions {
            panic_on_upsert: true,
            ..FixtureOptions::default()
        });
        let (job, events) = run_to_end(&fx, &["vbank"]).await;

        assert_eq!(job.phase, OnboardingPhase::TransactionsCollecting);
        assert!(events.iter().all(|e| !e.is_terminal()));
        assert!(!fx.publisher.is_live(&job.job_id));
    }

    #[tokio::test]
    async fn test_duplicate_banks_are_collapsed() {
        let fx = fixture(FixtureOptions::default());
        let (job, _) = run_to_end(&fx, &["vbank", "VBANK", "vbank"]).await;

        assert_eq!(job.per_bank_consent.len(), 1);
        // The collector reuses the consent cached by the consent step.
        assert_eq!(fx.consents_api.requests.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_start_rejects_invalid_requests() {
        let fx = fixture(FixtureOptions::default());

        let err = fx.orchestrator.start(UserId(7), Vec::new()).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        let err = fx
            .orchestrator
            .start(UserId(7), banks(&["vbank", "zbank"]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));

        let unknown_user = fixture(FixtureOptions {
            email: None,
            ..FixtureOptions::default()
        });
        let err = unknown_user
            .orchestrator
            .start(UserId(7), banks(&["vbank"]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        assert!(fx.jobs.jobs.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_status_of_unknown_job_is_not_found() {
        let fx = fixture(FixtureOptions::default());
        let err = fx.orchestrator.status("onb_missing").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_initial_snapshot_is_returned_before_the_run() {
        let fx = fixture(FixtureOptions::default());
        let job = fx
            .orchestrator
            .start(UserId(7), banks(&["vbank"]))
            .await
            .unwrap();
        assert_eq!(job.phase, OnboardingPhase::ConsentsInProgress);
        assert_eq!(job.progress, 5);
        assert!(Utc::now() - job.created_at < Duration::seconds(5));
    }

    #[tokio::test]
    async fn test_runs_without_a_progress_stream() {
        let jobs = Arc::new(MockJobs::default());
        let services = OnboardingServices {
            jobs: jobs.clone(),
            obligations: Arc::new(MockObligations::default()),
            consents: Arc::new(MockConsentRepo::default()),
            users: Arc::new(MockUsers {
                email: Some("team200-1@example.com".to_string()),
            }),
            consents_api: Arc::new(MockConsentsApi {
                statuses: HashMap::from([("vbank", "approved")]),
                requests: Mutex::new(Vec::new()),
            }),
            accounts_api: Arc::new(MockAccountsApi {
                merchant_by_bank: HashMap::from([("vbank", "Ростелеком")]),
                failing_banks: HashSet::new(),
                listed: Mutex::new(Vec::new()),
            }),
        };
        let orchestrator = OnboardingOrchestrator::new(
            services,
            Arc::new(NoOpProgressReporter),
            BanksConfig::new(
                "team200",
                "secret",
                vec![("vbank".to_string(), "https://vbank.example".to_string())],
            ),
            OnboardingConfig::default(),
        );

        let job = orchestrator.start(UserId(7), banks(&["vbank"])).await.unwrap();
        let mut finished = orchestrator.status(&job.job_id).await.unwrap();
        for _ in 0..100 {
            if finished.phase.is_terminal() {
                break;
            }
            tokio::task::yield_now().await;
            finished = orchestrator.status(&job.job_id).await.unwrap();
        }
        assert_eq!(finished.phase, OnboardingPhase::Done);
        assert_eq!(finished.obligations_detected, Some(1));
    }
}
