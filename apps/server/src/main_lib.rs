use std::sync::Arc;
use std::time::Duration;

use elly_connect::{
    BankAccountsApi, ConsentsApi, OnboardingOrchestrator, OnboardingServices, OpenBankApiClient,
    ProgressPublisher,
};
use elly_core::banking::BankCode;
use elly_core::obligations::ObligationRepositoryTrait;
use elly_storage_memory::{
    ConsentRepository, ObligationRepository, OnboardingJobRepository, UserRepository,
};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::Config;

pub struct AppState {
    pub onboarding: OnboardingOrchestrator<ProgressPublisher>,
    pub progress: Arc<ProgressPublisher>,
    pub obligations: Arc<dyn ObligationRepositoryTrait>,
    pub default_banks: Vec<BankCode>,
    pub heartbeat: Duration,
}

pub fn init_tracing() {
    let log_format = std::env::var("ELLY_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if log_format.eq_ignore_ascii_case("json") {
        registry
            .with(fmt::layer().json().with_current_span(false))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_line_number(true))
            .init();
    }
}

/// Wires the open-banking client and in-memory storage into the application state.
pub fn build_state(config: &Config) -> anyhow::Result<Arc<AppState>> {
    let client = Arc::new(OpenBankApiClient::new(
        config.banks.clone(),
        config.request_timeout,
    )?);
    tracing::info!(
        "Open-banking client ready for banks {:?}",
        config.banks.bank_codes()
    );
    Ok(build_state_with_apis(config, client.clone(), client))
}

/// Application state over the given bank APIs.
pub fn build_state_with_apis(
    config: &Config,
    accounts_api: Arc<dyn BankAccountsApi>,
    consents_api: Arc<dyn ConsentsApi>,
) -> Arc<AppState> {
    let users = UserRepository::with_users(config.seed_users.clone());
    tracing::info!("Seeded {} users", users.len());

    let obligations: Arc<dyn ObligationRepositoryTrait> = Arc::new(ObligationRepository::new());
    let services = OnboardingServices {
        jobs: Arc::new(OnboardingJobRepository::new()),
        obligations: obligations.clone(),
        consents: Arc::new(ConsentRepository::new()),
        users: Arc::new(users),
        consents_api,
        accounts_api,
    };
    let progress = Arc::new(ProgressPublisher::new(config.onboarding.replay_capacity));
    let onboarding = OnboardingOrchestrator::new(
        services,
        progress.clone(),
        config.banks.clone(),
        config.onboarding.clone(),
    );

    Arc::new(AppState {
        onboarding,
        progress,
        obligations,
        default_banks: config.default_banks.clone(),
        heartbeat: config.heartbeat,
    })
}
