//! Bank endpoints and onboarding tuning.

use std::collections::HashMap;

use elly_core::banking::BankCode;
use elly_core::errors::{Error, Result};
use elly_core::obligations::{DEFAULT_CURRENCY, DEFAULT_SOURCE};

/// Team credentials and the base URL of every bank the team may talk to.
#[derive(Debug, Clone, Default)]
pub struct BanksConfig {
    /// Team identifier, also sent as `X-Requesting-Bank`.
    pub team_client_id: String,
    pub team_client_secret: String,
    /// Lower-cased bank code -> base URL.
    pub banks: HashMap<String, String>,
}

impl BanksConfig {
    pub fn new(
        team_client_id: impl Into<String>,
        team_client_secret: impl Into<String>,
        banks: impl IntoIterator<Item = (String, String)>,
    ) -> Self {
        Self {
            team_client_id: team_client_id.into(),
            team_client_secret: team_client_secret.into(),
            banks: banks
                .into_iter()
                .map(|(code, url)| {
                    (
                        code.trim().to_lowercase(),
                        url.trim().trim_end_matches('/').to_string(),
                    )
                })
                .collect(),
        }
    }

    /// Base URL of `bank`, or a configuration error for unknown banks.
    pub fn base_url(&self, bank: &BankCode) -> Result<&str> {
        self.banks
            .get(bank.as_str())
            .map(String::as_str)
            .ok_or_else(|| Error::Configuration(format!("Unknown bank: {}", bank)))
    }

    pub fn contains(&self, bank: &BankCode) -> bool {
        self.banks.contains_key(bank.as_str())
    }

    /// Configured bank codes, sorted.
    pub fn bank_codes(&self) -> Vec<BankCode> {
        let mut codes: Vec<BankCode> = self.banks.keys().map(BankCode::new).collect();
        codes.sort();
        codes
    }
}

/// Configuration for onboarding runs.
#[derive(Debug, Clone)]
pub struct OnboardingConfig {
    /// How far back transactions are collected.
    pub lookback_days: i64,
    /// Source tag stamped on detected obligations.
    pub source: String,
    pub currency: String,
    /// Append synthetic recurring series before detection (sandbox demos).
    pub inject_demo_transactions: bool,
    /// Events kept per job for subscribers that attach late.
    pub replay_capacity: usize,
}

impl Default for OnboardingConfig {
    fn default() -> Self {
        Self {
            lookback_days: 90,
            source: DEFAULT_SOURCE.to_string(),
            currency: DEFAULT_CURRENCY.to_string(),
            inject_demo_transactions: false,
            replay_capacity: 32,
        }
    }
}
