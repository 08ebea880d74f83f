use std::{net::SocketAddr, time::Duration};

use elly_connect::{BanksConfig, OnboardingConfig};
use elly_core::banking::{BankCode, UserId};

const DEFAULT_BANKS: &str = "vbank=https://vbank.open.bankingapi.ru,\
abank=https://abank.open.bankingapi.ru,\
sbank=https://sbank.open.bankingapi.ru";

pub struct Config {
    pub listen_addr: SocketAddr,
    pub cors_allow: Vec<String>,
    /// Timeout of every outbound bank request.
    pub request_timeout: Duration,
    pub banks: BanksConfig,
    /// Banks used when a start request names none.
    pub default_banks: Vec<BankCode>,
    pub onboarding: OnboardingConfig,
    pub heartbeat: Duration,
    pub seed_users: Vec<(UserId, String)>,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let listen_addr: SocketAddr = var("ELLY_LISTEN_ADDR", "0.0.0.0:8080")
            .parse()
            .expect("Invalid ELLY_LISTEN_ADDR");
        let cors_allow = split_list(&var("ELLY_CORS_ALLOW_ORIGINS", "*"))
            .map(str::to_string)
            .collect();
        let timeout_ms: u64 = var("ELLY_REQUEST_TIMEOUT_MS", "30000")
            .parse()
            .unwrap_or(30000);
        let heartbeat_secs: u64 = var("ELLY_HEARTBEAT_SECS", "15").parse().unwrap_or(15);

        let banks = BanksConfig::new(
            var("ELLY_TEAM_CLIENT_ID", ""),
            var("ELLY_TEAM_CLIENT_SECRET", ""),
            parse_pairs(&var("ELLY_BANKS", DEFAULT_BANKS)),
        );
        let default_banks = split_list(&var("ELLY_DEFAULT_BANKS", "vbank,abank"))
            .map(BankCode::new)
            .collect();

        let defaults = OnboardingConfig::default();
        let onboarding = OnboardingConfig {
            lookback_days: var("ELLY_LOOKBACK_DAYS", "90")
                .parse()
                .unwrap_or(defaults.lookback_days),
            currency: var("ELLY_CURRENCY", &defaults.currency),
            inject_demo_transactions: var("ELLY_DEMO_TRANSACTIONS", "false")
                .eq_ignore_ascii_case("true"),
            ..defaults
        };

        let seed_users = parse_pairs(&var("ELLY_SEED_USERS", ""))
            .into_iter()
            .filter_map(|(id, email)| match id.parse::<i64>() {
                Ok(id) => Some((UserId(id), email)),
                Err(_) => {
                    tracing::warn!("Ignoring seed user with invalid id '{}'", id);
                    None
                }
            })
            .collect();

        Self {
            listen_addr,
            cors_allow,
            request_timeout: Duration::from_millis(timeout_ms),
            banks,
            default_banks,
            onboarding,
            heartbeat: Duration::from_secs(heartbeat_secs.max(1)),
            seed_users,
        }
    }
}

fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty())
}

/// Parses `key=value,key=value`. Entries without `=` are ignored.
fn parse_pairs(raw: &str) -> Vec<(String, String)> {
    split_list(raw)
        .filter_map(|entry| entry.split_once('='))
        .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        .filter(|(key, value)| !key.is_empty() && !value.is_empty())
        .collect()
}
