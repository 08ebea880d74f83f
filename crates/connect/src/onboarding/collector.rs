//! Account and transaction collection.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use futures::future::join_all;
use log::{info, warn};

use super::consents::ConsentOrchestrator;
use crate::bank::BankAccountsApi;
use elly_core::banking::{BankCode, ClientId, TxRecord, UserId};
use elly_core::consents::ConsentState;
use elly_core::errors::Result;

const ISO_SECONDS_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Booking-time window sent to the transactions endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookbackWindow {
    pub from_iso: String,
    pub to_iso: String,
}

/// `[now - days, now]` as second-precision UTC timestamps.
pub fn lookback_window(now: DateTime<Utc>, days: i64) -> LookbackWindow {
    let from = now
        .checked_sub_signed(Duration::days(days.max(0)))
        .unwrap_or(DateTime::<Utc>::MIN_UTC);
    LookbackWindow {
        from_iso: from.format(ISO_SECONDS_FORMAT).to_string(),
        to_iso: now.format(ISO_SECONDS_FORMAT).to_string(),
    }
}

/// Collects transactions from banks the user has approved.
pub struct TransactionCollector {
    accounts_api: Arc<dyn BankAccountsApi>,
    consents: Arc<ConsentOrchestrator>,
}

impl TransactionCollector {
    pub fn new(accounts_api: Arc<dyn BankAccountsApi>, consents: Arc<ConsentOrchestrator>) -> Self {
        Self {
            accounts_api,
            consents,
        }
    }

    /// One bank's transactions. Accounts are read one after another.
    pub async fn collect_bank_transactions(
        &self,
        user_id: UserId,
        client_id: &ClientId,
        bank: &BankCode,
        window: &LookbackWindow,
    ) -> Result<Vec<TxRecord>> {
        let consent = self
            .consents
            .ensure_consent_cached(user_id, bank, client_id)
            .await?;
        if !consent.is_approved() {
            info!("Skip bank={} (consent status {})", bank, consent.status);
            return Ok(Vec::new());
        }

        let accounts = self
            .accounts_api
            .list_accounts(bank, client_id, &consent.consent_id)
            .await?;

        let mut all = Vec::new();
        for account in &accounts {
            let transactions = self
                .accounts_api
                .list_transactions(account, &window.from_iso, &window.to_iso, &consent.consent_id)
                .await?;
            all.extend(transactions);
        }
        info!("Bank={} accounts={} tx={}", bank, accounts.len(), all.len());
        Ok(all)
    }

    /// Collects from every approved bank concurrently.
    ///
    /// A failing bank contributes nothing; the other banks are unaffected.
    pub async fn collect_all(
        &self,
        user_id: UserId,
        client_id: &ClientId,
        per_bank: &BTreeMap<BankCode, ConsentState>,
        window: &LookbackWindow,
    ) -> Vec<TxRecord> {
        let branches = per_bank.iter().map(|(bank, state)| async move {
            if !state.is_approved() {
                info!("Skip bank={} (consent not approved)", bank);
                return (bank, Vec::new());
            }
            match self
                .collect_bank_transactions(user_id, client_id, bank, window)
                .await
            {
                Ok(transactions) => (bank, transactions),
                Err(e) => {
                    warn!("Transactions[failed]: bank={} error={}", bank, e);
                    (bank, Vec::new())
                }
            }
        });

        let per_bank_tx = join_all(branches).await;
        let counts: BTreeMap<&str, usize> = per_bank_tx
            .iter()
            .map(|(bank, txs)| (bank.as_str(), txs.len()))
            .collect();
        let all: Vec<TxRecord> = per_bank_tx.into_iter().flat_map(|(_, txs)| txs).collect();
        info!("Transactions collected: total={} perBank={:?}", all.len(), counts);
        all
    }
}
