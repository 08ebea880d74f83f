//! Per-bank consent acquisition.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::join_all;
use log::{debug, info, warn};

use crate::bank::ConsentsApi;
use elly_core::banking::{BankCode, ClientId, UserId};
use elly_core::consents::{AccountsConsent, ConsentRepositoryTrait, ConsentState};
use elly_core::errors::Result;

/// Obtains accounts consents, reusing approved ones from the repository.
pub struct ConsentOrchestrator {
    consents_api: Arc<dyn ConsentsApi>,
    repository: Arc<dyn ConsentRepositoryTrait>,
}

impl ConsentOrchestrator {
    pub fn new(
        consents_api: Arc<dyn ConsentsApi>,
        repository: Arc<dyn ConsentRepositoryTrait>,
    ) -> Self {
        Self {
            consents_api,
            repository,
        }
    }

    /// Returns the cached consent when approved, otherwise requests and stores a new one.
    pub async fn ensure_consent_cached(
        &self,
        user_id: UserId,
        bank: &BankCode,
        client_id: &ClientId,
    ) -> Result<AccountsConsent> {
        if let Some(cached) = self.repository.find(user_id, bank).await? {
            if cached.is_approved() {
                debug!("Consent[cache-hit]: user={} bank={}", user_id, bank);
                return Ok(cached);
            }
        }

        let fresh = self
            .consents_api
            .ensure_accounts_consent(bank, client_id, user_id)
            .await?;
        info!(
            "Consent[requested]: user={} bank={} status={}",
            user_id, bank, fresh.status
        );
        self.repository.upsert(fresh).await
    }

    /// Runs consent acquisition for every bank concurrently.
    ///
    /// Every bank gets an entry; a bank whose consent could not be obtained is `Pending`.
    pub async fn request_consents(
        &self,
        user_id: UserId,
        client_id: &ClientId,
        banks: &[BankCode],
    ) -> BTreeMap<BankCode, ConsentState> {
        let branches = banks.iter().map(|bank| async move {
            let state = match self.ensure_consent_cached(user_id, bank, client_id).await {
                Ok(consent) => ConsentState::from_consent(&consent),
                Err(e) => {
                    warn!("Consent[failed]: user={} bank={} error={}", user_id, bank, e);
                    ConsentState::Pending
                }
            };
            (bank.clone(), state)
        });

        let states: BTreeMap<BankCode, ConsentState> =
            join_all(branches).await.into_iter().collect();
        info!("Consents collected: user={} states={:?}", user_id, states);
        states
    }
}
