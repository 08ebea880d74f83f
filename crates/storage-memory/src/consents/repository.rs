use async_trait::async_trait;
use dashmap::DashMap;

use elly_core::banking::{BankCode, UserId};
use elly_core::consents::{AccountsConsent, ConsentRepositoryTrait};
use elly_core::errors::Result;

/// Consent cache keyed by `(user, bank)`.
#[derive(Default)]
pub struct ConsentRepository {
    consents: DashMap<(UserId, BankCode), AccountsConsent>,
}

impl ConsentRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConsentRepositoryTrait for ConsentRepository {
    async fn find(&self, user_id: UserId, bank: &BankCode) -> Result<Option<AccountsConsent>> {
        Ok(self
            .consents
            .get(&(user_id, bank.clone()))
            .map(|consent| consent.clone()))
    }

    async fn upsert(&self, consent: AccountsConsent) -> Result<AccountsConsent> {
        self.consents
            .insert((consent.user_id, consent.bank.clone()), consent.clone());
        Ok(consent)
    }

    async fn delete(&self, user_id: UserId, bank: &BankCode) -> Result<()> {
        self.consents.remove(&(user_id, bank.clone()));
        Ok(())
    }
}
