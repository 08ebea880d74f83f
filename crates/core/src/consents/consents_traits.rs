//! Consent repository trait.

use async_trait::async_trait;

use super::consents_model::AccountsConsent;
use crate::banking::{BankCode, UserId};
use crate::errors::Result;

/// Persisted cache of the consents each bank has granted to a user.
#[async_trait]
pub trait ConsentRepositoryTrait: Send + Sync {
    /// Returns the stored consent for `(user, bank)`, if any.
    async fn find(&self, user_id: UserId, bank: &BankCode) -> Result<Option<AccountsConsent>>;

    /// Inserts or replaces the consent for `(consent.user_id, consent.bank)`.
    async fn upsert(&self, consent: AccountsConsent) -> Result<AccountsConsent>;

    /// Removes a stored consent (revocation / rotation).
    async fn delete(&self, user_id: UserId, bank: &BankCode) -> Result<()>;
}
