//! Traits defining the contract with remote bank APIs.

use async_trait::async_trait;

use elly_core::banking::{AccountRef, BankCode, ClientId, ConsentId, PaymentId, TxRecord, UserId};
use elly_core::consents::AccountsConsent;
use elly_core::errors::{DomainError, Result};

/// A bank access token as issued by the bank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedToken {
    pub token: String,
    /// Advertised lifetime. `None` when the bank did not say.
    pub ttl_secs: Option<u64>,
}

/// Trait for obtaining fresh bank access tokens
#[async_trait]
pub trait BankTokenFetcher: Send + Sync {
    async fn fetch_bank_token(&self, bank: &BankCode) -> Result<FetchedToken>;
}

/// Trait for reading accounts and transactions from a bank
#[async_trait]
pub trait BankAccountsApi: Send + Sync {
    /// List the accounts the consent gives access to
    async fn list_accounts(
        &self,
        bank: &BankCode,
        client_id: &ClientId,
        consent_id: &ConsentId,
    ) -> Result<Vec<AccountRef>>;

    /// List one account's transactions booked between `from_iso` and `to_iso`
    async fn list_transactions(
        &self,
        account: &AccountRef,
        from_iso: &str,
        to_iso: &str,
        consent_id: &ConsentId,
    ) -> Result<Vec<TxRecord>>;

    /// Find or open the user's reserve account at `bank`
    async fn ensure_reserve_account(
        &self,
        _user_id: UserId,
        bank: &BankCode,
        _client_id: &ClientId,
        _consent_id: &ConsentId,
    ) -> Result<AccountRef> {
        Err(DomainError::NotImplemented(format!("reserve account at {}", bank)).into())
    }

    /// Transfer `amount_minor` from `debtor` to `creditor`
    async fn transfer(
        &self,
        debtor: &AccountRef,
        _creditor: &AccountRef,
        _amount_minor: i64,
        _comment: Option<&str>,
        _client_id: &ClientId,
        _payment_consent_id: Option<&ConsentId>,
    ) -> Result<PaymentId> {
        Err(DomainError::NotImplemented(format!("transfer from {}", debtor.bank)).into())
    }
}

/// Trait for acquiring consents from a bank
#[async_trait]
pub trait ConsentsApi: Send + Sync {
    /// Request a consent to read accounts, balances and transactions
    async fn ensure_accounts_consent(
        &self,
        bank: &BankCode,
        client_id: &ClientId,
        user_id: UserId,
    ) -> Result<AccountsConsent>;
}
