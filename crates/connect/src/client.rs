//! HTTP client for the open-banking sandbox APIs.
//!
//! Every bank exposes the same API under its own base URL. Requests are
//! made with the team's credentials; bank access tokens come from a shared
//! [`BankTokenCache`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use log::{debug, info, warn};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::bank::{BankAccountsApi, BankTokenCache, BankTokenFetcher, ConsentsApi, FetchedToken};
use crate::config::BanksConfig;
use crate::mapping::{parse_accounts, parse_consent, parse_transactions};
use elly_core::banking::{AccountRef, BankCode, ClientId, ConsentId, TxRecord, UserId};
use elly_core::consents::AccountsConsent;
use elly_core::errors::{Error, ExternalServiceError, Result};

/// Default timeout for API requests.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Page size requested from the transactions endpoint.
const TRANSACTIONS_PAGE_LIMIT: u32 = 100;

/// Permissions requested for an accounts consent.
const ACCOUNTS_CONSENT_PERMISSIONS: &[&str] =
    &["ReadAccountsDetail", "ReadBalances", "ReadTransactionsDetail"];

const CONSENT_REASON: &str = "Elly onboarding aggregation";
const REQUESTING_BANK_NAME: &str = "Elly App";

/// Number of body characters kept in error messages.
const ERROR_BODY_SNIPPET_CHARS: usize = 200;

// ─────────────────────────────────────────────────────────────────────────────
// API Request/Response Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ApiBankTokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Debug, Serialize)]
struct ApiConsentRequest<'a> {
    client_id: &'a str,
    permissions: &'a [&'a str],
    reason: &'a str,
    requesting_bank: &'a str,
    requesting_bank_name: &'a str,
}

// ─────────────────────────────────────────────────────────────────────────────
// Shared HTTP plumbing
// ─────────────────────────────────────────────────────────────────────────────

fn build_http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| Error::Unexpected(format!("Failed to initialize HTTP client: {}", e)))
}

/// Reads a response body, turning non-2xx statuses into `ExternalServiceError`.
async fn read_body<T: DeserializeOwned>(service: &str, response: reqwest::Response) -> Result<T> {
    let status = response.status();
    let body = response.text().await.map_err(|e| {
        ExternalServiceError::new(service, format!("Failed to read response: {}", e))
    })?;

    if !status.is_success() {
        let snippet: String = body.chars().take(ERROR_BODY_SNIPPET_CHARS).collect();
        warn!("{}[http-error]: status={} bodySnippet={}", service, status, snippet);
        return Err(ExternalServiceError::new(service, snippet)
            .with_status(status.as_u16())
            .into());
    }

    serde_json::from_str(&body).map_err(|e| {
        ExternalServiceError::new(service, format!("Failed to parse response: {}", e)).into()
    })
}

fn transport_error(service: &str, err: reqwest::Error) -> Error {
    let mut external = ExternalServiceError::new(service, format!("Request failed: {}", err));
    if let Some(status) = err.status() {
        external = external.with_status(status.as_u16());
    }
    external.into()
}

// ─────────────────────────────────────────────────────────────────────────────
// Token fetcher
// ─────────────────────────────────────────────────────────────────────────────

/// Obtains bank access tokens with the team credentials.
#[derive(Debug, Clone)]
pub struct OpenBankTokenFetcher {
    http: reqwest::Client,
    banks: Arc<BanksConfig>,
}

impl OpenBankTokenFetcher {
    pub fn new(http: reqwest::Client, banks: Arc<BanksConfig>) -> Self {
        Self { http, banks }
    }
}

#[async_trait]
impl BankTokenFetcher for OpenBankTokenFetcher {
    async fn fetch_bank_token(&self, bank: &BankCode) -> Result<FetchedToken> {
        let base = self.banks.base_url(bank)?;
        let url = format!(
            "{}/auth/bank-token?client_id={}&client_secret={}",
            base,
            urlencoding::encode(&self.banks.team_client_id),
            urlencoding::encode(&self.banks.team_client_secret)
        );
        info!("BankToken[fetch]: bank={} url={}/auth/bank-token", bank, base);

        let response = self
            .http
            .post(&url)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| transport_error("bank-token", e))?;

        let token: ApiBankTokenResponse = read_body("bank-token", response).await?;
        Ok(FetchedToken {
            token: token.access_token,
            ttl_secs: token.expires_in,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Open-banking API client
// ─────────────────────────────────────────────────────────────────────────────

/// HTTP client for the accounts, transactions and consents endpoints.
///
/// # Example
///
/// ```ignore
/// let client = OpenBankApiClient::new(banks_config, DEFAULT_TIMEOUT)?;
/// let consent = client.ensure_accounts_consent(&bank, &client_id, user_id).await?;
/// let accounts = client.list_accounts(&bank, &client_id, &consent.consent_id).await?;
/// ```
#[derive(Clone)]
pub struct OpenBankApiClient {
    http: reqwest::Client,
    banks: Arc<BanksConfig>,
    tokens: Arc<BankTokenCache>,
}

impl OpenBankApiClient {
    /// Create a client with its own token cache backed by [`OpenBankTokenFetcher`].
    pub fn new(banks: BanksConfig, timeout: Duration) -> Result<Self> {
        let http = build_http_client(timeout)?;
        let banks = Arc::new(banks);
        let fetcher = Arc::new(OpenBankTokenFetcher::new(http.clone(), banks.clone()));
        Ok(Self {
            http,
            banks,
            tokens: Arc::new(BankTokenCache::new(fetcher)),
        })
    }

    /// Create a client sharing an existing token cache.
    pub fn with_token_cache(
        banks: Arc<BanksConfig>,
        tokens: Arc<BankTokenCache>,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            http: build_http_client(timeout)?,
            banks,
            tokens,
        })
    }

    pub fn token_cache(&self) -> Arc<BankTokenCache> {
        self.tokens.clone()
    }

    /// Headers for an authorized request made on behalf of the team.
    async fn headers(&self, bank: &BankCode, consent_id: Option<&ConsentId>) -> Result<HeaderMap> {
        let token = self.tokens.get_token(bank).await?;
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| Error::Unexpected(format!("Invalid bank token format: {}", e)))?,
        );
        headers.insert(
            "x-requesting-bank",
            HeaderValue::from_str(&self.banks.team_client_id)
                .map_err(|e| Error::Configuration(format!("Invalid team client id: {}", e)))?,
        );
        if let Some(consent_id) = consent_id {
            headers.insert(
                "x-consent-id",
                HeaderValue::from_str(consent_id.as_str())
                    .map_err(|e| Error::Unexpected(format!("Invalid consent id: {}", e)))?,
            );
        }
        Ok(headers)
    }

    /// Make a GET request and return the JSON body.
    async fn get_json(
        &self,
        service: &str,
        bank: &BankCode,
        url: &str,
        consent_id: &ConsentId,
    ) -> Result<Value> {
        debug!("[OpenBankApi] GET {}", url);
        let response = self
            .http
            .get(url)
            .headers(self.headers(bank, Some(consent_id)).await?)
            .send()
            .await
            .map_err(|e| transport_error(service, e))?;
        read_body(service, response).await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// BankAccountsApi Trait Implementation
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl BankAccountsApi for OpenBankApiClient {
    async fn list_accounts(
        &self,
        bank: &BankCode,
        client_id: &ClientId,
        consent_id: &ConsentId,
    ) -> Result<Vec<AccountRef>> {
        let base = self.banks.base_url(bank)?;
        let url = format!(
            "{}/accounts?client_id={}",
            base,
            urlencoding::encode(client_id.as_str())
        );
        let started = Instant::now();
        info!(
            "Accounts[list→]: bank={} clientId={} (X-Consent-Id={})",
            bank, client_id, consent_id
        );

        let raw = self.get_json("accounts", bank, &url, consent_id).await?;
        let accounts = parse_accounts(&raw, bank);

        let ms = started.elapsed().as_millis();
        if accounts.is_empty() {
            warn!("Accounts[list←0]: bank={} clientId={} ({} ms, empty)", bank, client_id, ms);
        } else {
            let sample: Vec<&str> = accounts
                .iter()
                .take(3)
                .map(|a| a.account_id.as_str())
                .collect();
            info!(
                "Accounts[list←{}]: bank={} clientId={} ({} ms, sample={})",
                accounts.len(),
                bank,
                client_id,
                ms,
                sample.join(", ")
            );
        }
        Ok(accounts)
    }

    async fn list_transactions(
        &self,
        account: &AccountRef,
        from_iso: &str,
        to_iso: &str,
        consent_id: &ConsentId,
    ) -> Result<Vec<TxRecord>> {
        let bank = &account.bank;
        let base = self.banks.base_url(bank)?;
        let url = format!(
            "{}/accounts/{}/transactions?from_booking_date_time={}&to_booking_date_time={}&limit={}",
            base,
            urlencoding::encode(account.account_id.as_str()),
            urlencoding::encode(from_iso),
            urlencoding::encode(to_iso),
            TRANSACTIONS_PAGE_LIMIT
        );
        let started = Instant::now();
        info!(
            "Tx[list→]: bank={} accountId={} from={} to={}",
            bank, account.account_id, from_iso, to_iso
        );

        let raw = self.get_json("transactions", bank, &url, consent_id).await?;
        let transactions = parse_transactions(&raw, account);

        let ms = started.elapsed().as_millis();
        if transactions.is_empty() {
            warn!(
                "Tx[list←0]: bank={} accountId={} ({} ms, empty)",
                bank, account.account_id, ms
            );
        } else {
            info!(
                "Tx[list←{}]: bank={} accountId={} ({} ms)",
                transactions.len(),
                bank,
                account.account_id,
                ms
            );
        }
        Ok(transactions)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ConsentsApi Trait Implementation
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl ConsentsApi for OpenBankApiClient {
    async fn ensure_accounts_consent(
        &self,
        bank: &BankCode,
        client_id: &ClientId,
        user_id: UserId,
    ) -> Result<AccountsConsent> {
        let base = self.banks.base_url(bank)?;
        let url = format!("{}/account-consents/request", base);
        let body = ApiConsentRequest {
            client_id: client_id.as_str(),
            permissions: ACCOUNTS_CONSENT_PERMISSIONS,
            reason: CONSENT_REASON,
            requesting_bank: &self.banks.team_client_id,
            requesting_bank_name: REQUESTING_BANK_NAME,
        };
        info!("Consent[request]: bank={} clientId={}", bank, client_id);

        let response = self
            .http
            .post(&url)
            .headers(self.headers(bank, None).await?)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error("account-consents", e))?;

        let raw: Value = read_body("account-consents", response).await?;
        let (consent_id, status) = parse_consent(&raw)?;
        info!(
            "Consent[ok]: bank={} consentId={} status={}",
            bank, consent_id, status
        );

        Ok(AccountsConsent {
            user_id,
            bank: bank.clone(),
            client_id: client_id.clone(),
            consent_id,
            status,
            created_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consent_request_body_shape() {
        let body = ApiConsentRequest {
            client_id: "team200-1",
            permissions: ACCOUNTS_CONSENT_PERMISSIONS,
            reason: CONSENT_REASON,
            requesting_bank: "team200",
            requesting_bank_name: REQUESTING_BANK_NAME,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["client_id"], "team200-1");
        assert_eq!(json["requesting_bank"], "team200");
        assert_eq!(
            json["permissions"],
            serde_json::json!(["ReadAccountsDetail", "ReadBalances", "ReadTransactionsDetail"])
        );
    }

    #[test]
    fn test_token_response_without_ttl() {
        let parsed: ApiBankTokenResponse =
            serde_json::from_str(r#"{"access_token":"abc","token_type":"bearer"}"#).unwrap();
        assert_eq!(parsed.access_token, "abc");
        assert_eq!(parsed.expires_in, None);
    }

    #[tokio::test]
    async fn test_unknown_bank_fails_before_network() {
        let banks = BanksConfig::new("team200", "secret", Vec::new());
        let client = OpenBankApiClient::new(banks, DEFAULT_TIMEOUT).unwrap();
        let err = client
            .list_accounts(
                &BankCode::new("zbank"),
                &ClientId::from("team200-1"),
                &ConsentId::from("c-1"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    struct UnavailableFetcher;

    #[async_trait]
    impl BankTokenFetcher for UnavailableFetcher {
        async fn fetch_bank_token(&self, _bank: &BankCode) -> Result<FetchedToken> {
            Err(ExternalServiceError::new("bank-token", "offline")
                .with_status(503)
                .into())
        }
    }

    #[tokio::test]
    async fn test_shared_token_cache_errors_surface() {
        let banks = Arc::new(BanksConfig::new(
            "team200",
            "secret",
            vec![("vbank".to_string(), "http://vbank.invalid".to_string())],
        ));
        let tokens = Arc::new(BankTokenCache::new(Arc::new(UnavailableFetcher)));
        let client =
            OpenBankApiClient::with_token_cache(banks, tokens.clone(), DEFAULT_TIMEOUT).unwrap();
        assert!(Arc::ptr_eq(&client.token_cache(), &tokens));

        let err = client
            .list_accounts(
                &BankCode::new("vbank"),
                &ClientId::from("team200-1"),
                &ConsentId::from("c-1"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ExternalService(ref e) if e.status == Some(503)));
    }
}
