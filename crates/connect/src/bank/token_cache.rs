//! Process-wide cache of bank access tokens.

use std::sync::Arc;

use dashmap::DashMap;
use log::{debug, error, info};

use super::traits::BankTokenFetcher;
use elly_core::banking::BankCode;
use elly_core::errors::Result;

/// Lifetime assumed when the bank does not advertise one.
pub const DEFAULT_TOKEN_TTL_SECS: u64 = 86_400;

/// Cached tokens with less remaining lifetime than this are refreshed.
pub const MIN_REMAINING_TTL_SECS: i64 = 60;

/// Current time as epoch seconds.
pub type EpochClock = fn() -> i64;

fn system_clock() -> i64 {
    chrono::Utc::now().timestamp()
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: i64,
}

/// Bank tokens keyed by lower-cased bank code.
///
/// Concurrent misses for the same bank each fetch; the last writer wins.
pub struct BankTokenCache {
    fetcher: Arc<dyn BankTokenFetcher>,
    entries: DashMap<String, CachedToken>,
    clock: EpochClock,
}

impl BankTokenCache {
    pub fn new(fetcher: Arc<dyn BankTokenFetcher>) -> Self {
        Self::with_clock(fetcher, system_clock)
    }

    pub fn with_clock(fetcher: Arc<dyn BankTokenFetcher>, clock: EpochClock) -> Self {
        Self {
            fetcher,
            entries: DashMap::new(),
            clock,
        }
    }

    /// Returns a token for `bank`, fetching a new one when the cached one is
    /// missing or about to expire. Fetch errors propagate and nothing is cached.
    pub async fn get_token(&self, bank: &BankCode) -> Result<String> {
        let key = bank.as_str().to_lowercase();
        let now = (self.clock)();

        // The shard guard must be released before the fetch is awaited.
        let cached = self.entries.get(&key).map(|entry| entry.clone());
        if let Some(entry) = cached {
            let seconds_left = entry.expires_at - now;
            if seconds_left > MIN_REMAINING_TTL_SECS {
                debug!("BankToken[cache-hit]: bank={}, ttlLeft={}s", key, seconds_left);
                return Ok(entry.token);
            }
            debug!("BankToken[cache-stale]: bank={}, ttlLeft={}s", key, seconds_left);
        }

        let fetched = self.fetcher.fetch_bank_token(bank).await.map_err(|e| {
            error!("BankToken[fetch-failed]: bank={} error={}", key, e);
            e
        })?;

        let ttl = fetched.ttl_secs.unwrap_or(DEFAULT_TOKEN_TTL_SECS);
        let expires_at = now.saturating_add(i64::try_from(ttl).unwrap_or(i64::MAX));
        info!(
            "BankToken[fetch-ok]: bank={} ttl={}s tokenPrefix={}",
            key,
            ttl,
            token_prefix(&fetched.token)
        );
        self.entries.insert(
            key,
            CachedToken {
                token: fetched.token.clone(),
                expires_at,
            },
        );
        Ok(fetched.token)
    }

    /// Drops the cached token for `bank`, forcing the next call to fetch.
    pub fn invalidate(&self, bank: &BankCode) {
        self.entries.remove(&bank.as_str().to_lowercase());
    }
}

/// First characters of a token, safe to log.
pub(crate) fn token_prefix(token: &str) -> String {
    let prefix: String = token.chars().take(8).collect();
    format!("{}…", prefix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bank::FetchedToken;
    use async_trait::async_trait;
    use elly_core::errors::{Error, ExternalServiceError};
    use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct MockFetcher {
        calls: AtomicUsize,
        ttl_secs: Option<u64>,
        fail: Mutex<bool>,
    }

    impl MockFetcher {
        fn new(ttl_secs: Option<u64>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                ttl_secs,
                fail: Mutex::new(false),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl BankTokenFetcher for MockFetcher {
        async fn fetch_bank_token(&self, bank: &BankCode) -> Result<FetchedToken> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if *self.fail.lock().unwrap() {
                return Err(ExternalServiceError::new("bank-token", "boom")
                    .with_status(500)
                    .into());
            }
            Ok(FetchedToken {
                token: format!("{}-token-{}", bank, n),
                ttl_secs: self.ttl_secs,
            })
        }
    }

    static HIT_CLOCK: AtomicI64 = AtomicI64::new(1_000);
    fn hit_clock() -> i64 {
        HIT_CLOCK.load(Ordering::SeqCst)
    }

    #[tokio::test]
    async fn test_hit_until_sixty_seconds_left() {
        let fetcher = MockFetcher::new(Some(300));
        let cache = BankTokenCache::with_clock(fetcher.clone(), hit_clock);
        let bank = BankCode::new("vbank");

        let first = cache.get_token(&bank).await.unwrap();
        HIT_CLOCK.store(1_000 + 239, Ordering::SeqCst);
        assert_eq!(cache.get_token(&bank).await.unwrap(), first);
        assert_eq!(fetcher.calls(), 1);

        // Exactly 60 seconds left is stale.
        HIT_CLOCK.store(1_000 + 240, Ordering::SeqCst);
        let refreshed = cache.get_token(&bank).await.unwrap();
        assert_ne!(refreshed, first);
        assert_eq!(fetcher.calls(), 2);
    }

    static DEFAULT_TTL_CLOCK: AtomicI64 = AtomicI64::new(0);
    fn default_ttl_clock() -> i64 {
        DEFAULT_TTL_CLOCK.load(Ordering::SeqCst)
    }

    #[tokio::test]
    async fn test_missing_ttl_defaults_to_one_day() {
        let fetcher = MockFetcher::new(None);
        let cache = BankTokenCache::with_clock(fetcher.clone(), default_ttl_clock);
        let bank = BankCode::new("abank");

        cache.get_token(&bank).await.unwrap();
        DEFAULT_TTL_CLOCK.store(86_400 - 61, Ordering::SeqCst);
        cache.get_token(&bank).await.unwrap();
        assert_eq!(fetcher.calls(), 1);

        DEFAULT_TTL_CLOCK.store(86_400 - 60, Ordering::SeqCst);
        cache.get_token(&bank).await.unwrap();
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test]
    async fn test_keys_are_case_insensitive_and_per_bank() {
        let fetcher = MockFetcher::new(Some(3_600));
        let cache = BankTokenCache::new(fetcher.clone());

        let a = cache.get_token(&BankCode::new("VBank")).await.unwrap();
        let b = cache.get_token(&BankCode::new("vbank")).await.unwrap();
        assert_eq!(a, b);
        cache.get_token(&BankCode::new("sbank")).await.unwrap();
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test]
    async fn test_fetch_error_propagates_and_is_not_cached() {
        let fetcher = MockFetcher::new(Some(3_600));
        let cache = BankTokenCache::new(fetcher.clone());
        let bank = BankCode::new("vbank");

        *fetcher.fail.lock().unwrap() = true;
        let err = cache.get_token(&bank).await.unwrap_err();
        assert!(matches!(err, Error::ExternalService(_)));

        *fetcher.fail.lock().unwrap() = false;
        assert!(cache.get_token(&bank).await.is_ok());
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test]
    async fn test_invalidate_forces_refetch() {
        let fetcher = MockFetcher::new(Some(3_600));
        let cache = BankTokenCache::new(fetcher.clone());
        let bank = BankCode::new("vbank");

        cache.get_token(&bank).await.unwrap();
        cache.invalidate(&bank);
        cache.get_token(&bank).await.unwrap();
        assert_eq!(fetcher.calls(), 2);
    }

    struct SlowFetcher {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl BankTokenFetcher for SlowFetcher {
        async fn fetch_bank_token(&self, bank: &BankCode) -> Result<FetchedToken> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            Ok(FetchedToken {
                token: format!("{}-token-{}", bank, n),
                ttl_secs: Some(3_600),
            })
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_callers_get_their_own_bank_token() {
        let fetcher = Arc::new(SlowFetcher {
            calls: AtomicUsize::new(0),
        });
        let cache = Arc::new(BankTokenCache::new(fetcher.clone()));
        let callers = 8;

        let handles: Vec<_> = (0..callers)
            .map(|i| {
                let cache = Arc::clone(&cache);
                let bank = BankCode::new(if i % 2 == 0 { "vbank" } else { "abank" });
                tokio::spawn(async move {
                    let token = cache.get_token(&bank).await.unwrap();
                    (bank, token)
                })
            })
            .collect();

        for handle in handles {
            let (bank, token) = handle.await.unwrap();
            assert!(
                token.starts_with(&format!("{}-token-", bank)),
                "{} got {}",
                bank,
                token
            );
        }
        let fetched = fetcher.calls.load(Ordering::SeqCst);
        assert!((2..=callers).contains(&fetched), "fetched {} times", fetched);

        // Once settled, both banks are served from the cache.
        cache.get_token(&BankCode::new("vbank")).await.unwrap();
        cache.get_token(&BankCode::new("abank")).await.unwrap();
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), fetched);
    }

    #[test]
    fn test_token_prefix_hides_rest() {
        assert_eq!(token_prefix("abcdefghijklmnop"), "abcdefgh…");
        assert_eq!(token_prefix("abc"), "abc…");
    }
}
