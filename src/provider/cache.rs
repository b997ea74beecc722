//! Time-boxed memoisation in front of any [`MarketDataSource`].
//!
//! Entries are keyed by provider symbol and expire a fixed TTL after the fetch
//! that produced them. Failed fetches are never stored, so the next cycle
//! retries them.

use super::MarketDataSource;
use crate::error::FetchError;
use crate::models::PriceHistory;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

struct CacheEntry {
    history: PriceHistory,
    fetched_at: Instant,
}

pub struct CachedSource<S> {
    inner: S,
    ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl<S: MarketDataSource> CachedSource<S> {
    pub fn new(inner: S, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    async fn lookup(&self, provider_symbol: &str) -> Option<PriceHistory> {
        let mut entries = self.entries.lock().await;
        match entries.get(provider_symbol) {
            Some(e) if e.fetched_at.elapsed() < self.ttl => Some(e.history.clone()),
            Some(_) => {
                entries.remove(provider_symbol);
                None
            }
            None => None,
        }
    }
}

#[async_trait]
impl<S: MarketDataSource> MarketDataSource for CachedSource<S> {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn fetch_history(&self, provider_symbol: &str) -> Result<PriceHistory, FetchError> {
        if let Some(history) = self.lookup(provider_symbol).await {
            debug!("{}: cache hit", provider_symbol);
            return Ok(history);
        }

        // Lock is released while the inner fetch runs so symbols fetch in parallel.
        let history = self.inner.fetch_history(provider_symbol).await?;
        self.entries.lock().await.insert(
            provider_symbol.to_string(),
            CacheEntry {
                history: history.clone(),
                fetched_at: Instant::now(),
            },
        );
        Ok(history)
    }
}
