pub mod cache;
pub mod cleaner;
pub mod http_client;
pub mod yahoo;

use crate::error::FetchError;
use crate::models::PriceHistory;
use async_trait::async_trait;
use std::sync::Arc;

pub use self::cache::CachedSource;
pub use self::yahoo::YahooSource;

// ── Source trait ──────────────────────────────────────────────────────────────

/// Swappable data source abstraction.
///
/// An `Ok` history may be empty; the metrics engine treats that the same as
/// an error.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Short label for logs.
    fn name(&self) -> &'static str;

    async fn fetch_history(&self, provider_symbol: &str) -> Result<PriceHistory, FetchError>;
}

#[async_trait]
impl<S: MarketDataSource + ?Sized> MarketDataSource for Arc<S> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    async fn fetch_history(&self, provider_symbol: &str) -> Result<PriceHistory, FetchError> {
        (**self).fetch_history(provider_symbol).await
    }
}

#[async_trait]
impl<S: MarketDataSource + ?Sized> MarketDataSource for Box<S> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    async fn fetch_history(&self, provider_symbol: &str) -> Result<PriceHistory, FetchError> {
        (**self).fetch_history(provider_symbol).await
    }
}
