use crate::config::ProviderConfig;
use crate::error::FetchError;
use std::time::Duration;
use tokio::time::sleep;
use tokio_retry::RetryIf;
use tokio_retry::strategy::{ExponentialBackoff, jitter};
use tracing::{debug, warn};
use url::Url;

pub struct HttpClient {
    inner: reqwest::Client,
    request_delay_ms: u64,
    jitter_ms: u64,
    max_retries: u32,
}

impl HttpClient {
    pub fn new(config: &ProviderConfig) -> Result<Self, FetchError> {
        let inner = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .gzip(true)
            // Yahoo hands out a consent cookie on first contact
            .cookie_store(true)
            .build()?;

        Ok(Self {
            inner,
            request_delay_ms: config.request_delay_ms,
            jitter_ms: config.jitter_ms,
            max_retries: config.max_retries,
        })
    }

    /// Fetch a URL as text with a polite delay and retry on transient failures.
    /// Non-retryable statuses (404 etc.) come back as `FetchError::Status` at once.
    pub async fn get_text(&self, url: &Url) -> Result<String, FetchError> {
        self.polite_delay().await;

        // 2·d, 4·d, 8·d … with d = request_delay_ms
        let strategy = ExponentialBackoff::from_millis(2)
            .factor(self.request_delay_ms.max(1))
            .max_delay(Duration::from_secs(30))
            .map(jitter)
            .take(self.max_retries as usize);

        RetryIf::spawn(
            strategy,
            || self.get_once(url),
            |e: &FetchError| {
                let retry = e.is_transient();
                if retry {
                    warn!("GET {} failed, retrying: {}", url, e);
                }
                retry
            },
        )
        .await
    }

    async fn get_once(&self, url: &Url) -> Result<String, FetchError> {
        debug!("GET {}", url);
        let resp = self.inner.get(url.clone()).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(resp.text().await?)
    }

    /// Sleep for the configured delay + random jitter.
    async fn polite_delay(&self) {
        let jitter_ms = if self.jitter_ms == 0 {
            0
        } else {
            rand::random_range(0..=self.jitter_ms)
        };
        let total = Duration::from_millis(self.request_delay_ms + jitter_ms);
        if !total.is_zero() {
            sleep(total).await;
        }
    }
}
