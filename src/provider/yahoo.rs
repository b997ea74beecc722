//! Yahoo Finance v8 chart API: full daily history for one symbol.

use super::MarketDataSource;
use super::http_client::HttpClient;
use crate::config::ProviderConfig;
use crate::error::FetchError;
use crate::models::{DailyBar, PriceHistory};
use async_trait::async_trait;
use chrono::DateTime;
use serde::Deserialize;
use tracing::debug;
use url::Url;

// ── Wire types ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    #[serde(default)]
    meta: ChartMeta,
    timestamp: Option<Vec<i64>>,
    indicators: Option<Indicators>,
}

#[derive(Debug, Default, Deserialize)]
struct ChartMeta {
    /// Exchange offset from UTC in seconds (19800 for NSE).
    #[serde(default)]
    gmtoffset: i64,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteData>,
}

#[derive(Debug, Default, Deserialize)]
struct QuoteData {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<u64>>,
}

// ── Parsing ───────────────────────────────────────────────────────────────────

/// Decode a chart response. A symbol that exists but has no bars yields an
/// empty history rather than an error.
pub fn parse_chart(symbol: &str, body: &str) -> Result<PriceHistory, FetchError> {
    let resp: ChartResponse =
        serde_json::from_str(body).map_err(|e| FetchError::Format(e.to_string()))?;

    if let Some(err) = resp.chart.error {
        return Err(if err.code.eq_ignore_ascii_case("not found") {
            FetchError::SymbolNotFound { symbol: symbol.to_string() }
        } else {
            FetchError::Format(format!("{}: {}", err.code, err.description))
        });
    }

    let Some(data) = resp.chart.result.and_then(|r| r.into_iter().next()) else {
        return Ok(PriceHistory::empty());
    };

    let timestamps = data.timestamp.unwrap_or_default();
    let quote = data
        .indicators
        .and_then(|i| i.quote.into_iter().next())
        .unwrap_or_default();

    let offset = data.meta.gmtoffset;
    let mut bars = Vec::with_capacity(timestamps.len());

    for (i, &ts) in timestamps.iter().enumerate() {
        let date = DateTime::from_timestamp(ts + offset, 0)
            .map(|dt| dt.date_naive())
            .ok_or_else(|| FetchError::Format(format!("invalid timestamp: {ts}")))?;

        let at = |v: &Vec<Option<f64>>| v.get(i).copied().flatten();
        bars.push(DailyBar {
            date,
            open: at(&quote.open),
            high: at(&quote.high),
            low: at(&quote.low),
            close: at(&quote.close),
            volume: quote.volume.get(i).copied().flatten(),
        });
    }

    Ok(PriceHistory::new(bars))
}

// ── Source ────────────────────────────────────────────────────────────────────

pub struct YahooSource {
    client: HttpClient,
    base_url: String,
    range: String,
    interval: String,
}

impl YahooSource {
    pub fn new(config: &ProviderConfig) -> Result<Self, FetchError> {
        Ok(Self {
            client: HttpClient::new(config)?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            range: config.range.clone(),
            interval: config.interval.clone(),
        })
    }

    /// e.g. RELIANCE.NS → …/chart/RELIANCE.NS?range=max&interval=1d
    fn chart_url(&self, symbol: &str) -> Result<Url, FetchError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| FetchError::Format(format!("bad base url {}: {}", self.base_url, e)))?;
        url.path_segments_mut()
            .map_err(|_| FetchError::Format(format!("base url cannot take a path: {}", self.base_url)))?
            .push(symbol);
        url.query_pairs_mut()
            .append_pair("range", &self.range)
            .append_pair("interval", &self.interval)
            .append_pair("includeAdjustedClose", "false");
        Ok(url)
    }
}

#[async_trait]
impl MarketDataSource for YahooSource {
    fn name(&self) -> &'static str {
        "yahoo"
    }

    async fn fetch_history(&self, provider_symbol: &str) -> Result<PriceHistory, FetchError> {
        let url = self.chart_url(provider_symbol)?;
        let body = match self.client.get_text(&url).await {
            Err(FetchError::Status { status: 404, .. }) => {
                return Err(FetchError::SymbolNotFound { symbol: provider_symbol.to_string() });
            }
            other => other?,
        };

        let history = parse_chart(provider_symbol, &body)?;
        debug!(
            "{}: {} bars ({:?} → {:?})",
            provider_symbol,
            history.len(),
            history.first_date(),
            history.last_date()
        );
        Ok(history)
    }
}
