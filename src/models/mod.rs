use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ── Catalog ───────────────────────────────────────────────────────────────────

/// One tracked symbol. Catalog order is the default row order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CatalogEntry {
    pub display_name: String,     // "RELIANCE"
    pub provider_symbol: String,  // "RELIANCE.NS"
    #[serde(default)]
    pub lot_size: u32,
}

impl CatalogEntry {
    pub fn new(
        display_name: impl Into<String>,
        provider_symbol: impl Into<String>,
        lot_size: u32,
    ) -> Self {
        Self {
            display_name: display_name.into(),
            provider_symbol: provider_symbol.into(),
            lot_size,
        }
    }
}

// ── Daily bar ─────────────────────────────────────────────────────────────────

/// A single trading day as delivered by a data source. Any price may be
/// missing; the metrics engine decides what counts as usable.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct DailyBar {
    pub date: NaiveDate,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub volume: Option<u64>,
}

impl DailyBar {
    /// Bar carrying only the fields the engine reads.
    pub fn close_high(date: NaiveDate, close: f64, high: f64) -> Self {
        Self {
            date,
            open: None,
            high: Some(high),
            low: None,
            close: Some(close),
            volume: None,
        }
    }

    /// Both close and high present and finite.
    pub fn is_complete(&self) -> bool {
        matches!(
            (self.close, self.high),
            (Some(c), Some(h)) if c.is_finite() && h.is_finite()
        )
    }
}

// ── Price history ─────────────────────────────────────────────────────────────

/// Daily history for one symbol: ascending by date, one bar per date.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PriceHistory {
    bars: Vec<DailyBar>,
}

impl PriceHistory {
    /// Sorts by date and collapses duplicate dates (the later observation wins).
    pub fn new(mut bars: Vec<DailyBar>) -> Self {
        bars.sort_by_key(|b| b.date);
        let mut out: Vec<DailyBar> = Vec::with_capacity(bars.len());
        for bar in bars {
            match out.last_mut() {
                Some(prev) if prev.date == bar.date => *prev = bar,
                _ => out.push(bar),
            }
        }
        Self { bars: out }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn bars(&self) -> &[DailyBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.bars.first().map(|b| b.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.bars.last().map(|b| b.date)
    }
}

// ── Row record ────────────────────────────────────────────────────────────────

/// Derived figures for a symbol with usable data.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RowMetrics {
    pub last_price: f64,
    pub all_time_high: f64,
    /// `None` when the all-time-high is zero.
    pub percent_below_ath: Option<f64>,
    pub contract_value: i64,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub trailing_window: Vec<DailyBar>,
}

/// One dashboard row. `metrics == None` is the unavailable state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RowRecord {
    pub display_name: String,
    pub lot_size: u32,
    pub metrics: Option<RowMetrics>,
}

impl RowRecord {
    pub fn is_available(&self) -> bool {
        self.metrics.is_some()
    }

    pub fn last_price(&self) -> Option<f64> {
        self.metrics.as_ref().map(|m| m.last_price)
    }

    pub fn contract_value(&self) -> Option<i64> {
        self.metrics.as_ref().map(|m| m.contract_value)
    }

    pub fn percent_below_ath(&self) -> Option<f64> {
        self.metrics.as_ref().and_then(|m| m.percent_below_ath)
    }

    pub fn trailing_closes(&self) -> Vec<f64> {
        self.metrics
            .as_ref()
            .map(|m| m.trailing_window.iter().filter_map(|b| b.close).collect())
            .unwrap_or_default()
    }
}
