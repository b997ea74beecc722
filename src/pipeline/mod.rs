//! Pipeline orchestrator: ties data source → metrics engine together.
//!
//! One `run()` is one rendering cycle:
//!   1. Fetch every catalog symbol's history in parallel (bounded by a semaphore,
//!      each fetch under a timeout).
//!   2. Compute one row per catalog entry, in catalog order, against a single
//!      `as_of` date.
//!   Any failure for a symbol (error, timeout, panic) degrades that row to
//!   unavailable; the cycle itself always completes.
//!
//! `watch()` repeats cycles on a fixed period until a shutdown future resolves.

use crate::config::AppConfig;
use crate::error::FetchError;
use crate::metrics::{compute_row, compute_unavailable};
use crate::models::{CatalogEntry, RowRecord};
use crate::provider::MarketDataSource;
use crate::ranking::{Direction, SortKey, rank};
use crate::utils::Timer;
use chrono::{Local, NaiveDate};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

pub struct Pipeline {
    source: Arc<dyn MarketDataSource>,
    catalog: Vec<CatalogEntry>,
    concurrency: usize,
    fetch_timeout: Duration,
}

impl Pipeline {
    pub fn new(config: &AppConfig, source: Arc<dyn MarketDataSource>) -> Self {
        Self {
            source,
            catalog: config.catalog.clone(),
            concurrency: config.pipeline.concurrency.max(1),
            fetch_timeout: Duration::from_secs(config.pipeline.fetch_timeout_secs),
        }
    }

    /// Run a cycle against today's local date.
    pub async fn run_now(&self) -> Snapshot {
        self.run(Local::now().date_naive()).await
    }

    pub async fn run(&self, as_of: NaiveDate) -> Snapshot {
        info!(
            "Cycle as of {}: {} symbols via {}",
            as_of,
            self.catalog.len(),
            self.source.name()
        );

        let sem = Arc::new(Semaphore::new(self.concurrency));
        let mut handles = Vec::with_capacity(self.catalog.len());

        for entry in &self.catalog {
            let symbol = entry.provider_symbol.clone();
            let source = Arc::clone(&self.source);
            let sem = Arc::clone(&sem);
            let limit = self.fetch_timeout;

            let handle = tokio::spawn(async move {
                // The semaphore is never closed, so acquiring only waits.
                let _permit = sem.acquire_owned().await.ok();
                match tokio::time::timeout(limit, source.fetch_history(&symbol)).await {
                    Ok(res) => res,
                    Err(_) => Err(FetchError::Timeout { secs: limit.as_secs() }),
                }
            });
            handles.push(handle);
        }

        let mut rows = Vec::with_capacity(self.catalog.len());
        let mut stats = CycleStats::default();

        for (entry, handle) in self.catalog.iter().zip(handles) {
            let row = match handle.await {
                Ok(Ok(history)) => {
                    let row = compute_row(entry, &history, as_of);
                    if !row.is_available() {
                        warn!("{}: no usable price data ({} bars)", entry.display_name, history.len());
                    }
                    row
                }
                Ok(Err(e)) => {
                    warn!("{} ({}): {}", entry.display_name, entry.provider_symbol, e);
                    stats.fetch_errors += 1;
                    compute_unavailable(entry)
                }
                Err(e) => {
                    error!("Task panic for {}: {}", entry.display_name, e);
                    stats.fetch_errors += 1;
                    compute_unavailable(entry)
                }
            };

            if row.is_available() {
                stats.available += 1;
            } else {
                stats.unavailable += 1;
            }
            rows.push(row);
        }

        info!(
            "Cycle done: {} rows | {} available | {} unavailable | {} fetch errors",
            rows.len(),
            stats.available,
            stats.unavailable,
            stats.fetch_errors
        );

        Snapshot { as_of, rows, stats }
    }

    /// Run a cycle every `period` until `shutdown` resolves, handing each
    /// snapshot to `on_snapshot`. A cycle still in flight when `shutdown`
    /// fires is abandoned. Returns the number of completed cycles.
    ///
    /// A cycle slower than `period` delays the next one instead of queueing
    /// catch-up cycles.
    pub async fn watch<S, F>(
        &self,
        period: Duration,
        shutdown: S,
        mut on_snapshot: F,
    ) -> anyhow::Result<usize>
    where
        S: Future,
        F: FnMut(&Snapshot) -> anyhow::Result<()>,
    {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        let mut cycles = 0;
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested, stopping watch");
                    break;
                }
                _ = ticker.tick() => {}
            }

            let snapshot = tokio::select! {
                snapshot = async {
                    let _t = Timer::start("Watch cycle");
                    self.run_now().await
                } => snapshot,
                _ = &mut shutdown => {
                    info!("Shutdown requested mid-cycle, stopping watch");
                    break;
                }
            };

            on_snapshot(&snapshot)?;
            cycles += 1;
        }

        Ok(cycles)
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CycleStats {
    pub available: usize,
    pub unavailable: usize,
    pub fetch_errors: usize,
}

/// Result of one cycle. Rows are in catalog order.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub as_of: NaiveDate,
    pub rows: Vec<RowRecord>,
    pub stats: CycleStats,
}

impl Snapshot {
    pub fn ranked(&self, key: SortKey, direction: Direction) -> Vec<&RowRecord> {
        rank(&self.rows, key, direction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DailyBar, PriceHistory};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::time::Instant;

    enum Canned {
        Bars(Vec<(NaiveDate, f64, f64)>),
        Fail,
        Hang,
    }

    struct CannedSource(HashMap<&'static str, Canned>);

    #[async_trait]
    impl MarketDataSource for CannedSource {
        fn name(&self) -> &'static str {
            "canned"
        }

        async fn fetch_history(&self, symbol: &str) -> Result<PriceHistory, FetchError> {
            match self.0.get(symbol) {
                Some(Canned::Bars(bars)) => Ok(PriceHistory::new(
                    bars.iter().map(|&(d, c, h)| DailyBar::close_high(d, c, h)).collect(),
                )),
                Some(Canned::Hang) => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(PriceHistory::empty())
                }
                Some(Canned::Fail) | None => {
                    Err(FetchError::SymbolNotFound { symbol: symbol.to_string() })
                }
            }
        }
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn config() -> AppConfig {
        let mut cfg = AppConfig::default();
        cfg.catalog = vec![
            CatalogEntry::new("AAA", "AAA.NS", 100),
            CatalogEntry::new("BBB", "BBB.NS", 10),
            CatalogEntry::new("CCC", "CCC.NS", 50),
            CatalogEntry::new("DDD", "DDD.NS", 1),
            CatalogEntry::new("EEE", "EEE.NS", 1),
        ];
        cfg.pipeline.concurrency = 2;
        cfg.pipeline.fetch_timeout_secs = 5;
        cfg
    }

    fn source() -> Arc<dyn MarketDataSource> {
        let d0 = date("2024-06-03");
        let d1 = date("2024-06-04");
        let mut m = HashMap::new();
        m.insert("AAA.NS", Canned::Bars(vec![(d0, 10.0, 12.0), (d1, 11.0, 12.0)]));
        m.insert("BBB.NS", Canned::Fail);
        m.insert("CCC.NS", Canned::Bars(vec![(d1, 3.0, 4.0)]));
        m.insert("DDD.NS", Canned::Hang);
        m.insert("EEE.NS", Canned::Bars(vec![]));
        Arc::new(CannedSource(m))
    }

    #[tokio::test(start_paused = true)]
    async fn test_cycle_degrades_bad_symbols_only() {
        let pipeline = Pipeline::new(&config(), source());
        let snap = pipeline.run(date("2024-06-04")).await;

        let names: Vec<_> = snap.rows.iter().map(|r| r.display_name.as_str()).collect();
        assert_eq!(names, vec!["AAA", "BBB", "CCC", "DDD", "EEE"]);

        let a = snap.rows[0].metrics.as_ref().unwrap();
        assert_eq!(a.last_price, 11.0);
        assert_eq!(a.percent_below_ath, Some(8.33));
        assert_eq!(a.contract_value, 1100);

        assert!(!snap.rows[1].is_available());
        assert_eq!(snap.rows[1].lot_size, 10);
        assert_eq!(snap.rows[2].contract_value(), Some(150));
        assert!(!snap.rows[3].is_available());
        assert!(!snap.rows[4].is_available());

        assert_eq!(
            snap.stats,
            CycleStats { available: 2, unavailable: 3, fetch_errors: 2 }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_snapshot_ranked() {
        let pipeline = Pipeline::new(&config(), source());
        let snap = pipeline.run(date("2024-06-04")).await;
        let ranked: Vec<_> = snap
            .ranked(SortKey::ContractValue, Direction::Ascending)
            .iter()
            .map(|r| r.display_name.clone())
            .collect();
        assert_eq!(ranked, vec!["CCC", "AAA", "BBB", "DDD", "EEE"]);
    }

    /// First fetch takes 25s, every later one returns at once.
    struct SlowFirstFetch(AtomicBool);

    #[async_trait]
    impl MarketDataSource for SlowFirstFetch {
        fn name(&self) -> &'static str {
            "slow-first"
        }

        async fn fetch_history(&self, _symbol: &str) -> Result<PriceHistory, FetchError> {
            if !self.0.swap(true, Ordering::SeqCst) {
                tokio::time::sleep(Duration::from_secs(25)).await;
            }
            Ok(PriceHistory::new(vec![DailyBar::close_high(date("2024-06-04"), 1.0, 1.0)]))
        }
    }

    fn single(symbol: &str) -> AppConfig {
        let mut cfg = AppConfig::default();
        cfg.catalog = vec![CatalogEntry::new("ONE", symbol, 1)];
        cfg.pipeline.fetch_timeout_secs = 45;
        cfg
    }

    #[tokio::test(start_paused = true)]
    async fn test_watch_shutdown_interrupts_cycle() {
        let pipeline = Pipeline::new(&single("DDD.NS"), source());
        let started = Instant::now();

        let mut seen = 0;
        let cycles = pipeline
            .watch(
                Duration::from_secs(60),
                tokio::time::sleep(Duration::from_secs(10)),
                |_| {
                    seen += 1;
                    Ok(())
                },
            )
            .await
            .unwrap();

        assert_eq!(cycles, 0);
        assert_eq!(seen, 0);
        assert_eq!(started.elapsed(), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_watch_slow_cycle_delays_next_tick() {
        let source: Arc<dyn MarketDataSource> = Arc::new(SlowFirstFetch(AtomicBool::new(false)));
        let pipeline = Pipeline::new(&single("ONE.NS"), source);
        let started = Instant::now();

        let mut finished_at = Vec::new();
        let cycles = pipeline
            .watch(
                Duration::from_secs(10),
                tokio::time::sleep(Duration::from_secs(44)),
                |snap| {
                    assert_eq!(snap.stats.available, 1);
                    finished_at.push(started.elapsed().as_secs());
                    Ok(())
                },
            )
            .await
            .unwrap();

        // Cycles at 0s (slow, ends 25s), 25s, 35s. No burst of catch-up cycles.
        assert_eq!(cycles, 3);
        assert_eq!(finished_at, vec![25, 25, 35]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_watch_stops_on_callback_error() {
        let pipeline = Pipeline::new(&single("AAA.NS"), source());
        let res = pipeline
            .watch(
                Duration::from_secs(1),
                std::future::pending::<()>(),
                |_| Err(anyhow::anyhow!("stdout closed")),
            )
            .await;
        assert_eq!(res.unwrap_err().to_string(), "stdout closed");
    }
}
