//! Offline histories from CSV exports, one file per provider symbol.
//!
//! Expected layout is a header row naming the columns (`Date, Open, High, Low,
//! Close, Volume` in any order; `Price` is accepted for the close). A file
//! without a close or high column still loads, but every bar is incomplete, so
//! the resulting row is unavailable.

use crate::error::FetchError;
use crate::models::{DailyBar, PriceHistory};
use crate::provider::MarketDataSource;
use crate::provider::cleaner::{parse_date, parse_price, parse_volume};
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Default, PartialEq)]
struct Columns {
    date: Option<usize>,
    open: Option<usize>,
    high: Option<usize>,
    low: Option<usize>,
    close: Option<usize>,
    volume: Option<usize>,
}

impl Columns {
    fn from_headers(headers: &csv::StringRecord) -> Self {
        let mut cols = Columns::default();
        for (i, h) in headers.iter().enumerate() {
            let h = h.trim().trim_start_matches('\u{feff}').to_lowercase();
            match h.as_str() {
                "date" | "datetime" => cols.date = Some(i),
                "open" => cols.open = Some(i),
                "high" => cols.high = Some(i),
                "low" => cols.low = Some(i),
                "close" | "price" => cols.close = Some(i),
                "volume" | "vol." | "vol" => cols.volume = Some(i),
                _ => {}
            }
        }
        cols
    }
}

/// Parse one history file. Rows with an unreadable date are skipped.
pub fn load_history(path: &Path) -> Result<PriceHistory, FetchError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)?;

    let cols = Columns::from_headers(reader.headers()?);
    let Some(date_idx) = cols.date else {
        return Err(FetchError::Format(format!("{:?}: no Date column", path)));
    };

    let mut bars = Vec::new();
    for (i, result) in reader.records().enumerate() {
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                warn!("Row {} in {:?}: {}", i + 1, path, e);
                continue;
            }
        };

        let field = |idx: Option<usize>| idx.and_then(|j| record.get(j));
        let Some(date) = field(Some(date_idx)).and_then(parse_date) else {
            debug!("Row {} in {:?}: unreadable date", i + 1, path);
            continue;
        };

        bars.push(DailyBar {
            date,
            open: field(cols.open).and_then(parse_price),
            high: field(cols.high).and_then(parse_price),
            low: field(cols.low).and_then(parse_price),
            close: field(cols.close).and_then(parse_price),
            volume: field(cols.volume).and_then(parse_volume),
        });
    }

    Ok(PriceHistory::new(bars))
}

pub fn discover_csv_files(dir: &Path) -> Result<Vec<PathBuf>, FetchError> {
    if !dir.exists() {
        return Ok(vec![]);
    }

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|e| e == "csv") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

// ── Source ────────────────────────────────────────────────────────────────────

/// Serves `<dir>/<provider_symbol>.csv`.
pub struct CsvDirSource {
    dir: PathBuf,
}

impl CsvDirSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, symbol: &str) -> PathBuf {
        self.dir.join(format!("{symbol}.csv"))
    }

    /// Provider symbols this directory can serve, taken from the file stems.
    pub fn available_symbols(&self) -> Result<BTreeSet<String>, FetchError> {
        let symbols = discover_csv_files(&self.dir)?
            .iter()
            .filter_map(|p| p.file_stem().and_then(|s| s.to_str()).map(str::to_string))
            .collect();
        Ok(symbols)
    }
}

#[async_trait]
impl MarketDataSource for CsvDirSource {
    fn name(&self) -> &'static str {
        "csv"
    }

    async fn fetch_history(&self, provider_symbol: &str) -> Result<PriceHistory, FetchError> {
        let path = self.path_for(provider_symbol);
        if !path.is_file() {
            return Err(FetchError::SymbolNotFound { symbol: provider_symbol.to_string() });
        }
        let history = tokio::task::spawn_blocking(move || load_history(&path))
            .await
            .map_err(|e| FetchError::Format(format!("loader task failed: {e}")))??;
        debug!("{}: {} bars from csv", provider_symbol, history.len());
        Ok(history)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::fs;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("nifty_snapshot_{}_{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_load_history() {
        let dir = scratch_dir("load");
        let path = dir.join("INFY.NS.csv");
        fs::write(
            &path,
            "Date,Open,High,Low,Close,Volume\n\
             2024-06-04,1500,1520.5,1490,1510.25,1.2M\n\
             2024-06-03,1480,1505,1470,1499,900K\n\
             not-a-date,1,1,1,1,1\n\
             2024-06-05,,,,,\n",
        )
        .unwrap();

        let h = load_history(&path).unwrap();
        assert_eq!(h.len(), 3);
        assert_eq!(h.first_date(), NaiveDate::from_ymd_opt(2024, 6, 3));
        assert_eq!(h.bars()[1].close, Some(1510.25));
        assert_eq!(h.bars()[1].volume, Some(1_200_000));
        assert!(!h.bars()[2].is_complete());
    }

    #[test]
    fn test_missing_high_column_loads_incomplete() {
        let dir = scratch_dir("nohigh");
        let path = dir.join("ITC.NS.csv");
        fs::write(&path, "Date,Price\n\"Feb 20, 2024\",410.5\n").unwrap();
        let h = load_history(&path).unwrap();
        assert_eq!(h.len(), 1);
        assert_eq!(h.bars()[0].close, Some(410.5));
        assert_eq!(h.bars()[0].high, None);
    }

    #[test]
    fn test_no_date_column_is_format_error() {
        let dir = scratch_dir("nodate");
        let path = dir.join("LT.NS.csv");
        fs::write(&path, "Close,High\n1,2\n").unwrap();
        assert!(matches!(load_history(&path), Err(FetchError::Format(_))));
    }

    #[tokio::test]
    async fn test_csv_source() {
        let dir = scratch_dir("source");
        fs::write(dir.join("SBIN.NS.csv"), "Date,High,Close\n2024-06-03,830,820.4\n").unwrap();
        fs::write(dir.join("notes.txt"), "ignored").unwrap();

        let src = CsvDirSource::new(dir.clone());
        let h = src.fetch_history("SBIN.NS").await.unwrap();
        assert_eq!(h.len(), 1);
        assert!(matches!(
            src.fetch_history("TCS.NS").await,
            Err(FetchError::SymbolNotFound { .. })
        ));
    }

    #[test]
    fn test_available_symbols_match_served_paths() {
        let dir = scratch_dir("symbols");
        fs::write(dir.join("SBIN.NS.csv"), "Date,High,Close\n").unwrap();
        fs::write(dir.join("RELIANCE.NS.csv"), "Date,High,Close\n").unwrap();
        fs::write(dir.join("notes.txt"), "ignored").unwrap();
        fs::create_dir_all(dir.join("old.csv")).unwrap();

        let src = CsvDirSource::new(dir.clone());
        let found: Vec<_> = src.available_symbols().unwrap().into_iter().collect();
        assert_eq!(found, vec!["RELIANCE.NS", "SBIN.NS"]);
        for symbol in &found {
            assert!(src.path_for(symbol).is_file());
        }

        let gone = CsvDirSource::new(dir.join("does-not-exist"));
        assert!(gone.available_symbols().unwrap().is_empty());
    }
}
