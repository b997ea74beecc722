//! Metrics engine: one catalog entry + its price history → one dashboard row.
//!
//! Pure functions only. The caller reads the clock once per cycle and passes
//! the same `as_of` date for every symbol so all rows share one chart cutoff.

use crate::models::{CatalogEntry, DailyBar, PriceHistory, RowMetrics, RowRecord};
use chrono::{Duration, NaiveDate};

/// Length of the chart window, inclusive of the boundary day.
pub const TRAILING_WINDOW_DAYS: i64 = 365;

/// Round half away from zero to 2 decimal places.
pub fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Contract notional in whole currency units; fractions are dropped, not rounded.
pub fn contract_value(last_price: f64, lot_size: u32) -> i64 {
    (last_price * f64::from(lot_size)).trunc() as i64
}

/// `(ath - last) / ath * 100`, rounded. `None` when `ath` is zero.
pub fn percent_below_ath(last_price: f64, all_time_high: f64) -> Option<f64> {
    if all_time_high == 0.0 {
        return None;
    }
    if last_price == all_time_high {
        return Some(0.0);
    }
    Some(round2((all_time_high - last_price) / all_time_high * 100.0))
}

/// First date that still falls inside the trailing window for `as_of`.
pub fn window_start(as_of: NaiveDate) -> NaiveDate {
    as_of - Duration::days(TRAILING_WINDOW_DAYS)
}

/// The row shown when a symbol has no usable data or its fetch failed.
pub fn compute_unavailable(entry: &CatalogEntry) -> RowRecord {
    RowRecord {
        display_name: entry.display_name.clone(),
        lot_size: entry.lot_size,
        metrics: None,
    }
}

pub fn compute_row(entry: &CatalogEntry, history: &PriceHistory, as_of: NaiveDate) -> RowRecord {
    // Bars missing a finite close or high take no part in any figure.
    let bars: Vec<&DailyBar> = history.bars().iter().filter(|b| b.is_complete()).collect();

    let Some(last) = bars.last() else {
        return compute_unavailable(entry);
    };

    // Every remaining bar is complete, so the fallback is unreachable.
    let last_close = last.close.unwrap_or(f64::NAN);
    let all_time_high = bars
        .iter()
        .filter_map(|b| b.high)
        .fold(f64::NEG_INFINITY, f64::max);

    let cutoff = window_start(as_of);
    let trailing_window = bars
        .iter()
        .filter(|b| b.date >= cutoff)
        .map(|b| **b)
        .collect();

    RowRecord {
        display_name: entry.display_name.clone(),
        lot_size: entry.lot_size,
        metrics: Some(RowMetrics {
            last_price: round2(last_close),
            all_time_high,
            percent_below_ath: percent_below_ath(last_close, all_time_high),
            contract_value: contract_value(last_close, entry.lot_size),
            trailing_window,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn entry(lot: u32) -> CatalogEntry {
        CatalogEntry::new("X", "X.NS", lot)
    }

    #[test]
    fn test_end_to_end_row() {
        let h = PriceHistory::new(vec![
            DailyBar::close_high(date("2024-03-01"), 10.0, 12.0),
            DailyBar::close_high(date("2024-03-04"), 11.0, 12.0),
        ]);
        let row = compute_row(&entry(100), &h, date("2024-03-04"));
        let m = row.metrics.expect("available");
        assert_eq!(m.last_price, 11.0);
        assert_eq!(m.all_time_high, 12.0);
        assert_eq!(m.percent_below_ath, Some(8.33));
        assert_eq!(m.contract_value, 1100);
        assert_eq!(m.trailing_window.len(), 2);
    }

    #[test]
    fn test_empty_history_is_unavailable() {
        let row = compute_row(&entry(75), &PriceHistory::empty(), date("2024-03-04"));
        assert_eq!(row.display_name, "X");
        assert_eq!(row.lot_size, 75);
        assert!(row.metrics.is_none());
    }

    #[test]
    fn test_missing_high_series_is_unavailable() {
        let bars = (1..=5)
            .map(|d| DailyBar {
                date: NaiveDate::from_ymd_opt(2024, 1, d).unwrap(),
                open: Some(1.0),
                high: None,
                low: Some(1.0),
                close: Some(1.0),
                volume: Some(10),
            })
            .collect();
        let row = compute_row(&entry(1), &PriceHistory::new(bars), date("2024-01-05"));
        assert!(!row.is_available());
    }

    #[test]
    fn test_incomplete_trailing_bar_is_skipped() {
        let mut gap = DailyBar::close_high(date("2024-01-03"), 0.0, 0.0);
        gap.close = None;
        let h = PriceHistory::new(vec![
            DailyBar::close_high(date("2024-01-02"), 50.0, 55.0),
            gap,
        ]);
        let m = compute_row(&entry(2), &h, date("2024-01-03")).metrics.unwrap();
        assert_eq!(m.last_price, 50.0);
        assert_eq!(m.contract_value, 100);
    }

    #[test]
    fn test_contract_value_truncates() {
        assert_eq!(contract_value(99.999, 2), 199);
        assert_eq!(contract_value(1234.56, 0), 0);
        assert_eq!(contract_value(0.5, 1), 0);
    }

    #[test]
    fn test_contract_value_uses_unrounded_close() {
        let h = PriceHistory::new(vec![DailyBar::close_high(date("2024-01-02"), 99.999, 120.0)]);
        let m = compute_row(&entry(2), &h, date("2024-01-02")).metrics.unwrap();
        assert_eq!(m.last_price, 100.0);
        assert_eq!(m.contract_value, 199);
    }

    #[test]
    fn test_zero_ath_guards_division() {
        let h = PriceHistory::new(vec![DailyBar::close_high(date("2024-01-02"), 0.0, 0.0)]);
        let m = compute_row(&entry(100), &h, date("2024-01-02")).metrics.unwrap();
        assert_eq!(m.last_price, 0.0);
        assert_eq!(m.all_time_high, 0.0);
        assert_eq!(m.percent_below_ath, None);
        assert_eq!(m.contract_value, 0);
    }

    #[test]
    fn test_percent_zero_at_high_and_bounded_below() {
        assert_eq!(percent_below_ath(250.0, 250.0), Some(0.0));
        for last in [0.0, 1.0, 49.5, 99.99, 100.0] {
            let p = percent_below_ath(last, 100.0).unwrap();
            assert!((0.0..=100.0).contains(&p), "{last} -> {p}");
        }
        assert!(percent_below_ath(99.99, 100.0).unwrap() > 0.0);
    }

    #[test]
    fn test_ath_spans_full_history() {
        let h = PriceHistory::new(vec![
            DailyBar::close_high(date("2015-06-01"), 180.0, 200.0),
            DailyBar::close_high(date("2024-06-03"), 90.0, 95.0),
        ]);
        let m = compute_row(&entry(1), &h, date("2024-06-03")).metrics.unwrap();
        assert_eq!(m.all_time_high, 200.0);
        assert_eq!(m.percent_below_ath, Some(55.0));
        assert_eq!(m.trailing_window.len(), 1);
    }

    #[test]
    fn test_trailing_window_includes_boundary_day() {
        let as_of = date("2024-06-30");
        let h = PriceHistory::new(vec![
            DailyBar::close_high(window_start(as_of) - Duration::days(1), 1.0, 1.0),
            DailyBar::close_high(window_start(as_of), 2.0, 2.0),
            DailyBar::close_high(as_of, 3.0, 3.0),
        ]);
        let m = compute_row(&entry(1), &h, as_of).metrics.unwrap();
        let closes: Vec<_> = m.trailing_window.iter().filter_map(|b| b.close).collect();
        assert_eq!(closes, vec![2.0, 3.0]);
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(8.333333), 8.33);
        assert_eq!(round2(2.675_1), 2.68);
        assert_eq!(round2(-1.005_1), -1.01);
    }
}
