//! Terminal and JSON rendering of a ranked snapshot.

use crate::models::RowRecord;
use crate::pipeline::Snapshot;
use crate::ranking::{Direction, SortKey};
use crate::utils::{fmt_number, fmt_price};
use anyhow::Result;
use serde::Serialize;
use std::fmt::Write as _;

const PLACEHOLDER: &str = "—";
const BLOCKS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

pub const CAPTION: &str = "Data Source: Yahoo Finance | Timeframe: Daily";

/// Squeeze `values` into at most `width` glyphs, averaging each bucket.
pub fn sparkline(values: &[f64], width: usize) -> String {
    if values.is_empty() || width == 0 {
        return PLACEHOLDER.to_string();
    }

    let buckets = width.min(values.len());
    let points: Vec<f64> = (0..buckets)
        .map(|b| {
            let lo = b * values.len() / buckets;
            let hi = ((b + 1) * values.len() / buckets).max(lo + 1);
            let slice = &values[lo..hi];
            slice.iter().sum::<f64>() / slice.len() as f64
        })
        .collect();

    let min = points.iter().copied().fold(f64::INFINITY, f64::min);
    let max = points.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let span = max - min;

    points
        .iter()
        .map(|&p| {
            if span <= f64::EPSILON {
                BLOCKS[BLOCKS.len() / 2]
            } else {
                let idx = ((p - min) / span * (BLOCKS.len() - 1) as f64).round() as usize;
                BLOCKS[idx.min(BLOCKS.len() - 1)]
            }
        })
        .collect()
}

fn cells(row: &RowRecord, sparkline_width: usize) -> [String; 6] {
    let opt = |v: Option<String>| v.unwrap_or_else(|| PLACEHOLDER.to_string());
    [
        row.display_name.clone(),
        opt(row.last_price().map(fmt_price)),
        row.lot_size.to_string(),
        opt(row.contract_value().map(|v| format!("₹ {}", fmt_number(v)))),
        opt(row.percent_below_ath().map(|p| format!("{p:.2} %"))),
        sparkline(&row.trailing_closes(), sparkline_width),
    ]
}

fn pad(out: &mut String, cell: &str, width: usize, right: bool) {
    let fill = " ".repeat(width.saturating_sub(cell.chars().count()));
    if right {
        let _ = write!(out, "{fill}{cell}  ");
    } else {
        let _ = write!(out, "{cell}{fill}  ");
    }
}

/// Fixed-width table, one line per row, caption last.
pub fn render_table(rows: &[&RowRecord], sparkline_width: usize) -> String {
    let headers = [
        "Stock",
        "Prev Close",
        "Lot Size",
        "Contract Value (₹)",
        "% Below ATH",
        "1Y Chart",
    ];
    let body: Vec<[String; 6]> = rows.iter().map(|r| cells(r, sparkline_width)).collect();

    let mut widths = headers.map(|h| h.chars().count());
    for line in &body {
        for (w, cell) in widths.iter_mut().zip(line) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    for (i, h) in headers.into_iter().enumerate() {
        pad(&mut out, h, widths[i], false);
    }
    out = out.trim_end().to_string();
    out.push('\n');
    let total: usize = widths.iter().sum::<usize>() + 2 * (widths.len() - 1);
    out.push_str(&"─".repeat(total));
    out.push('\n');

    for line in &body {
        let mut text = String::new();
        for (i, cell) in line.iter().enumerate() {
            // numeric columns right-aligned
            pad(&mut text, cell, widths[i], (1..=4).contains(&i));
        }
        out.push_str(text.trim_end());
        out.push('\n');
    }

    out.push('\n');
    out.push_str(CAPTION);
    out.push('\n');
    out
}

#[derive(Serialize)]
struct JsonView<'a> {
    as_of: chrono::NaiveDate,
    sort_key: SortKey,
    direction: Direction,
    rows: Vec<&'a RowRecord>,
}

pub fn render_json(
    snapshot: &Snapshot,
    rows: Vec<&RowRecord>,
    sort_key: SortKey,
    direction: Direction,
) -> Result<String> {
    let view = JsonView {
        as_of: snapshot.as_of,
        sort_key,
        direction,
        rows,
    };
    Ok(serde_json::to_string_pretty(&view)?)
}
