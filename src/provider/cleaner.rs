//! Lenient field parsing for hand-exported price files.

use chrono::NaiveDate;

// ── Parsers ───────────────────────────────────────────────────────────────────

fn is_placeholder(s: &str) -> bool {
    s.is_empty()
        || s.eq_ignore_ascii_case("n/a")
        || s.eq_ignore_ascii_case("nan")
        || s.eq_ignore_ascii_case("null")
        || s == "-"
        || s == "—"
}

/// Parse price: strip everything except digits, dot, minus.
/// "₹ 1,234.56" → 1234.56 | "610.00" → 610.0 | "null" → None
pub fn parse_price(s: &str) -> Option<f64> {
    let s = s.trim();
    if is_placeholder(s) {
        return None;
    }
    let cleaned: String = s
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    cleaned.parse().ok().filter(|v: &f64| v.is_finite())
}

/// Parse volume with K/M/B suffixes.
/// "1.2M" → 1,200,000 | "345K" → 345,000 | "12345" → 12345
pub fn parse_volume(s: &str) -> Option<u64> {
    let s = s.trim().to_uppercase().replace(',', "");
    if is_placeholder(&s) {
        return None;
    }

    let (num_str, multiplier) = if let Some(n) = s.strip_suffix('B') {
        (n, 1_000_000_000.0)
    } else if let Some(n) = s.strip_suffix('M') {
        (n, 1_000_000.0)
    } else if let Some(n) = s.strip_suffix('K') {
        (n, 1_000.0)
    } else {
        // Plain number, possibly exported as "12345.0"
        let num: f64 = s.parse().ok()?;
        return (num >= 0.0).then_some(num as u64);
    };

    let num: f64 = num_str.trim().parse().ok()?;
    (num >= 0.0).then(|| (num * multiplier) as u64)
}

/// Dates: ISO first, then the common spreadsheet/export layouts.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    // "2024-02-20 00:00:00+05:30" style exports keep the date in the first token
    let s = s.split_whitespace().next().filter(|t| t.contains('-')).unwrap_or(s);

    ["%Y-%m-%d", "%b %d, %Y", "%d/%m/%Y", "%d-%b-%Y", "%d %b %Y"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
