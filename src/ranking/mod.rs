//! Ranking stage: orders a borrowed view of the rows without touching them.

use crate::error::RankError;
use crate::models::RowRecord;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SortKey {
    /// Catalog order.
    #[default]
    None,
    ContractValue,
    PercentBelowAth,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Direction {
    Ascending,
    #[default]
    Descending,
}

impl SortKey {
    fn value(self, row: &RowRecord) -> Option<f64> {
        match self {
            SortKey::None => None,
            SortKey::ContractValue => row.contract_value().map(|v| v as f64),
            SortKey::PercentBelowAth => row.percent_below_ath(),
        }
    }
}

impl FromStr for SortKey {
    type Err = RankError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "none" => Ok(SortKey::None),
            "contract-value" | "contract" => Ok(SortKey::ContractValue),
            "percent-below-ath" | "ath" | "pct-below-ath" => Ok(SortKey::PercentBelowAth),
            _ => Err(RankError::InvalidSortKey(s.to_string())),
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SortKey::None => "none",
            SortKey::ContractValue => "contract-value",
            SortKey::PercentBelowAth => "percent-below-ath",
        })
    }
}

impl TryFrom<String> for SortKey {
    type Error = RankError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<SortKey> for String {
    fn from(k: SortKey) -> Self {
        k.to_string()
    }
}

impl FromStr for Direction {
    type Err = RankError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ascending" | "asc" => Ok(Direction::Ascending),
            "descending" | "desc" => Ok(Direction::Descending),
            _ => Err(RankError::InvalidDirection(s.to_string())),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Direction::Ascending => "ascending",
            Direction::Descending => "descending",
        })
    }
}

impl TryFrom<String> for Direction {
    type Error = RankError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Direction> for String {
    fn from(d: Direction) -> Self {
        d.to_string()
    }
}

/// Orders `rows` by `key`. The sort is stable, and rows lacking the chosen
/// field always trail, whatever the direction.
pub fn rank(rows: &[RowRecord], key: SortKey, direction: Direction) -> Vec<&RowRecord> {
    if key == SortKey::None {
        return rows.iter().collect();
    }

    let (mut known, unknown): (Vec<(f64, &RowRecord)>, Vec<(f64, &RowRecord)>) = rows
        .iter()
        .map(|r| (key.value(r).unwrap_or(f64::NAN), r))
        .partition(|(v, _)| !v.is_nan());

    known.sort_by(|(a, _), (b, _)| {
        let ord = a.partial_cmp(b).unwrap_or(Ordering::Equal);
        match direction {
            Direction::Ascending => ord,
            Direction::Descending => ord.reverse(),
        }
    });

    known
        .into_iter()
        .chain(unknown)
        .map(|(_, r)| r)
        .collect()
}

/// String-keyed entry point for hosts that take the selection as text.
pub fn rank_by_name<'a>(
    rows: &'a [RowRecord],
    key: &str,
    direction: &str,
) -> Result<Vec<&'a RowRecord>, RankError> {
    Ok(rank(rows, key.parse()?, direction.parse()?))
}
