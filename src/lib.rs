//! NIFTY top-ten snapshot: per-symbol price metrics and ranking over a
//! pluggable market-data source.

pub mod config;
pub mod error;
pub mod loader;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod provider;
pub mod ranking;
pub mod report;
pub mod utils;

pub use error::{FetchError, RankError};
pub use metrics::{compute_row, compute_unavailable};
pub use models::{CatalogEntry, DailyBar, PriceHistory, RowMetrics, RowRecord};
pub use ranking::{Direction, SortKey, rank};
