use thiserror::Error;

/// Failures of a market-data source. The pipeline turns every one of these
/// into an unavailable row; they never abort a cycle.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} for {url}")]
    Status { status: u16, url: String },

    #[error("timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("unexpected response format: {0}")]
    Format(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl FetchError {
    /// Worth another attempt: rate limiting, server trouble, transport errors.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            FetchError::Status { status, .. } => *status == 429 || *status >= 500,
            FetchError::Timeout { .. } => true,
            _ => false,
        }
    }
}

/// Rejected ranking requests. These are caller mistakes, not data conditions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RankError {
    #[error("unknown sort key '{0}' (expected none, contract-value or percent-below-ath)")]
    InvalidSortKey(String),

    #[error("unknown sort direction '{0}' (expected ascending or descending)")]
    InvalidDirection(String),
}
