use crate::models::CatalogEntry;
use crate::ranking::{Direction, SortKey};
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Top-level application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub dashboard: DashboardConfig,
    #[serde(default = "default_catalog")]
    pub catalog: Vec<CatalogEntry>,
}

/// Market-data provider configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_range")]
    pub range: String,

    #[serde(default = "default_interval")]
    pub interval: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,

    #[serde(default = "default_jitter_ms")]
    pub jitter_ms: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// History cache configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

/// Pipeline configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
}

/// Presentation defaults; CLI flags override them per run.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DashboardConfig {
    #[serde(default)]
    pub sort_key: SortKey,

    #[serde(default)]
    pub direction: Direction,

    #[serde(default = "default_sparkline_width")]
    pub sparkline_width: usize,

    #[serde(default = "default_refresh_secs")]
    pub refresh_secs: u64,
}

// ── Defaults ─────────────────────────────────────────────────────────────────

fn default_base_url() -> String {
    "https://query1.finance.yahoo.com/v8/finance/chart".to_string()
}
fn default_range() -> String {
    "max".to_string()
}
fn default_interval() -> String {
    "1d".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_request_delay_ms() -> u64 {
    250
}
fn default_jitter_ms() -> u64 {
    250
}
fn default_max_retries() -> u32 {
    3
}
fn default_user_agent() -> String {
    "Mozilla/5.0 (X11; Linux x86_64) nifty-snapshot/0.1".to_string()
}
fn default_ttl_secs() -> u64 {
    3600
}
fn default_concurrency() -> usize {
    3
}
fn default_fetch_timeout_secs() -> u64 {
    45
}
fn default_sparkline_width() -> usize {
    24
}
fn default_refresh_secs() -> u64 {
    300
}

/// NIFTY top ten, one standard lot of 100 each.
fn default_catalog() -> Vec<CatalogEntry> {
    [
        "RELIANCE", "TCS", "HDFCBANK", "INFY", "ICICIBANK",
        "HINDUNILVR", "ITC", "LT", "SBIN", "BHARTIARTL",
    ]
    .into_iter()
    .map(|name| CatalogEntry::new(name, format!("{name}.NS"), 100))
    .collect()
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            range: default_range(),
            interval: default_interval(),
            timeout_secs: default_timeout_secs(),
            request_delay_ms: default_request_delay_ms(),
            jitter_ms: default_jitter_ms(),
            max_retries: default_max_retries(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { ttl_secs: default_ttl_secs() }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
        }
    }
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            sort_key: SortKey::default(),
            direction: Direction::default(),
            sparkline_width: default_sparkline_width(),
            refresh_secs: default_refresh_secs(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            provider: ProviderConfig::default(),
            cache: CacheConfig::default(),
            pipeline: PipelineConfig::default(),
            dashboard: DashboardConfig::default(),
            catalog: default_catalog(),
        }
    }
}

// ── Loader ───────────────────────────────────────────────────────────────────

impl AppConfig {
    /// Load configuration from file + environment overrides
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        let cfg = config::Config::builder()
            .add_source(
                config::File::with_name("config/default")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(
                config::File::with_name("config/local")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(config::Environment::with_prefix("NIFTY").separator("__"))
            .build()?;

        let app_cfg: AppConfig = cfg
            .try_deserialize()
            .context("Invalid configuration")?;
        app_cfg.validate()?;
        Ok(app_cfg)
    }

    /// Display names and provider symbols must each be unique.
    pub fn validate(&self) -> Result<()> {
        if self.catalog.is_empty() {
            bail!("catalog is empty");
        }
        let mut names = HashSet::new();
        let mut symbols = HashSet::new();
        for e in &self.catalog {
            if e.display_name.trim().is_empty() || e.provider_symbol.trim().is_empty() {
                bail!("catalog entry with empty name or symbol: {:?}", e);
            }
            if !names.insert(e.display_name.as_str()) {
                bail!("duplicate display name in catalog: {}", e.display_name);
            }
            if !symbols.insert(e.provider_symbol.as_str()) {
                bail!("duplicate provider symbol in catalog: {}", e.provider_symbol);
            }
        }
        if self.pipeline.concurrency == 0 {
            bail!("pipeline.concurrency must be at least 1");
        }
        Ok(())
    }
}
