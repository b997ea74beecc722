use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use nifty_snapshot::config::AppConfig;
use nifty_snapshot::loader::CsvDirSource;
use nifty_snapshot::pipeline::Pipeline;
use nifty_snapshot::provider::{CachedSource, MarketDataSource, YahooSource};
use nifty_snapshot::ranking::{Direction, SortKey};
use nifty_snapshot::{report, utils};

#[derive(Parser)]
#[command(name = "nifty-snapshot", about = "NIFTY top-10 price snapshot", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Args, Clone)]
struct ViewArgs {
    /// Sort key: none, contract-value, percent-below-ath
    #[arg(short, long, env = "NIFTY_SORT")]
    sort: Option<String>,

    /// Sort direction: ascending, descending
    #[arg(short, long)]
    direction: Option<String>,

    /// Read histories from <DIR>/<SYMBOL>.csv instead of Yahoo Finance
    #[arg(long)]
    csv_dir: Option<PathBuf>,

    /// Print rows as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch, compute and print one snapshot
    Snapshot {
        #[command(flatten)]
        view: ViewArgs,

        /// Evaluate the chart window as of this date (YYYY-MM-DD); defaults to today
        #[arg(long)]
        as_of: Option<NaiveDate>,
    },

    /// Re-render the snapshot on an interval (histories cached per TTL)
    Watch {
        #[command(flatten)]
        view: ViewArgs,

        /// Seconds between cycles (default: dashboard.refresh_secs)
        #[arg(long)]
        every: Option<u64>,
    },

    /// List the configured symbols and lot sizes
    Catalog {
        /// Also report which symbols have a <SYMBOL>.csv file in <DIR>
        #[arg(long)]
        csv_dir: Option<PathBuf>,
    },
}

/// Sort selection for this run: CLI flags first, then config.
fn resolve_order(view: &ViewArgs, config: &AppConfig) -> Result<(SortKey, Direction)> {
    let key = match &view.sort {
        Some(s) => s.parse::<SortKey>()?,
        None => config.dashboard.sort_key,
    };
    let direction = match &view.direction {
        Some(d) => d.parse::<Direction>()?,
        None => config.dashboard.direction,
    };
    Ok((key, direction))
}

fn build_source(view: &ViewArgs, config: &AppConfig) -> Result<Arc<dyn MarketDataSource>> {
    let ttl = Duration::from_secs(config.cache.ttl_secs);
    let source: Arc<dyn MarketDataSource> = match &view.csv_dir {
        Some(dir) => {
            info!("Reading histories from {:?}", dir);
            Arc::new(CachedSource::new(CsvDirSource::new(dir.clone()), ttl))
        }
        None => Arc::new(CachedSource::new(
            YahooSource::new(&config.provider).context("Failed to build Yahoo client")?,
            ttl,
        )),
    };
    Ok(source)
}

fn print_snapshot(
    snapshot: &nifty_snapshot::pipeline::Snapshot,
    key: SortKey,
    direction: Direction,
    json: bool,
    config: &AppConfig,
) -> Result<()> {
    let rows = snapshot.ranked(key, direction);
    if json {
        println!("{}", report::render_json(snapshot, rows, key, direction)?);
    } else {
        println!("📊 NIFTY Top 10 Equal Weight – Snapshot ({})", snapshot.as_of);
        if key != SortKey::None {
            println!("   sorted by {} ({})", key, direction);
        }
        println!();
        print!("{}", report::render_table(&rows, config.dashboard.sparkline_width));
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "nifty_snapshot=info,warn",
        1 => "nifty_snapshot=debug,info",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().compact().with_target(false).with_writer(std::io::stderr))
        .with(EnvFilter::new(filter))
        .init();

    let config = AppConfig::load()?;

    match cli.command {
        Command::Snapshot { view, as_of } => {
            let (key, direction) = resolve_order(&view, &config)?;
            let pipeline = Pipeline::new(&config, build_source(&view, &config)?);

            let snapshot = {
                let _t = utils::Timer::start("Snapshot cycle");
                match as_of {
                    Some(date) => pipeline.run(date).await,
                    None => pipeline.run_now().await,
                }
            };
            print_snapshot(&snapshot, key, direction, view.json, &config)?;
        }

        Command::Watch { view, every } => {
            let (key, direction) = resolve_order(&view, &config)?;
            let pipeline = Pipeline::new(&config, build_source(&view, &config)?);
            let period = Duration::from_secs(every.unwrap_or(config.dashboard.refresh_secs).max(1));

            let cycles = pipeline
                .watch(period, tokio::signal::ctrl_c(), |snapshot| {
                    print_snapshot(snapshot, key, direction, view.json, &config)
                })
                .await?;
            info!("Interrupted after {} cycles", cycles);
        }

        Command::Catalog { csv_dir } => {
            let on_disk = match &csv_dir {
                Some(dir) => Some(CsvDirSource::new(dir.clone()).available_symbols()?),
                None => None,
            };

            println!("─────────────────────────────────────────────────");
            println!("  {:<12} {:<16} {:>8} {:>7}", "Stock", "Provider", "Lot", "CSV");
            println!("─────────────────────────────────────────────────");
            for e in &config.catalog {
                let csv = match &on_disk {
                    Some(found) if found.contains(&e.provider_symbol) => "yes",
                    Some(_) => "missing",
                    None => "",
                };
                println!(
                    "  {:<12} {:<16} {:>8} {:>7}",
                    e.display_name, e.provider_symbol, e.lot_size, csv
                );
            }
            println!("─────────────────────────────────────────────────");

            if let (Some(found), Some(dir)) = (&on_disk, &csv_dir) {
                let covered = config
                    .catalog
                    .iter()
                    .filter(|e| found.contains(&e.provider_symbol))
                    .count();
                println!("  {}/{} symbols have a CSV in {:?}", covered, config.catalog.len(), dir);
            }
        }
    }

    Ok(())
}
