use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use sheetcount::{store::StoredCountRecord, JsonlCountStore, SheetcountConfig};
use tracing::{debug, warn};

/// Inspect a JSON-lines sheet count ledger.
#[derive(Parser, Debug)]
#[command(name = "sheetlog")]
#[command(about = "Inspect the JSON-lines ledger written by sheetcount")]
struct Args {
    /// Ledger file (defaults to persistence.path in the configuration)
    #[arg(short, long)]
    ledger: Option<PathBuf>,

    /// Path to sheetcount configuration file
    #[arg(short = 'c', long, default_value = "sheetcount.toml")]
    config: PathBuf,

    /// Print machine-readable JSON instead of text
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the most recently stored count
    Last,
    /// Print stored records, newest last
    List {
        /// Only print the newest N records
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Print record count, time range and count span
    Summary,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct LedgerSummary {
    records: usize,
    first_count: Option<u64>,
    last_count: Option<u64>,
    first_recorded_at: Option<DateTime<Utc>>,
    last_recorded_at: Option<DateTime<Utc>>,
    /// Counts missing between consecutive records (dropped or failed writes)
    missing_counts: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let args = Args::parse();
    let ledger_path = resolve_ledger_path(args.ledger.as_deref(), &args.config)?;
    debug!("Reading ledger {}", ledger_path.display());

    let records = JsonlCountStore::new(&ledger_path)
        .read_records()
        .await
        .with_context(|| format!("Failed to read ledger {}", ledger_path.display()))?;

    match args.command {
        Command::Last => {
            let last = records
                .last()
                .ok_or_else(|| anyhow!("No records in {}", ledger_path.display()))?;
            if args.json {
                println!("{}", serde_json::to_string(last)?);
            } else {
                println!("{}", last.count);
            }
        }
        Command::List { limit } => {
            for record in newest(&records, limit) {
                if args.json {
                    println!("{}", serde_json::to_string(record)?);
                } else {
                    println!(
                        "{:>8}  {:>10}  {}",
                        record.id,
                        record.count,
                        record.recorded_at.to_rfc3339()
                    );
                }
            }
        }
        Command::Summary => {
            let summary = summarize(&records);
            if args.json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print_summary(&ledger_path, &summary);
            }
        }
    }

    Ok(())
}

fn resolve_ledger_path(ledger: Option<&Path>, config_path: &Path) -> Result<PathBuf> {
    if let Some(path) = ledger {
        return Ok(path.to_path_buf());
    }

    let config = SheetcountConfig::load_from_file(config_path).with_context(|| {
        format!("Failed to load configuration {}", config_path.display())
    })?;
    Ok(PathBuf::from(config.persistence.path))
}

fn newest(records: &[StoredCountRecord], limit: Option<usize>) -> &[StoredCountRecord] {
    match limit {
        Some(limit) if limit < records.len() => &records[records.len() - limit..],
        _ => records,
    }
}

fn summarize(records: &[StoredCountRecord]) -> LedgerSummary {
    let mut missing_counts = 0;
    for pair in records.windows(2) {
        let (prev, cur) = (&pair[0], &pair[1]);
        if cur.count > prev.count + 1 {
            missing_counts += cur.count - prev.count - 1;
        } else if cur.count <= prev.count {
            warn!(
                "Count did not increase between records {} and {} ({} -> {})",
                prev.id, cur.id, prev.count, cur.count
            );
        }
    }

    LedgerSummary {
        records: records.len(),
        first_count: records.first().map(|r| r.count),
        last_count: records.last().map(|r| r.count),
        first_recorded_at: records.first().map(|r| r.recorded_at),
        last_recorded_at: records.last().map(|r| r.recorded_at),
        missing_counts,
    }
}

fn print_summary(path: &Path, summary: &LedgerSummary) {
    println!("Ledger:   {}", path.display());
    println!("Records:  {}", summary.records);

    match (summary.first_count, summary.last_count) {
        (Some(first), Some(last)) => println!("Counts:   {} .. {}", first, last),
        _ => println!("Counts:   -"),
    }

    match (summary.first_recorded_at, summary.last_recorded_at) {
        (Some(first), Some(last)) => {
            println!("From:     {}", first.to_rfc3339());
            println!("To:       {}", last.to_rfc3339());
        }
        _ => println!("From:     -"),
    }

    println!("Missing:  {}", summary.missing_counts);
}
