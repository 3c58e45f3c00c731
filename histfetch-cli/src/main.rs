//! histfetch CLI: fetch historical series and inspect chunk plans.
//!
//! Commands:
//! - `fetch`: fetch a configured set of identifiers and fields, project a
//!   table, optionally write it as CSV
//! - `plan`: show how a date range would be chunked and which period bucket
//!   the fallback would request

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use histfetch_core::data::chunker::DEFAULT_CHUNK_DAYS;
use histfetch_core::data::{
    plan_chunks, CsvDirProvider, DateRange, HistoryProvider, MarketDataSet, PeriodBucket,
    ProjectedTable, Selection, TracingDiagnostics, YahooProvider,
};
use histfetch_core::FetchConfig;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "histfetch",
    about = "histfetch: historical market data with fallback retrieval"
)]
struct Cli {
    /// Log filter used when RUST_LOG is unset (e.g. info, debug, histfetch_core=trace).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch series for every identifier and field, then project a table.
    Fetch {
        /// Path to a TOML fetch config.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Start date (YYYY-MM-DD).
        #[arg(long)]
        start: Option<String>,

        /// End date (YYYY-MM-DD), inclusive.
        #[arg(long)]
        end: Option<String>,

        /// Identifiers to fetch, comma separated (e.g. SPY,QQQ,AAPL).
        #[arg(long, value_delimiter = ',')]
        ids: Vec<String>,

        /// Fields to keep, comma separated (e.g. close,volume).
        #[arg(long, value_delimiter = ',')]
        fields: Vec<String>,

        /// Chunk span in days for the chunked fallback. Overrides the config.
        #[arg(long)]
        chunk_days: Option<i64>,

        /// Project only these identifiers. Defaults to all fetched.
        #[arg(long, value_delimiter = ',')]
        select_ids: Vec<String>,

        /// Project only these fields. Defaults to all fetched.
        #[arg(long, value_delimiter = ',')]
        select_fields: Vec<String>,

        /// Offline mode: read `{ID}.csv` files from this directory instead of Yahoo.
        #[arg(long)]
        csv_dir: Option<PathBuf>,

        /// Write the projected table to this CSV file.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Print the chunk plan and period bucket for a date range.
    Plan {
        /// Start date.
        #[arg(long)]
        start: String,

        /// End date, inclusive.
        #[arg(long)]
        end: String,

        /// Chunk span in days.
        #[arg(long, default_value_t = DEFAULT_CHUNK_DAYS)]
        chunk_days: i64,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Fetch {
            config,
            start,
            end,
            ids,
            fields,
            chunk_days,
            select_ids,
            select_fields,
            csv_dir,
            output,
        } => {
            let config = build_config(config, start, end, ids, fields, chunk_days)?;
            run_fetch(config, select_ids, select_fields, csv_dir, output)
        }
        Commands::Plan {
            start,
            end,
            chunk_days,
        } => run_plan(&start, &end, chunk_days),
    }
}

fn build_config(
    config_path: Option<PathBuf>,
    start: Option<String>,
    end: Option<String>,
    ids: Vec<String>,
    fields: Vec<String>,
    chunk_days: Option<i64>,
) -> Result<FetchConfig> {
    let inline = start.is_some() || end.is_some() || !ids.is_empty() || !fields.is_empty();

    let mut config = match config_path {
        Some(_) if inline => {
            bail!("--config is mutually exclusive with --start, --end, --ids and --fields")
        }
        Some(path) => FetchConfig::from_file(&path)?,
        None => {
            let (Some(start), Some(end)) = (start, end) else {
                bail!("either --config or both --start and --end are required");
            };
            FetchConfig::new(start, end, ids, fields)
        }
    };

    if let Some(days) = chunk_days {
        config.fetch.chunk_days = days;
    }
    config.validate()?;
    Ok(config)
}

fn selection(names: Vec<String>) -> Selection {
    if names.is_empty() {
        Selection::All
    } else {
        Selection::Only(names)
    }
}

fn run_fetch(
    mut config: FetchConfig,
    select_ids: Vec<String>,
    select_fields: Vec<String>,
    csv_dir: Option<PathBuf>,
    output: Option<PathBuf>,
) -> Result<()> {
    let provider: Box<dyn HistoryProvider> = match csv_dir {
        Some(dir) => {
            if !dir.is_dir() {
                bail!("CSV directory does not exist: {}", dir.display());
            }
            // Local files need no pacing.
            config.fetch.identifier_pause_ms = 0;
            config.fetch.chunk_pause_ms = 0;
            Box::new(CsvDirProvider::new(dir))
        }
        None => Box::new(YahooProvider::new()?),
    };

    tracing::info!(
        provider = provider.name(),
        start = %config.start,
        end = %config.end,
        chunk_days = config.fetch.chunk_days,
        "starting fetch"
    );

    let diagnostics = TracingDiagnostics;
    let set = MarketDataSet::fetch(provider.as_ref(), &config, &diagnostics)?;
    let table = set.project(&selection(select_fields), &selection(select_ids), &diagnostics);

    print_summary(&set, &table);

    if let Some(path) = output {
        let file = std::fs::File::create(&path)?;
        table.write_csv(std::io::BufWriter::new(file))?;
        println!("Table written to: {}", path.display());
    }

    if set.report().all_failed() {
        eprintln!("Every identifier failed; nothing was fetched.");
        std::process::exit(1);
    }

    Ok(())
}

fn print_summary(set: &MarketDataSet, table: &ProjectedTable) {
    let report = set.report();
    println!("Range:      {}", set.range());
    println!(
        "Populated:  {}/{} identifiers",
        report.populated_identifiers(),
        report.identifiers.len()
    );
    if !report.empty.is_empty() {
        println!("Empty:      {}", report.empty.join(", "));
    }
    if !report.failed.is_empty() {
        println!("Failed:     {}", report.failed.join(", "));
    }
    println!(
        "Table:      {} columns x {} rows",
        table.len(),
        table.row_count()
    );
    for name in table.column_names() {
        println!("  {name}");
    }
}

fn run_plan(start: &str, end: &str, chunk_days: i64) -> Result<()> {
    if chunk_days <= 0 {
        bail!("--chunk-days must be positive");
    }
    let range = DateRange::parse(start, end)?;
    let chunks = plan_chunks(range, chunk_days);

    println!("Range:  {range} ({} days)", range.days());
    if chunks.is_empty() {
        println!("Start is after end; nothing to fetch.");
        return Ok(());
    }
    println!("Chunks: {} of up to {chunk_days} days", chunks.len());
    for (i, chunk) in chunks.iter().enumerate() {
        println!("  {:>3}  {chunk}", i + 1);
    }
    println!("Period fallback: {}", PeriodBucket::for_days(range.days()));

    Ok(())
}
