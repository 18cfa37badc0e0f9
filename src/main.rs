use chrono::NaiveDate;
use clap::{Parser, ValueEnum};
use escrow_broker::application::engine::EscrowEngine;
use escrow_broker::application::reporting::ReportFilter;
use escrow_broker::config::Config;
use escrow_broker::domain::account::AccountId;
use escrow_broker::domain::ports::SharedLedgerStore;
use escrow_broker::infrastructure::in_memory::InMemoryLedgerStore;
use escrow_broker::interfaces::csv::command_reader::CommandReader;
use escrow_broker::interfaces::csv::report_writer::ReportWriter;
use escrow_broker::interfaces::csv::script_runner::ScriptRunner;
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum Report {
    /// Every stored account with balance and reputation
    #[default]
    Accounts,
    /// Most recently created deals
    Recent,
    /// Paid deals with a running total
    History,
    /// Count and turnover of paid deals
    Stats,
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input command script (CSV)
    input: PathBuf,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Report written to stdout after the script has run
    #[arg(long, value_enum, default_value_t)]
    report: Report,

    /// First payment date included in history and stats (YYYY-MM-DD)
    #[arg(long)]
    from: Option<NaiveDate>,

    /// Last payment date included in history and stats (YYYY-MM-DD)
    #[arg(long)]
    to: Option<NaiveDate>,

    /// Restrict history and stats to deals this account took part in
    #[arg(long)]
    account: Option<AccountId>,

    /// Number of deals in the recent report
    #[arg(long)]
    limit: Option<usize>,
}

#[cfg(feature = "storage-rocksdb")]
fn open_store(config: &Config) -> Result<SharedLedgerStore> {
    use escrow_broker::infrastructure::rocksdb::RocksDBStore;

    let store: SharedLedgerStore = match &config.storage.db_path {
        Some(path) => Arc::new(RocksDBStore::open(path, config.storage.sync_writes).into_diagnostic()?),
        None => Arc::new(InMemoryLedgerStore::new()),
    };
    Ok(store)
}

#[cfg(not(feature = "storage-rocksdb"))]
fn open_store(config: &Config) -> Result<SharedLedgerStore> {
    if config.storage.db_path.is_some() {
        eprintln!(
            "WARNING: Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
        );
    }
    Ok(Arc::new(InMemoryLedgerStore::new()))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::from_file(path).into_diagnostic()?,
        None => Config::default(),
    }
    .with_env()
    .into_diagnostic()?;
    if let Some(db_path) = cli.db_path {
        config.storage.db_path = Some(db_path);
    }

    let store = open_store(&config)?;
    let engine = EscrowEngine::new(store, &config).into_diagnostic()?;

    // Replay the script
    let file = File::open(&cli.input).into_diagnostic()?;
    let mut runner = ScriptRunner::new(engine.clone());
    let summary = runner.run(CommandReader::new(file).commands()).await;
    tracing::info!(
        applied = summary.applied,
        rejected = summary.rejected,
        malformed = summary.malformed,
        "script finished"
    );

    // Output the requested report
    let filter = ReportFilter {
        from: cli.from,
        to: cli.to,
        account: cli.account,
    };
    let stdout = io::stdout();
    let mut writer = ReportWriter::new(stdout.lock());
    match cli.report {
        Report::Accounts => {
            let accounts = engine.all_accounts().await.into_diagnostic()?;
            writer.write_accounts(&accounts).into_diagnostic()?;
        }
        Report::Recent => {
            let limit = cli.limit.unwrap_or(config.recent_limit);
            let deals = engine.reporting().list_recent(limit).await.into_diagnostic()?;
            writer.write_deals(&deals).into_diagnostic()?;
        }
        Report::History => {
            let history = engine.reporting().history(&filter).await.into_diagnostic()?;
            writer.write_history(&history).into_diagnostic()?;
        }
        Report::Stats => {
            let stats = engine.reporting().stats(&filter).await.into_diagnostic()?;
            writer.write_stats(&stats).into_diagnostic()?;
        }
    }

    Ok(())
}
