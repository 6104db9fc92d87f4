use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;
use user_records_cli::{Prompter, Session};
use user_records_core::{EventLog, RecordStore};
use user_records_store_sqlite::SqliteSink;

#[derive(Debug, Parser)]
#[command(name = "urec")]
#[command(about = "User Data Management System")]
struct Cli {
    /// JSON file holding the user records.
    #[arg(long, default_value = "user_data.txt")]
    file: PathBuf,

    /// SQLite database mirroring the records.
    #[arg(long, default_value = "./user_records.sqlite3")]
    db: PathBuf,

    #[arg(long, default_value_t = 3000)]
    exit_delay_ms: u64,

    /// Tracing filter used when `RUST_LOG` is not set.
    #[arg(long, default_value = "error")]
    log_filter: String,
}

fn init_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    if let Err(err) = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init()
    {
        eprintln!("failed to install tracing subscriber: {err}");
    }
}

fn run(cli: &Cli) -> Result<()> {
    println!("Initializing with file: {}", cli.file.display());
    let store = RecordStore::load(&cli.file)
        .with_context(|| format!("failed to load {}", cli.file.display()))?;
    println!("Existing data loaded from {}", cli.file.display());
    tracing::info!(records = store.len(), path = %cli.file.display(), "record store loaded");

    // A sink that cannot be prepared is reported, not fatal.
    let sink = SqliteSink::new(cli.db.clone());
    if let Err(err) = sink.ensure_schema() {
        let message = format!("Failed to prepare database {}: {err:#}", cli.db.display());
        sink.error(&message);
        println!("{message}");
    }

    let stdin = io::stdin();
    let prompter = Prompter::new(stdin.lock(), io::stdout().lock());
    let mut session = Session::new(prompter, store, cli.file.clone(), &sink, &sink)
        .with_exit_pause(Duration::from_millis(cli.exit_delay_ms));
    session.run()
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli.log_filter);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %format!("{err:#}"), "session ended with an error");
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
