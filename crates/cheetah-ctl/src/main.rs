//! cheetah-ctl entry point.
//!
//! Runs against an in-memory session seeded from a recorded pipeline
//! snapshot (or the empty reference program), so a reconciliation can be
//! rehearsed and its resulting state saved.

use anyhow::Context;
use cheetah_bfrt::{BfrtSession, SimSession};
use cheetah_ctl::flow::{self, Phases};
use cheetah_ctl::{pipeline, Config, Inspector, Snapshot, DEFAULT_CONFIG_PATH};
use clap::{Parser, Subcommand};
use log::{error, info};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

/// Cheetah load-balancer control plane
#[derive(Parser, Debug)]
#[command(name = "cheetah-ctl")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, default_value = "info")]
    log_level: String,

    /// JSON pipeline snapshot to start from
    #[arg(short = 's', long)]
    snapshot: Option<PathBuf>,

    /// Write the resulting pipeline state to this file
    #[arg(long)]
    save_snapshot: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Clear all tables, load static rules, reset registers and dump
    Reconcile,
    /// Clear all tables only
    Clear {
        /// Remove entries one call at a time
        #[arg(long)]
        no_batching: bool,
        /// Log progress lines at debug level
        #[arg(long)]
        quiet: bool,
    },
    /// Clear all tables and load static rules
    Load,
    /// Dump tables and registers
    Dump {
        /// Objects to dump; defaults to the configured dump list
        names: Vec<String>,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Zero the direct counters of every entry in a table
    ClearCounters { table: String },
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&args.log_level))
        .init();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default(DEFAULT_CONFIG_PATH)?,
    };

    let sim = Arc::new(open_session(args.snapshot.as_deref())?);
    let session: Arc<dyn BfrtSession> = sim.clone();
    info!("Session open on {}", session.program());

    match args.command.unwrap_or(Command::Reconcile) {
        Command::Reconcile => {
            let report = flow::run(session, &config, Phases::ALL).await?;
            print_snapshots(&report.dump, false)?;
        }
        Command::Clear { no_batching, quiet } => {
            config.reconcile.batching &= !no_batching;
            config.reconcile.verbose &= !quiet;
            let report = flow::run(session, &config, Phases::CLEAR).await?;
            println!("{}", report.cleared);
        }
        Command::Load => {
            flow::run(session, &config, Phases::LOAD).await?;
        }
        Command::Dump { names, json } => {
            let inspector = Inspector::new(session);
            let snapshots = if names.is_empty() {
                inspector
                    .dump_all(&config.dump.tables, &config.dump.registers, config.dump.from_hw)
                    .await?
            } else {
                let mut snapshots = Vec::with_capacity(names.len());
                for name in &names {
                    snapshots.push(inspector.dump(name, config.dump.from_hw).await?);
                }
                snapshots
            };
            print_snapshots(&snapshots, json)?;
        }
        Command::ClearCounters { table } => {
            let count = cheetah_ctl::clear_counters(session.as_ref(), &table).await?;
            println!("{}: reset counters on {} entries", table, count);
        }
    }

    if let Some(path) = &args.save_snapshot {
        let json = serde_json::to_string_pretty(&sim.snapshot())?;
        fs::write(path, json)
            .with_context(|| format!("failed to write snapshot {}", path.display()))?;
        info!("Pipeline state saved to {}", path.display());
    }

    Ok(())
}

fn open_session(snapshot: Option<&Path>) -> anyhow::Result<SimSession> {
    match snapshot {
        Some(path) => {
            let json = fs::read_to_string(path)
                .with_context(|| format!("failed to read snapshot {}", path.display()))?;
            SimSession::from_json(&json)
                .with_context(|| format!("invalid snapshot {}", path.display()))
        }
        None => Ok(SimSession::new(pipeline::reference_snapshot())),
    }
}

fn print_snapshots(snapshots: &[Snapshot], json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(snapshots)?);
    } else {
        for snapshot in snapshots {
            print!("{}", snapshot);
        }
    }
    Ok(())
}
