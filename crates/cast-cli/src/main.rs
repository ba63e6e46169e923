//! cast: thin command-line front end over `cast-engine`.
//!
//! Surfaces exactly the three operations the library exposes
//! (`index`, `sync`, `reset`); does not implement colored output, an
//! editor integration, or an interactive conflict-resolution UI (those
//! remain external collaborators).

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cast_engine::orchestrator::{self, ConflictMode};
use cast_engine::{index as engine_index, ActionLabel, SyncPolicy, VaultConfig};

#[derive(Parser, Debug)]
#[command(name = "cast")]
#[command(about = "Reconcile Markdown vaults")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Enable verbose (debug) logging.
    #[arg(long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Rebuild or incrementally update a vault's index.
    Index {
        #[arg(short, long)]
        vault: PathBuf,

        /// Force a full rebuild instead of an incremental one.
        #[arg(long)]
        rebuild: bool,

        /// Generate and inject `cast-id` for files that have a sync-managed
        /// key but none yet.
        #[arg(long, default_value_t = true)]
        auto_fix: bool,
    },

    /// Reconcile a driver vault against one or more peer vaults.
    Sync {
        #[arg(short, long)]
        vault: PathBuf,

        /// Peer vault path; may be given more than once.
        #[arg(short, long = "peer")]
        peers: Vec<PathBuf>,

        /// Force the driver vault's version at every divergent file.
        #[arg(long)]
        overpower: bool,

        /// Permit `sync -> cast` propagation in addition to `cast -> sync`.
        #[arg(long)]
        allow_sync_to_cast: bool,
    },

    /// Delete a vault's index and sync-state, keeping its configuration.
    Reset {
        #[arg(short, long)]
        vault: PathBuf,

        /// Also delete `.cast/config.yaml`.
        #[arg(long)]
        drop_config: bool,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    let filter = if args.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match args.command {
        Command::Index {
            vault,
            rebuild,
            auto_fix,
        } => run_index(&vault, rebuild, auto_fix),
        Command::Sync {
            vault,
            peers,
            overpower,
            allow_sync_to_cast,
        } => run_sync(&vault, &peers, overpower, allow_sync_to_cast),
        Command::Reset { vault, drop_config } => run_reset(&vault, !drop_config),
    }
}

fn run_index(vault: &PathBuf, rebuild: bool, auto_fix: bool) -> Result<()> {
    let config = VaultConfig::load(vault).context("loading vault configuration")?;
    let report = engine_index::build_index(vault, &config, rebuild, auto_fix)
        .context("building vault index")?;

    println!("indexed {} document(s)", report.index.len());
    for error in &report.errors {
        eprintln!("warning: {error}");
    }
    Ok(())
}

fn run_sync(vault: &PathBuf, peers: &[PathBuf], overpower: bool, allow_sync_to_cast: bool) -> Result<()> {
    let policy = SyncPolicy {
        allow_sync_to_cast,
    };

    let report = orchestrator::sync_all(
        vault,
        peers,
        overpower,
        ConflictMode::NonInteractive,
        policy,
    )
    .context("reconciling vaults")?;

    for peer in &report.peers {
        println!(
            "peer {}: synced {}, conflicts {}",
            peer.peer_id, peer.synced, peer.conflicts
        );
        for action in &peer.actions {
            println!(
                "  {:<16} {} ({})",
                label_str(action.action),
                action.relative_path.display(),
                action.doc_id
            );
        }
        for error in &peer.errors {
            eprintln!("  error: {error}");
        }
    }

    Ok(())
}

fn run_reset(vault: &PathBuf, keep_config: bool) -> Result<()> {
    orchestrator::reset(vault, keep_config).context("resetting vault state")
}

fn label_str(label: ActionLabel) -> &'static str {
    match label {
        ActionLabel::CopyToVault1 => "COPY_TO_VAULT1",
        ActionLabel::CopyToVault2 => "COPY_TO_VAULT2",
        ActionLabel::AutoMergeVault1 => "AUTO_MERGE_VAULT1",
        ActionLabel::AutoMergeVault2 => "AUTO_MERGE_VAULT2",
        ActionLabel::Overpower => "OVERPOWER",
        ActionLabel::UseVault1 => "USE_VAULT1",
        ActionLabel::UseVault2 => "USE_VAULT2",
        ActionLabel::Conflict => "CONFLICT",
        ActionLabel::Skip => "SKIP",
    }
}
