// File: manager/src/cli.rs
use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use zsnap_agent::ZfsCli;

use crate::config::{Config, ConfigManager};
use crate::constants::config::{CONFIG_DIR_ENV, DEFAULT_CONFIG_DIR};
use crate::inventory::Snapshot;
use crate::replication::{ReplicationEngine, ReplicationReport};
use crate::snapshot::{CleanupReport, SnapshotManager, SnapshotReport};

#[derive(Parser, Debug)]
#[command(name = "zsnap")]
#[command(about = "ZFS snapshot rotation and local replication", long_about = None)]
pub struct Cli {
    /// Log mutating zfs commands instead of running them
    #[arg(short = 'n', long, global = true)]
    pub dry_run: bool,

    /// Configuration directory
    #[arg(short, long, global = true, env = CONFIG_DIR_ENV, default_value = DEFAULT_CONFIG_DIR)]
    pub config: PathBuf,

    /// Print the command report as JSON on stdout
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Snapshot every mounted filesystem (all pools when none given)
    #[command(name = "snapshot")]
    Snapshot { filesystems: Vec<String> },

    /// Destroy automatic snapshots of a pool older than the retention window
    #[command(name = "snapshot_cleanup")]
    SnapshotCleanup {
        pool: String,
        retention_hours: Option<u32>,
    },

    /// Full transfer into a destination that does not exist yet
    #[command(name = "init_repl")]
    InitRepl { source: String, destination: String },

    /// Incremental transfer from the latest common marker
    #[command(name = "repl")]
    Repl { source: String, destination: String },

    /// Every snapshot under a pool with its kind and timestamp
    #[command(name = "list_snapshots")]
    ListSnapshots { pool: String },
}

/// Loads the configuration and applies command line overrides.
pub async fn load_config(cli: &Cli) -> Result<Arc<Config>> {
    let manager = ConfigManager::new(&cli.config).await?;
    let mut config = (*manager.get_current_config()).clone();
    if cli.dry_run {
        config.dry_run = true;
    }
    Ok(Arc::new(config))
}

/// Runs one command against the host's zfs. Returns whether it succeeded.
pub async fn run(cli: Cli, now: DateTime<Utc>) -> Result<bool> {
    let config = load_config(&cli).await?;
    let storage = Arc::new(ZfsCli::new(config.zfs_binary.clone(), config.dry_run));

    if config.dry_run {
        info!("Dry run: mutating zfs commands are only logged");
    }

    match cli.command {
        Command::Snapshot { filesystems } => {
            let report = SnapshotManager::new(config, storage)
                .snapshot_all(&filesystems, now)
                .await?;
            print_report(cli.json, &report, render_snapshot_report)?;
            Ok(report.is_success())
        }
        Command::SnapshotCleanup {
            pool,
            retention_hours,
        } => {
            let hours = config.retention_for(&pool, retention_hours)?;
            let report = SnapshotManager::new(config, storage)
                .cleanup_pool(&pool, hours, now)
                .await?;
            print_report(cli.json, &report, render_cleanup_report)?;
            Ok(report.is_success())
        }
        Command::InitRepl {
            source,
            destination,
        } => {
            let report = ReplicationEngine::new(config, storage)
                .init_replicate(&source, &destination, now)
                .await?;
            print_report(cli.json, &report, render_replication_report)?;
            Ok(true)
        }
        Command::Repl {
            source,
            destination,
        } => {
            let report = ReplicationEngine::new(config, storage)
                .incremental_replicate(&source, &destination, now)
                .await?;
            print_report(cli.json, &report, render_replication_report)?;
            Ok(true)
        }
        Command::ListSnapshots { pool } => {
            let snapshots = SnapshotManager::new(config, storage)
                .list_snapshots(&pool)
                .await?;
            print_report(cli.json, &snapshots, |s| render_snapshot_list(s))?;
            Ok(true)
        }
    }
}

fn print_report<T: Serialize + ?Sized>(
    json: bool,
    report: &T,
    render: impl Fn(&T) -> String,
) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        print!("{}", render(report));
    }
    Ok(())
}

pub fn render_snapshot_report(report: &SnapshotReport) -> String {
    let mut out = String::new();
    for name in &report.created {
        out.push_str(&format!("created {}\n", name));
    }
    for name in &report.skipped {
        out.push_str(&format!("skipped {}\n", name));
    }
    for failure in &report.failures {
        out.push_str(&format!("failed  {}: {}\n", failure.target, failure.reason));
    }
    out
}

pub fn render_cleanup_report(report: &CleanupReport) -> String {
    let mut out = String::new();
    for name in &report.destroyed {
        out.push_str(&format!("destroyed {}\n", name));
    }
    for failure in &report.busy {
        out.push_str(&format!("busy      {}: {}\n", failure.target, failure.reason));
    }
    for failure in &report.failures {
        out.push_str(&format!("failed    {}: {}\n", failure.target, failure.reason));
    }
    out.push_str(&format!(
        "{}: {} destroyed, {} retained, {} ignored (retention {}h)\n",
        report.pool,
        report.destroyed.len(),
        report.retained,
        report.ignored,
        report.retention_hours
    ));
    out
}

pub fn render_replication_report(report: &ReplicationReport) -> String {
    let mut out = match &report.basis {
        Some(basis) => format!(
            "{} -> {}: {} .. {}\n",
            report.source, report.destination, basis, report.marker
        ),
        None => format!(
            "{} -> {}: full stream at {}\n",
            report.source, report.destination, report.marker
        ),
    };
    for name in &report.pruned {
        out.push_str(&format!("pruned {}\n", name));
    }
    for failure in &report.prune_failures {
        out.push_str(&format!("could not prune {}: {}\n", failure.target, failure.reason));
    }
    out
}

pub fn render_snapshot_list(snapshots: &[Snapshot]) -> String {
    let mut out = String::new();
    for snapshot in snapshots {
        let kind = if snapshot.is_automatic() {
            "auto"
        } else if snapshot.is_marker() {
            "marker"
        } else {
            "external"
        };
        let taken_at = snapshot
            .kind
            .taken_at()
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "-".to_string());
        out.push_str(&format!("{}\t{}\t{}\n", snapshot.full_name(), kind, taken_at));
    }
    out
}
