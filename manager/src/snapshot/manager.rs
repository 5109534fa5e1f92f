// File: manager/src/snapshot/manager.rs
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::config::Config;
use crate::errors::{ItemFailure, ZsnapError};
use crate::inventory::{Inventory, Snapshot};
use crate::naming::{self, SnapshotKind};
use crate::storage::Storage;

#[derive(Debug, Clone, Default, Serialize)]
pub struct SnapshotReport {
    pub label: String,
    pub created: Vec<String>,
    /// Unmounted datasets, and datasets of pools with snapshots disabled
    pub skipped: Vec<String>,
    pub failures: Vec<ItemFailure>,
}

impl SnapshotReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CleanupReport {
    pub pool: String,
    pub retention_hours: u32,
    pub destroyed: Vec<String>,
    /// Automatic snapshots still inside the retention window
    pub retained: usize,
    /// Markers and externally created snapshots, never considered
    pub ignored: usize,
    /// Held or cloned snapshots; reported but not a command failure
    pub busy: Vec<ItemFailure>,
    pub failures: Vec<ItemFailure>,
}

impl CleanupReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct SnapshotManager<S> {
    config: Arc<Config>,
    storage: Arc<S>,
}

impl<S: Storage> SnapshotManager<S> {
    pub fn new(config: Arc<Config>, storage: Arc<S>) -> Self {
        Self { config, storage }
    }

    /// Snapshot every mounted dataset under `roots` (all pools when empty).
    ///
    /// Replication targets are kept unmounted, which is what keeps them out of this rotation.
    #[instrument(skip(self, now))]
    pub async fn snapshot_all(
        &self,
        roots: &[String],
        now: DateTime<Utc>,
    ) -> Result<SnapshotReport, ZsnapError> {
        let datasets = Inventory::new(self.storage.as_ref()).list_datasets(roots).await?;
        let label = naming::automatic_label(now);

        let mut report = SnapshotReport {
            label: label.clone(),
            ..Default::default()
        };

        for dataset in datasets {
            if !dataset.mounted {
                debug!("Skipping unmounted dataset {}", dataset.name);
                report.skipped.push(dataset.name);
                continue;
            }

            if !self.config.snapshots_enabled(dataset.pool()) {
                debug!("Skipping {} (snapshots disabled for pool {})", dataset.name, dataset.pool());
                report.skipped.push(dataset.name);
                continue;
            }

            match self.storage.create_snapshot(&dataset.name, &label, false).await {
                Ok(()) => report.created.push(format!("{}@{}", dataset.name, label)),
                Err(e) => {
                    let target = format!("{}@{}", dataset.name, label);
                    warn!("Failed to create snapshot -> {}: {}", target, e);
                    report.failures.push(ItemFailure::from_agent(target, &e));
                }
            }
        }

        info!(
            "Snapshot run {}: {} created, {} skipped, {} failed",
            label,
            report.created.len(),
            report.skipped.len(),
            report.failures.len()
        );
        Ok(report)
    }

    /// Destroy automatic snapshots under `pool` older than `retention_hours`.
    ///
    /// Scoped to one pool so a replication destination can keep a longer history than its
    /// source. Markers and foreign snapshots are never touched.
    #[instrument(skip(self, now))]
    pub async fn cleanup_pool(
        &self,
        pool: &str,
        retention_hours: u32,
        now: DateTime<Utc>,
    ) -> Result<CleanupReport, ZsnapError> {
        if retention_hours == 0 {
            return Err(ZsnapError::Config(
                "Retention must be at least 1 hour".to_string(),
            ));
        }

        let snapshots = Inventory::new(self.storage.as_ref()).snapshots_under(pool).await?;

        let mut report = CleanupReport {
            pool: pool.to_string(),
            retention_hours,
            ..Default::default()
        };

        for snapshot in snapshots {
            let SnapshotKind::Automatic { taken_at } = snapshot.kind else {
                report.ignored += 1;
                continue;
            };

            if !naming::expired_at(taken_at, retention_hours, now) {
                report.retained += 1;
                continue;
            }

            let name = snapshot.full_name();
            match self
                .storage
                .destroy_snapshot(&snapshot.dataset, &snapshot.label, false)
                .await
            {
                Ok(()) => report.destroyed.push(name),
                Err(e) if e.is_busy() => {
                    warn!("Snapshot {} is held or cloned, leaving it: {}", name, e);
                    report.busy.push(ItemFailure::from_agent(name, &e));
                }
                Err(e) => {
                    warn!("Failed to remove snapshot -> {}: {}", name, e);
                    report.failures.push(ItemFailure::from_agent(name, &e));
                }
            }
        }

        info!(
            "Cleanup of {} ({}h): {} destroyed, {} retained, {} busy, {} failed",
            pool,
            retention_hours,
            report.destroyed.len(),
            report.retained,
            report.busy.len(),
            report.failures.len()
        );
        Ok(report)
    }

    /// Every snapshot under `pool`, grouped by dataset, oldest first.
    pub async fn list_snapshots(&self, pool: &str) -> Result<Vec<Snapshot>, ZsnapError> {
        Inventory::new(self.storage.as_ref()).snapshots_under(pool).await
    }
}

impl<S> Clone for SnapshotManager<S> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            storage: self.storage.clone(),
        }
    }
}
