use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};
use zsnap_agent::{AgentError, TransferRequest};

use super::resolver::{marker_order, ReplicationResolver};
use super::{ReplicationPair, ReplicationState};
use crate::config::Config;
use crate::constants::properties;
use crate::errors::{FailureKind, ItemFailure, ZsnapError};
use crate::inventory::{Inventory, Snapshot};
use crate::naming;
use crate::storage::Storage;

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReplicationReport {
    pub source: String,
    pub destination: String,
    /// Marker the incremental stream started from; `None` for a full transfer
    pub basis: Option<String>,
    /// Marker created and transferred by this run
    pub marker: String,
    pub pruned: Vec<String>,
    pub prune_failures: Vec<ItemFailure>,
}

pub struct ReplicationEngine<S> {
    config: Arc<Config>,
    storage: Arc<S>,
}

impl<S: Storage> ReplicationEngine<S> {
    pub fn new(config: Arc<Config>, storage: Arc<S>) -> Self {
        Self { config, storage }
    }

    /// Validates the pair against the configured replication roots.
    pub fn pair(&self, source: &str, destination: &str) -> Result<ReplicationPair, ZsnapError> {
        ReplicationPair::new(source, destination, &self.config.replication.roots)
    }

    pub async fn resolve(
        &self,
        source: &str,
        destination: &str,
    ) -> Result<(ReplicationPair, ReplicationState), ZsnapError> {
        let pair = self.pair(source, destination)?;
        let state = ReplicationResolver::new(self.storage.as_ref())
            .resolve(&pair)
            .await?;
        Ok((pair, state))
    }

    /// First full transfer. Only legal while the destination does not exist.
    #[instrument(skip(self, now))]
    pub async fn init_replicate(
        &self,
        source: &str,
        destination: &str,
        now: DateTime<Utc>,
    ) -> Result<ReplicationReport, ZsnapError> {
        let (pair, state) = self.resolve(source, destination).await?;

        if state != ReplicationState::Uninitialized {
            return Err(ZsnapError::AlreadyInitialized {
                destination: pair.destination,
            });
        }

        let marker = self.create_marker(&pair, now).await?;
        let request = TransferRequest {
            base: None,
            snapshot: format!("{}@{}", pair.source, marker),
            target: pair.destination.clone(),
            flags: self.config.transfer_flags(),
        };

        self.transfer(&request).await?;
        self.enforce_destination_invariant(&request).await?;

        let mut report = ReplicationReport {
            source: pair.source.clone(),
            destination: pair.destination.clone(),
            basis: None,
            marker,
            ..Default::default()
        };

        // Earlier aborted attempts leave markers behind on the source
        self.prune_superseded_markers(&pair, &mut report).await;

        info!(
            "Initial replication {} -> {} complete at {}",
            report.source, report.destination, report.marker
        );
        Ok(report)
    }

    /// Incremental transfer from the latest common marker to a fresh one.
    ///
    /// A failed transfer keeps the new source marker; the next run resolves the same
    /// basis again and sends everything after it, intermediates included.
    #[instrument(skip(self, now))]
    pub async fn incremental_replicate(
        &self,
        source: &str,
        destination: &str,
        now: DateTime<Utc>,
    ) -> Result<ReplicationReport, ZsnapError> {
        let (pair, state) = self.resolve(source, destination).await?;

        let basis = match state {
            ReplicationState::SyncedAt(basis) => basis,
            ReplicationState::Uninitialized => {
                return Err(ZsnapError::NotInitialized {
                    destination: pair.destination,
                })
            }
            ReplicationState::Diverged => {
                error!("No previous matching snaps available - you may need to restart repl");
                return Err(ZsnapError::DivergedState {
                    source_path: pair.source,
                    destination: pair.destination,
                });
            }
        };

        let marker = self.create_marker(&pair, now).await?;
        let request = TransferRequest {
            base: Some(basis.full_name()),
            snapshot: format!("{}@{}", pair.source, marker),
            target: pair.destination.clone(),
            flags: self.config.transfer_flags(),
        };

        self.transfer(&request).await?;
        self.enforce_destination_invariant(&request).await?;

        let mut report = ReplicationReport {
            source: pair.source.clone(),
            destination: pair.destination.clone(),
            basis: Some(basis.label),
            marker,
            ..Default::default()
        };

        self.prune_superseded_markers(&pair, &mut report).await;

        info!(
            "Incremental replication {} -> {} complete at {}",
            report.source, report.destination, report.marker
        );
        Ok(report)
    }

    async fn create_marker(
        &self,
        pair: &ReplicationPair,
        now: DateTime<Utc>,
    ) -> Result<String, ZsnapError> {
        let marker = naming::marker_label(now);
        self.storage
            .create_snapshot(&pair.source, &marker, self.config.transfer.recursive)
            .await
            .map_err(|e| {
                ZsnapError::storage("create marker", format!("{}@{}", pair.source, marker), e)
            })?;
        Ok(marker)
    }

    async fn transfer(&self, request: &TransferRequest) -> Result<(), ZsnapError> {
        self.storage.transfer(request).await.map_err(|e| {
            warn!(
                "Transfer of {} failed, keeping the marker for the next run",
                request.snapshot
            );
            ZsnapError::Transfer {
                snapshot: request.snapshot.clone(),
                destination: request.target.clone(),
                source: e,
            }
        })
    }

    /// Destination ends up read-only and unmounted, whatever the receive did.
    async fn enforce_destination_invariant(&self, request: &TransferRequest) -> Result<(), ZsnapError> {
        let destination = request.target.as_str();
        let inventory = Inventory::new(self.storage.as_ref());

        if inventory.dataset(destination).await?.is_none() {
            if self.config.dry_run {
                debug!("dryrun: {} not received, nothing to lock down", destination);
                return Ok(());
            }
            return Err(ZsnapError::Transfer {
                snapshot: request.snapshot.clone(),
                destination: destination.to_string(),
                source: AgentError::DatasetNotFound(destination.to_string()),
            });
        }

        self.storage
            .set_property(destination, properties::READONLY, properties::ON)
            .await
            .map_err(|e| ZsnapError::storage("set readonly", destination, e))?;

        // Children before parents
        let datasets = inventory.list_datasets(&[destination.to_string()]).await?;
        for dataset in datasets.iter().rev().filter(|d| d.mounted) {
            self.storage
                .unmount(&dataset.name)
                .await
                .map_err(|e| ZsnapError::storage("unmount", dataset.name.as_str(), e))?;
        }

        debug!("{} is read-only and unmounted", destination);
        Ok(())
    }

    /// Removes markers older than the one just transferred on both sides.
    ///
    /// Failures are reported but never fail a replication that already succeeded.
    async fn prune_superseded_markers(&self, pair: &ReplicationPair, report: &mut ReplicationReport) {
        if !self.config.replication.prune_superseded_markers {
            return;
        }

        let current = Snapshot {
            dataset: pair.source.clone(),
            label: report.marker.clone(),
            created_at: DateTime::<Utc>::default(),
            kind: naming::classify(&report.marker),
        };

        let inventory = Inventory::new(self.storage.as_ref());
        for dataset in [&pair.source, &pair.destination] {
            let snapshots = match inventory.snapshots(dataset).await {
                Ok(snapshots) => snapshots,
                // Only reachable in dry run, where nothing was received
                Err(ZsnapError::Inventory { ref source, .. }) if source.is_not_found() => {
                    debug!("{} does not exist, no markers to prune", dataset);
                    continue;
                }
                Err(e) => {
                    warn!("Could not list markers of {} for pruning: {}", dataset, e);
                    report.prune_failures.push(ItemFailure {
                        target: dataset.to_string(),
                        kind: FailureKind::Failed,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            let superseded = snapshots
                .iter()
                .filter(|s| s.is_marker() && marker_order(s, &current).is_lt());

            for snapshot in superseded {
                let name = snapshot.full_name();
                match self
                    .storage
                    .destroy_snapshot(&snapshot.dataset, &snapshot.label, self.config.transfer.recursive)
                    .await
                {
                    Ok(()) => report.pruned.push(name),
                    Err(e) => {
                        warn!("Failed to remove superseded marker {}: {}", name, e);
                        report.prune_failures.push(ItemFailure::from_agent(name, &e));
                    }
                }
            }
        }
    }
}

impl<S> Clone for ReplicationEngine<S> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            storage: self.storage.clone(),
        }
    }
}
