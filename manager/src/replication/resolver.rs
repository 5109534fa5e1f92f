use std::cmp::Ordering;
use std::collections::HashSet;
use tracing::{debug, info};
use zsnap_agent::AgentError;

use super::{ReplicationPair, ReplicationState};
use crate::errors::ZsnapError;
use crate::inventory::{Inventory, Snapshot};
use crate::storage::Storage;

pub struct ReplicationResolver<'a, S> {
    inventory: Inventory<'a, S>,
}

impl<'a, S: Storage> ReplicationResolver<'a, S> {
    pub fn new(storage: &'a S) -> Self {
        Self {
            inventory: Inventory::new(storage),
        }
    }

    /// Derives the state of `pair` from the snapshots on both sides. Read-only.
    pub async fn resolve(&self, pair: &ReplicationPair) -> Result<ReplicationState, ZsnapError> {
        if self.inventory.dataset(&pair.source).await?.is_none() {
            return Err(ZsnapError::inventory(
                pair.source.as_str(),
                AgentError::DatasetNotFound(pair.source.clone()),
            ));
        }

        if self.inventory.dataset(&pair.destination).await?.is_none() {
            debug!("{} does not exist yet", pair.destination);
            return Ok(ReplicationState::Uninitialized);
        }

        let source_snapshots = self.inventory.snapshots(&pair.source).await?;
        let destination_snapshots = self.inventory.snapshots(&pair.destination).await?;

        let state = match latest_common_marker(&source_snapshots, &destination_snapshots) {
            Some(marker) => ReplicationState::SyncedAt(marker),
            None => ReplicationState::Diverged,
        };

        match &state {
            ReplicationState::SyncedAt(marker) => info!(
                "{} -> {} synced at {}",
                pair.source, pair.destination, marker.label
            ),
            _ => info!("{} -> {} is {:?}", pair.source, pair.destination, state),
        }
        Ok(state)
    }
}

/// The newest marker label present on both sides, as the source-side snapshot.
pub fn latest_common_marker(source: &[Snapshot], destination: &[Snapshot]) -> Option<Snapshot> {
    let destination_markers: HashSet<&str> = destination
        .iter()
        .filter(|s| s.is_marker())
        .map(|s| s.label.as_str())
        .collect();

    source
        .iter()
        .filter(|s| s.is_marker() && destination_markers.contains(s.label.as_str()))
        .max_by(|a, b| marker_order(a, b))
        .cloned()
}

/// Total order on markers: embedded timestamp, then label.
///
/// Markers with an unreadable timestamp sort before every readable one.
pub fn marker_order(a: &Snapshot, b: &Snapshot) -> Ordering {
    a.kind
        .taken_at()
        .cmp(&b.kind.taken_at())
        .then_with(|| a.label.cmp(&b.label))
}
