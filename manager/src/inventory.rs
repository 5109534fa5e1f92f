//! Dataset inventory.
//!
//! Converts raw listing rows into typed values: mount state as a bool and label
//! timestamps parsed once, here, so nothing downstream handles label strings.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;
use zsnap_agent::{DatasetRecord, SnapshotRecord};

use crate::errors::ZsnapError;
use crate::naming::{self, SnapshotKind};
use crate::storage::Storage;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dataset {
    pub name: String,
    pub mounted: bool,
}

impl Dataset {
    /// The pool is the first path component.
    pub fn pool(&self) -> &str {
        pool_of(&self.name)
    }
}

impl From<DatasetRecord> for Dataset {
    fn from(record: DatasetRecord) -> Self {
        Self {
            name: record.name,
            mounted: record.mounted,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub dataset: String,
    pub label: String,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: SnapshotKind,
}

impl Snapshot {
    pub fn full_name(&self) -> String {
        format!("{}@{}", self.dataset, self.label)
    }

    pub fn is_marker(&self) -> bool {
        matches!(self.kind, SnapshotKind::Marker { .. })
    }

    pub fn is_automatic(&self) -> bool {
        matches!(self.kind, SnapshotKind::Automatic { .. })
    }
}

impl From<SnapshotRecord> for Snapshot {
    fn from(record: SnapshotRecord) -> Self {
        let kind = naming::classify(&record.label);
        Self {
            created_at: DateTime::from_timestamp(record.creation, 0).unwrap_or_default(),
            dataset: record.dataset,
            label: record.label,
            kind,
        }
    }
}

/// Read-only view of the storage layer. Nothing is cached between calls.
pub struct Inventory<'a, S> {
    storage: &'a S,
}

impl<'a, S: Storage> Inventory<'a, S> {
    pub fn new(storage: &'a S) -> Self {
        Self { storage }
    }

    /// Every dataset under `roots` with its live mount state; all pools when `roots` is empty.
    pub async fn list_datasets(&self, roots: &[String]) -> Result<Vec<Dataset>, ZsnapError> {
        let target = if roots.is_empty() {
            "all pools".to_string()
        } else {
            roots.join(", ")
        };

        let records = self
            .storage
            .list_filesystems(roots)
            .await
            .map_err(|e| ZsnapError::inventory(target, e))?;

        Ok(records.into_iter().map(Dataset::from).collect())
    }

    /// A single dataset; `None` when the storage layer says it does not exist.
    pub async fn dataset(&self, name: &str) -> Result<Option<Dataset>, ZsnapError> {
        let record = self
            .storage
            .get_filesystem(name)
            .await
            .map_err(|e| ZsnapError::inventory(name, e))?;

        Ok(record.map(Dataset::from))
    }

    /// The dataset's own snapshots, oldest first.
    pub async fn snapshots(&self, dataset: &str) -> Result<Vec<Snapshot>, ZsnapError> {
        self.load_snapshots(dataset, false).await
    }

    /// Snapshots of `root` and every descendant, grouped by dataset, oldest first.
    pub async fn snapshots_under(&self, root: &str) -> Result<Vec<Snapshot>, ZsnapError> {
        self.load_snapshots(root, true).await
    }

    async fn load_snapshots(&self, dataset: &str, recursive: bool) -> Result<Vec<Snapshot>, ZsnapError> {
        let records = self
            .storage
            .list_snapshots(dataset, recursive)
            .await
            .map_err(|e| ZsnapError::inventory(dataset, e))?;

        let mut snapshots: Vec<Snapshot> = records.into_iter().map(Snapshot::from).collect();
        snapshots.sort_by(|a, b| {
            a.dataset
                .cmp(&b.dataset)
                .then(a.created_at.cmp(&b.created_at))
                .then(a.label.cmp(&b.label))
        });

        debug!("{} snapshots under {}", snapshots.len(), dataset);
        Ok(snapshots)
    }
}

pub fn pool_of(path: &str) -> &str {
    path.split('/').next().unwrap_or(path)
}

/// The part of `path` below `root`, compared per path component.
///
/// `Some("")` when `path == root`, `None` when `path` is not inside `root`.
pub fn relative_to<'p>(path: &'p str, root: &str) -> Option<&'p str> {
    if path == root {
        return Some("");
    }
    path.strip_prefix(root)?.strip_prefix('/')
}

/// `root` joined with a relative suffix from [`relative_to`].
pub fn join_path(root: &str, suffix: &str) -> String {
    if suffix.is_empty() {
        root.to_string()
    } else {
        format!("{}/{}", root, suffix)
    }
}
