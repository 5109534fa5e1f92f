//! In-memory ZFS for testing
//!
//! Implements the `Storage` trait over a map of datasets so the engine can be
//! driven without a real pool. Supports failure injection (create, destroy,
//! transfer, queries) and a "mount on receive" switch that makes received
//! datasets come up mounted and writable, as a careless receiver would.

use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;

use zsnap::storage::Storage;
use zsnap_agent::{AgentError, DatasetRecord, SnapshotRecord, TransferRequest};

/// Creation time of the first snapshot taken on a fresh mock
const CLOCK_START: i64 = 1_700_000_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeSnapshot {
    pub label: String,
    pub creation: i64,
    /// Dataset content generation captured by the snapshot
    pub content: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeDataset {
    pub mounted: bool,
    pub readonly: bool,
    /// Bumped by `write`, copied by transfers
    pub content: u64,
    pub snapshots: Vec<FakeSnapshot>,
}

impl FakeDataset {
    fn new(mounted: bool) -> Self {
        Self {
            mounted,
            readonly: false,
            content: 0,
            snapshots: Vec::new(),
        }
    }

    fn snapshot(&self, label: &str) -> Option<&FakeSnapshot> {
        self.snapshots.iter().find(|s| s.label == label)
    }
}

#[derive(Debug, Default)]
struct PoolState {
    datasets: BTreeMap<String, FakeDataset>,
    clock: i64,
    calls: Vec<String>,
    dry_run: bool,
    mount_on_receive: bool,
    fail_queries: bool,
    transfer_failures: u32,
    fail_create: HashSet<String>,
    busy: HashSet<String>,
    fail_destroy: HashSet<String>,
}

impl PoolState {
    fn tick(&mut self) -> i64 {
        self.clock += 60;
        self.clock
    }

    fn subtree(&self, root: &str) -> Vec<String> {
        let prefix = format!("{}/", root);
        self.datasets
            .keys()
            .filter(|name| name.as_str() == root || name.starts_with(&prefix))
            .cloned()
            .collect()
    }

    fn query_guard(&self, target: &str) -> Result<(), AgentError> {
        if self.fail_queries {
            return Err(failed(format!("zfs list {}", target), "I/O error"));
        }
        Ok(())
    }
}

fn failed(command: String, stderr: &str) -> AgentError {
    AgentError::Failed {
        command,
        status: 1,
        stderr: stderr.to_string(),
    }
}

fn split_full_name(full: &str) -> (&str, &str) {
    full.split_once('@').unwrap_or((full, ""))
}

pub struct MockZfs {
    state: Mutex<PoolState>,
}

impl MockZfs {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(PoolState {
                clock: CLOCK_START,
                ..Default::default()
            }),
        }
    }

    // === SETUP ===

    pub fn with_dataset(self, name: &str, mounted: bool) -> Self {
        self.add_dataset(name, mounted);
        self
    }

    pub fn with_snapshot(self, dataset: &str, label: &str) -> Self {
        self.add_snapshot(dataset, label);
        self
    }

    pub fn add_dataset(&self, name: &str, mounted: bool) {
        self.state
            .lock()
            .unwrap()
            .datasets
            .insert(name.to_string(), FakeDataset::new(mounted));
    }

    /// Adds a snapshot directly, bypassing call recording and failure injection.
    pub fn add_snapshot(&self, dataset: &str, label: &str) {
        let mut state = self.state.lock().unwrap();
        let creation = state.tick();
        let ds = state
            .datasets
            .get_mut(dataset)
            .unwrap_or_else(|| panic!("no dataset {}", dataset));
        let content = ds.content;
        ds.snapshots.push(FakeSnapshot {
            label: label.to_string(),
            creation,
            content,
        });
    }

    /// Deletes a snapshot behind the engine's back, as an operator would.
    pub fn remove_snapshot(&self, dataset: &str, label: &str) {
        let mut state = self.state.lock().unwrap();
        if let Some(ds) = state.datasets.get_mut(dataset) {
            ds.snapshots.retain(|s| s.label != label);
        }
    }

    pub fn remove_dataset(&self, name: &str) {
        self.state.lock().unwrap().datasets.remove(name);
    }

    /// Simulates new data being written to a dataset.
    pub fn write(&self, dataset: &str) {
        let mut state = self.state.lock().unwrap();
        if let Some(ds) = state.datasets.get_mut(dataset) {
            ds.content += 1;
        }
    }

    pub fn set_mounted(&self, dataset: &str, mounted: bool) {
        let mut state = self.state.lock().unwrap();
        if let Some(ds) = state.datasets.get_mut(dataset) {
            ds.mounted = mounted;
        }
    }

    // === FAILURE INJECTION ===

    /// Mutations are recorded but not applied.
    pub fn dry_run(self) -> Self {
        self.state.lock().unwrap().dry_run = true;
        self
    }

    pub fn mount_on_receive(self, enabled: bool) -> Self {
        self.state.lock().unwrap().mount_on_receive = enabled;
        self
    }

    pub fn fail_queries(&self, enabled: bool) {
        self.state.lock().unwrap().fail_queries = enabled;
    }

    pub fn fail_next_transfers(&self, count: u32) {
        self.state.lock().unwrap().transfer_failures = count;
    }

    pub fn fail_create_on(&self, dataset: &str) {
        self.state
            .lock()
            .unwrap()
            .fail_create
            .insert(dataset.to_string());
    }

    /// Destroying `full_name` will fail as held or cloned.
    pub fn mark_busy(&self, full_name: &str) {
        self.state.lock().unwrap().busy.insert(full_name.to_string());
    }

    pub fn fail_destroy_on(&self, full_name: &str) {
        self.state
            .lock()
            .unwrap()
            .fail_destroy
            .insert(full_name.to_string());
    }

    // === INSPECTION ===

    pub fn exists(&self, name: &str) -> bool {
        self.state.lock().unwrap().datasets.contains_key(name)
    }

    pub fn dataset(&self, name: &str) -> Option<FakeDataset> {
        self.state.lock().unwrap().datasets.get(name).cloned()
    }

    pub fn labels(&self, dataset: &str) -> Vec<String> {
        self.dataset(dataset)
            .map(|ds| ds.snapshots.into_iter().map(|s| s.label).collect())
            .unwrap_or_default()
    }

    pub fn has_snapshot(&self, dataset: &str, label: &str) -> bool {
        self.labels(dataset).iter().any(|l| l == label)
    }

    /// Every recorded mutation, in order, e.g. `snapshot tank/a@auto_...`.
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn calls_starting_with(&self, prefix: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.starts_with(prefix))
            .collect()
    }

    /// The dataset and its descendants with their content, for comparing two pools.
    pub fn tree_content(&self, root: &str) -> Vec<(String, u64)> {
        let state = self.state.lock().unwrap();
        state
            .subtree(root)
            .into_iter()
            .map(|name| {
                let content = state.datasets[&name].content;
                (name.strip_prefix(root).unwrap_or_default().to_string(), content)
            })
            .collect()
    }

    fn receive_full(state: &mut PoolState, request: &TransferRequest) -> Result<(), AgentError> {
        let (source, label) = split_full_name(&request.snapshot);
        let sent = state
            .datasets
            .get(source)
            .and_then(|ds| ds.snapshot(label))
            .map(|s| s.creation)
            .ok_or_else(|| AgentError::DatasetNotFound(request.snapshot.clone()))?;

        if state.datasets.contains_key(&request.target) {
            return Err(failed(
                format!("zfs recv {}", request.target),
                "destination already exists",
            ));
        }

        let sources = if request.flags.replicate {
            state.subtree(source)
        } else {
            vec![source.to_string()]
        };

        let mounted = state.mount_on_receive;
        for name in sources {
            let suffix = name.strip_prefix(source).unwrap_or_default();
            let target = format!("{}{}", request.target, suffix);
            let origin = &state.datasets[&name];

            let snapshots: Vec<FakeSnapshot> = if request.flags.replicate {
                origin
                    .snapshots
                    .iter()
                    .filter(|s| s.creation <= sent)
                    .cloned()
                    .collect()
            } else {
                origin.snapshot(label).into_iter().cloned().collect()
            };

            let mut received = FakeDataset::new(mounted);
            received.content = snapshots.last().map(|s| s.content).unwrap_or_default();
            received.snapshots = snapshots;
            state.datasets.insert(target, received);
        }
        Ok(())
    }

    fn receive_incremental(
        state: &mut PoolState,
        request: &TransferRequest,
        base: &str,
    ) -> Result<(), AgentError> {
        let (source, label) = split_full_name(&request.snapshot);
        let (_, base_label) = split_full_name(base);

        let origin = state
            .datasets
            .get(source)
            .ok_or_else(|| AgentError::DatasetNotFound(source.to_string()))?;
        let sent = origin
            .snapshot(label)
            .map(|s| s.creation)
            .ok_or_else(|| AgentError::DatasetNotFound(request.snapshot.clone()))?;
        let from = origin
            .snapshot(base_label)
            .map(|s| s.creation)
            .ok_or_else(|| AgentError::DatasetNotFound(base.to_string()))?;

        let target = state
            .datasets
            .get(&request.target)
            .ok_or_else(|| AgentError::DatasetNotFound(request.target.clone()))?;

        // The receiver must sit exactly at the basis
        if target.snapshots.last().map(|s| s.label.as_str()) != Some(base_label) {
            return Err(failed(
                format!("zfs recv {}", request.target),
                "destination has been modified since most recent snapshot",
            ));
        }

        let sources = if request.flags.replicate {
            state.subtree(source)
        } else {
            vec![source.to_string()]
        };

        let mounted = state.mount_on_receive;
        for name in sources {
            let suffix = name.strip_prefix(source).unwrap_or_default().to_string();
            let target_name = format!("{}{}", request.target, suffix);
            let incoming: Vec<FakeSnapshot> = state.datasets[&name]
                .snapshots
                .iter()
                .filter(|s| s.creation > from && s.creation <= sent)
                .cloned()
                .collect();

            let received = state
                .datasets
                .entry(target_name)
                .or_insert_with(|| FakeDataset::new(mounted));
            received.snapshots.extend(incoming);
            received.content = received.snapshots.last().map(|s| s.content).unwrap_or_default();
            if mounted {
                received.mounted = true;
            }
        }
        Ok(())
    }
}

impl Default for MockZfs {
    fn default() -> Self {
        Self::new()
    }
}

impl Storage for MockZfs {
    async fn list_filesystems(&self, roots: &[String]) -> Result<Vec<DatasetRecord>, AgentError> {
        let state = self.state.lock().unwrap();
        state.query_guard(&roots.join(" "))?;

        let names: Vec<String> = if roots.is_empty() {
            state.datasets.keys().cloned().collect()
        } else {
            let mut names = Vec::new();
            for root in roots {
                if !state.datasets.contains_key(root) {
                    return Err(AgentError::DatasetNotFound(root.clone()));
                }
                names.extend(state.subtree(root));
            }
            names
        };

        Ok(names
            .into_iter()
            .map(|name| DatasetRecord {
                mounted: state.datasets[&name].mounted,
                name,
            })
            .collect())
    }

    async fn get_filesystem(&self, name: &str) -> Result<Option<DatasetRecord>, AgentError> {
        let state = self.state.lock().unwrap();
        state.query_guard(name)?;
        Ok(state.datasets.get(name).map(|ds| DatasetRecord {
            name: name.to_string(),
            mounted: ds.mounted,
        }))
    }

    async fn list_snapshots(
        &self,
        dataset: &str,
        recursive: bool,
    ) -> Result<Vec<SnapshotRecord>, AgentError> {
        let state = self.state.lock().unwrap();
        state.query_guard(dataset)?;
        if !state.datasets.contains_key(dataset) {
            return Err(AgentError::DatasetNotFound(dataset.to_string()));
        }

        let names = if recursive {
            state.subtree(dataset)
        } else {
            vec![dataset.to_string()]
        };

        Ok(names
            .into_iter()
            .flat_map(|name| {
                state.datasets[&name]
                    .snapshots
                    .iter()
                    .map(|s| SnapshotRecord {
                        dataset: name.clone(),
                        label: s.label.clone(),
                        creation: s.creation,
                    })
                    .collect::<Vec<_>>()
            })
            .collect())
    }

    async fn create_snapshot(
        &self,
        dataset: &str,
        label: &str,
        recursive: bool,
    ) -> Result<(), AgentError> {
        let mut state = self.state.lock().unwrap();
        let flag = if recursive { "-r " } else { "" };
        state.calls.push(format!("snapshot {}{}@{}", flag, dataset, label));

        if state.dry_run {
            return Ok(());
        }
        if !state.datasets.contains_key(dataset) {
            return Err(AgentError::DatasetNotFound(dataset.to_string()));
        }
        if state.fail_create.contains(dataset) {
            return Err(failed(format!("zfs snapshot {}@{}", dataset, label), "out of space"));
        }
        if state.datasets[dataset].snapshot(label).is_some() {
            return Err(failed(
                format!("zfs snapshot {}@{}", dataset, label),
                "dataset already exists",
            ));
        }

        let creation = state.tick();
        let names = if recursive {
            state.subtree(dataset)
        } else {
            vec![dataset.to_string()]
        };
        for name in names {
            if let Some(ds) = state.datasets.get_mut(&name) {
                let content = ds.content;
                ds.snapshots.push(FakeSnapshot {
                    label: label.to_string(),
                    creation,
                    content,
                });
            }
        }
        Ok(())
    }

    async fn destroy_snapshot(
        &self,
        dataset: &str,
        label: &str,
        recursive: bool,
    ) -> Result<(), AgentError> {
        let mut state = self.state.lock().unwrap();
        let full_name = format!("{}@{}", dataset, label);
        let flag = if recursive { "-r " } else { "" };
        state.calls.push(format!("destroy {}{}", flag, full_name));

        if state.dry_run {
            return Ok(());
        }
        if state.busy.contains(&full_name) {
            return Err(AgentError::Busy {
                target: full_name,
                stderr: "snapshot is held".to_string(),
            });
        }
        if state.fail_destroy.contains(&full_name) {
            return Err(failed(format!("zfs destroy {}", full_name), "I/O error"));
        }
        if state
            .datasets
            .get(dataset)
            .and_then(|ds| ds.snapshot(label))
            .is_none()
        {
            return Err(AgentError::DatasetNotFound(full_name));
        }

        let names = if recursive {
            state.subtree(dataset)
        } else {
            vec![dataset.to_string()]
        };
        for name in names {
            if let Some(ds) = state.datasets.get_mut(&name) {
                ds.snapshots.retain(|s| s.label != label);
            }
        }
        Ok(())
    }

    async fn transfer(&self, request: &TransferRequest) -> Result<(), AgentError> {
        let mut state = self.state.lock().unwrap();
        let call = match &request.base {
            Some(base) => format!("transfer -I {} {} -> {}", base, request.snapshot, request.target),
            None => format!("transfer {} -> {}", request.snapshot, request.target),
        };
        state.calls.push(call);

        if state.dry_run {
            return Ok(());
        }
        if state.transfer_failures > 0 {
            state.transfer_failures -= 1;
            return Err(AgentError::Pipe {
                producer: format!("zfs send {}", request.snapshot),
                consumer: format!("zfs recv {}", request.target),
                source: std::io::Error::new(std::io::ErrorKind::BrokenPipe, "broken pipe"),
            });
        }

        match &request.base {
            Some(base) => Self::receive_incremental(&mut state, request, base),
            None => Self::receive_full(&mut state, request),
        }
    }

    async fn set_property(&self, dataset: &str, property: &str, value: &str) -> Result<(), AgentError> {
        let mut state = self.state.lock().unwrap();
        state
            .calls
            .push(format!("set {}={} {}", property, value, dataset));

        if state.dry_run {
            return Ok(());
        }
        let ds = state
            .datasets
            .get_mut(dataset)
            .ok_or_else(|| AgentError::DatasetNotFound(dataset.to_string()))?;
        if property == "readonly" {
            ds.readonly = value == "on";
        }
        Ok(())
    }

    async fn unmount(&self, dataset: &str) -> Result<(), AgentError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("unmount {}", dataset));

        if state.dry_run {
            return Ok(());
        }
        let ds = state
            .datasets
            .get_mut(dataset)
            .ok_or_else(|| AgentError::DatasetNotFound(dataset.to_string()))?;
        ds.mounted = false;
        Ok(())
    }
}
