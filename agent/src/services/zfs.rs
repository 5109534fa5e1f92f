// File: agent/src/services/zfs.rs
use tracing::{debug, info};

use crate::error::AgentError;
use crate::services::commands::{execute_command, execute_pipeline};
use crate::services::zfs_output::{parse_datasets, parse_snapshots};
use crate::types::{CommandLine, DatasetRecord, SnapshotRecord, TransferRequest};

/// stderr fragment zfs prints when a dataset or snapshot is missing.
const NOT_FOUND_MARKERS: &[&str] = &["dataset does not exist", "could not find any snapshots"];

/// stderr fragments zfs prints when a destroy is refused by a hold or a clone.
const BUSY_MARKERS: &[&str] = &["dataset is busy", "has dependent clones", "snapshot is held"];

/// Thin wrapper over the `zfs` binary.
///
/// Listing commands always run. Mutating commands are only logged when `dry_run` is set.
#[derive(Debug, Clone)]
pub struct ZfsCli {
    binary: String,
    dry_run: bool,
}

impl ZfsCli {
    pub fn new(binary: impl Into<String>, dry_run: bool) -> Self {
        Self {
            binary: binary.into(),
            dry_run,
        }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Every filesystem under `roots` (all pools when empty), roots included.
    pub async fn list_filesystems(&self, roots: &[String]) -> Result<Vec<DatasetRecord>, AgentError> {
        let command = self
            .command()
            .args(["list", "-H", "-p", "-t", "filesystem", "-o", "name,mounted", "-r"])
            .args(roots.iter().cloned());

        let output = self.query(&command, &roots.join(" ")).await?;
        let datasets = parse_datasets(&output).map_err(|reason| AgentError::Parse {
            command: command.to_string(),
            reason,
        })?;

        debug!("Listed {} filesystems under {:?}", datasets.len(), roots);
        Ok(datasets)
    }

    /// A single filesystem, or `None` when it does not exist.
    pub async fn get_filesystem(&self, name: &str) -> Result<Option<DatasetRecord>, AgentError> {
        let command = self
            .command()
            .args(["list", "-H", "-p", "-t", "filesystem", "-o", "name,mounted", name]);

        let output = match self.query(&command, name).await {
            Ok(output) => output,
            Err(AgentError::DatasetNotFound(_)) => {
                debug!("Filesystem {} does not exist", name);
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let datasets = parse_datasets(&output).map_err(|reason| AgentError::Parse {
            command: command.to_string(),
            reason,
        })?;

        Ok(datasets.into_iter().find(|d| d.name == name))
    }

    /// Snapshots of `dataset` itself, or of the whole subtree when `recursive`.
    pub async fn list_snapshots(
        &self,
        dataset: &str,
        recursive: bool,
    ) -> Result<Vec<SnapshotRecord>, AgentError> {
        let depth: &[&str] = if recursive { &["-r"] } else { &["-d", "1"] };
        let command = self
            .command()
            .args(["list", "-H", "-p", "-t", "snapshot", "-o", "name,creation"])
            .args(depth.iter().copied())
            .arg(dataset);

        let output = self.query(&command, dataset).await?;
        let snapshots = parse_snapshots(&output).map_err(|reason| AgentError::Parse {
            command: command.to_string(),
            reason,
        })?;

        debug!("Listed {} snapshots under {}", snapshots.len(), dataset);
        Ok(snapshots)
    }

    pub async fn create_snapshot(
        &self,
        dataset: &str,
        label: &str,
        recursive: bool,
    ) -> Result<(), AgentError> {
        let name = format!("{}@{}", dataset, label);
        let mut command = self.command().arg("snapshot");
        if recursive {
            command = command.arg("-r");
        }
        let command = command.arg(&name);

        self.mutate(&command, &name).await?;
        info!("create_snap -> {}", name);
        Ok(())
    }

    pub async fn destroy_snapshot(
        &self,
        dataset: &str,
        label: &str,
        recursive: bool,
    ) -> Result<(), AgentError> {
        let name = format!("{}@{}", dataset, label);
        let mut command = self.command().arg("destroy");
        if recursive {
            command = command.arg("-r");
        }
        let command = command.arg(&name);

        self.mutate(&command, &name).await?;
        info!("remove_snap -> {}", name);
        Ok(())
    }

    pub async fn set_property(
        &self,
        dataset: &str,
        property: &str,
        value: &str,
    ) -> Result<(), AgentError> {
        let command = self
            .command()
            .arg("set")
            .arg(format!("{}={}", property, value))
            .arg(dataset);

        self.mutate(&command, dataset).await
    }

    pub async fn unmount(&self, dataset: &str) -> Result<(), AgentError> {
        let command = self.command().arg("unmount").arg(dataset);
        self.mutate(&command, dataset).await?;
        info!("Unmounted {}", dataset);
        Ok(())
    }

    /// `zfs send ... | zfs recv -u -o mountpoint=none -o readonly=on <target>`.
    pub async fn send_receive(&self, request: &TransferRequest) -> Result<(), AgentError> {
        let (send, recv) = self.transfer_commands(request);

        if self.dry_run {
            info!("dryrun: {} | {}", send, recv);
            return Ok(());
        }

        info!("running -> {} | {}", send, recv);
        execute_pipeline(&send, &recv)
            .await
            .map_err(|e| classify(e, &request.target))?;

        if request.is_incremental() {
            info!("Incremental replication success -> {}", request.target);
        } else {
            info!("Initial replication success -> {}", request.target);
        }
        Ok(())
    }

    /// The send and receive command lines for a transfer.
    pub fn transfer_commands(&self, request: &TransferRequest) -> (CommandLine, CommandLine) {
        let mut send = self.command().arg("send");
        if request.flags.replicate {
            send = send.arg("-R");
        }
        if request.flags.raw {
            send = send.arg("-w");
        }
        if request.flags.large_blocks {
            send = send.arg("-L");
        }
        if let Some(base) = &request.base {
            send = send.arg("-I").arg(base);
        }
        let send = send.arg(&request.snapshot);

        let recv = self
            .command()
            .args(["recv", "-u", "-o", "mountpoint=none", "-o", "readonly=on"])
            .arg(&request.target);

        (send, recv)
    }

    fn command(&self) -> CommandLine {
        CommandLine::new(&self.binary)
    }

    async fn query(&self, command: &CommandLine, target: &str) -> Result<String, AgentError> {
        execute_command(command)
            .await
            .map(|output| output.stdout)
            .map_err(|e| classify(e, target))
    }

    async fn mutate(&self, command: &CommandLine, target: &str) -> Result<(), AgentError> {
        if self.dry_run {
            info!("dryrun: {}", command);
            return Ok(());
        }

        execute_command(command)
            .await
            .map(|_| ())
            .map_err(|e| classify(e, target))
    }
}

/// Maps well-known zfs failure messages onto dedicated error variants.
fn classify(error: AgentError, target: &str) -> AgentError {
    match error {
        AgentError::Failed { ref stderr, .. }
            if NOT_FOUND_MARKERS.iter().any(|m| stderr.contains(m)) =>
        {
            AgentError::DatasetNotFound(target.to_string())
        }
        AgentError::Failed { stderr, .. } if BUSY_MARKERS.iter().any(|m| stderr.contains(m)) => {
            AgentError::Busy {
                target: target.to_string(),
                stderr,
            }
        }
        other => other,
    }
}
