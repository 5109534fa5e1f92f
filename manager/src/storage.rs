//! The storage seam between the engine and the host.
//!
//! The engine only ever talks to a [`Storage`]; production uses [`ZfsCli`], tests use
//! an in-memory pool.

use zsnap_agent::{AgentError, DatasetRecord, SnapshotRecord, TransferRequest, ZfsCli};

/// Opaque storage primitives. Every call is awaited to completion before the next.
#[allow(async_fn_in_trait)]
pub trait Storage {
    /// All filesystems under `roots` (every pool when empty), roots included.
    async fn list_filesystems(&self, roots: &[String]) -> Result<Vec<DatasetRecord>, AgentError>;

    /// One filesystem, `None` when it does not exist.
    async fn get_filesystem(&self, name: &str) -> Result<Option<DatasetRecord>, AgentError>;

    /// Snapshots of `dataset`, or of its whole subtree when `recursive`.
    async fn list_snapshots(
        &self,
        dataset: &str,
        recursive: bool,
    ) -> Result<Vec<SnapshotRecord>, AgentError>;

    async fn create_snapshot(
        &self,
        dataset: &str,
        label: &str,
        recursive: bool,
    ) -> Result<(), AgentError>;

    async fn destroy_snapshot(
        &self,
        dataset: &str,
        label: &str,
        recursive: bool,
    ) -> Result<(), AgentError>;

    /// Send a full or incremental stream and receive it into the target.
    async fn transfer(&self, request: &TransferRequest) -> Result<(), AgentError>;

    async fn set_property(&self, dataset: &str, property: &str, value: &str)
        -> Result<(), AgentError>;

    async fn unmount(&self, dataset: &str) -> Result<(), AgentError>;
}

impl Storage for ZfsCli {
    async fn list_filesystems(&self, roots: &[String]) -> Result<Vec<DatasetRecord>, AgentError> {
        ZfsCli::list_filesystems(self, roots).await
    }

    async fn get_filesystem(&self, name: &str) -> Result<Option<DatasetRecord>, AgentError> {
        ZfsCli::get_filesystem(self, name).await
    }

    async fn list_snapshots(
        &self,
        dataset: &str,
        recursive: bool,
    ) -> Result<Vec<SnapshotRecord>, AgentError> {
        ZfsCli::list_snapshots(self, dataset, recursive).await
    }

    async fn create_snapshot(
        &self,
        dataset: &str,
        label: &str,
        recursive: bool,
    ) -> Result<(), AgentError> {
        ZfsCli::create_snapshot(self, dataset, label, recursive).await
    }

    async fn destroy_snapshot(
        &self,
        dataset: &str,
        label: &str,
        recursive: bool,
    ) -> Result<(), AgentError> {
        ZfsCli::destroy_snapshot(self, dataset, label, recursive).await
    }

    async fn transfer(&self, request: &TransferRequest) -> Result<(), AgentError> {
        self.send_receive(request).await
    }

    async fn set_property(
        &self,
        dataset: &str,
        property: &str,
        value: &str,
    ) -> Result<(), AgentError> {
        ZfsCli::set_property(self, dataset, property, value).await
    }

    async fn unmount(&self, dataset: &str) -> Result<(), AgentError> {
        ZfsCli::unmount(self, dataset).await
    }
}
