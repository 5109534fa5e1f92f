pub mod cli;
pub mod config;
pub mod constants;
pub mod errors;
pub mod inventory;
pub mod naming;
pub mod replication;
pub mod snapshot;
pub mod storage;

// Re-export commonly used types
pub use config::{Config, ConfigManager, PoolConfig, ReplicationRoot};
pub use errors::{FailureKind, ItemFailure, ZsnapError};
pub use inventory::{Dataset, Inventory, Snapshot};
pub use naming::SnapshotKind;
pub use replication::{
    ReplicationEngine, ReplicationPair, ReplicationReport, ReplicationResolver, ReplicationState,
};
pub use snapshot::{CleanupReport, SnapshotManager, SnapshotReport};
pub use storage::Storage;
