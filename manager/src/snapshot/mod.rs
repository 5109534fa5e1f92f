pub mod manager;

pub use manager::{CleanupReport, SnapshotManager, SnapshotReport};
