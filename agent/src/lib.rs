//! Host-side adapter around the `zfs` command line tool.
//!
//! Everything here is a direct translation of one storage primitive into one
//! `zfs` invocation. Policy lives in the `zsnap` crate.

pub mod error;
pub mod services;
pub mod types;

pub use error::AgentError;
pub use services::zfs::ZfsCli;
pub use types::{CommandLine, DatasetRecord, SnapshotRecord, TransferFlags, TransferRequest};
