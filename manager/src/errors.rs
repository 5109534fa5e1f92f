//! Error types for the snapshot and replication engine
//!
//! Fatal errors abort a command. Per-item failures inside a batch are collected as
//! [`ItemFailure`] entries in the command's report instead.

use serde::Serialize;
use thiserror::Error;
use zsnap_agent::AgentError;

/// Main error type for zsnap commands
#[derive(Debug, Error)]
pub enum ZsnapError {
    /// The storage layer could not be queried; no partial inventory is used
    #[error("failed to query {target}: {source}")]
    Inventory {
        target: String,
        #[source]
        source: AgentError,
    },

    /// Destination path does not mirror the source path under the configured roots
    #[error("destination {destination} does not mirror source {source_path} (expected {expected})")]
    StructureMismatch {
        source_path: String,
        destination: String,
        expected: String,
    },

    /// Initial replication refused because the destination already exists
    #[error("destination {destination} already exists, refusing to overwrite it")]
    AlreadyInitialized { destination: String },

    /// Incremental replication requested before an initial one
    #[error("destination {destination} does not exist, run init_repl first")]
    NotInitialized { destination: String },

    /// Source and destination share no replication marker
    #[error(
        "{source_path} and {destination} share no common replication marker, manual intervention required"
    )]
    DivergedState {
        source_path: String,
        destination: String,
    },

    /// Send/receive failed. The new source marker is kept so a re-run resumes cleanly
    #[error("transfer of {snapshot} into {destination} failed: {source}")]
    Transfer {
        snapshot: String,
        destination: String,
        #[source]
        source: AgentError,
    },

    /// A single mutating primitive failed outside of a batch
    #[error("{operation} failed on {target}: {source}")]
    Storage {
        operation: &'static str,
        target: String,
        #[source]
        source: AgentError,
    },

    /// Invalid or missing configuration
    #[error("configuration error: {0}")]
    Config(String),
}

impl ZsnapError {
    pub fn inventory(target: impl Into<String>, source: AgentError) -> Self {
        ZsnapError::Inventory {
            target: target.into(),
            source,
        }
    }

    pub fn storage(operation: &'static str, target: impl Into<String>, source: AgentError) -> Self {
        ZsnapError::Storage {
            operation,
            target: target.into(),
            source,
        }
    }
}

/// How a single batch item failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Refused because of a hold or a dependent clone; reported, never forced
    Busy,
    Failed,
}

/// One failed item of a batch (snapshot creation or destruction)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemFailure {
    pub target: String,
    pub kind: FailureKind,
    pub reason: String,
}

impl ItemFailure {
    pub fn from_agent(target: impl Into<String>, error: &AgentError) -> Self {
        let kind = if error.is_busy() {
            FailureKind::Busy
        } else {
            FailureKind::Failed
        };

        Self {
            target: target.into(),
            kind,
            reason: error.to_string(),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.kind == FailureKind::Busy
    }
}
