//! Error types for ZFS command execution.

use thiserror::Error;

/// Errors raised while invoking the `zfs` binary.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The process could not be started at all.
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The process ran and exited unsuccessfully.
    #[error("`{command}` exited with status {status}: {stderr}")]
    Failed {
        command: String,
        status: i32,
        stderr: String,
    },

    /// The named dataset or snapshot does not exist.
    #[error("dataset does not exist: {0}")]
    DatasetNotFound(String),

    /// Destroy refused because of a user hold or a dependent clone.
    #[error("{target} is busy (held or cloned): {stderr}")]
    Busy { target: String, stderr: String },

    /// `zfs list` produced output we could not interpret.
    #[error("unexpected output from `{command}`: {reason}")]
    Parse { command: String, reason: String },

    /// The send stream could not be piped into the receiver.
    #[error("pipe from `{producer}` into `{consumer}` failed: {source}")]
    Pipe {
        producer: String,
        consumer: String,
        #[source]
        source: std::io::Error,
    },
}

impl AgentError {
    /// True when the failure was caused by a hold or clone reference.
    pub fn is_busy(&self) -> bool {
        matches!(self, AgentError::Busy { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, AgentError::DatasetNotFound(_))
    }
}
