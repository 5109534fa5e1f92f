// File: agent/src/types.rs
use serde::Serialize;
use std::fmt;

// === COMMAND LINES ===

/// A program plus its arguments, kept structured so nothing goes through a shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandLine {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, A>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

// === LISTING RECORDS ===

/// One filesystem row from `zfs list -t filesystem -o name,mounted`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatasetRecord {
    pub name: String,
    pub mounted: bool,
}

/// One snapshot row from `zfs list -t snapshot -o name,creation`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotRecord {
    pub dataset: String,
    pub label: String,
    /// Creation time in seconds since the epoch (`-p` output).
    pub creation: i64,
}

// === TRANSFERS ===

/// Flags for the sending side of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TransferFlags {
    /// `-R`: replication stream including descendants and properties.
    pub replicate: bool,
    /// `-w`: raw stream, keeps encrypted datasets encrypted.
    pub raw: bool,
    /// `-L`: allow records larger than 128K.
    pub large_blocks: bool,
}

impl Default for TransferFlags {
    fn default() -> Self {
        Self {
            replicate: true,
            raw: true,
            large_blocks: true,
        }
    }
}

/// A send/receive pair: `zfs send [-I base] snapshot | zfs recv target`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    /// Full name (`dataset@label`) of the incremental basis, `None` for a full stream.
    pub base: Option<String>,
    /// Full name of the snapshot being sent.
    pub snapshot: String,
    /// Dataset receiving the stream.
    pub target: String,
    pub flags: TransferFlags,
}

impl TransferRequest {
    pub fn is_incremental(&self) -> bool {
        self.base.is_some()
    }
}
