//! Central repository for naming conventions, defaults and well-known values
//!
//! Organized by category so every magic string has a single source of truth.

/// Snapshot label conventions
///
/// Timestamps in labels are always UTC. Labels written in local time by other
/// tools on a host not running UTC are still read as UTC, so their age is off by
/// the host's UTC offset until they rotate out.
pub mod labels {
    /// Prefix of routine snapshots created by `snapshot`
    pub const AUTOMATIC_PREFIX: &str = "auto_";

    /// Prefix of replication marker snapshots
    pub const MARKER_PREFIX: &str = "repl_";

    /// Timestamp embedded after the prefix (UTC, zero padded so labels sort chronologically)
    pub const TIMESTAMP_FORMAT: &str = "%Y_%m_%d_%H_%M_%S";
}

/// Configuration file locations and defaults
pub mod config {
    /// Directory used when neither `--config` nor the environment names one
    pub const DEFAULT_CONFIG_DIR: &str = "/etc/zsnap";

    /// Environment variable naming the configuration directory
    pub const CONFIG_DIR_ENV: &str = "ZSNAP_CONFIG_DIR";

    /// Global settings file inside the configuration directory
    pub const MAIN_CONFIG_FILE: &str = "main.toml";

    /// Binary invoked for every storage primitive
    pub const DEFAULT_ZFS_BINARY: &str = "zfs";
}

/// ZFS properties forced on replication destinations
pub mod properties {
    pub const READONLY: &str = "readonly";
    pub const ON: &str = "on";
}

/// Logging defaults
pub mod logging {
    /// Directives applied on top of `RUST_LOG`
    pub const DEFAULT_DIRECTIVES: &[&str] = &["zsnap=info", "zsnap_agent=info"];
}
