// File: manager/src/config/mod.rs
pub mod manager;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use zsnap_agent::TransferFlags;
pub use manager::ConfigManager;

use crate::constants::config::DEFAULT_ZFS_BINARY;
use crate::errors::ZsnapError;
use crate::inventory::relative_to;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_zfs_binary")]
    pub zfs_binary: String,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub transfer: TransferConfig,
    #[serde(default)]
    pub replication: ReplicationConfig,
    // Populated from individual pool config files
    #[serde(skip)]
    pub pools: HashMap<String, PoolConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            zfs_binary: default_zfs_binary(),
            dry_run: false,
            transfer: TransferConfig::default(),
            replication: ReplicationConfig::default(),
            pools: HashMap::new(),
        }
    }
}

fn default_zfs_binary() -> String {
    DEFAULT_ZFS_BINARY.to_string()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferConfig {
    #[serde(default = "default_true")]
    pub raw: bool,
    #[serde(default = "default_true")]
    pub large_blocks: bool,
    /// Recursive markers plus a replication stream covering the whole subtree
    #[serde(default = "default_true")]
    pub recursive: bool,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            raw: true,
            large_blocks: true,
            recursive: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicationConfig {
    /// Destroy markers older than the newest one after a successful transfer
    #[serde(default = "default_true")]
    pub prune_superseded_markers: bool,
    #[serde(default)]
    pub roots: Vec<ReplicationRoot>,
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            prune_superseded_markers: true,
            roots: Vec::new(),
        }
    }
}

/// `source` is replicated below `destination` with the same relative layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicationRoot {
    pub source: String,
    pub destination: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PoolConfig {
    pub retention_hours: Option<u32>,
    /// Set to false to leave the whole pool out of `snapshot`
    #[serde(default = "default_true")]
    pub snapshot: bool,
}

impl Config {
    pub fn pool(&self, name: &str) -> Option<&PoolConfig> {
        self.pools.get(name)
    }

    /// Whether datasets of `pool` take part in `snapshot`.
    pub fn snapshots_enabled(&self, pool: &str) -> bool {
        self.pool(pool).map(|p| p.snapshot).unwrap_or(true)
    }

    /// Retention for `pool`: an explicit value wins over the pool's config file.
    pub fn retention_for(&self, pool: &str, explicit: Option<u32>) -> Result<u32, ZsnapError> {
        let hours = explicit
            .or_else(|| self.pool(pool).and_then(|p| p.retention_hours))
            .ok_or_else(|| {
                ZsnapError::Config(format!(
                    "no retention given for pool {} and none configured",
                    pool
                ))
            })?;

        if hours == 0 {
            return Err(ZsnapError::Config(
                "Retention must be at least 1 hour".to_string(),
            ));
        }
        Ok(hours)
    }

    pub fn transfer_flags(&self) -> TransferFlags {
        TransferFlags {
            replicate: self.transfer.recursive,
            raw: self.transfer.raw,
            large_blocks: self.transfer.large_blocks,
        }
    }

    pub fn validate(&self) -> Result<(), ZsnapError> {
        if self.zfs_binary.trim().is_empty() {
            return Err(ZsnapError::Config("zfs_binary must not be empty".to_string()));
        }

        for (name, pool) in &self.pools {
            if pool.retention_hours == Some(0) {
                return Err(ZsnapError::Config(format!(
                    "pool {}: retention_hours must be at least 1",
                    name
                )));
            }
        }

        for root in &self.replication.roots {
            for path in [&root.source, &root.destination] {
                if path.is_empty() || path.starts_with('/') || path.ends_with('/') {
                    return Err(ZsnapError::Config(format!(
                        "invalid replication root '{}'",
                        path
                    )));
                }
            }

            if relative_to(&root.destination, &root.source).is_some() {
                return Err(ZsnapError::Config(format!(
                    "replication destination {} lies inside its source {}",
                    root.destination, root.source
                )));
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfigFile {
    pub pool: PoolConfig,
}
