// File: manager/src/config/manager.rs
use super::{Config, PoolConfigFile};
use anyhow::{anyhow, Context, Result};
use glob::glob;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, info};

use crate::constants::config::MAIN_CONFIG_FILE;

pub struct ConfigManager {
    config_dir: PathBuf,
    current_config: Arc<Config>,
}

impl ConfigManager {
    pub async fn new(config_dir: impl AsRef<Path>) -> Result<Self> {
        let config_dir = config_dir.as_ref().to_path_buf();
        let config = Self::load_configuration(&config_dir).await?;
        config.validate()?;
        Ok(Self {
            config_dir,
            current_config: Arc::new(config),
        })
    }

    pub fn get_current_config(&self) -> Arc<Config> {
        self.current_config.clone()
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    async fn load_configuration(config_dir: &Path) -> Result<Config> {
        if !fs::try_exists(config_dir).await.unwrap_or(false) {
            info!(
                "Config directory {} not found, using defaults",
                config_dir.display()
            );
            return Ok(Config::default());
        }

        let main_config_path = config_dir.join(MAIN_CONFIG_FILE);
        let mut config: Config = if fs::try_exists(&main_config_path).await.unwrap_or(false) {
            let content = fs::read_to_string(&main_config_path)
                .await
                .with_context(|| format!("Failed to read main config {}", main_config_path.display()))?;
            toml::from_str(&content)
                .map_err(|e| anyhow!("Failed to parse main config {}: {}", main_config_path.display(), e))?
        } else {
            debug!("No {} in {}, using defaults", MAIN_CONFIG_FILE, config_dir.display());
            Config::default()
        };

        // Every other *.toml file holds the policy of the pool it is named after
        let pattern = format!("{}/*.toml", config_dir.display());
        let mut pools = HashMap::new();

        for entry in glob(&pattern).map_err(|e| anyhow!("Glob pattern error: {}", e))? {
            let path = entry.map_err(|e| anyhow!("Glob entry error: {}", e))?;
            let filename = path
                .file_name()
                .and_then(|name| name.to_str())
                .ok_or_else(|| anyhow!("Invalid filename: {}", path.display()))?;

            if filename == MAIN_CONFIG_FILE {
                continue;
            }

            let pool_name = filename
                .strip_suffix(".toml")
                .ok_or_else(|| anyhow!("Invalid config filename: {}", filename))?;

            debug!("Loading pool config: {}", path.display());

            let content = fs::read_to_string(&path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;

            let pool_file: PoolConfigFile = toml::from_str(&content)
                .map_err(|e| anyhow!("Failed to parse {}: {}", path.display(), e))?;

            pools.insert(pool_name.to_string(), pool_file.pool);
        }

        config.pools = pools;

        info!(
            "Loaded {} pool policies, {} replication roots",
            config.pools.len(),
            config.replication.roots.len()
        );

        Ok(config)
    }
}
