use super::Config;
use crate::constants::defaults::{CONFIG_DIR, CONFIG_DIR_ENV};
use anyhow::{anyhow, Result};
use std::path::Path;
use std::sync::Arc;
use tokio::fs;
use tracing::{info, warn};

pub struct ConfigManager {
    current_config: Arc<Config>,
}

impl ConfigManager {
    pub async fn new(config_dir: String) -> Result<Self> {
        let config = Self::load_configuration(&config_dir).await?;
        Ok(Self {
            current_config: Arc::new(config),
        })
    }

    /// `ORCHESTRATOR_CONFIG_DIR`, falling back to `./config`
    pub fn config_dir_from_env() -> String {
        std::env::var(CONFIG_DIR_ENV)
            .ok()
            .filter(|dir| !dir.trim().is_empty())
            .unwrap_or_else(|| CONFIG_DIR.to_string())
    }

    pub fn get_current_config(&self) -> Arc<Config> {
        self.current_config.clone()
    }

    async fn load_configuration(config_dir: &str) -> Result<Config> {
        let main_config_path = format!("{}/main.toml", config_dir);

        if !Path::new(&main_config_path).exists() {
            warn!("No config at {}, using defaults", main_config_path);
            return Ok(Config::default());
        }

        let main_config_content = fs::read_to_string(&main_config_path).await
            .map_err(|e| anyhow!("Failed to read main config {}: {}", main_config_path, e))?;

        let config: Config = toml::from_str(&main_config_content)
            .map_err(|e| anyhow!("Failed to parse main config: {}", e))?;

        if config.event_buffer_size == 0 {
            return Err(anyhow!("event_buffer_size must be greater than zero"));
        }
        if config.command_buffer_size == 0 {
            return Err(anyhow!("command_buffer_size must be greater than zero"));
        }

        info!(
            "Loaded configuration: agent {}, notifications {}",
            if config.agent.base_url.is_some() { "configured" } else { "not configured" },
            if config.notifications.webhook_url.is_some() { "configured" } else { "not configured" },
        );

        Ok(config)
    }
}
