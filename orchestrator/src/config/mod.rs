pub mod manager;
use serde::{Deserialize, Serialize};
pub use manager::ConfigManager;

use crate::constants::{agent, defaults, events, scheduler};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_database_path")]
    pub database_path: String,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
    /// Per-subscriber event buffer; slower subscribers lose the oldest events
    #[serde(default = "default_event_buffer_size")]
    pub event_buffer_size: usize,
    #[serde(default = "default_command_buffer_size")]
    pub command_buffer_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Base URL of the automation agent service; runs fail while unset
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Notifications are skipped while unset
    pub webhook_url: Option<String>,
    /// Used when a task has no destination of its own
    pub default_destination: Option<String>,
}

fn default_host() -> String {
    defaults::HOST.to_string()
}

fn default_port() -> u16 {
    defaults::PORT
}

fn default_database_path() -> String {
    defaults::DATABASE_PATH.to_string()
}

fn default_event_buffer_size() -> usize {
    events::DEFAULT_SUBSCRIBER_BUFFER
}

fn default_command_buffer_size() -> usize {
    scheduler::DEFAULT_COMMAND_BUFFER
}

fn default_request_timeout() -> u64 {
    agent::DEFAULT_REQUEST_TIMEOUT_SECONDS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            database_path: default_database_path(),
            agent: AgentConfig::default(),
            notifications: NotificationConfig::default(),
            event_buffer_size: default_event_buffer_size(),
            command_buffer_size: default_command_buffer_size(),
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: None,
            request_timeout_seconds: default_request_timeout(),
        }
    }
}
