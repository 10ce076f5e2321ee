//! Test configuration builder for writing config directories

use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// Builder for a temporary config directory holding `main.toml`
pub struct TestConfigBuilder {
    temp_dir: TempDir,
    lines: Vec<String>,
    agent: Vec<String>,
    notifications: Vec<String>,
}

impl TestConfigBuilder {
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("Failed to create temp dir"),
            lines: Vec::new(),
            agent: Vec::new(),
            notifications: Vec::new(),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.lines.push(format!("port = {}", port));
        self
    }

    pub fn with_database_path(mut self, path: &str) -> Self {
        self.lines.push(format!("database_path = \"{}\"", path));
        self
    }

    pub fn with_event_buffer_size(mut self, size: usize) -> Self {
        self.lines.push(format!("event_buffer_size = {}", size));
        self
    }

    pub fn with_agent(mut self, base_url: &str, api_key: &str) -> Self {
        self.agent.push(format!("base_url = \"{}\"", base_url));
        self.agent.push(format!("api_key = \"{}\"", api_key));
        self
    }

    pub fn with_webhook(mut self, webhook_url: &str) -> Self {
        self.notifications.push(format!("webhook_url = \"{}\"", webhook_url));
        self
    }

    fn to_toml(&self) -> String {
        let mut toml = self.lines.join("\n");
        if !self.agent.is_empty() {
            toml.push_str("\n\n[agent]\n");
            toml.push_str(&self.agent.join("\n"));
        }
        if !self.notifications.is_empty() {
            toml.push_str("\n\n[notifications]\n");
            toml.push_str(&self.notifications.join("\n"));
        }
        toml.push('\n');
        toml
    }

    /// Write main.toml and return the config directory
    pub fn build(self) -> TestConfig {
        let config_dir = self.temp_dir.path().join("config");
        fs::create_dir_all(&config_dir).expect("Failed to create config dir");
        fs::write(config_dir.join("main.toml"), self.to_toml()).expect("Failed to write main.toml");

        TestConfig {
            _temp_dir: self.temp_dir,
            config_dir,
        }
    }
}

/// Keeps the temp directory alive for the duration of the test
pub struct TestConfig {
    _temp_dir: TempDir,
    pub config_dir: PathBuf,
}

impl TestConfig {
    pub fn config_dir_string(&self) -> String {
        self.config_dir.to_string_lossy().to_string()
    }
}
