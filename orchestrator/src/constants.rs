//! Application-wide constants for timeouts, limits, and configuration values
//!
//! This module organizes constants by category so validation rules, channel
//! sizes and network timeouts have a single source of truth.

use std::time::Duration;

/// Task validation limits and defaults
pub mod tasks {
    /// Lower bound for a task's execution timeout
    pub const MIN_TIMEOUT_SECONDS: i64 = 30;

    /// Upper bound for a task's execution timeout
    pub const MAX_TIMEOUT_SECONDS: i64 = 3600;

    /// Timeout applied when a task does not specify one
    pub const DEFAULT_TIMEOUT_SECONDS: i64 = 300;

    pub const MAX_NAME_LENGTH: usize = 255;
    pub const MAX_CRON_LENGTH: usize = 100;
    pub const MAX_TIMEZONE_LENGTH: usize = 50;
    pub const MAX_START_URL_LENGTH: usize = 2048;
    pub const MAX_DESTINATION_LENGTH: usize = 100;

    pub const DEFAULT_TIMEZONE: &str = "UTC";

    /// Appended to the name of a duplicated task
    pub const DUPLICATE_SUFFIX: &str = " (DUPLICATE)";
}

/// Run history pagination
pub mod logs {
    pub const DEFAULT_PER_PAGE: u32 = 25;
    pub const MAX_PER_PAGE: u32 = 100;
}

/// Event bus and SSE settings
pub mod events {
    use super::Duration;

    /// Events a subscriber may fall behind before the oldest are dropped
    pub const DEFAULT_SUBSCRIBER_BUFFER: usize = 64;

    /// Interval between SSE keep-alive comments
    pub const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);
}

/// Scheduler loop settings
pub mod scheduler {
    use super::Duration;

    /// Capacity of the scheduler command channel
    pub const DEFAULT_COMMAND_BUFFER: usize = 256;

    /// How long the loop sleeps when no task is scheduled (commands still wake it)
    pub const IDLE_WAKE_INTERVAL: Duration = Duration::from_secs(3600);

    /// Number of upcoming trigger instants shown per job in the status view
    pub const PREVIEW_TRIGGER_COUNT: usize = 3;
}

/// Notification delivery
pub mod notifications {
    use super::Duration;

    /// Webhook request timeout
    pub const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

    /// Result/error excerpts are cut to this many characters
    pub const MAX_EXCERPT_CHARS: usize = 500;
}

/// Remote automation agent
pub mod agent {
    /// HTTP request timeout for the agent call; the per-task timeout is enforced separately
    pub const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 3660;

    /// Endpoint the run request is posted to
    pub const RUN_ENDPOINT: &str = "/run";
}

/// Default server values
pub mod defaults {
    pub const HOST: &str = "0.0.0.0";
    pub const PORT: u16 = 8000;
    pub const DATABASE_PATH: &str = "data/orchestrator.db";
    pub const CONFIG_DIR: &str = "config";

    /// Environment variable that overrides the config directory
    pub const CONFIG_DIR_ENV: &str = "ORCHESTRATOR_CONFIG_DIR";
}
