//! Database record types (entities).
//!
//! This module contains all the record structs used by the database layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Tasks
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: String,
    pub name: String,
    pub description: String,
    // Schedule (absent cron = manual-only)
    pub cron_expression: Option<String>,
    pub timezone: String,
    pub enabled: bool,
    // Execution parameters
    pub timeout_seconds: i64,
    pub headless: bool,
    pub start_url: Option<String>,
    // Notification policy
    pub notifications_enabled: bool,
    pub notify_destination: Option<String>,
    pub notify_on_success: bool,
    pub notify_on_failure: bool,
    // Timestamps
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_run_at: Option<DateTime<Utc>>,
    pub next_run_at: Option<DateTime<Utc>>,
}

impl TaskRecord {
    /// True when the task should be cron-triggered
    pub fn is_scheduled(&self) -> bool {
        self.enabled
            && self
                .cron_expression
                .as_deref()
                .is_some_and(|expr| !expr.trim().is_empty())
    }
}

// ============================================================================
// Runs
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Success,
    Failure,
    Timeout,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Success => "success",
            RunStatus::Failure => "failure",
            RunStatus::Timeout => "timeout",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunStatus::Running)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(RunStatus::Running),
            "success" => Ok(RunStatus::Success),
            "failure" => Ok(RunStatus::Failure),
            "timeout" => Ok(RunStatus::Timeout),
            other => Err(format!("unknown run status '{}'", other)),
        }
    }
}

/// What initiated a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunTrigger {
    Scheduled,
    Manual,
}

impl RunTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunTrigger::Scheduled => "scheduled",
            RunTrigger::Manual => "manual",
        }
    }
}

impl fmt::Display for RunTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunTrigger {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(RunTrigger::Scheduled),
            "manual" => Ok(RunTrigger::Manual),
            other => Err(format!("unknown run trigger '{}'", other)),
        }
    }
}

/// One entry of the agent's step trace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentStep {
    pub index: usize,
    pub action: Option<String>,
    pub result: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: String,
    pub seq: i64,
    pub task_id: String,
    /// Joined from `tasks`; null once the task is deleted
    pub task_name: Option<String>,
    pub status: RunStatus,
    pub trigger: RunTrigger,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_seconds: Option<f64>,
    pub result_summary: Option<String>,
    pub error_message: Option<String>,
    pub agent_steps: Vec<AgentStep>,
}

/// Terminal outcome of a run
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Success { summary: String },
    Failure { error: String },
    Timeout { error: String },
}

impl RunOutcome {
    pub fn status(&self) -> RunStatus {
        match self {
            RunOutcome::Success { .. } => RunStatus::Success,
            RunOutcome::Failure { .. } => RunStatus::Failure,
            RunOutcome::Timeout { .. } => RunStatus::Timeout,
        }
    }

    pub fn summary(&self) -> Option<&str> {
        match self {
            RunOutcome::Success { summary } => Some(summary),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            RunOutcome::Success { .. } => None,
            RunOutcome::Failure { error } | RunOutcome::Timeout { error } => Some(error),
        }
    }
}

// ============================================================================
// Queries
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct RunQuery {
    pub task_id: Option<String>,
    pub status: Option<RunStatus>,
    pub page: u32,
    pub per_page: u32,
    /// Highest `seq` visible to the first page; later pages pass it back
    pub snapshot: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunPage {
    pub logs: Vec<RunRecord>,
    pub total: i64,
    pub page: u32,
    pub per_page: u32,
    pub total_pages: i64,
    pub snapshot: i64,
}
