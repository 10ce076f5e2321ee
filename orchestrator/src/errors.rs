//! Custom error types for the task orchestrator
//!
//! Provides structured error handling with context for the scheduling,
//! execution and storage failure scenarios.

use std::fmt;

/// Main error type for the orchestrator
#[derive(Debug)]
pub enum SchedulerError {
    /// Cron expression or timezone could not be parsed
    InvalidSchedule { expression: String, reason: String },

    /// A run of this task is already in progress
    ConcurrencyRejected { task_id: String, active_run_id: String },

    /// The automation agent reported an error
    AgentFailure { task_id: String, reason: String },

    /// The automation agent did not finish within the task timeout
    AgentTimeout { task_id: String, timeout_seconds: i64 },

    /// The notification sender could not deliver a message
    NotificationDelivery { destination: String, reason: String },

    /// Persistence layer errors
    Store(StoreError),

    /// A terminal state was written twice for the same run
    RunAlreadyCompleted { run_id: String },

    /// No task with the given id exists
    TaskNotFound { task_id: String },

    /// Request payload failed validation
    Validation { field: String, reason: String },

    /// The scheduler loop is not accepting commands
    SchedulerUnavailable,

    /// Other errors with context
    Other(String),
}

/// Store error variants
#[derive(Debug)]
pub enum StoreError {
    /// Connection or pool failure
    ConnectionFailed { reason: String },

    /// Query execution failed
    QueryFailed { reason: String },

    /// Row could not be mapped to or from its domain type
    Serialization { reason: String },

    /// Lookup by id found nothing
    NotFound { entity: &'static str, id: String },
}

impl SchedulerError {
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        SchedulerError::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn task_not_found(task_id: impl Into<String>) -> Self {
        SchedulerError::TaskNotFound {
            task_id: task_id.into(),
        }
    }
}

impl fmt::Display for SchedulerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedulerError::InvalidSchedule { expression, reason } => {
                write!(f, "Invalid schedule '{}': {}", expression, reason)
            }
            SchedulerError::ConcurrencyRejected { task_id, active_run_id } => {
                write!(
                    f,
                    "Task '{}' is already running (run {})",
                    task_id, active_run_id
                )
            }
            SchedulerError::AgentFailure { task_id, reason } => {
                write!(f, "Automation agent failed for task '{}': {}", task_id, reason)
            }
            SchedulerError::AgentTimeout {
                task_id,
                timeout_seconds,
            } => {
                write!(
                    f,
                    "Task '{}' timed out after {}s",
                    task_id, timeout_seconds
                )
            }
            SchedulerError::NotificationDelivery { destination, reason } => {
                write!(f, "Notification to '{}' failed: {}", destination, reason)
            }
            SchedulerError::Store(e) => write!(f, "Store error: {}", e),
            SchedulerError::RunAlreadyCompleted { run_id } => {
                write!(f, "Run '{}' is already completed", run_id)
            }
            SchedulerError::TaskNotFound { task_id } => {
                write!(f, "Task '{}' not found", task_id)
            }
            SchedulerError::Validation { field, reason } => {
                write!(f, "Invalid value for '{}': {}", field, reason)
            }
            SchedulerError::SchedulerUnavailable => write!(f, "Scheduler is not running"),
            SchedulerError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::ConnectionFailed { reason } => {
                write!(f, "Database connection failed: {}", reason)
            }
            StoreError::QueryFailed { reason } => write!(f, "Query failed: {}", reason),
            StoreError::Serialization { reason } => {
                write!(f, "Serialization error: {}", reason)
            }
            StoreError::NotFound { entity, id } => write!(f, "{} '{}' not found", entity, id),
        }
    }
}

impl std::error::Error for SchedulerError {}
impl std::error::Error for StoreError {}

impl From<StoreError> for SchedulerError {
    fn from(err: StoreError) -> Self {
        SchedulerError::Store(err)
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StoreError::ConnectionFailed {
                    reason: err.to_string(),
                }
            }
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                StoreError::Serialization {
                    reason: err.to_string(),
                }
            }
            other => StoreError::QueryFailed {
                reason: other.to_string(),
            },
        }
    }
}

impl From<sqlx::Error> for SchedulerError {
    fn from(err: sqlx::Error) -> Self {
        SchedulerError::Store(err.into())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization {
            reason: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for SchedulerError {
    fn from(err: serde_json::Error) -> Self {
        SchedulerError::Store(err.into())
    }
}

// Conversions from anyhow::Error for application plumbing
impl From<anyhow::Error> for SchedulerError {
    fn from(err: anyhow::Error) -> Self {
        SchedulerError::Other(err.to_string())
    }
}
