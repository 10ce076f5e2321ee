use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::NotificationConfig;
use crate::constants::notifications::{MAX_EXCERPT_CHARS, WEBHOOK_TIMEOUT};
use crate::database::{RunRecord, RunStatus, TaskRecord};
use crate::errors::SchedulerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Success,
    Failure,
    Timeout,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunNotification {
    pub timestamp: DateTime<Utc>,
    pub kind: NotificationKind,
    pub task_id: String,
    pub task_name: String,
    pub run_id: String,
    /// Per-task override; the notifier's default applies when absent
    pub destination: Option<String>,
    pub duration_seconds: Option<f64>,
    pub message: String,
}

impl RunNotification {
    /// Builds the notification for a terminal run, or `None` while it is still running
    pub fn from_run(task: &TaskRecord, run: &RunRecord) -> Option<Self> {
        let duration = run
            .duration_seconds
            .map(|secs| format!("{:.1}s", secs))
            .unwrap_or_else(|| "N/A".to_string());

        let (kind, message) = match run.status {
            RunStatus::Running => return None,
            RunStatus::Success => {
                let mut message = format!(
                    "Task completed successfully\nTask: {}\nDuration: {}",
                    task.name, duration
                );
                if let Some(summary) = run.result_summary.as_deref().filter(|s| !s.is_empty()) {
                    message.push_str(&format!("\n\nResult:\n{}", excerpt(summary)));
                }
                (NotificationKind::Success, message)
            }
            RunStatus::Failure => {
                let mut message = format!("Task failed\nTask: {}\nDuration: {}", task.name, duration);
                if let Some(error) = run.error_message.as_deref().filter(|s| !s.is_empty()) {
                    message.push_str(&format!("\n\nError:\n{}", excerpt(error)));
                }
                (NotificationKind::Failure, message)
            }
            RunStatus::Timeout => (
                NotificationKind::Timeout,
                format!(
                    "Task timed out\nTask: {}\nTimeout: {}s\n\nThe task was terminated because it exceeded the configured timeout.",
                    task.name, task.timeout_seconds
                ),
            ),
        };

        Some(Self {
            timestamp: Utc::now(),
            kind,
            task_id: task.id.clone(),
            task_name: task.name.clone(),
            run_id: run.id.clone(),
            destination: task.notify_destination.clone(),
            duration_seconds: run.duration_seconds,
            message,
        })
    }
}

/// Whether the task's notification policy asks for a message about `status`.
/// A timeout counts as a failure.
pub fn should_notify(task: &TaskRecord, status: RunStatus) -> bool {
    if !task.notifications_enabled {
        return false;
    }
    match status {
        RunStatus::Running => false,
        RunStatus::Success => task.notify_on_success,
        RunStatus::Failure | RunStatus::Timeout => task.notify_on_failure,
    }
}

fn excerpt(text: &str) -> String {
    text.chars().take(MAX_EXCERPT_CHARS).collect()
}

#[async_trait]
pub trait Notifier: Send + Sync {
    fn is_configured(&self) -> bool;

    async fn deliver(&self, notification: &RunNotification) -> Result<(), SchedulerError>;
}

/// Posts run notifications as JSON to a webhook
pub struct WebhookNotifier {
    webhook_url: Option<String>,
    default_destination: Option<String>,
    client: Client,
}

impl WebhookNotifier {
    pub fn new(config: &NotificationConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(WEBHOOK_TIMEOUT)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create HTTP client for notifications: {}", e))?;

        Ok(Self {
            webhook_url: config.webhook_url.clone().filter(|url| !url.is_empty()),
            default_destination: config.default_destination.clone(),
            client,
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    fn is_configured(&self) -> bool {
        self.webhook_url.is_some()
    }

    async fn deliver(&self, notification: &RunNotification) -> Result<(), SchedulerError> {
        let Some(webhook_url) = &self.webhook_url else {
            debug!("No webhook URL configured, skipping notification");
            return Ok(());
        };

        let mut payload = notification.clone();
        if payload.destination.is_none() {
            payload.destination = self.default_destination.clone();
        }
        let destination = payload
            .destination
            .clone()
            .unwrap_or_else(|| webhook_url.clone());

        match timeout(WEBHOOK_TIMEOUT, self.client.post(webhook_url).json(&payload).send()).await {
            Ok(Ok(response)) if response.status().is_success() => {
                info!(
                    "Notification sent for task {} run {}: {:?}",
                    payload.task_name, payload.run_id, payload.kind
                );
                Ok(())
            }
            Ok(Ok(response)) => {
                warn!(
                    "Notification webhook returned status: {} for {}",
                    response.status(),
                    payload.task_name
                );
                Err(SchedulerError::NotificationDelivery {
                    destination,
                    reason: format!("webhook returned status {}", response.status()),
                })
            }
            Ok(Err(e)) => Err(SchedulerError::NotificationDelivery {
                destination,
                reason: e.to_string(),
            }),
            Err(_) => Err(SchedulerError::NotificationDelivery {
                destination,
                reason: "webhook timeout".to_string(),
            }),
        }
    }
}
