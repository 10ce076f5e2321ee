//! Common test data and task builders

use chrono::{DateTime, Utc};
use orchestrator::database::TaskRecord;
use uuid::Uuid;

/// Get current timestamp for testing
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Common cron expressions
pub mod schedules {
    pub const EVERY_SECOND: &str = "* * * * * *";
    pub const EVERY_FIVE_MINUTES: &str = "*/5 * * * *";
    pub const DAILY_NINE: &str = "0 9 * * *";
}

/// Builder for task records inserted directly into the store
pub struct TaskBuilder {
    task: TaskRecord,
}

impl TaskBuilder {
    pub fn new(name: &str) -> Self {
        let now = Utc::now();
        Self {
            task: TaskRecord {
                id: Uuid::new_v4().to_string(),
                name: name.to_string(),
                description: format!("Automate: {}", name),
                cron_expression: None,
                timezone: "UTC".to_string(),
                enabled: true,
                timeout_seconds: 30,
                headless: true,
                start_url: Some("https://shop.example.com".to_string()),
                notifications_enabled: true,
                notify_destination: None,
                notify_on_success: false,
                notify_on_failure: true,
                created_at: now,
                updated_at: now,
                last_run_at: None,
                next_run_at: None,
            },
        }
    }

    pub fn cron(mut self, expression: &str) -> Self {
        self.task.cron_expression = Some(expression.to_string());
        self
    }

    pub fn timezone(mut self, timezone: &str) -> Self {
        self.task.timezone = timezone.to_string();
        self
    }

    pub fn disabled(mut self) -> Self {
        self.task.enabled = false;
        self
    }

    /// Below the API minimum; only for driving the engine directly
    pub fn timeout_seconds(mut self, seconds: i64) -> Self {
        self.task.timeout_seconds = seconds;
        self
    }

    pub fn notify_on_success(mut self, value: bool) -> Self {
        self.task.notify_on_success = value;
        self
    }

    pub fn notify_on_failure(mut self, value: bool) -> Self {
        self.task.notify_on_failure = value;
        self
    }

    pub fn notifications_enabled(mut self, value: bool) -> Self {
        self.task.notifications_enabled = value;
        self
    }

    pub fn created_at(mut self, at: DateTime<Utc>) -> Self {
        self.task.created_at = at;
        self.task.updated_at = at;
        self
    }

    pub fn build(self) -> TaskRecord {
        self.task
    }
}

pub fn task(name: &str) -> TaskRecord {
    TaskBuilder::new(name).build()
}
