use chrono::Utc;
use serde::{Deserialize, Deserializer};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::constants::tasks::{
    DEFAULT_TIMEOUT_SECONDS, DEFAULT_TIMEZONE, DUPLICATE_SUFFIX, MAX_DESTINATION_LENGTH,
    MAX_NAME_LENGTH, MAX_START_URL_LENGTH, MAX_TIMEOUT_SECONDS, MIN_TIMEOUT_SECONDS,
};
use crate::database::{Database, TaskRecord};
use crate::errors::SchedulerError;
use crate::scheduler::cron::{parse_timezone, validate_schedule};
use crate::scheduler::SchedulerHandle;

fn default_timezone() -> String {
    DEFAULT_TIMEZONE.to_string()
}

fn default_timeout() -> i64 {
    DEFAULT_TIMEOUT_SECONDS
}

fn default_true() -> bool {
    true
}

/// Distinguishes an absent field (`None`) from an explicit `null` (`Some(None)`)
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Payload for creating a task
#[derive(Debug, Clone, Deserialize)]
pub struct TaskDraft {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub cron_expression: Option<String>,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_timeout")]
    pub timeout_seconds: i64,
    #[serde(default = "default_true")]
    pub headless: bool,
    #[serde(default)]
    pub start_url: Option<String>,
    #[serde(default = "default_true")]
    pub notifications_enabled: bool,
    #[serde(default)]
    pub notify_destination: Option<String>,
    #[serde(default)]
    pub notify_on_success: bool,
    #[serde(default = "default_true")]
    pub notify_on_failure: bool,
}

/// Partial update; absent fields keep their current value
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub cron_expression: Option<Option<String>>,
    pub timezone: Option<String>,
    pub enabled: Option<bool>,
    pub timeout_seconds: Option<i64>,
    pub headless: Option<bool>,
    #[serde(default, deserialize_with = "nullable")]
    pub start_url: Option<Option<String>>,
    pub notifications_enabled: Option<bool>,
    #[serde(default, deserialize_with = "nullable")]
    pub notify_destination: Option<Option<String>>,
    pub notify_on_success: Option<bool>,
    pub notify_on_failure: Option<bool>,
}

/// Blank optional text means "not set"
fn normalize(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn validate_task(task: &TaskRecord) -> Result<(), SchedulerError> {
    let name_len = task.name.chars().count();
    if task.name.trim().is_empty() || name_len > MAX_NAME_LENGTH {
        return Err(SchedulerError::validation(
            "name",
            format!("must be between 1 and {} characters", MAX_NAME_LENGTH),
        ));
    }
    if task.description.trim().is_empty() {
        return Err(SchedulerError::validation("description", "must not be empty"));
    }
    if !(MIN_TIMEOUT_SECONDS..=MAX_TIMEOUT_SECONDS).contains(&task.timeout_seconds) {
        return Err(SchedulerError::validation(
            "timeout_seconds",
            format!(
                "must be between {} and {}",
                MIN_TIMEOUT_SECONDS, MAX_TIMEOUT_SECONDS
            ),
        ));
    }
    if task
        .start_url
        .as_ref()
        .is_some_and(|url| url.chars().count() > MAX_START_URL_LENGTH)
    {
        return Err(SchedulerError::validation(
            "start_url",
            format!("must be at most {} characters", MAX_START_URL_LENGTH),
        ));
    }
    if task
        .notify_destination
        .as_ref()
        .is_some_and(|dest| dest.chars().count() > MAX_DESTINATION_LENGTH)
    {
        return Err(SchedulerError::validation(
            "notify_destination",
            format!("must be at most {} characters", MAX_DESTINATION_LENGTH),
        ));
    }

    match &task.cron_expression {
        Some(expression) => validate_schedule(expression, &task.timezone),
        None => parse_timezone(&task.timezone).map(|_| ()),
    }
}

/// Task CRUD on top of the store, keeping the scheduler loop informed
pub struct TaskService {
    database: Arc<Database>,
    scheduler: SchedulerHandle,
}

impl TaskService {
    pub fn new(database: Arc<Database>, scheduler: SchedulerHandle) -> Self {
        Self {
            database,
            scheduler,
        }
    }

    pub async fn list_tasks(&self) -> Result<Vec<TaskRecord>, SchedulerError> {
        self.database.list_tasks().await
    }

    pub async fn get_task(&self, task_id: &str) -> Result<TaskRecord, SchedulerError> {
        self.database
            .get_task(task_id)
            .await?
            .ok_or_else(|| SchedulerError::task_not_found(task_id))
    }

    pub async fn create_task(&self, draft: TaskDraft) -> Result<TaskRecord, SchedulerError> {
        let now = Utc::now();
        let task = TaskRecord {
            id: Uuid::new_v4().to_string(),
            name: draft.name.trim().to_string(),
            description: draft.description.trim().to_string(),
            cron_expression: normalize(draft.cron_expression),
            timezone: draft.timezone.trim().to_string(),
            enabled: draft.enabled,
            timeout_seconds: draft.timeout_seconds,
            headless: draft.headless,
            start_url: normalize(draft.start_url),
            notifications_enabled: draft.notifications_enabled,
            notify_destination: normalize(draft.notify_destination),
            notify_on_success: draft.notify_on_success,
            notify_on_failure: draft.notify_on_failure,
            created_at: now,
            updated_at: now,
            last_run_at: None,
            next_run_at: None,
        };
        validate_task(&task)?;

        self.database.insert_task(&task).await?;
        info!("Created task '{}' ({})", task.name, task.id);

        Ok(self.sync_schedule(task).await)
    }

    pub async fn update_task(
        &self,
        task_id: &str,
        patch: TaskPatch,
    ) -> Result<TaskRecord, SchedulerError> {
        let mut task = self.get_task(task_id).await?;

        if let Some(name) = patch.name {
            task.name = name.trim().to_string();
        }
        if let Some(description) = patch.description {
            task.description = description.trim().to_string();
        }
        if let Some(cron_expression) = patch.cron_expression {
            task.cron_expression = normalize(cron_expression);
        }
        if let Some(timezone) = patch.timezone {
            task.timezone = timezone.trim().to_string();
        }
        if let Some(enabled) = patch.enabled {
            task.enabled = enabled;
        }
        if let Some(timeout_seconds) = patch.timeout_seconds {
            task.timeout_seconds = timeout_seconds;
        }
        if let Some(headless) = patch.headless {
            task.headless = headless;
        }
        if let Some(start_url) = patch.start_url {
            task.start_url = normalize(start_url);
        }
        if let Some(notifications_enabled) = patch.notifications_enabled {
            task.notifications_enabled = notifications_enabled;
        }
        if let Some(notify_destination) = patch.notify_destination {
            task.notify_destination = normalize(notify_destination);
        }
        if let Some(notify_on_success) = patch.notify_on_success {
            task.notify_on_success = notify_on_success;
        }
        if let Some(notify_on_failure) = patch.notify_on_failure {
            task.notify_on_failure = notify_on_failure;
        }
        validate_task(&task)?;

        task.updated_at = Utc::now();
        self.database.update_task(&task).await?;
        info!("Updated task '{}' ({})", task.name, task.id);

        Ok(self.sync_schedule(task).await)
    }

    /// Run records of the task are kept
    pub async fn delete_task(&self, task_id: &str) -> Result<(), SchedulerError> {
        if !self.database.delete_task(task_id).await? {
            return Err(SchedulerError::task_not_found(task_id));
        }
        info!("Deleted task {}", task_id);

        if let Err(e) = self.scheduler.task_removed(task_id).await {
            warn!("Could not unschedule deleted task {}: {}", task_id, e);
        }
        Ok(())
    }

    pub async fn toggle_task(&self, task_id: &str) -> Result<TaskRecord, SchedulerError> {
        let mut task = self.get_task(task_id).await?;
        task.enabled = !task.enabled;
        task.updated_at = Utc::now();

        self.database.update_task(&task).await?;
        info!(
            "Task '{}' ({}) {}",
            task.name,
            task.id,
            if task.enabled { "enabled" } else { "disabled" }
        );

        Ok(self.sync_schedule(task).await)
    }

    /// Copies the task under a new id and a suffixed name. The copy starts
    /// enabled with no run history.
    pub async fn duplicate_task(&self, task_id: &str) -> Result<TaskRecord, SchedulerError> {
        let original = self.get_task(task_id).await?;
        let now = Utc::now();

        let keep = MAX_NAME_LENGTH.saturating_sub(DUPLICATE_SUFFIX.chars().count());
        let base: String = original.name.chars().take(keep).collect();

        let copy = TaskRecord {
            id: Uuid::new_v4().to_string(),
            name: format!("{}{}", base, DUPLICATE_SUFFIX),
            enabled: true,
            created_at: now,
            updated_at: now,
            last_run_at: None,
            next_run_at: None,
            ..original
        };

        self.database.insert_task(&copy).await?;
        info!("Duplicated task {} as '{}' ({})", task_id, copy.name, copy.id);

        Ok(self.sync_schedule(copy).await)
    }

    /// Starts a run right away, scheduled or not, enabled or not. Fails with
    /// `ConcurrencyRejected` when the task is already running.
    pub async fn run_now(&self, task_id: &str) -> Result<String, SchedulerError> {
        let task = self.get_task(task_id).await?;
        self.scheduler.run_now(task).await
    }

    /// Tells the scheduler about the task's current definition and returns
    /// the task carrying the resulting `next_run_at`.
    async fn sync_schedule(&self, mut task: TaskRecord) -> TaskRecord {
        match self.scheduler.task_upserted(&task.id).await {
            Ok(next_run_at) => task.next_run_at = next_run_at,
            Err(e) => warn!(
                "Task {} saved but not rescheduled, it will be picked up on restart: {}",
                task.id, e
            ),
        }
        task
    }
}
