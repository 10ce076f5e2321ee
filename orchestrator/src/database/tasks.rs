//! Task database operations.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use tracing::debug;

use super::records::TaskRecord;
use super::Database;
use crate::errors::SchedulerError;

const TASK_COLUMNS: &str = r#"
    id, name, description, cron_expression, timezone, enabled,
    timeout_seconds, headless, start_url, notifications_enabled,
    notify_destination, notify_on_success, notify_on_failure,
    created_at, updated_at, last_run_at, next_run_at
"#;

fn task_from_row(row: &SqliteRow) -> Result<TaskRecord, sqlx::Error> {
    Ok(TaskRecord {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        cron_expression: row.try_get("cron_expression")?,
        timezone: row.try_get("timezone")?,
        enabled: row.try_get("enabled")?,
        timeout_seconds: row.try_get("timeout_seconds")?,
        headless: row.try_get("headless")?,
        start_url: row.try_get("start_url")?,
        notifications_enabled: row.try_get("notifications_enabled")?,
        notify_destination: row.try_get("notify_destination")?,
        notify_on_success: row.try_get("notify_on_success")?,
        notify_on_failure: row.try_get("notify_on_failure")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        last_run_at: row.try_get("last_run_at")?,
        next_run_at: row.try_get("next_run_at")?,
    })
}

impl Database {
    pub async fn insert_task(&self, task: &TaskRecord) -> Result<(), SchedulerError> {
        debug!("Storing task: {} ({})", task.name, task.id);

        sqlx::query(
            r#"
            INSERT INTO tasks (
                id, name, description, cron_expression, timezone, enabled,
                timeout_seconds, headless, start_url, notifications_enabled,
                notify_destination, notify_on_success, notify_on_failure,
                created_at, updated_at, last_run_at, next_run_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&task.id)
        .bind(&task.name)
        .bind(&task.description)
        .bind(&task.cron_expression)
        .bind(&task.timezone)
        .bind(task.enabled)
        .bind(task.timeout_seconds)
        .bind(task.headless)
        .bind(&task.start_url)
        .bind(task.notifications_enabled)
        .bind(&task.notify_destination)
        .bind(task.notify_on_success)
        .bind(task.notify_on_failure)
        .bind(task.created_at)
        .bind(task.updated_at)
        .bind(task.last_run_at)
        .bind(task.next_run_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to store task {}: {}", task.id, e);
            e
        })?;

        Ok(())
    }

    pub async fn get_task(&self, task_id: &str) -> Result<Option<TaskRecord>, SchedulerError> {
        let sql = format!("SELECT {} FROM tasks WHERE id = ?", TASK_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(task_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(task_from_row).transpose()?)
    }

    /// All tasks, newest first
    pub async fn list_tasks(&self) -> Result<Vec<TaskRecord>, SchedulerError> {
        let sql = format!(
            "SELECT {} FROM tasks ORDER BY created_at DESC, rowid DESC",
            TASK_COLUMNS
        );
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;

        Ok(rows
            .iter()
            .map(task_from_row)
            .collect::<Result<Vec<_>, _>>()?)
    }

    /// Enabled tasks that carry a cron expression
    pub async fn list_scheduled_tasks(&self) -> Result<Vec<TaskRecord>, SchedulerError> {
        let sql = format!(
            r#"
            SELECT {} FROM tasks
            WHERE enabled = 1
              AND cron_expression IS NOT NULL
              AND TRIM(cron_expression) != ''
            ORDER BY created_at ASC
            "#,
            TASK_COLUMNS
        );
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;

        Ok(rows
            .iter()
            .map(task_from_row)
            .collect::<Result<Vec<_>, _>>()?)
    }

    /// Writes the business fields of `task`. Scheduling fields
    /// (`last_run_at`, `next_run_at`) belong to the scheduler and are left alone.
    pub async fn update_task(&self, task: &TaskRecord) -> Result<(), SchedulerError> {
        debug!("Updating task: {} ({})", task.name, task.id);

        let result = sqlx::query(
            r#"
            UPDATE tasks SET
                name = ?, description = ?, cron_expression = ?, timezone = ?,
                enabled = ?, timeout_seconds = ?, headless = ?, start_url = ?,
                notifications_enabled = ?, notify_destination = ?,
                notify_on_success = ?, notify_on_failure = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&task.name)
        .bind(&task.description)
        .bind(&task.cron_expression)
        .bind(&task.timezone)
        .bind(task.enabled)
        .bind(task.timeout_seconds)
        .bind(task.headless)
        .bind(&task.start_url)
        .bind(task.notifications_enabled)
        .bind(&task.notify_destination)
        .bind(task.notify_on_success)
        .bind(task.notify_on_failure)
        .bind(task.updated_at)
        .bind(&task.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(SchedulerError::task_not_found(&task.id));
        }
        Ok(())
    }

    /// Returns false when no task had this id
    pub async fn delete_task(&self, task_id: &str) -> Result<bool, SchedulerError> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = ?")
            .bind(task_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn set_next_run_at(
        &self,
        task_id: &str,
        next_run_at: Option<DateTime<Utc>>,
    ) -> Result<(), SchedulerError> {
        sqlx::query("UPDATE tasks SET next_run_at = ? WHERE id = ?")
            .bind(next_run_at)
            .bind(task_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn set_last_run_at(
        &self,
        task_id: &str,
        last_run_at: DateTime<Utc>,
    ) -> Result<(), SchedulerError> {
        sqlx::query("UPDATE tasks SET last_run_at = ? WHERE id = ?")
            .bind(last_run_at)
            .bind(task_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Clears `next_run_at` on tasks that can no longer be cron-triggered
    pub async fn clear_next_run_for_unscheduled(&self) -> Result<u64, SchedulerError> {
        let result = sqlx::query(
            r#"
            UPDATE tasks SET next_run_at = NULL
            WHERE next_run_at IS NOT NULL
              AND (enabled = 0 OR cron_expression IS NULL OR TRIM(cron_expression) = '')
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    pub async fn count_tasks(&self) -> Result<i64, SchedulerError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tasks")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
