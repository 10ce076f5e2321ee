//! Run record database operations.
//!
//! Records are ordered by the autoincrement `seq` column rather than by
//! timestamps, so pagination stays stable while new runs are being inserted.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use tracing::{debug, warn};

use super::records::{
    AgentStep, RunOutcome, RunPage, RunQuery, RunRecord, RunStatus, RunTrigger, TaskRecord,
};
use super::Database;
use crate::constants::logs::{DEFAULT_PER_PAGE, MAX_PER_PAGE};
use crate::errors::{SchedulerError, StoreError};

const INTERRUPTED_MESSAGE: &str = "interrupted by scheduler restart";

const RUN_SELECT: &str = r#"
    SELECT r.seq, r.id, r.task_id, t.name AS task_name, r.trigger_kind, r.status,
           r.started_at, r.completed_at, r.duration_seconds, r.result_summary,
           r.error_message, r.agent_steps
    FROM run_records r
    LEFT JOIN tasks t ON t.id = r.task_id
"#;

fn run_from_row(row: &SqliteRow) -> Result<RunRecord, SchedulerError> {
    let status: String = row.try_get("status")?;
    let trigger: String = row.try_get("trigger_kind")?;
    let steps_json: String = row.try_get("agent_steps")?;

    Ok(RunRecord {
        id: row.try_get("id")?,
        seq: row.try_get("seq")?,
        task_id: row.try_get("task_id")?,
        task_name: row.try_get("task_name")?,
        status: status
            .parse()
            .map_err(|reason| StoreError::Serialization { reason })?,
        trigger: trigger
            .parse()
            .map_err(|reason| StoreError::Serialization { reason })?,
        started_at: row.try_get("started_at")?,
        completed_at: row.try_get("completed_at")?,
        duration_seconds: row.try_get("duration_seconds")?,
        result_summary: row.try_get("result_summary")?,
        error_message: row.try_get("error_message")?,
        agent_steps: serde_json::from_str(&steps_json)?,
    })
}

fn duration_between(started_at: DateTime<Utc>, completed_at: DateTime<Utc>) -> f64 {
    (completed_at - started_at).num_milliseconds().max(0) as f64 / 1000.0
}

impl Database {
    /// Inserts a record in `running` state and returns it with its assigned `seq`
    pub async fn create_running_record(
        &self,
        task: &TaskRecord,
        run_id: &str,
        trigger: RunTrigger,
        started_at: DateTime<Utc>,
    ) -> Result<RunRecord, SchedulerError> {
        debug!("Creating running record {} for task {}", run_id, task.id);

        let result = sqlx::query(
            r#"
            INSERT INTO run_records (id, task_id, trigger_kind, status, started_at, agent_steps)
            VALUES (?, ?, ?, ?, ?, '[]')
            "#,
        )
        .bind(run_id)
        .bind(&task.id)
        .bind(trigger.as_str())
        .bind(RunStatus::Running.as_str())
        .bind(started_at)
        .execute(&self.pool)
        .await?;

        Ok(RunRecord {
            id: run_id.to_string(),
            seq: result.last_insert_rowid(),
            task_id: task.id.clone(),
            task_name: Some(task.name.clone()),
            status: RunStatus::Running,
            trigger,
            started_at,
            completed_at: None,
            duration_seconds: None,
            result_summary: None,
            error_message: None,
            agent_steps: Vec::new(),
        })
    }

    /// Writes the terminal state of a run. A run can be completed once;
    /// later calls fail with `RunAlreadyCompleted`.
    pub async fn complete_run(
        &self,
        run_id: &str,
        outcome: &RunOutcome,
        steps: &[AgentStep],
        completed_at: DateTime<Utc>,
    ) -> Result<RunRecord, SchedulerError> {
        let row = sqlx::query("SELECT status, started_at FROM run_records WHERE id = ?")
            .bind(run_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::NotFound {
                entity: "Run",
                id: run_id.to_string(),
            })?;

        let status: String = row.try_get("status")?;
        if status != RunStatus::Running.as_str() {
            return Err(SchedulerError::RunAlreadyCompleted {
                run_id: run_id.to_string(),
            });
        }
        let started_at: DateTime<Utc> = row.try_get("started_at")?;
        let steps_json = serde_json::to_string(steps)?;

        // The status guard keeps the write single-shot even if two callers race past the check
        let result = sqlx::query(
            r#"
            UPDATE run_records SET
                status = ?, completed_at = ?, duration_seconds = ?,
                result_summary = ?, error_message = ?, agent_steps = ?
            WHERE id = ? AND status = 'running'
            "#,
        )
        .bind(outcome.status().as_str())
        .bind(completed_at)
        .bind(duration_between(started_at, completed_at))
        .bind(outcome.summary())
        .bind(outcome.error())
        .bind(steps_json)
        .bind(run_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(SchedulerError::RunAlreadyCompleted {
                run_id: run_id.to_string(),
            });
        }

        debug!("Run {} completed with status {}", run_id, outcome.status());
        self.get_run(run_id).await?.ok_or_else(|| {
            StoreError::NotFound {
                entity: "Run",
                id: run_id.to_string(),
            }
            .into()
        })
    }

    pub async fn get_run(&self, run_id: &str) -> Result<Option<RunRecord>, SchedulerError> {
        let sql = format!("{} WHERE r.id = ?", RUN_SELECT);
        let row = sqlx::query(&sql)
            .bind(run_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(run_from_row).transpose()
    }

    /// Newest-first page of run records. The first page pins `snapshot` to
    /// the highest visible `seq`; callers pass it back for later pages.
    pub async fn list_runs(&self, query: &RunQuery) -> Result<RunPage, SchedulerError> {
        let page = query.page.max(1);
        let per_page = if query.per_page == 0 {
            DEFAULT_PER_PAGE
        } else {
            query.per_page.min(MAX_PER_PAGE)
        };

        let snapshot = match query.snapshot {
            Some(snapshot) => snapshot,
            None => {
                sqlx::query_scalar::<_, i64>("SELECT COALESCE(MAX(seq), 0) FROM run_records")
                    .fetch_one(&self.pool)
                    .await?
            }
        };

        let status = query.status.map(|s| s.as_str());

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM run_records
            WHERE seq <= ?
              AND (? IS NULL OR task_id = ?)
              AND (? IS NULL OR status = ?)
            "#,
        )
        .bind(snapshot)
        .bind(&query.task_id)
        .bind(&query.task_id)
        .bind(status)
        .bind(status)
        .fetch_one(&self.pool)
        .await?;

        let sql = format!(
            r#"{}
            WHERE r.seq <= ?
              AND (? IS NULL OR r.task_id = ?)
              AND (? IS NULL OR r.status = ?)
            ORDER BY r.seq DESC
            LIMIT ? OFFSET ?
            "#,
            RUN_SELECT
        );
        let offset = i64::from(page - 1) * i64::from(per_page);
        let rows = sqlx::query(&sql)
            .bind(snapshot)
            .bind(&query.task_id)
            .bind(&query.task_id)
            .bind(status)
            .bind(status)
            .bind(i64::from(per_page))
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        let logs = rows
            .iter()
            .map(run_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        let per_page_i64 = i64::from(per_page);
        let total_pages = if total == 0 {
            1
        } else {
            (total + per_page_i64 - 1) / per_page_i64
        };

        Ok(RunPage {
            logs,
            total,
            page,
            per_page,
            total_pages,
            snapshot,
        })
    }

    /// Closes every record still `running` as a failure. Only valid at
    /// startup, before any run of this process has been admitted.
    pub async fn fail_interrupted_runs(&self) -> Result<u64, SchedulerError> {
        let rows = sqlx::query(
            "SELECT id, task_id, started_at FROM run_records WHERE status = 'running' ORDER BY seq ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        let completed_at = Utc::now();
        let mut closed = 0u64;

        for row in &rows {
            let run_id: String = row.try_get("id")?;
            let task_id: String = row.try_get("task_id")?;
            let started_at: DateTime<Utc> = row.try_get("started_at")?;

            warn!(
                "Closing interrupted run {} of task {} (started at {})",
                run_id, task_id, started_at
            );

            if self
                .fail_running_record(&run_id, started_at, INTERRUPTED_MESSAGE, completed_at)
                .await?
            {
                closed += 1;
            }
        }

        Ok(closed)
    }

    /// Marks a run as failed if it is still `running`. Returns false when the
    /// record was already closed.
    pub async fn fail_running_record(
        &self,
        run_id: &str,
        started_at: DateTime<Utc>,
        error: &str,
        completed_at: DateTime<Utc>,
    ) -> Result<bool, SchedulerError> {
        let result = sqlx::query(
            r#"
            UPDATE run_records SET
                status = 'failure', completed_at = ?, duration_seconds = ?, error_message = ?
            WHERE id = ? AND status = 'running'
            "#,
        )
        .bind(completed_at)
        .bind(duration_between(started_at, completed_at))
        .bind(error)
        .bind(run_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn count_running_for_task(&self, task_id: &str) -> Result<i64, SchedulerError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM run_records WHERE task_id = ? AND status = 'running'",
        )
        .bind(task_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}
