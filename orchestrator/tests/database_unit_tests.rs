//! Unit tests for database operations
//!
//! These tests verify task and run record storage using in-memory SQLite
//! for speed and isolation.

mod common;

use chrono::{Duration, Utc};
use common::fixtures::*;
use orchestrator::database::{
    AgentStep, Database, RunOutcome, RunQuery, RunStatus, RunTrigger, TaskRecord,
};
use orchestrator::errors::{SchedulerError, StoreError};
use sqlx::Row;
use uuid::Uuid;

async fn start_run(db: &TestDatabase, task: &TaskRecord) -> String {
    let run_id = Uuid::new_v4().to_string();
    db.database()
        .create_running_record(task, &run_id, RunTrigger::Manual, Utc::now())
        .await
        .expect("Failed to create running record");
    run_id
}

async fn finish_run(db: &TestDatabase, run_id: &str, outcome: RunOutcome) {
    db.database()
        .complete_run(run_id, &outcome, &[], Utc::now())
        .await
        .expect("Failed to complete run");
}

fn success() -> RunOutcome {
    RunOutcome::Success {
        summary: "ok".to_string(),
    }
}

#[tokio::test]
async fn test_database_initialization() {
    let db = TestDatabase::new()
        .await
        .expect("Failed to create test database");

    // Verify tables exist
    let result = sqlx::query("SELECT name FROM sqlite_master WHERE type='table'")
        .fetch_all(db.pool())
        .await
        .expect("Failed to query tables");

    let table_names: Vec<String> = result
        .iter()
        .map(|row| row.get::<String, _>("name"))
        .collect();

    assert!(table_names.contains(&"tasks".to_string()));
    assert!(table_names.contains(&"run_records".to_string()));
}

#[tokio::test]
async fn test_task_crud() {
    let db = TestDatabase::new().await.unwrap();
    let database = db.database();

    let mut task = TaskBuilder::new("Check prices")
        .cron(schedules::DAILY_NINE)
        .timezone("America/New_York")
        .build();
    database.insert_task(&task).await.unwrap();

    let stored = database.get_task(&task.id).await.unwrap().unwrap();
    assert_eq!(stored.name, "Check prices");
    assert_eq!(stored.cron_expression.as_deref(), Some("0 9 * * *"));
    assert_eq!(stored.timezone, "America/New_York");
    assert_eq!(stored.start_url, task.start_url);
    assert!(stored.enabled);

    task.name = "Check all prices".to_string();
    task.notify_on_success = true;
    database.update_task(&task).await.unwrap();
    let stored = database.get_task(&task.id).await.unwrap().unwrap();
    assert_eq!(stored.name, "Check all prices");
    assert!(stored.notify_on_success);

    assert!(database.delete_task(&task.id).await.unwrap());
    assert!(database.get_task(&task.id).await.unwrap().is_none());
    assert!(!database.delete_task(&task.id).await.unwrap());
}

#[tokio::test]
async fn test_update_missing_task_fails() {
    let db = TestDatabase::new().await.unwrap();

    let result = db.database().update_task(&task("Ghost")).await;

    assert!(matches!(result, Err(SchedulerError::TaskNotFound { .. })));
}

#[tokio::test]
async fn test_list_tasks_newest_first() {
    let db = TestDatabase::new().await.unwrap();
    let now = Utc::now();

    let old = TaskBuilder::new("Old").created_at(now - Duration::hours(2)).build();
    let new = TaskBuilder::new("New").created_at(now).build();
    db.insert(&old).await.unwrap();
    db.insert(&new).await.unwrap();

    let tasks = db.database().list_tasks().await.unwrap();
    let names: Vec<&str> = tasks.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["New", "Old"]);
    assert_eq!(db.database().count_tasks().await.unwrap(), 2);
}

#[tokio::test]
async fn test_list_scheduled_tasks_filters_disabled_and_manual() {
    let db = TestDatabase::new().await.unwrap();

    let scheduled = TaskBuilder::new("Scheduled").cron(schedules::DAILY_NINE).build();
    let disabled = TaskBuilder::new("Disabled")
        .cron(schedules::DAILY_NINE)
        .disabled()
        .build();
    let manual = TaskBuilder::new("Manual").build();
    let blank = TaskBuilder::new("Blank").cron("  ").build();
    for task in [&scheduled, &disabled, &manual, &blank] {
        db.insert(task).await.unwrap();
    }

    let tasks = db.database().list_scheduled_tasks().await.unwrap();

    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].id, scheduled.id);
}

#[tokio::test]
async fn test_next_and_last_run_bookkeeping() {
    let db = TestDatabase::new().await.unwrap();
    let database = db.database();
    let mut disabled = TaskBuilder::new("Disabled")
        .cron(schedules::DAILY_NINE)
        .disabled()
        .build();
    let next = Utc::now() + Duration::minutes(5);
    disabled.next_run_at = Some(next);
    db.insert(&disabled).await.unwrap();

    let completed = Utc::now();
    database.set_last_run_at(&disabled.id, completed).await.unwrap();
    let stored = database.get_task(&disabled.id).await.unwrap().unwrap();
    assert_eq!(stored.last_run_at, Some(completed));
    assert_eq!(stored.next_run_at, Some(next));

    assert_eq!(database.clear_next_run_for_unscheduled().await.unwrap(), 1);
    let stored = database.get_task(&disabled.id).await.unwrap().unwrap();
    assert!(stored.next_run_at.is_none());
}

#[tokio::test]
async fn test_create_and_complete_run() {
    let db = TestDatabase::new().await.unwrap();
    let database = db.database();
    let task = task("Check prices");
    db.insert(&task).await.unwrap();

    let run_id = Uuid::new_v4().to_string();
    let started_at = Utc::now() - Duration::seconds(3);
    let running = database
        .create_running_record(&task, &run_id, RunTrigger::Scheduled, started_at)
        .await
        .unwrap();
    assert_eq!(running.status, RunStatus::Running);
    assert!(running.seq > 0);
    assert_eq!(database.count_running_for_task(&task.id).await.unwrap(), 1);

    let steps = vec![AgentStep {
        index: 1,
        action: Some("navigate".to_string()),
        result: Some("ok".to_string()),
        timestamp: Utc::now(),
    }];
    let completed = database
        .complete_run(&run_id, &success(), &steps, Utc::now())
        .await
        .unwrap();

    assert_eq!(completed.status, RunStatus::Success);
    assert_eq!(completed.trigger, RunTrigger::Scheduled);
    assert_eq!(completed.task_name.as_deref(), Some("Check prices"));
    assert_eq!(completed.result_summary.as_deref(), Some("ok"));
    assert_eq!(completed.agent_steps, steps);
    assert!(completed.duration_seconds.unwrap() >= 3.0);
    assert_eq!(database.count_running_for_task(&task.id).await.unwrap(), 0);
}

#[tokio::test]
async fn test_run_completes_only_once() {
    let db = TestDatabase::new().await.unwrap();
    let task = task("Check prices");
    db.insert(&task).await.unwrap();
    let run_id = start_run(&db, &task).await;

    finish_run(&db, &run_id, success()).await;
    let second = db
        .database()
        .complete_run(
            &run_id,
            &RunOutcome::Failure {
                error: "late".to_string(),
            },
            &[],
            Utc::now(),
        )
        .await;

    assert!(matches!(
        second,
        Err(SchedulerError::RunAlreadyCompleted { .. })
    ));
    let stored = db.database().get_run(&run_id).await.unwrap().unwrap();
    assert_eq!(stored.status, RunStatus::Success);
}

#[tokio::test]
async fn test_complete_unknown_run_is_not_found() {
    let db = TestDatabase::new().await.unwrap();

    let result = db
        .database()
        .complete_run("missing", &success(), &[], Utc::now())
        .await;

    assert!(matches!(
        result,
        Err(SchedulerError::Store(StoreError::NotFound { .. }))
    ));
}

#[tokio::test]
async fn test_list_runs_newest_first_with_filters() {
    let db = TestDatabase::new().await.unwrap();
    let first = task("First");
    let second = task("Second");
    db.insert(&first).await.unwrap();
    db.insert(&second).await.unwrap();

    let a = start_run(&db, &first).await;
    finish_run(&db, &a, success()).await;
    let b = start_run(&db, &second).await;
    finish_run(
        &db,
        &b,
        RunOutcome::Failure {
            error: "boom".to_string(),
        },
    )
    .await;
    let c = start_run(&db, &first).await;

    let database = db.database();
    let all = database.list_runs(&RunQuery::default()).await.unwrap();
    let ids: Vec<&str> = all.logs.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec![c.as_str(), b.as_str(), a.as_str()]);
    assert_eq!(all.total, 3);
    assert_eq!(all.page, 1);
    assert_eq!(all.per_page, 25);

    let by_task = database
        .list_runs(&RunQuery {
            task_id: Some(first.id.clone()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(by_task.total, 2);
    assert!(by_task.logs.iter().all(|r| r.task_id == first.id));

    let failures = database
        .list_runs(&RunQuery {
            status: Some(RunStatus::Failure),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(failures.total, 1);
    assert_eq!(failures.logs[0].id, b);
    assert_eq!(failures.logs[0].error_message.as_deref(), Some("boom"));
}

#[tokio::test]
async fn test_pagination_is_stable_under_inserts() {
    let db = TestDatabase::new().await.unwrap();
    let task = task("Busy");
    db.insert(&task).await.unwrap();
    for _ in 0..5 {
        let run_id = start_run(&db, &task).await;
        finish_run(&db, &run_id, success()).await;
    }

    let database = db.database();
    let first_page = database
        .list_runs(&RunQuery {
            page: 1,
            per_page: 2,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(first_page.total, 5);
    assert_eq!(first_page.total_pages, 3);

    // New runs arrive between page requests
    start_run(&db, &task).await;
    start_run(&db, &task).await;

    let second_page = database
        .list_runs(&RunQuery {
            page: 2,
            per_page: 2,
            snapshot: Some(first_page.snapshot),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(second_page.total, 5);
    assert_eq!(second_page.snapshot, first_page.snapshot);

    let first_seqs: Vec<i64> = first_page.logs.iter().map(|r| r.seq).collect();
    let second_seqs: Vec<i64> = second_page.logs.iter().map(|r| r.seq).collect();
    assert_eq!(second_seqs.len(), 2);
    assert!(second_seqs.iter().all(|seq| !first_seqs.contains(seq)));
    assert!(second_seqs[0] < *first_seqs.last().unwrap());
}

#[tokio::test]
async fn test_empty_listing_has_one_page() {
    let db = TestDatabase::new().await.unwrap();

    let page = db.database().list_runs(&RunQuery::default()).await.unwrap();

    assert!(page.logs.is_empty());
    assert_eq!(page.total, 0);
    assert_eq!(page.total_pages, 1);
    assert_eq!(page.snapshot, 0);
}

#[tokio::test]
async fn test_per_page_is_capped() {
    let db = TestDatabase::new().await.unwrap();

    let page = db
        .database()
        .list_runs(&RunQuery {
            per_page: 500,
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(page.per_page, 100);
}

#[tokio::test]
async fn test_runs_outlive_deleted_task() {
    let db = TestDatabase::new().await.unwrap();
    let task = task("Temporary");
    db.insert(&task).await.unwrap();
    let run_id = start_run(&db, &task).await;
    finish_run(&db, &run_id, success()).await;

    db.database().delete_task(&task.id).await.unwrap();

    let run = db.database().get_run(&run_id).await.unwrap().unwrap();
    assert_eq!(run.task_id, task.id);
    assert!(run.task_name.is_none());
    assert_eq!(db.count_rows("run_records").await.unwrap(), 1);
}

#[tokio::test]
async fn test_fail_interrupted_runs() {
    let db = TestDatabase::new().await.unwrap();
    let task = task("Interrupted");
    db.insert(&task).await.unwrap();
    let finished = start_run(&db, &task).await;
    finish_run(&db, &finished, success()).await;
    let dangling = start_run(&db, &task).await;

    let closed = db.database().fail_interrupted_runs().await.unwrap();

    assert_eq!(closed, 1);
    let run = db.database().get_run(&dangling).await.unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Failure);
    assert_eq!(
        run.error_message.as_deref(),
        Some("interrupted by scheduler restart")
    );
    assert!(run.completed_at.is_some());
    let untouched = db.database().get_run(&finished).await.unwrap().unwrap();
    assert_eq!(untouched.status, RunStatus::Success);
}

#[tokio::test]
async fn test_reopening_file_database_closes_running_records() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("data").join("orchestrator.db");
    let path = path.to_string_lossy().to_string();

    let task = task("Restarted");
    let run_id = Uuid::new_v4().to_string();
    {
        let database = Database::new(&path).await.unwrap();
        database.insert_task(&task).await.unwrap();
        database
            .create_running_record(&task, &run_id, RunTrigger::Scheduled, Utc::now())
            .await
            .unwrap();
        database.pool().close().await;
    }

    let database = Database::new(&path).await.unwrap();
    let run = database.get_run(&run_id).await.unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Failure);
    assert!(database.get_task(&task.id).await.unwrap().is_some());
}
