//! Database layer for the task orchestrator.
//!
//! This module provides SQLite persistence for:
//! - Tasks (definitions plus the cached `last_run_at` / `next_run_at`)
//! - Run records (the append-mostly execution history)
//!
//! The module is organized into submodules:
//! - `records` - All record types (entities)
//! - `tasks` - Task CRUD and scheduling-field updates
//! - `runs` - Run record creation, completion and paginated queries

mod records;
mod runs;
mod tasks;

pub use records::*;

use anyhow::Result;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Sqlite, SqlitePool};
use std::path::Path;
use tracing::{debug, error, info, warn};

pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn new(database_path: &str) -> Result<Self> {
        info!("Opening task database at {}", database_path);

        if let Some(parent) = Path::new(database_path).parent() {
            if !parent.as_os_str().is_empty() {
                if let Err(e) = tokio::fs::create_dir_all(parent).await {
                    error!("Cannot create database directory {:?}: {}", parent, e);
                    return Err(e.into());
                }
            }
        }

        let database_url = format!("sqlite:{}?mode=rwc", database_path);
        let pool = match SqlitePool::connect(&database_url).await {
            Ok(pool) => pool,
            Err(e) => {
                error!("Cannot open database {}: {}", database_url, e);
                return Err(e.into());
            }
        };

        let database = Self { pool };
        database.initialize_tables().await?;

        // Runs left `running` by a previous process can never complete now
        match database.fail_interrupted_runs().await {
            Ok(0) => info!("No interrupted runs found"),
            Ok(count) => warn!("Closed {} runs interrupted by the previous shutdown", count),
            Err(e) => {
                error!("Failed to close interrupted runs: {}", e);
            }
        }

        info!("Task database ready");
        Ok(database)
    }

    /// Single-connection in-memory database; every connection of a
    /// `sqlite::memory:` pool would otherwise see its own empty database.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        let database = Self { pool };
        database.initialize_tables().await?;
        Ok(database)
    }

    async fn initialize_tables(&self) -> Result<()> {
        debug!("Creating tasks table");
        let tasks_table_sql = r#"
            CREATE TABLE IF NOT EXISTS tasks (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                description TEXT NOT NULL,
                cron_expression TEXT,
                timezone TEXT NOT NULL DEFAULT 'UTC',
                enabled BOOLEAN NOT NULL DEFAULT 1,
                timeout_seconds INTEGER NOT NULL DEFAULT 300,
                headless BOOLEAN NOT NULL DEFAULT 1,
                start_url TEXT,
                notifications_enabled BOOLEAN NOT NULL DEFAULT 1,
                notify_destination TEXT,
                notify_on_success BOOLEAN NOT NULL DEFAULT 0,
                notify_on_failure BOOLEAN NOT NULL DEFAULT 1,
                created_at DATETIME NOT NULL,
                updated_at DATETIME NOT NULL,
                last_run_at DATETIME,
                next_run_at DATETIME
            )
        "#;
        if let Err(e) = sqlx::query(tasks_table_sql).execute(&self.pool).await {
            error!("FAILED to create tasks table: {}", e);
            return Err(e.into());
        }

        // No foreign key: run records outlive the task they belong to
        debug!("Creating run_records table");
        let runs_table_sql = r#"
            CREATE TABLE IF NOT EXISTS run_records (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT UNIQUE NOT NULL,
                task_id TEXT NOT NULL,
                trigger_kind TEXT NOT NULL,
                status TEXT NOT NULL,
                started_at DATETIME NOT NULL,
                completed_at DATETIME,
                duration_seconds REAL,
                result_summary TEXT,
                error_message TEXT,
                agent_steps TEXT NOT NULL DEFAULT '[]'
            )
        "#;
        if let Err(e) = sqlx::query(runs_table_sql).execute(&self.pool).await {
            error!("FAILED to create run_records table: {}", e);
            return Err(e.into());
        }

        let index_statements = [
            "CREATE INDEX IF NOT EXISTS idx_runs_task_seq ON run_records(task_id, seq DESC)",
            "CREATE INDEX IF NOT EXISTS idx_runs_status_seq ON run_records(status, seq DESC)",
        ];
        for sql in index_statements {
            if let Err(e) = sqlx::query(sql).execute(&self.pool).await {
                error!("FAILED to create run_records index: {}", e);
                return Err(e.into());
            }
        }

        debug!("Schema ready");
        Ok(())
    }
}
