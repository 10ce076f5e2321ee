//! Test database utilities for in-memory SQLite testing

use anyhow::Result;
use orchestrator::database::{Database, TaskRecord};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Test database wrapper for in-memory SQLite
pub struct TestDatabase {
    database: Arc<Database>,
}

impl TestDatabase {
    /// Create a new in-memory test database with the orchestrator schema
    pub async fn new() -> Result<Self> {
        Ok(Self {
            database: Arc::new(Database::in_memory().await?),
        })
    }

    /// Get the connection pool
    pub fn pool(&self) -> &SqlitePool {
        self.database.pool()
    }

    pub fn database(&self) -> Arc<Database> {
        self.database.clone()
    }

    pub async fn insert(&self, task: &TaskRecord) -> Result<()> {
        self.database.insert_task(task).await?;
        Ok(())
    }

    /// Count rows in a table
    pub async fn count_rows(&self, table: &str) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(self.database.pool())
            .await?;
        Ok(count)
    }
}
