//! Full orchestrator over an in-memory database with scripted collaborators

use anyhow::{anyhow, Result};
use orchestrator::config::Config;
use orchestrator::database::{Database, RunRecord, RunQuery, TaskRecord};
use orchestrator::web::AppState;
use orchestrator::Orchestrator;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};

use super::mock_agent::ScriptedAgent;
use super::recording_notifier::RecordingNotifier;

const WAIT_LIMIT: Duration = Duration::from_secs(10);
const POLL_INTERVAL: Duration = Duration::from_millis(25);

pub struct TestHarness {
    pub orchestrator: Orchestrator,
    pub database: Arc<Database>,
    pub agent: Arc<ScriptedAgent>,
    pub notifier: Arc<RecordingNotifier>,
}

impl TestHarness {
    pub async fn start() -> Result<Self> {
        Self::with(ScriptedAgent::succeeding(), RecordingNotifier::new()).await
    }

    pub async fn with_agent(agent: ScriptedAgent) -> Result<Self> {
        Self::with(agent, RecordingNotifier::new()).await
    }

    /// Starts against tasks already present in `database`
    pub async fn with_database(database: Arc<Database>) -> Result<Self> {
        Self::build(database, ScriptedAgent::succeeding(), RecordingNotifier::new()).await
    }

    pub async fn with(agent: ScriptedAgent, notifier: RecordingNotifier) -> Result<Self> {
        let database = Arc::new(Database::in_memory().await?);
        Self::build(database, agent, notifier).await
    }

    async fn build(
        database: Arc<Database>,
        agent: ScriptedAgent,
        notifier: RecordingNotifier,
    ) -> Result<Self> {
        let agent = Arc::new(agent);
        let notifier = Arc::new(notifier);
        let orchestrator = Orchestrator::start(
            Arc::new(Config::default()),
            database.clone(),
            agent.clone(),
            notifier.clone(),
        )
        .await?;

        Ok(Self {
            orchestrator,
            database,
            agent,
            notifier,
        })
    }

    pub fn state(&self) -> &AppState {
        self.orchestrator.state()
    }

    pub async fn insert_task(&self, task: &TaskRecord) -> Result<()> {
        self.database.insert_task(task).await?;
        Ok(())
    }

    pub async fn task(&self, task_id: &str) -> Result<TaskRecord> {
        self.database
            .get_task(task_id)
            .await?
            .ok_or_else(|| anyhow!("task {} missing", task_id))
    }

    /// Polls until the run leaves `running`
    pub async fn wait_for_terminal(&self, run_id: &str) -> Result<RunRecord> {
        let deadline = Instant::now() + WAIT_LIMIT;
        loop {
            if let Some(run) = self.database.get_run(run_id).await? {
                if run.status.is_terminal() {
                    return Ok(run);
                }
            }
            if Instant::now() > deadline {
                return Err(anyhow!("run {} did not finish in time", run_id));
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    /// Polls until the task has at least `count` run records
    pub async fn wait_for_runs(&self, task_id: &str, count: i64) -> Result<Vec<RunRecord>> {
        let deadline = Instant::now() + WAIT_LIMIT;
        loop {
            let page = self
                .database
                .list_runs(&RunQuery {
                    task_id: Some(task_id.to_string()),
                    per_page: 100,
                    ..Default::default()
                })
                .await?;
            if page.total >= count {
                return Ok(page.logs);
            }
            if Instant::now() > deadline {
                return Err(anyhow!(
                    "task {} has {} runs, expected {}",
                    task_id,
                    page.total,
                    count
                ));
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    /// Polls until the guard holds no run for the task
    pub async fn wait_until_idle(&self, task_id: &str) -> Result<()> {
        let deadline = Instant::now() + WAIT_LIMIT;
        while self.state().guard.is_running(task_id) {
            if Instant::now() > deadline {
                return Err(anyhow!("task {} still running", task_id));
            }
            sleep(POLL_INTERVAL).await;
        }
        Ok(())
    }
}
