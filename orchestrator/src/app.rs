//! Wiring of the orchestration core
//!
//! Builds the run guard, event bus, execution engine, scheduler loop and task
//! service around a database and the two external collaborators, and exposes
//! the shared [`AppState`] used by the HTTP layer.

use anyhow::Result;
use axum::Router;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::agent::AutomationAgent;
use crate::config::Config;
use crate::database::Database;
use crate::events::EventBus;
use crate::run_guard::RunGuard;
use crate::scheduler::Scheduler;
use crate::services::{ExecutionEngine, Notifier, TaskService};
use crate::web::{create_router, AppState};

pub struct Orchestrator {
    state: AppState,
    engine: Arc<ExecutionEngine>,
    scheduler_task: JoinHandle<()>,
}

impl Orchestrator {
    pub async fn start(
        config: Arc<Config>,
        database: Arc<Database>,
        agent: Arc<dyn AutomationAgent>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self> {
        let agent_configured = agent.is_configured();
        let notifications_configured = notifier.is_configured();
        if !agent_configured {
            warn!("Automation agent not configured, runs will fail until [agent] base_url is set");
        }
        if !notifications_configured {
            warn!("Notifications disabled, set [notifications] webhook_url to enable them");
        }

        let guard = RunGuard::new();
        let events = EventBus::new(config.event_buffer_size);

        let (engine, completions) = ExecutionEngine::new(
            database.clone(),
            guard.clone(),
            events.clone(),
            agent,
            notifier,
        );
        info!("Execution engine initialized");

        let (scheduler, scheduler_task) = Scheduler::start(
            database.clone(),
            engine.clone(),
            completions,
            config.command_buffer_size,
        )
        .await?;
        info!("Scheduler loop started");

        let task_service = Arc::new(TaskService::new(database.clone(), scheduler.clone()));

        let state = AppState {
            config,
            database,
            task_service,
            scheduler,
            guard,
            events,
            agent_configured,
            notifications_configured,
        };

        Ok(Self {
            state,
            engine,
            scheduler_task,
        })
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn engine(&self) -> &Arc<ExecutionEngine> {
        &self.engine
    }

    pub fn router(&self) -> Router {
        create_router(self.state.clone())
    }

    /// Stops the scheduler loop. Runs already in flight finish on their own.
    pub async fn shutdown(self) {
        self.state.scheduler.shutdown().await;
        if let Err(e) = self.scheduler_task.await {
            warn!("Scheduler loop ended abnormally: {}", e);
        }
        info!("Orchestrator stopped");
    }
}
