//! Automation agent seam
//!
//! The engine hands a run request to an [`AutomationAgent`] and gets back a
//! result summary or an error. Steps are reported through a [`StepRecorder`]
//! as they happen, so a run that is aborted on timeout still keeps the steps
//! it completed.

mod http;

pub use http::HttpAutomationAgent;

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::database::{AgentStep, TaskRecord};

/// What the agent is asked to do for one run
#[derive(Debug, Clone, Serialize)]
pub struct AgentRequest {
    pub task_id: String,
    pub run_id: String,
    pub description: String,
    pub start_url: Option<String>,
    pub headless: bool,
}

impl AgentRequest {
    pub fn for_task(task: &TaskRecord, run_id: &str) -> Self {
        Self {
            task_id: task.id.clone(),
            run_id: run_id.to_string(),
            description: task.description.clone(),
            start_url: task.start_url.clone(),
            headless: task.headless,
        }
    }
}

/// Shared, append-only step trace for one run
#[derive(Clone, Default)]
pub struct StepRecorder {
    steps: Arc<Mutex<Vec<AgentStep>>>,
}

impl StepRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, action: Option<String>, result: Option<String>) {
        let mut steps = self.lock();
        let index = steps.len() + 1;
        steps.push(AgentStep {
            index,
            action,
            result,
            timestamp: Utc::now(),
        });
    }

    pub fn snapshot(&self) -> Vec<AgentStep> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, Vec<AgentStep>> {
        self.steps.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
pub trait AutomationAgent: Send + Sync {
    /// Whether the agent has what it needs to accept runs
    fn is_configured(&self) -> bool;

    /// Executes one run and returns its result summary
    async fn run(&self, request: AgentRequest, steps: StepRecorder) -> anyhow::Result<String>;
}
