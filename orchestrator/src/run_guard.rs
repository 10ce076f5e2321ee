//! Per-task run admission
//!
//! Tracks which tasks currently have a run in progress so that a task never
//! executes twice at the same time, whether the second attempt comes from the
//! cron schedule or from a manual "run now".
//!
//! # Usage
//!
//! ```ignore
//! // Fails with ConcurrencyRejected if the task is already running
//! let permit = guard.try_acquire(&task.id, RunTrigger::Manual)?;
//!
//! // Run the task...
//!
//! // Released explicitly, or when the permit is dropped on any exit path
//! permit.release();
//! ```

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::database::RunTrigger;
use crate::errors::SchedulerError;

#[derive(Debug, Clone)]
struct ActiveRun {
    task_id: String,
    run_id: String,
    trigger: RunTrigger,
    started_at: DateTime<Utc>,
}

type ActiveRuns = Arc<Mutex<HashMap<String, ActiveRun>>>;

/// The set of running tasks. Clones share the same set.
#[derive(Clone, Default)]
pub struct RunGuard {
    active_runs: ActiveRuns, // task_id -> run
}

impl RunGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admits a run for `task_id` and assigns its run id, or rejects it if
    /// the task already has one in progress.
    #[instrument(skip(self), fields(task = %task_id))]
    pub fn try_acquire(
        &self,
        task_id: &str,
        trigger: RunTrigger,
    ) -> Result<RunPermit, SchedulerError> {
        let mut active = lock(&self.active_runs);

        if let Some(current) = active.get(task_id) {
            info!(
                "Skipping {} run of task {}: run {} in progress since {}",
                trigger, task_id, current.run_id, current.started_at
            );
            return Err(SchedulerError::ConcurrencyRejected {
                task_id: task_id.to_string(),
                active_run_id: current.run_id.clone(),
            });
        }

        let run = ActiveRun {
            task_id: task_id.to_string(),
            run_id: Uuid::new_v4().to_string(),
            trigger,
            started_at: Utc::now(),
        };
        active.insert(task_id.to_string(), run.clone());
        info!("Admitted {} run {} of task {}", trigger, run.run_id, task_id);

        Ok(RunPermit {
            active_runs: Arc::clone(&self.active_runs),
            run,
            released: false,
        })
    }

    /// task id -> run id for every run in progress
    pub fn snapshot(&self) -> HashMap<String, String> {
        lock(&self.active_runs)
            .iter()
            .map(|(task_id, run)| (task_id.clone(), run.run_id.clone()))
            .collect()
    }

    pub fn is_running(&self, task_id: &str) -> bool {
        lock(&self.active_runs).contains_key(task_id)
    }

    pub fn active_count(&self) -> usize {
        lock(&self.active_runs).len()
    }
}

/// Proof of admission for one run; the task's slot is freed on release or drop.
pub struct RunPermit {
    active_runs: ActiveRuns,
    run: ActiveRun,
    released: bool,
}

impl RunPermit {
    pub fn task_id(&self) -> &str {
        &self.run.task_id
    }

    pub fn run_id(&self) -> &str {
        &self.run.run_id
    }

    pub fn trigger(&self) -> RunTrigger {
        self.run.trigger
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.run.started_at
    }

    pub fn release(mut self) {
        self.release_slot();
    }

    fn release_slot(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        let mut active = lock(&self.active_runs);
        // Only remove the entry this permit created
        if active
            .get(&self.run.task_id)
            .is_some_and(|current| current.run_id == self.run.run_id)
        {
            active.remove(&self.run.task_id);
            let took = Utc::now().signed_duration_since(self.run.started_at);
            info!(
                "Released task {} after run {} ({}s)",
                self.run.task_id,
                self.run.run_id,
                took.num_seconds()
            );
        }
    }
}

impl Drop for RunPermit {
    fn drop(&mut self) {
        self.release_slot();
    }
}

// The map stays consistent across a panic in any holder, so poisoning is ignored
fn lock(active_runs: &ActiveRuns) -> MutexGuard<'_, HashMap<String, ActiveRun>> {
    active_runs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
