//! Drives one run of a task end to end
//!
//! A run is admitted by the [`RunGuard`], recorded as `running`, handed to the
//! automation agent under the task's timeout, and closed exactly once as
//! success, failure or timeout. After the terminal record is written the guard
//! is released, a `completed` event is published, the scheduler is told about
//! the completion, and a notification goes out if the task asks for one.
//!
//! If the outcome cannot be written, the record is closed as a failure instead.
//! If even that fails the task keeps its guard slot until restart, so no second
//! run can start beside a record that is still `running`.

use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, info, instrument, warn};

use crate::agent::{AgentRequest, AutomationAgent, StepRecorder};
use crate::database::{Database, RunOutcome, RunRecord, RunStatus, RunTrigger, TaskRecord};
use crate::errors::SchedulerError;
use crate::events::{EventBus, LifecycleEvent};
use crate::run_guard::{RunGuard, RunPermit};
use crate::services::notifier::{should_notify, Notifier, RunNotification};

/// Reported to the scheduler loop once a run has reached its terminal state
#[derive(Debug, Clone)]
pub struct RunCompletion {
    pub task_id: String,
    pub run_id: String,
    pub trigger: RunTrigger,
    pub status: RunStatus,
    pub completed_at: DateTime<Utc>,
}

/// An admitted run. Dropping the handle detaches the run; it still completes.
pub struct RunAdmission {
    pub task_id: String,
    pub run_id: String,
    pub handle: JoinHandle<Option<RunRecord>>,
}

pub struct ExecutionEngine {
    database: Arc<Database>,
    guard: RunGuard,
    events: EventBus,
    agent: Arc<dyn AutomationAgent>,
    notifier: Arc<dyn Notifier>,
    completions: mpsc::UnboundedSender<RunCompletion>,
    stranded: Mutex<Vec<RunPermit>>,
}

impl ExecutionEngine {
    pub fn new(
        database: Arc<Database>,
        guard: RunGuard,
        events: EventBus,
        agent: Arc<dyn AutomationAgent>,
        notifier: Arc<dyn Notifier>,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<RunCompletion>) {
        let (completions, completion_rx) = mpsc::unbounded_channel();
        let engine = Arc::new(Self {
            database,
            guard,
            events,
            agent,
            notifier,
            completions,
            stranded: Mutex::new(Vec::new()),
        });
        (engine, completion_rx)
    }

    pub fn guard(&self) -> &RunGuard {
        &self.guard
    }

    /// Admits a run of `task` and spawns it. Returns `ConcurrencyRejected`
    /// without side effects if the task is already running.
    #[instrument(skip(self, task), fields(task = %task.id))]
    pub fn try_start(
        self: &Arc<Self>,
        task: TaskRecord,
        trigger: RunTrigger,
    ) -> Result<RunAdmission, SchedulerError> {
        let permit = self.guard.try_acquire(&task.id, trigger)?;
        let run_id = permit.run_id().to_string();
        let task_id = task.id.clone();

        info!("Starting {} run {} of task '{}'", trigger, run_id, task.name);

        let engine = Arc::clone(self);
        let handle = tokio::spawn(async move { engine.drive(task, permit).await });

        Ok(RunAdmission {
            task_id,
            run_id,
            handle,
        })
    }

    async fn drive(self: Arc<Self>, task: TaskRecord, permit: RunPermit) -> Option<RunRecord> {
        let run_id = permit.run_id().to_string();
        let trigger = permit.trigger();

        if let Err(e) = self
            .database
            .create_running_record(&task, &run_id, trigger, permit.started_at())
            .await
        {
            error!("Failed to record start of run {} for task {}: {}", run_id, task.id, e);
            permit.release();
            return None;
        }

        self.events.publish(LifecycleEvent::Started {
            task_id: task.id.clone(),
            run_id: run_id.clone(),
        });

        let steps = StepRecorder::new();
        let outcome = self.invoke_agent(&task, &run_id, steps.clone()).await;
        let completed_at = Utc::now();

        let record = match self
            .database
            .complete_run(&run_id, &outcome, &steps.snapshot(), completed_at)
            .await
        {
            Ok(record) => record,
            Err(e) => {
                error!("Failed to record completion of run {}: {}", run_id, e);
                match self
                    .close_as_failure(&run_id, permit.started_at(), &e, completed_at)
                    .await
                {
                    Some(record) => record,
                    None => {
                        error!(
                            "Run {} of task {} is still marked running, task blocked until restart",
                            run_id, task.id
                        );
                        self.strand(permit);
                        return None;
                    }
                }
            }
        };
        let status = record.status;

        permit.release();

        self.events.publish(LifecycleEvent::Completed {
            task_id: task.id.clone(),
            run_id: run_id.clone(),
            status,
        });

        if self
            .completions
            .send(RunCompletion {
                task_id: task.id.clone(),
                run_id: run_id.clone(),
                trigger,
                status,
                completed_at,
            })
            .is_err()
        {
            debug!("Scheduler loop is gone, completion of run {} not reported", run_id);
        }

        info!("Run {} of task '{}' finished: {}", run_id, task.name, status);

        self.dispatch_notification(&task, &record).await;

        Some(record)
    }

    /// Fallback when the real outcome could not be written. Returns the
    /// record only once it is terminal in the store.
    async fn close_as_failure(
        &self,
        run_id: &str,
        started_at: DateTime<Utc>,
        cause: &SchedulerError,
        completed_at: DateTime<Utc>,
    ) -> Option<RunRecord> {
        let message = format!("failed to record run outcome: {}", cause);
        if let Err(e) = self
            .database
            .fail_running_record(run_id, started_at, &message, completed_at)
            .await
        {
            error!("Failed to close run {} as a failure: {}", run_id, e);
        }

        match self.database.get_run(run_id).await {
            Ok(Some(record)) if record.status != RunStatus::Running => Some(record),
            Ok(_) => None,
            Err(e) => {
                error!("Failed to read back run {}: {}", run_id, e);
                None
            }
        }
    }

    fn strand(&self, permit: RunPermit) {
        self.stranded
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(permit);
    }

    /// The agent call runs in its own task so a timeout can abort it and a
    /// panic surfaces as a join error instead of unwinding through the run.
    async fn invoke_agent(&self, task: &TaskRecord, run_id: &str, steps: StepRecorder) -> RunOutcome {
        let agent = Arc::clone(&self.agent);
        let request = AgentRequest::for_task(task, run_id);
        let mut handle = tokio::spawn(async move { agent.run(request, steps).await });

        let limit = Duration::from_secs(task.timeout_seconds.max(1) as u64);
        match timeout(limit, &mut handle).await {
            Ok(Ok(Ok(summary))) => RunOutcome::Success { summary },
            Ok(Ok(Err(e))) => {
                warn!("Automation agent failed run {}: {:#}", run_id, e);
                RunOutcome::Failure {
                    error: format!("{:#}", e),
                }
            }
            Ok(Err(join_error)) => {
                error!("Automation agent crashed during run {}: {}", run_id, join_error);
                RunOutcome::Failure {
                    error: format!("automation agent crashed: {}", join_error),
                }
            }
            Err(_) => {
                handle.abort();
                warn!(
                    "Run {} of task {} exceeded its {}s timeout, aborted",
                    run_id, task.id, task.timeout_seconds
                );
                RunOutcome::Timeout {
                    error: format!("execution timed out after {}s", task.timeout_seconds),
                }
            }
        }
    }

    async fn dispatch_notification(&self, task: &TaskRecord, record: &RunRecord) {
        if !should_notify(task, record.status) {
            return;
        }
        if !self.notifier.is_configured() {
            debug!("Notifications not configured, skipping run {}", record.id);
            return;
        }
        let Some(notification) = RunNotification::from_run(task, record) else {
            return;
        };

        if let Err(e) = self.notifier.deliver(&notification).await {
            warn!("Failed to send notification for run {}: {}", record.id, e);
        }
    }
}
