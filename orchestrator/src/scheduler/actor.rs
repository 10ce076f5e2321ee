use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use super::cron::CronSchedule;
use crate::constants::scheduler::{IDLE_WAKE_INTERVAL, PREVIEW_TRIGGER_COUNT};
use crate::database::{Database, RunTrigger, TaskRecord};
use crate::errors::SchedulerError;
use crate::services::execution_engine::{ExecutionEngine, RunCompletion};

pub enum SchedulerCommand {
    /// A task was created or edited; the loop reloads it from the store and
    /// replies with its new `next_run_at`
    TaskUpserted {
        task_id: String,
        reply: oneshot::Sender<Option<DateTime<Utc>>>,
    },
    TaskRemoved {
        task_id: String,
    },
    /// Start a run immediately; replies with the admitted run id
    RunNow {
        task: TaskRecord,
        reply: oneshot::Sender<Result<String, SchedulerError>>,
    },
    Status {
        reply: oneshot::Sender<SchedulerStatus>,
    },
    Shutdown,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScheduledJob {
    pub task_id: String,
    pub task_name: String,
    pub cron_expression: String,
    pub timezone: String,
    pub next_run_at: DateTime<Utc>,
    pub upcoming: Vec<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    pub running: bool,
    pub scheduled_jobs: usize,
    pub jobs: Vec<ScheduledJob>,
}

impl SchedulerStatus {
    pub fn stopped() -> Self {
        Self {
            running: false,
            scheduled_jobs: 0,
            jobs: Vec::new(),
        }
    }
}

/// Cloneable entry point to the scheduler loop
#[derive(Clone)]
pub struct SchedulerHandle {
    commands: mpsc::Sender<SchedulerCommand>,
}

impl SchedulerHandle {
    pub fn is_running(&self) -> bool {
        !self.commands.is_closed()
    }

    pub async fn task_upserted(
        &self,
        task_id: &str,
    ) -> Result<Option<DateTime<Utc>>, SchedulerError> {
        let (reply, response) = oneshot::channel();
        self.send(SchedulerCommand::TaskUpserted {
            task_id: task_id.to_string(),
            reply,
        })
        .await?;
        response.await.map_err(|_| SchedulerError::SchedulerUnavailable)
    }

    pub async fn task_removed(&self, task_id: &str) -> Result<(), SchedulerError> {
        self.send(SchedulerCommand::TaskRemoved {
            task_id: task_id.to_string(),
        })
        .await
    }

    pub async fn run_now(&self, task: TaskRecord) -> Result<String, SchedulerError> {
        let (reply, response) = oneshot::channel();
        self.send(SchedulerCommand::RunNow { task, reply }).await?;
        response
            .await
            .map_err(|_| SchedulerError::SchedulerUnavailable)?
    }

    pub async fn status(&self) -> Result<SchedulerStatus, SchedulerError> {
        let (reply, response) = oneshot::channel();
        self.send(SchedulerCommand::Status { reply }).await?;
        response.await.map_err(|_| SchedulerError::SchedulerUnavailable)
    }

    pub async fn shutdown(&self) {
        if self.commands.send(SchedulerCommand::Shutdown).await.is_err() {
            debug!("Scheduler loop already stopped");
        }
    }

    async fn send(&self, command: SchedulerCommand) -> Result<(), SchedulerError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| SchedulerError::SchedulerUnavailable)
    }
}

struct ScheduledEntry {
    task: TaskRecord,
    schedule: CronSchedule,
    next_run_at: DateTime<Utc>,
}

enum LoopEvent {
    Command(SchedulerCommand),
    Completion(RunCompletion),
    Wake,
    Closed,
}

/// Single owner of the scheduled-task set and the next wake-up time
pub struct Scheduler {
    database: Arc<Database>,
    engine: Arc<ExecutionEngine>,
    entries: HashMap<String, ScheduledEntry>,
}

impl Scheduler {
    /// Loads every enabled, scheduled task, persists its next trigger, and
    /// spawns the loop.
    pub async fn start(
        database: Arc<Database>,
        engine: Arc<ExecutionEngine>,
        completions: mpsc::UnboundedReceiver<RunCompletion>,
        command_buffer: usize,
    ) -> anyhow::Result<(SchedulerHandle, JoinHandle<()>)> {
        let mut scheduler = Self {
            database,
            engine,
            entries: HashMap::new(),
        };
        scheduler.load_scheduled_tasks().await?;

        let (commands, command_rx) = mpsc::channel(command_buffer.max(1));
        let join = tokio::spawn(scheduler.run(command_rx, completions));

        Ok((SchedulerHandle { commands }, join))
    }

    #[instrument(skip(self))]
    async fn load_scheduled_tasks(&mut self) -> anyhow::Result<()> {
        let cleared = self.database.clear_next_run_for_unscheduled().await?;
        if cleared > 0 {
            info!("Cleared next run time on {} unscheduled tasks", cleared);
        }

        let tasks = self.database.list_scheduled_tasks().await?;
        let now = Utc::now();
        for task in tasks {
            self.schedule_task(task, now).await;
        }

        info!("Scheduler loaded {} scheduled tasks", self.entries.len());
        Ok(())
    }

    async fn run(
        mut self,
        mut commands: mpsc::Receiver<SchedulerCommand>,
        mut completions: mpsc::UnboundedReceiver<RunCompletion>,
    ) {
        info!("Scheduler loop started");

        loop {
            let sleep_for = self.time_until_next_due(Utc::now());

            let event = tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => LoopEvent::Command(command),
                    None => LoopEvent::Closed,
                },
                Some(completion) = completions.recv() => LoopEvent::Completion(completion),
                _ = tokio::time::sleep(sleep_for) => LoopEvent::Wake,
            };

            match event {
                LoopEvent::Command(SchedulerCommand::Shutdown) | LoopEvent::Closed => break,
                LoopEvent::Command(command) => self.handle_command(command).await,
                LoopEvent::Completion(completion) => self.handle_completion(completion).await,
                LoopEvent::Wake => self.fire_due_tasks(Utc::now()).await,
            }
        }

        info!("Scheduler loop stopped");
    }

    async fn handle_command(&mut self, command: SchedulerCommand) {
        match command {
            SchedulerCommand::TaskUpserted { task_id, reply } => {
                let next_run_at = self.reload_task(&task_id).await;
                let _ = reply.send(next_run_at);
            }
            SchedulerCommand::TaskRemoved { task_id } => {
                if self.entries.remove(&task_id).is_some() {
                    info!("Unscheduled deleted task {}", task_id);
                }
            }
            SchedulerCommand::RunNow { task, reply } => {
                let result = self
                    .engine
                    .try_start(task, RunTrigger::Manual)
                    .map(|admission| admission.run_id);
                let _ = reply.send(result);
            }
            SchedulerCommand::Status { reply } => {
                let _ = reply.send(self.status(Utc::now()));
            }
            SchedulerCommand::Shutdown => {}
        }
    }

    /// Commands can arrive after later writes to the same task, so the store
    /// decides what gets scheduled.
    async fn reload_task(&mut self, task_id: &str) -> Option<DateTime<Utc>> {
        let task = match self.database.get_task(task_id).await {
            Ok(Some(task)) => task,
            Ok(None) => {
                if self.entries.remove(task_id).is_some() {
                    info!("Task {} no longer exists, unscheduled", task_id);
                }
                return None;
            }
            Err(e) => {
                error!("Failed to reload task {}, keeping its schedule: {}", task_id, e);
                return self.entries.get(task_id).map(|entry| entry.next_run_at);
            }
        };

        self.entries.remove(task_id);
        if task.is_scheduled() {
            self.schedule_task(task, Utc::now()).await
        } else {
            debug!("Task {} is not scheduled, clearing next run", task_id);
            self.persist_next_run(task_id, None).await;
            None
        }
    }

    async fn handle_completion(&mut self, completion: RunCompletion) {
        debug!(
            "{} run {} of task {} completed: {}",
            completion.trigger, completion.run_id, completion.task_id, completion.status
        );
        if let Err(e) = self
            .database
            .set_last_run_at(&completion.task_id, completion.completed_at)
            .await
        {
            error!("Failed to update last run of task {}: {}", completion.task_id, e);
        }

        let next_run_at = match self.entries.get_mut(&completion.task_id) {
            Some(entry) => {
                entry.task.last_run_at = Some(completion.completed_at);
                Some(entry.next_run_at)
            }
            None => None,
        };

        // A scheduled run already moved next_run_at forward when it fired
        if let Some(next_run_at) = next_run_at {
            self.persist_next_run(&completion.task_id, Some(next_run_at)).await;
        }
    }

    async fn fire_due_tasks(&mut self, now: DateTime<Utc>) {
        let due: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.next_run_at <= now)
            .map(|(task_id, _)| task_id.clone())
            .collect();

        for task_id in due {
            let Some(entry) = self.entries.get_mut(&task_id) else {
                continue;
            };

            let consumed = entry.next_run_at;
            let base = consumed.max(now);
            let next = entry.schedule.next_after(base);
            let task = entry.task.clone();

            match next {
                Ok(next_run_at) => {
                    entry.next_run_at = next_run_at;
                    debug!("Task {} fired for {}, next at {}", task_id, consumed, next_run_at);
                    self.persist_next_run(&task_id, Some(next_run_at)).await;
                }
                Err(e) => {
                    error!("Cannot compute next run of task {}, unscheduling: {}", task_id, e);
                    self.entries.remove(&task_id);
                    self.persist_next_run(&task_id, None).await;
                }
            }

            match self.engine.try_start(task, RunTrigger::Scheduled) {
                Ok(admission) => debug!("Scheduled run {} admitted", admission.run_id),
                Err(SchedulerError::ConcurrencyRejected { active_run_id, .. }) => {
                    info!(
                        "Skipping scheduled run of task {}: run {} still in progress",
                        task_id, active_run_id
                    );
                }
                Err(e) => error!("Failed to start scheduled run of task {}: {}", task_id, e),
            }
        }
    }

    /// Parses the task's schedule, computes and persists its next trigger.
    /// Bookkeeping failures leave the task unscheduled until its next edit.
    async fn schedule_task(&mut self, task: TaskRecord, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let expression = task.cron_expression.clone().unwrap_or_default();

        let scheduled = CronSchedule::parse(&expression, &task.timezone)
            .and_then(|schedule| schedule.next_after(now).map(|next| (schedule, next)));

        match scheduled {
            Ok((schedule, next_run_at)) => {
                info!(
                    "Scheduled task '{}' ({}) with '{}' {}, next run at {}",
                    task.name, task.id, expression, task.timezone, next_run_at
                );
                let task_id = task.id.clone();
                self.entries.insert(
                    task_id.clone(),
                    ScheduledEntry {
                        task,
                        schedule,
                        next_run_at,
                    },
                );
                self.persist_next_run(&task_id, Some(next_run_at)).await;
                Some(next_run_at)
            }
            Err(e) => {
                warn!("Skipping schedule of task {}: {}", task.id, e);
                self.persist_next_run(&task.id, None).await;
                None
            }
        }
    }

    async fn persist_next_run(&self, task_id: &str, next_run_at: Option<DateTime<Utc>>) {
        if let Err(e) = self.database.set_next_run_at(task_id, next_run_at).await {
            error!("Failed to persist next run of task {}: {}", task_id, e);
        }
    }

    fn time_until_next_due(&self, now: DateTime<Utc>) -> Duration {
        self.entries
            .values()
            .map(|entry| entry.next_run_at)
            .min()
            .map(|next| (next - now).to_std().unwrap_or(Duration::ZERO))
            .unwrap_or(IDLE_WAKE_INTERVAL)
    }

    fn status(&self, now: DateTime<Utc>) -> SchedulerStatus {
        let mut jobs: Vec<ScheduledJob> = self
            .entries
            .values()
            .map(|entry| ScheduledJob {
                task_id: entry.task.id.clone(),
                task_name: entry.task.name.clone(),
                cron_expression: entry.schedule.expression().to_string(),
                timezone: entry.schedule.timezone().name().to_string(),
                next_run_at: entry.next_run_at,
                upcoming: entry
                    .schedule
                    .upcoming(now, PREVIEW_TRIGGER_COUNT)
                    .unwrap_or_default(),
            })
            .collect();
        jobs.sort_by_key(|job| job.next_run_at);

        SchedulerStatus {
            running: true,
            scheduled_jobs: jobs.len(),
            jobs,
        }
    }
}
