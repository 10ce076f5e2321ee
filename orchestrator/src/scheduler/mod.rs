//! Cron-based scheduling of automation tasks
//!
//! This module provides:
//! - Timezone-aware cron evaluation (`cron`)
//! - The scheduler loop that owns the set of scheduled tasks, waits for the
//!   nearest trigger and hands due or manually requested runs to the
//!   execution engine (`actor`)
//!
//! # Features
//!
//! - **Cron expressions**: 5-field crontab, or 6 fields with leading seconds
//! - **Timezone-aware**: each task is evaluated in its own IANA timezone
//! - **Overlap prevention**: a trigger for a task that is still running is skipped
//! - **Single owner**: only the loop mutates `next_run_at`; other components
//!   talk to it through a [`SchedulerHandle`]
//!
//! ```toml
//! # a task scheduled every weekday at 09:30 Berlin time
//! cron_expression = "30 9 * * 1-5"
//! timezone = "Europe/Berlin"
//! ```

pub mod actor;
pub mod cron;

pub use actor::{ScheduledJob, Scheduler, SchedulerCommand, SchedulerHandle, SchedulerStatus};
pub use cron::{next_trigger, upcoming, validate_schedule, CronSchedule};
