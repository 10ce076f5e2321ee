pub mod agent;
pub mod app;
pub mod config;
pub mod constants;
pub mod database;
pub mod errors;
pub mod events;
pub mod run_guard;
pub mod scheduler;
pub mod services;
pub mod web;

// Re-export commonly used types
pub use agent::{AutomationAgent, HttpAutomationAgent};
pub use app::Orchestrator;
pub use config::{Config, ConfigManager};
pub use database::Database;
pub use errors::SchedulerError;
pub use events::{EventBus, LifecycleEvent};
pub use run_guard::RunGuard;
pub use scheduler::SchedulerHandle;
pub use services::{ExecutionEngine, TaskService, WebhookNotifier};
