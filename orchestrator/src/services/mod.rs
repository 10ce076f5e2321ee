pub mod execution_engine;
pub mod notifier;
pub mod task_service;

pub use execution_engine::{ExecutionEngine, RunAdmission, RunCompletion};
pub use notifier::{Notifier, RunNotification, WebhookNotifier};
pub use task_service::{TaskDraft, TaskPatch, TaskService};
