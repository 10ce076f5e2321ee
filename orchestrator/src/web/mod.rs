pub mod handlers;
pub mod server;

pub use server::{create_router, start_web_server};

use std::sync::Arc;

use crate::config::Config;
use crate::database::Database;
use crate::events::EventBus;
use crate::run_guard::RunGuard;
use crate::scheduler::SchedulerHandle;
use crate::services::TaskService;

// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub database: Arc<Database>,
    pub task_service: Arc<TaskService>,
    pub scheduler: SchedulerHandle,
    pub guard: RunGuard,
    pub events: EventBus,
    pub agent_configured: bool,
    pub notifications_configured: bool,
}
