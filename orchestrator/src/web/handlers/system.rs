// System status and health endpoints

use axum::{extract::State, response::Json};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::warn;

use crate::scheduler::SchedulerStatus;
use crate::web::AppState;

#[derive(Debug, Serialize)]
pub struct ConfigStatus {
    pub agent_configured: bool,
    pub notifications_configured: bool,
}

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub scheduler: SchedulerStatus,
    /// task id -> run id
    pub running_tasks: HashMap<String, String>,
    pub sse_subscribers: usize,
    pub config: ConfigStatus,
}

pub async fn health_check() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

pub async fn system_status(State(state): State<AppState>) -> Json<SystemStatus> {
    let scheduler = match state.scheduler.status().await {
        Ok(status) => status,
        Err(e) => {
            warn!("Scheduler status unavailable: {}", e);
            SchedulerStatus::stopped()
        }
    };

    Json(SystemStatus {
        scheduler,
        running_tasks: state.guard.snapshot(),
        sse_subscribers: state.events.subscriber_count(),
        config: ConfigStatus {
            agent_configured: state.agent_configured,
            notifications_configured: state.notifications_configured,
        },
    })
}
