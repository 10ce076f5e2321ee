// Task management endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use serde::Serialize;
use tracing::info;

use super::common::ApiResult;
use crate::database::TaskRecord;
use crate::services::{TaskDraft, TaskPatch};
use crate::web::AppState;

#[derive(Debug, Serialize)]
pub struct TaskListResponse {
    pub tasks: Vec<TaskRecord>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct RunNowResponse {
    pub message: String,
    pub task_id: String,
    pub run_id: String,
}

pub async fn list_tasks(State(state): State<AppState>) -> ApiResult<Json<TaskListResponse>> {
    let tasks = state.task_service.list_tasks().await?;
    Ok(Json(TaskListResponse {
        total: tasks.len(),
        tasks,
    }))
}

pub async fn create_task(
    State(state): State<AppState>,
    Json(draft): Json<TaskDraft>,
) -> ApiResult<(StatusCode, Json<TaskRecord>)> {
    let task = state.task_service.create_task(draft).await?;
    Ok((StatusCode::CREATED, Json(task)))
}

pub async fn get_task(
    Path(task_id): Path<String>,
    State(state): State<AppState>,
) -> ApiResult<Json<TaskRecord>> {
    Ok(Json(state.task_service.get_task(&task_id).await?))
}

pub async fn update_task(
    Path(task_id): Path<String>,
    State(state): State<AppState>,
    Json(patch): Json<TaskPatch>,
) -> ApiResult<Json<TaskRecord>> {
    Ok(Json(state.task_service.update_task(&task_id, patch).await?))
}

pub async fn delete_task(
    Path(task_id): Path<String>,
    State(state): State<AppState>,
) -> ApiResult<StatusCode> {
    state.task_service.delete_task(&task_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn run_task(
    Path(task_id): Path<String>,
    State(state): State<AppState>,
) -> ApiResult<Json<RunNowResponse>> {
    info!("Manual run requested for task {}", task_id);
    let run_id = state.task_service.run_now(&task_id).await?;

    Ok(Json(RunNowResponse {
        message: "Task started".to_string(),
        task_id,
        run_id,
    }))
}

pub async fn toggle_task(
    Path(task_id): Path<String>,
    State(state): State<AppState>,
) -> ApiResult<Json<TaskRecord>> {
    Ok(Json(state.task_service.toggle_task(&task_id).await?))
}

pub async fn duplicate_task(
    Path(task_id): Path<String>,
    State(state): State<AppState>,
) -> ApiResult<(StatusCode, Json<TaskRecord>)> {
    let copy = state.task_service.duplicate_task(&task_id).await?;
    Ok((StatusCode::CREATED, Json(copy)))
}
