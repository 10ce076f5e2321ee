// Run history endpoints

use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use serde::Deserialize;

use super::common::{ApiError, ApiResult};
use crate::constants::logs::{DEFAULT_PER_PAGE, MAX_PER_PAGE};
use crate::database::{RunPage, RunQuery, RunRecord, RunStatus};
use crate::web::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct LogsQuery {
    pub task_id: Option<String>,
    pub status: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub snapshot: Option<i64>,
}

impl LogsQuery {
    fn into_run_query(self) -> Result<RunQuery, ApiError> {
        let page = self.page.unwrap_or(1);
        if page < 1 {
            return Err(ApiError::unprocessable("page must be at least 1"));
        }

        let per_page = self.per_page.unwrap_or(DEFAULT_PER_PAGE);
        if !(1..=MAX_PER_PAGE).contains(&per_page) {
            return Err(ApiError::unprocessable(format!(
                "per_page must be between 1 and {}",
                MAX_PER_PAGE
            )));
        }

        let status = match self.status.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(raw.parse::<RunStatus>().map_err(ApiError::unprocessable)?),
        };

        Ok(RunQuery {
            task_id: self.task_id.filter(|id| !id.is_empty()),
            status,
            page,
            per_page,
            snapshot: self.snapshot,
        })
    }
}

pub async fn list_logs(
    Query(query): Query<LogsQuery>,
    State(state): State<AppState>,
) -> ApiResult<Json<RunPage>> {
    let query = query.into_run_query()?;
    Ok(Json(state.database.list_runs(&query).await?))
}

pub async fn get_log(
    Path(run_id): Path<String>,
    State(state): State<AppState>,
) -> ApiResult<Json<RunRecord>> {
    state
        .database
        .get_run(&run_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Log not found"))
}

pub async fn list_task_logs(
    Path(task_id): Path<String>,
    Query(query): Query<LogsQuery>,
    State(state): State<AppState>,
) -> ApiResult<Json<RunPage>> {
    // 404 for unknown tasks; history of deleted tasks stays reachable through /api/logs
    state.task_service.get_task(&task_id).await?;

    let mut query = query.into_run_query()?;
    query.task_id = Some(task_id);
    Ok(Json(state.database.list_runs(&query).await?))
}
