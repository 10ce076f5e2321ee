use crate::web::{handlers, AppState};
use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use std::future::Future;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub async fn start_web_server<F>(state: AppState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = format!("{}:{}", state.config.host, state.config.port);
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server running on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        // === TASK ROUTES ===
        .route(
            "/api/tasks",
            get(handlers::list_tasks).post(handlers::create_task),
        )
        .route(
            "/api/tasks/{task_id}",
            get(handlers::get_task)
                .put(handlers::update_task)
                .delete(handlers::delete_task),
        )
        .route("/api/tasks/{task_id}/run", post(handlers::run_task))
        .route("/api/tasks/{task_id}/toggle", post(handlers::toggle_task))
        .route(
            "/api/tasks/{task_id}/duplicate",
            post(handlers::duplicate_task),
        )
        // === RUN HISTORY ROUTES ===
        .route("/api/logs", get(handlers::list_logs))
        .route("/api/logs/task/{task_id}", get(handlers::list_task_logs))
        .route("/api/logs/{run_id}", get(handlers::get_log))
        // === LIVE EVENTS ===
        .route("/api/events", get(handlers::stream_events))
        // === SYSTEM ROUTES ===
        .route("/api/system/status", get(handlers::system_status))
        .route("/api/system/health", get(handlers::health_check))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
