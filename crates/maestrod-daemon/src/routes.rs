//! Daemon HTTP API.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use maestrod_core::{BuildRequest, RunningBuild};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::info;

use crate::AppState;
use crate::error::ApiError;

/// Build the daemon router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", api_router())
        .merge(health_router())
        .with_state(state)
}

fn api_router() -> Router<AppState> {
    Router::new()
        .route("/builds", post(enqueue_build).get(list_builds))
        .route("/workers/{project}/{branch}", delete(destroy_worker))
}

fn health_router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

#[derive(Debug, Deserialize)]
struct EnqueueBuild {
    project: String,
    branch: String,
    #[serde(default)]
    prev_commit: String,
    curr_commit: String,
}

/// Append a build request to the waiting queue.
///
/// The request is admitted by a later scheduler cycle; whether the project
/// resolves against the configuration is checked at admission time.
async fn enqueue_build(
    State(state): State<AppState>,
    Json(body): Json<EnqueueBuild>,
) -> Result<StatusCode, ApiError> {
    if body.project.is_empty() || body.branch.is_empty() || body.curr_commit.is_empty() {
        return Err(ApiError::BadRequest(
            "project, branch and curr_commit are required".to_string(),
        ));
    }

    let req = BuildRequest::new(body.project, body.branch, body.prev_commit, body.curr_commit);
    info!(project = %req.project, branch = %req.branch, commit = %req.curr_commit, "enqueued build request");
    state.scheduler.lock().await.queue.enqueue(req);
    Ok(StatusCode::ACCEPTED)
}

#[derive(Debug, Serialize)]
struct BuildsSnapshot {
    queued: Vec<BuildRequest>,
    running: Vec<RunningBuild>,
}

async fn list_builds(State(state): State<AppState>) -> Json<BuildsSnapshot> {
    let scheduler = state.scheduler.lock().await;
    Json(BuildsSnapshot {
        queued: scheduler.queue.iter().cloned().collect(),
        running: scheduler.running.iter().cloned().collect(),
    })
}

/// Explicit teardown of a worker's backend resources.
async fn destroy_worker(
    State(state): State<AppState>,
    Path((project, branch)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    state.driver.destroy_worker(&project, &branch).await?;
    info!(project = %project, branch = %branch, "destroyed worker");
    Ok(Json(json!({ "destroyed": format!("{}/{}", project, branch) })))
}
