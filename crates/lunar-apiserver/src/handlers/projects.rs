use crate::handlers::{PoolParams, ProjectParams};
use crate::response::{status_success, ApiResponse};
use crate::{AppState, Result};
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use lunar_core::ProjectRequest;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

/// GET /domains/{domain}/pools/{pool}/projects
pub async fn list_projects(
    State(state): State<Arc<AppState>>,
    Path(params): Path<PoolParams>,
) -> Result<Response> {
    state.ensure_public_pool(&params.pool)?;
    let projects = state
        .orchestrator
        .list_projects(&params.pool, &params.domain)
        .await?;
    Ok(ApiResponse::ok(projects).into_response())
}

/// GET /domains/{domain}/pools/{pool}/projects/{project}
pub async fn get_project(
    State(state): State<Arc<AppState>>,
    Path(params): Path<ProjectParams>,
) -> Result<Response> {
    state.ensure_public_pool(&params.pool)?;
    let project = state.orchestrator.get_project(&params.path()).await?;
    Ok(ApiResponse::ok(project).into_response())
}

/// GET /domains/{domain}/pools/{pool}/projects/{project}/exists
pub async fn project_exists(
    State(state): State<Arc<AppState>>,
    Path(params): Path<ProjectParams>,
) -> Result<Response> {
    state.ensure_public_pool(&params.pool)?;
    let exists = state.orchestrator.project_exists(&params.path()).await?;
    Ok(ApiResponse::ok(json!({ "exists": exists })).into_response())
}

/// POST /domains/{domain}/pools/{pool}/projects/{project}
pub async fn create_project(
    State(state): State<Arc<AppState>>,
    Path(params): Path<ProjectParams>,
    Json(request): Json<ProjectRequest>,
) -> Result<Response> {
    state.ensure_public_pool(&params.pool)?;
    info!("Creating project {}", params.path());
    let project = state
        .orchestrator
        .create_project(&params.path(), &request)
        .await?;
    Ok(ApiResponse::created(project).into_response())
}

/// PUT /domains/{domain}/pools/{pool}/projects/{project}
pub async fn modify_project(
    State(state): State<Arc<AppState>>,
    Path(params): Path<ProjectParams>,
    Json(request): Json<ProjectRequest>,
) -> Result<Response> {
    state.ensure_public_pool(&params.pool)?;
    info!("Modifying project {}", params.path());
    let project = state
        .orchestrator
        .modify_project(&params.path(), &request)
        .await?;
    Ok(ApiResponse::ok(project).into_response())
}

/// DELETE /domains/{domain}/pools/{pool}/projects/{project}
pub async fn delete_project(
    State(state): State<Arc<AppState>>,
    Path(params): Path<ProjectParams>,
) -> Result<Response> {
    destroy(state, params, false).await
}

/// DELETE /domains/{domain}/pools/{pool}/projects/{project}/force
pub async fn force_delete_project(
    State(state): State<Arc<AppState>>,
    Path(params): Path<ProjectParams>,
) -> Result<Response> {
    destroy(state, params, true).await
}

async fn destroy(state: Arc<AppState>, params: ProjectParams, force: bool) -> Result<Response> {
    state.ensure_public_pool(&params.pool)?;
    let path = params.path();
    info!("Deleting project {} (force: {})", path, force);
    state.orchestrator.destroy_project(&path, force).await?;
    Ok(status_success(format!("project {} deleted", path)))
}
