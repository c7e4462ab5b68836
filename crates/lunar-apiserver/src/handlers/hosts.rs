use crate::handlers::MemberParams;
use crate::response::{status_success, ApiResponse};
use crate::{AppState, Result};
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use std::sync::Arc;
use tracing::info;

/// GET /hosts
pub async fn list_host_groups(State(state): State<Arc<AppState>>) -> Result<Response> {
    let groups = state.orchestrator.list_host_groups().await?;
    Ok(ApiResponse::ok(groups).into_response())
}

/// GET /hosts/{name}
pub async fn get_host_group(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Response> {
    let group = state.orchestrator.get_host_group(&name).await?;
    Ok(ApiResponse::ok(group).into_response())
}

/// POST /hosts/{name}
pub async fn create_host_group(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Response> {
    info!("Creating host group {}", name);
    let group = state.orchestrator.create_host_group(&name).await?;
    Ok(ApiResponse::created(group).into_response())
}

/// DELETE /hosts/{name}
pub async fn delete_host_group(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Response> {
    info!("Deleting host group {}", name);
    state.orchestrator.delete_host_group(&name).await?;
    Ok(status_success(format!("host group {} deleted", name)))
}

/// PUT /hosts/{name}/add/{member}
pub async fn add_member(
    State(state): State<Arc<AppState>>,
    Path(params): Path<MemberParams>,
) -> Result<Response> {
    add(state, params, false).await
}

/// PUT /hosts/{name}/add/{member}/force
///
/// Also moves an initiator that already belongs to another host group.
pub async fn force_add_member(
    State(state): State<Arc<AppState>>,
    Path(params): Path<MemberParams>,
) -> Result<Response> {
    add(state, params, true).await
}

async fn add(state: Arc<AppState>, params: MemberParams, force: bool) -> Result<Response> {
    let group = state
        .orchestrator
        .add_host_group_member(&params.name, &params.member, force)
        .await?;
    Ok(ApiResponse::ok(group).into_response())
}

/// PUT /hosts/{name}/remove/{member}
pub async fn remove_member(
    State(state): State<Arc<AppState>>,
    Path(params): Path<MemberParams>,
) -> Result<Response> {
    let group = state
        .orchestrator
        .remove_host_group_member(&params.name, &params.member)
        .await?;
    Ok(ApiResponse::ok(group).into_response())
}
