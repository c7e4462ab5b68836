//! Target groups, target port groups and iSCSI targets

use crate::handlers::MemberParams;
use crate::response::{status_success, ApiResponse};
use crate::{AppState, Result};
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use lunar_core::{TargetPortGroupRequest, TargetRequest};
use std::sync::Arc;
use tracing::info;

/// GET /targets/tg
pub async fn list_target_groups(State(state): State<Arc<AppState>>) -> Result<Response> {
    let groups = state.orchestrator.list_target_groups().await?;
    Ok(ApiResponse::ok(groups).into_response())
}

/// GET /targets/tg/{name}
pub async fn get_target_group(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Response> {
    let group = state.orchestrator.get_target_group(&name).await?;
    Ok(ApiResponse::ok(group).into_response())
}

/// POST /targets/tg/{name}
pub async fn create_target_group(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Response> {
    info!("Creating target group {}", name);
    let group = state.orchestrator.create_target_group(&name).await?;
    Ok(ApiResponse::created(group).into_response())
}

/// DELETE /targets/tg/{name}
pub async fn delete_target_group(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Response> {
    info!("Deleting target group {}", name);
    state.orchestrator.delete_target_group(&name).await?;
    Ok(status_success(format!("target group {} deleted", name)))
}

/// PUT /targets/tg/{name}/add/{member}
pub async fn add_target_group_member(
    State(state): State<Arc<AppState>>,
    Path(params): Path<MemberParams>,
) -> Result<Response> {
    let group = state
        .orchestrator
        .add_target_group_member(&params.name, &params.member)
        .await?;
    Ok(ApiResponse::ok(group).into_response())
}

/// PUT /targets/tg/{name}/remove/{member}
pub async fn remove_target_group_member(
    State(state): State<Arc<AppState>>,
    Path(params): Path<MemberParams>,
) -> Result<Response> {
    let group = state
        .orchestrator
        .remove_target_group_member(&params.name, &params.member)
        .await?;
    Ok(ApiResponse::ok(group).into_response())
}

/// GET /targets/tpg
pub async fn list_port_groups(State(state): State<Arc<AppState>>) -> Result<Response> {
    let tpgs = state.orchestrator.list_target_port_groups().await?;
    Ok(ApiResponse::ok(tpgs).into_response())
}

/// GET /targets/tpg/{name}
pub async fn get_port_group(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Response> {
    let tpg = state.orchestrator.get_target_port_group(&name).await?;
    Ok(ApiResponse::ok(tpg).into_response())
}

/// POST /targets/tpg/{name}
pub async fn create_port_group(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Json(request): Json<TargetPortGroupRequest>,
) -> Result<Response> {
    info!("Creating target port group {}", name);
    let tpg = state
        .orchestrator
        .create_target_port_group(&name, &request)
        .await?;
    Ok(ApiResponse::created(tpg).into_response())
}

/// DELETE /targets/tpg/{name}
pub async fn delete_port_group(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Response> {
    remove_port_group(state, name, false).await
}

/// DELETE /targets/tpg/{name}/force
pub async fn force_delete_port_group(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Response> {
    remove_port_group(state, name, true).await
}

async fn remove_port_group(state: Arc<AppState>, name: String, force: bool) -> Result<Response> {
    state
        .orchestrator
        .delete_target_port_group(&name, force)
        .await?;
    Ok(status_success(format!("target port group {} deleted", name)))
}

/// GET /targets
pub async fn list_targets(State(state): State<Arc<AppState>>) -> Result<Response> {
    let targets = state.orchestrator.list_iscsi_targets().await?;
    Ok(ApiResponse::ok(targets).into_response())
}

/// POST /targets
///
/// Without an `iqn` in the body the iSCSI admin generates one.
pub async fn create_target(
    State(state): State<Arc<AppState>>,
    Json(request): Json<TargetRequest>,
) -> Result<Response> {
    let target = state.orchestrator.create_iscsi_target(&request).await?;
    Ok(ApiResponse::created(target).into_response())
}

/// POST /targets/{iqn}
pub async fn create_named_target(
    State(state): State<Arc<AppState>>,
    Path(iqn): Path<String>,
    Json(request): Json<TargetRequest>,
) -> Result<Response> {
    let request = TargetRequest {
        iqn: Some(iqn),
        ..request
    };
    let target = state.orchestrator.create_iscsi_target(&request).await?;
    Ok(ApiResponse::created(target).into_response())
}

/// GET /targets/{iqn}
pub async fn get_target(
    State(state): State<Arc<AppState>>,
    Path(iqn): Path<String>,
) -> Result<Response> {
    let target = state.orchestrator.get_iscsi_target(&iqn).await?;
    Ok(ApiResponse::ok(target).into_response())
}

/// DELETE /targets/{iqn}
pub async fn delete_target(
    State(state): State<Arc<AppState>>,
    Path(iqn): Path<String>,
) -> Result<Response> {
    remove_target(state, iqn, false).await
}

/// DELETE /targets/{iqn}/force
pub async fn force_delete_target(
    State(state): State<Arc<AppState>>,
    Path(iqn): Path<String>,
) -> Result<Response> {
    remove_target(state, iqn, true).await
}

async fn remove_target(state: Arc<AppState>, iqn: String, force: bool) -> Result<Response> {
    state.orchestrator.delete_iscsi_target(&iqn, force).await?;
    Ok(status_success(format!("target {} deleted", iqn)))
}
