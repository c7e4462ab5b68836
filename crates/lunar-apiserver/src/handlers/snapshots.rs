use crate::handlers::{SnapshotParams, VolumeParams};
use crate::response::{job_accepted, ApiResponse};
use crate::{AppState, Result};
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use lunar_core::CloneVolumeRequest;
use std::sync::Arc;
use tracing::info;

/// GET .../volumes/{volume}/snapshots
pub async fn list_snapshots(
    State(state): State<Arc<AppState>>,
    Path(params): Path<VolumeParams>,
) -> Result<Response> {
    state.ensure_public_pool(&params.pool)?;
    let snapshots = state
        .orchestrator
        .list_snapshots(&params.path(), &params.volume)
        .await?;
    Ok(ApiResponse::ok(snapshots).into_response())
}

/// POST .../volumes/{volume}/snapshots/{snapshot}
pub async fn create_snapshot(
    State(state): State<Arc<AppState>>,
    Path(params): Path<SnapshotParams>,
) -> Result<Response> {
    state.ensure_public_pool(&params.pool)?;
    let snapshot = state
        .orchestrator
        .create_snapshot(&params.path(), &params.volume, &params.snapshot)
        .await?;
    Ok(ApiResponse::created(snapshot).into_response())
}

/// GET .../volumes/{volume}/snapshots/{snapshot}
pub async fn get_snapshot(
    State(state): State<Arc<AppState>>,
    Path(params): Path<SnapshotParams>,
) -> Result<Response> {
    state.ensure_public_pool(&params.pool)?;
    let snapshot = state
        .orchestrator
        .get_snapshot(&params.path(), &params.volume, &params.snapshot)
        .await?;
    Ok(ApiResponse::ok(snapshot).into_response())
}

/// DELETE .../volumes/{volume}/snapshots/{snapshot}
pub async fn delete_snapshot(
    State(state): State<Arc<AppState>>,
    Path(params): Path<SnapshotParams>,
) -> Result<Response> {
    state.ensure_public_pool(&params.pool)?;
    let project = params.path();
    // resolve now so an unknown volume is a 404 rather than a failed job
    let lu = state
        .orchestrator
        .get_volume(&project, &params.volume)
        .await?;

    let orchestrator = state.orchestrator.clone();
    let description = format!("destroy snapshot {}@{}", lu.backing_store, params.snapshot);
    let SnapshotParams {
        volume, snapshot, ..
    } = params;
    let job = state
        .jobs
        .submit(description, async move {
            orchestrator
                .destroy_snapshot(&project, &volume, &snapshot)
                .await
        })
        .await?;
    Ok(job_accepted(job))
}

/// PUT .../volumes/{volume}/snapshots/{snapshot}/rollback
pub async fn rollback(
    State(state): State<Arc<AppState>>,
    Path(params): Path<SnapshotParams>,
) -> Result<Response> {
    state.ensure_public_pool(&params.pool)?;
    info!(
        "Rolling back volume {} to {}",
        params.volume, params.snapshot
    );
    let lu = state
        .orchestrator
        .rollback_volume(&params.path(), &params.volume, &params.snapshot)
        .await?;
    Ok(ApiResponse::ok(lu).into_response())
}

/// POST .../volumes/{volume}/snapshots/{snapshot}/clone
pub async fn clone_snapshot(
    State(state): State<Arc<AppState>>,
    Path(params): Path<SnapshotParams>,
    Json(request): Json<CloneVolumeRequest>,
) -> Result<Response> {
    state.ensure_public_pool(&params.pool)?;
    let lu = state
        .orchestrator
        .clone_snapshot(&params.path(), &params.volume, &params.snapshot, &request)
        .await?;
    Ok(ApiResponse::created(lu).into_response())
}
