use crate::handlers::{ProjectParams, VolumeParams};
use crate::response::{job_accepted, ApiResponse};
use crate::{AppState, Result};
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use lunar_core::{CreateVolumeRequest, ExportRequest, ResizeVolumeRequest};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct CompressionParams {
    pub domain: String,
    pub pool: String,
    pub project: String,
    pub volume: String,
    pub compression: String,
}

/// GET /domains/{domain}/pools/{pool}/projects/{project}/volumes
pub async fn list_volumes(
    State(state): State<Arc<AppState>>,
    Path(params): Path<ProjectParams>,
) -> Result<Response> {
    state.ensure_public_pool(&params.pool)?;
    let volumes = state.orchestrator.list_volumes(&params.path()).await?;
    Ok(ApiResponse::ok(volumes).into_response())
}

/// POST /domains/{domain}/pools/{pool}/projects/{project}/volumes
pub async fn create_volume(
    State(state): State<Arc<AppState>>,
    Path(params): Path<ProjectParams>,
    Json(request): Json<CreateVolumeRequest>,
) -> Result<Response> {
    state.ensure_public_pool(&params.pool)?;
    info!("Creating volume {} in {}", request.alias, params.path());
    let lu = state
        .orchestrator
        .create_volume(&params.path(), &request)
        .await?;
    Ok(ApiResponse::created(lu).into_response())
}

/// GET /domains/{domain}/pools/{pool}/projects/{project}/volumes/{volume}
pub async fn get_volume(
    State(state): State<Arc<AppState>>,
    Path(params): Path<VolumeParams>,
) -> Result<Response> {
    state.ensure_public_pool(&params.pool)?;
    let lu = state
        .orchestrator
        .get_volume(&params.path(), &params.volume)
        .await?;
    Ok(ApiResponse::ok(lu).into_response())
}

/// DELETE /domains/{domain}/pools/{pool}/projects/{project}/volumes/{volume}
///
/// Runs as a job; the response carries its identifier.
pub async fn delete_volume(
    State(state): State<Arc<AppState>>,
    Path(params): Path<VolumeParams>,
) -> Result<Response> {
    state.ensure_public_pool(&params.pool)?;
    let project = params.path();
    let lu = state
        .orchestrator
        .get_volume(&project, &params.volume)
        .await?;

    let orchestrator = state.orchestrator.clone();
    let id = lu.id.clone();
    let job = state
        .jobs
        .submit(format!("destroy volume {}", lu.backing_store), async move {
            orchestrator.destroy_volume(&project, &id).await
        })
        .await?;
    info!("Volume {} scheduled for deletion by job {}", lu.id, job);
    Ok(job_accepted(job))
}

/// PUT /domains/{domain}/pools/{pool}/projects/{project}/volumes/{volume}/resize
pub async fn resize_volume(
    State(state): State<Arc<AppState>>,
    Path(params): Path<VolumeParams>,
    Json(request): Json<ResizeVolumeRequest>,
) -> Result<Response> {
    state.ensure_public_pool(&params.pool)?;
    let lu = state
        .orchestrator
        .resize_volume(&params.path(), &params.volume, &request)
        .await?;
    Ok(ApiResponse::ok(lu).into_response())
}

/// PUT /domains/{domain}/pools/{pool}/projects/{project}/volumes/{volume}/compression/{compression}
pub async fn set_compression(
    State(state): State<Arc<AppState>>,
    Path(params): Path<CompressionParams>,
) -> Result<Response> {
    state.ensure_public_pool(&params.pool)?;
    let project = lunar_core::ProjectPath::new(&params.pool, &params.domain, &params.project);
    let dataset = state
        .orchestrator
        .set_volume_compression(&project, &params.volume, &params.compression)
        .await?;
    Ok(ApiResponse::ok(dataset).into_response())
}

/// PUT /domains/{domain}/pools/{pool}/projects/{project}/volumes/{volume}/online
pub async fn online_volume(
    State(state): State<Arc<AppState>>,
    Path(params): Path<VolumeParams>,
) -> Result<Response> {
    state.ensure_public_pool(&params.pool)?;
    let lu = state
        .orchestrator
        .online_volume(&params.path(), &params.volume)
        .await?;
    Ok(ApiResponse::ok(lu).into_response())
}

/// PUT /domains/{domain}/pools/{pool}/projects/{project}/volumes/{volume}/offline
pub async fn offline_volume(
    State(state): State<Arc<AppState>>,
    Path(params): Path<VolumeParams>,
) -> Result<Response> {
    state.ensure_public_pool(&params.pool)?;
    let lu = state
        .orchestrator
        .offline_volume(&params.path(), &params.volume)
        .await?;
    Ok(ApiResponse::ok(lu).into_response())
}

/// PUT /domains/{domain}/pools/{pool}/projects/{project}/volumes/{volume}/export
pub async fn export_volume(
    State(state): State<Arc<AppState>>,
    Path(params): Path<VolumeParams>,
    Json(request): Json<ExportRequest>,
) -> Result<Response> {
    state.ensure_public_pool(&params.pool)?;
    let view = state
        .orchestrator
        .export_volume(&params.path(), &params.volume, &request)
        .await?;
    Ok(ApiResponse::ok(view).into_response())
}

/// GET /domains/{domain}/pools/{pool}/projects/{project}/volumes/{volume}/exports
pub async fn list_exports(
    State(state): State<Arc<AppState>>,
    Path(params): Path<VolumeParams>,
) -> Result<Response> {
    state.ensure_public_pool(&params.pool)?;
    let views = state
        .orchestrator
        .list_exports(&params.path(), &params.volume)
        .await?;
    Ok(ApiResponse::ok(views).into_response())
}

/// PUT /domains/{domain}/pools/{pool}/projects/{project}/volumes/{volume}/unexport
pub async fn unexport_volume(
    State(state): State<Arc<AppState>>,
    Path(params): Path<VolumeParams>,
    Json(request): Json<ExportRequest>,
) -> Result<Response> {
    state.ensure_public_pool(&params.pool)?;
    let lu = state
        .orchestrator
        .unexport_volume(&params.path(), &params.volume, &request)
        .await?;
    Ok(ApiResponse::ok(lu).into_response())
}

/// DELETE /domains/{domain}/pools/{pool}/projects/{project}/volumes/{volume}/exports
pub async fn unexport_all(
    State(state): State<Arc<AppState>>,
    Path(params): Path<VolumeParams>,
) -> Result<Response> {
    state.ensure_public_pool(&params.pool)?;
    let lu = state
        .orchestrator
        .unexport_all(&params.path(), &params.volume)
        .await?;
    Ok(ApiResponse::ok(lu).into_response())
}
