//! Download session routes.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use crate::api::error::ApiResult;
use crate::api::server::AppState;
use crate::downloader::{DownloadRequest, ProgressSnapshot, SessionId};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(start_download).get(list_downloads))
        .route("/{id}", get(get_download))
        .route("/{id}/cancel", post(cancel_download))
}

#[derive(Debug, Serialize)]
pub struct StartResponse {
    pub session_id: SessionId,
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub session_id: SessionId,
    /// False when the job had already finished
    pub cancelled: bool,
}

async fn start_download(
    State(state): State<AppState>,
    Json(request): Json<DownloadRequest>,
) -> ApiResult<(StatusCode, Json<StartResponse>)> {
    let session_id = state.downloader.start(request)?;
    Ok((StatusCode::ACCEPTED, Json(StartResponse { session_id })))
}

async fn list_downloads(State(state): State<AppState>) -> Json<Vec<ProgressSnapshot>> {
    Json(state.downloader.list_sessions())
}

async fn get_download(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ProgressSnapshot>> {
    let id: SessionId = id.parse()?;
    Ok(Json(state.downloader.get_status(id)?))
}

async fn cancel_download(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<CancelResponse>> {
    let session_id: SessionId = id.parse()?;
    let cancelled = state.downloader.cancel(session_id)?;
    Ok(Json(CancelResponse {
        session_id,
        cancelled,
    }))
}
