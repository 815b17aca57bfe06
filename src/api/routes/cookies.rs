//! Cookie file routes.
//!
//! Uploads are the raw file bytes in the request body, named by `?filename=`.

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::api::error::{ApiError, ApiResult};
use crate::api::server::AppState;
use crate::downloader::CookieFile;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_cookies).post(upload_cookie))
        .route("/cleanup", post(cleanup_cookies))
}

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    pub filename: String,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize)]
pub struct CleanupQuery {
    pub max_age_hours: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct CleanupResponse {
    pub removed: usize,
}

async fn list_cookies(State(state): State<AppState>) -> ApiResult<Json<Vec<CookieFile>>> {
    Ok(Json(state.downloader.list_cookie_files()?))
}

async fn upload_cookie(
    State(state): State<AppState>,
    Query(query): Query<UploadQuery>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<UploadResponse>)> {
    if body.is_empty() {
        return Err(ApiError::validation("Cookie file is empty"));
    }
    let path = state.downloader.save_cookie(&query.filename, &body)?;
    Ok((StatusCode::CREATED, Json(UploadResponse { path })))
}

async fn cleanup_cookies(
    State(state): State<AppState>,
    Query(query): Query<CleanupQuery>,
) -> ApiResult<Json<CleanupResponse>> {
    let max_age = query
        .max_age_hours
        .map(|h| Duration::from_secs(h.saturating_mul(60 * 60)))
        .unwrap_or(state.cookie_max_age);
    let removed = state.downloader.cleanup_old_cookies(max_age)?;
    Ok(Json(CleanupResponse { removed }))
}
