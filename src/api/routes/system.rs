//! System information route.

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use std::path::PathBuf;

use crate::api::server::AppState;
use crate::downloader::platforms::{PlatformConfig, PLATFORMS};
use crate::downloader::tools::ToolInfo;
use crate::downloader::Capabilities;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(system_info))
}

#[derive(Debug, Serialize)]
pub struct SystemResponse {
    pub version: String,
    pub extractor: String,
    pub capabilities: Capabilities,
    pub tools: Vec<ToolInfo>,
    pub download_dir: PathBuf,
    pub cookies_dir: PathBuf,
    pub cookie_count: usize,
    pub sessions: usize,
    pub platforms: Vec<PlatformConfig>,
}

async fn system_info(State(state): State<AppState>) -> Json<SystemResponse> {
    let downloader = &state.downloader;
    let cookie_count = match downloader.list_cookie_files() {
        Ok(files) => files.len(),
        Err(e) => {
            tracing::warn!(error = %e, "Cannot list cookie files");
            0
        }
    };

    Json(SystemResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        extractor: downloader.extractor_name().to_string(),
        capabilities: downloader.capabilities(),
        tools: state.tools.as_ref().clone(),
        download_dir: downloader.download_dir().to_path_buf(),
        cookies_dir: downloader.cookies().dir().to_path_buf(),
        cookie_count,
        sessions: downloader.registry().len(),
        platforms: PLATFORMS.to_vec(),
    })
}
