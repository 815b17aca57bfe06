mod common;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::time::Duration;
use tower::ServiceExt;

use common::{downloader_with, Outcome, ScriptedExtractor};
use eliot_downloader_lib::api::{ApiServer, AppState};
use eliot_downloader_lib::config::ServerConfig;
use eliot_downloader_lib::downloader::Downloader;

fn app(downloader: Downloader) -> Router {
    ApiServer::new(ServerConfig::default(), AppState::new(downloader)).build_router()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn failing_downloader(dir: &std::path::Path) -> Downloader {
    downloader_with(
        dir,
        ScriptedExtractor::new(
            &dir.join("downloads"),
            Outcome::Fail("ERROR: Video unavailable".to_string()),
        ),
    )
}

#[tokio::test]
async fn health_reports_version() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(failing_downloader(dir.path()));

    let (status, body) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn download_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(failing_downloader(dir.path()));

    let (status, body) = send(
        &app,
        post_json(
            "/api/downloads",
            json!({"url": "https://vimeo.com/42", "media_kind": "video", "quality": "720p"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let id = body["session_id"].as_str().unwrap().to_string();

    let mut snapshot = Value::Null;
    for _ in 0..500 {
        let (status, body) = send(&app, get(&format!("/api/downloads/{}", id))).await;
        assert_eq!(status, StatusCode::OK);
        if body["status"] == "error" || body["status"] == "completed" {
            snapshot = body;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert_eq!(snapshot["status"], "error");
    assert_eq!(snapshot["error_kind"], "unavailable");
    assert_eq!(snapshot["error"], "Content unavailable or region-blocked.");
    assert_eq!(snapshot["hint"], "The content might be region-blocked or removed");

    let (status, body) = send(&app, get("/api/downloads")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    let cancel = Request::builder()
        .method("POST")
        .uri(format!("/api/downloads/{}/cancel", id))
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, cancel).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cancelled"], false);
}

#[tokio::test]
async fn rejects_bad_requests() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(failing_downloader(dir.path()));

    let (status, body) = send(&app, post_json("/api/downloads", json!({"url": "   "}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let (status, _) = send(&app, get("/api/downloads/not-a-uuid")).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let missing = "6f1c1e4e-8a7b-4c4f-9a55-2b1f0f8d9e01";
    let (status, body) = send(&app, get(&format!("/api/downloads/{}", missing))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");

    let (status, _) = send(
        &app,
        post_json(
            "/api/downloads",
            json!({"url": "https://vimeo.com/1", "cookie": "unknown-site"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn cookie_upload_and_listing() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(failing_downloader(dir.path()));

    let upload = Request::builder()
        .method("POST")
        .uri("/api/cookies?filename=my%2Fsite")
        .body(Body::from("# Netscape HTTP Cookie File\n"))
        .unwrap();
    let (status, body) = send(&app, upload).await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(body["path"].as_str().unwrap().ends_with("my_site.txt"));

    let (status, body) = send(&app, get("/api/cookies")).await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["my_site"]);

    let cleanup = Request::builder()
        .method("POST")
        .uri("/api/cookies/cleanup")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, cleanup).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["removed"], 0);

    let empty = Request::builder()
        .method("POST")
        .uri("/api/cookies?filename=empty")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, empty).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn cookie_cleanup_with_huge_age_keeps_fresh_files() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(failing_downloader(dir.path()));

    let upload = Request::builder()
        .method("POST")
        .uri("/api/cookies?filename=fresh")
        .body(Body::from("# Netscape HTTP Cookie File\n"))
        .unwrap();
    let (status, _) = send(&app, upload).await;
    assert_eq!(status, StatusCode::CREATED);

    // 2^60 hours overflows a seconds count
    let cleanup = Request::builder()
        .method("POST")
        .uri("/api/cookies/cleanup?max_age_hours=1152921504606846976")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, cleanup).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["removed"], 0);

    let (_, body) = send(&app, get("/api/cookies")).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn system_info_lists_platforms() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(failing_downloader(dir.path()));

    let (status, body) = send(&app, get("/api/system")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["extractor"], "scripted");
    assert_eq!(body["capabilities"]["has_transcoder"], true);
    assert_eq!(body["platforms"].as_array().unwrap().len(), 6);
    assert_eq!(body["cookie_count"], 0);
}
