#![allow(dead_code)]

pub mod config_test_utils;
pub mod mock_socket;

use axum::{
    body::Body,
    http::{Method, Request},
    Router,
};
use docrelay::common::AppConfig;
use docrelay::server::{create_router, AppState};
use docrelay::session::{SessionHandle, SessionPhase, Socket};
use http_body_util::BodyExt;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

pub use mock_socket::MockSocket;

pub const BOUNDARY: &str = "----WebKitFormBoundary7MA4YWxkTrZu0gW";
pub const NUMBER: &str = "9876543210";
pub const JID: &str = "919876543210@s.whatsapp.net";

pub fn setup_temp_dir() -> TempDir {
    TempDir::new().expect("Failed to create temp directory")
}

pub fn test_config(upload_dir: &Path) -> AppConfig {
    let mut config = AppConfig::default();
    config.delivery.upload_dir = upload_dir.to_path_buf();
    config
}

/// Handle with `socket` installed and the session open.
pub fn ready_handle(socket: Arc<MockSocket>) -> SessionHandle {
    let handle = SessionHandle::new();
    let socket: Arc<dyn Socket> = socket;
    handle.install(socket);
    handle.set_phase(SessionPhase::Open);
    handle
}

pub fn create_test_app(handle: SessionHandle, config: &AppConfig) -> Router {
    let state = AppState::new(handle, config);
    create_router(&state)
}

/// Multipart body in the shape the upload form sends.
pub fn build_upload_request(society_data: Option<&str>, files: &[(&str, &[u8])]) -> Request<Body> {
    let mut body = Vec::new();

    if let Some(data) = society_data {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        body.extend_from_slice(b"Content-Disposition: form-data; name=\"societyData\"\r\n\r\n");
        body.extend_from_slice(data.as_bytes());
        body.extend_from_slice(b"\r\n");
    }

    for (name, content) in files {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"pdfFiles\"; filename=\"{}\"\r\n",
                name
            )
            .as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: application/pdf\r\n\r\n");
        body.extend_from_slice(content);
        body.extend_from_slice(b"\r\n");
    }

    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    Request::builder()
        .method(Method::POST)
        .uri("/send-society")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .expect("Failed to build multipart request")
}

pub fn number_data(number: &str) -> String {
    serde_json::json!({ "number": number, "society": "Green Park" }).to_string()
}

pub async fn extract_json(response: axum::response::Response) -> serde_json::Value {
    let body_bytes = response
        .into_body()
        .collect()
        .await
        .expect("Failed to collect body")
        .to_bytes();
    serde_json::from_slice(&body_bytes).expect("Failed to parse JSON")
}

/// Files left behind in the staging directory.
pub fn staged_file_count(dir: &Path) -> usize {
    match std::fs::read_dir(dir) {
        Ok(entries) => entries.count(),
        Err(_) => 0,
    }
}
