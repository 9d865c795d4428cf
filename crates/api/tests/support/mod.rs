//! Shared harness for router integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, Response};
use axum::Router;
use tempfile::TempDir;
use tower::ServiceExt;
use userhub_api::{router, AppContext};
use userhub_core::testing::StaticIdentityVerifier;
use userhub_domain::{Config, IdentityUser};
use userhub_infra::{DbManager, LocalObjectStore};

pub const TOKEN: &str = "valid-token";
pub const BOUNDARY: &str = "userhub-test-boundary";
pub const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

/// Router over a temporary database and upload directory.
pub struct TestApp {
    pub router: Router,
    pub ctx: Arc<AppContext>,
    _temp_dir: TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("temp dir should be created");

        let mut config = Config::default();
        config.database.path = temp_dir.path().join("userhub.db").to_string_lossy().to_string();
        config.uploads.dir = temp_dir.path().join("uploads").to_string_lossy().to_string();

        let db = Arc::new(
            DbManager::from_config(&config.database).expect("database manager should initialise"),
        );
        db.run_migrations().expect("schema migrations should apply");

        let store = Arc::new(LocalObjectStore::from_config(&config.uploads));
        let identity = Arc::new(StaticIdentityVerifier::new().with_token(
            TOKEN,
            IdentityUser { id: "uuid-ana".into(), email: Some("ana@example.com".into()) },
        ));

        let ctx = Arc::new(AppContext::from_parts(config, db, store, identity));
        Self { router: router(Arc::clone(&ctx)), ctx, _temp_dir: temp_dir }
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.expect("router should respond")
    }
}

pub fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request should build")
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).expect("request should build")
}

/// Multipart body with an optional `email` field and an optional file part.
pub fn multipart_request(
    email: Option<&str>,
    file: Option<(&str, &str, &[u8])>,
) -> Request<Body> {
    let mut body = Vec::new();
    if let Some(email) = email {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"email\"\r\n\r\n{email}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((file_name, content_type, bytes)) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; \
                 filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/upload")
        .header("content-type", format!("multipart/form-data; boundary={BOUNDARY}"))
        .body(Body::from(body))
        .expect("request should build")
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body should be readable");
    serde_json::from_slice(&bytes).expect("body should be JSON")
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX).await.expect("body should be readable").to_vec()
}
