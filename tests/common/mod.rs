//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::Path;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    response::Response,
    Router,
};
use media_gate::{GateConfig, GateServer, Shutdown};
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower::ServiceExt;

/// Deterministic file contents: byte `i` is `i % 251`.
pub fn pattern(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i % 251) as u8).collect()
}

/// A temporary content root holding `files` (name, size).
pub fn content_root(files: &[(&str, usize)]) -> TempDir {
    let dir = TempDir::new().unwrap();
    for (name, size) in files {
        let path = dir.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, pattern(*size)).unwrap();
    }
    dir
}

/// Config pointing at `root` with a fixed secret.
pub fn test_config(root: &Path) -> GateConfig {
    let mut config = GateConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.content.root = root.to_path_buf();
    config.tokens.secret = Some("integration-test-secret".to_string());
    config
}

pub fn router(config: GateConfig) -> Router {
    GateServer::new(config).unwrap().router()
}

/// A running server bound to an ephemeral port.
pub struct RunningGate {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub handle: JoinHandle<()>,
}

impl RunningGate {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn stop(self) {
        self.shutdown.trigger();
        let _ = self.handle.await;
    }
}

pub async fn spawn_gate(config: GateConfig) -> RunningGate {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = GateServer::new(config).unwrap();
    let shutdown = Shutdown::new();
    let rx = shutdown.subscribe();

    let handle = tokio::spawn(async move {
        server.run(listener, rx).await.unwrap();
    });

    RunningGate {
        addr,
        shutdown,
        handle,
    }
}

pub async fn send(app: &Router, request: Request<Body>) -> Response {
    app.clone().oneshot(request).await.unwrap()
}

pub async fn get(app: &Router, uri: &str) -> Response {
    send(app, Request::get(uri).body(Body::empty()).unwrap()).await
}

pub async fn get_with_token(app: &Router, uri: &str, token: &str, range: Option<&str>) -> Response {
    let mut builder = Request::get(uri).header("x-auth-token", token);
    if let Some(range) = range {
        builder = builder.header(header::RANGE, range);
    }
    send(app, builder.body(Body::empty()).unwrap()).await
}

pub async fn post_json(app: &Router, uri: &str, body: Value) -> Response {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

pub async fn body_bytes(response: Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

pub async fn body_json(response: Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// Issue a token through `POST /auth`.
pub async fn issue_token(app: &Router, resource_id: &str, requester_id: &str) -> String {
    let response = post_json(
        app,
        "/auth",
        json!({ "resourceId": resource_id, "requesterId": requester_id }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await["token"]
        .as_str()
        .unwrap()
        .to_string()
}
