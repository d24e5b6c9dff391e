//! Router-level tests of the HTTP surface.

mod common;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use common::*;
use serde_json::json;

const LECTURE: &str = "lecture.mp3";

fn lecture_root() -> tempfile::TempDir {
    content_root(&[(LECTURE, 2000), ("notes.txt", 10), ("week 2/intro.mp3", 300)])
}

#[tokio::test]
async fn health_reports_status_and_streams() {
    let dir = lecture_root();
    let app = router(test_config(dir.path()));

    let response = get(&app, "/health").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["activeStreams"], 0);
    assert!(body["timestamp"].as_u64().unwrap() > 0);
    assert!(body["uptime"].as_f64().is_some());
}

#[tokio::test]
async fn auth_issues_token_with_expiry() {
    let dir = lecture_root();
    let app = router(test_config(dir.path()));

    let response = post_json(&app, "/auth", json!({ "resourceId": "class-1", "requesterId": "alice" })).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert!(body["token"].as_str().unwrap().contains('.'));
    assert!(body["expiresAt"].as_u64().unwrap() > 0);
    assert_eq!(body["requesterId"], "alice");
    assert_eq!(body["message"], "Authentication successful");
}

#[tokio::test]
async fn auth_accepts_legacy_field_names_and_defaults_requester() {
    let dir = lecture_root();
    let app = router(test_config(dir.path()));

    let body = body_json(post_json(&app, "/auth", json!({ "classId": "class-1" })).await).await;
    assert!(body["requesterId"].as_str().unwrap().starts_with("anonymous-"));
}

#[tokio::test]
async fn auth_rejects_bad_bodies() {
    let dir = lecture_root();
    let app = router(test_config(dir.path()));

    let response = post_json(&app, "/auth", json!({ "requesterId": "alice" })).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "resourceId is required");

    let response = post_json(&app, "/auth", json!({ "resourceId": "   " })).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let request = Request::post("/auth")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = send(&app, request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "Invalid request body");
}

#[tokio::test]
async fn auth_requires_post() {
    let dir = lecture_root();
    let app = router(test_config(dir.path()));

    let response = get(&app, "/auth").await;
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(body_json(response).await["error"], "Method not allowed");
}

#[tokio::test]
async fn resource_without_token_is_unauthorized() {
    let dir = lecture_root();
    let app = router(test_config(dir.path()));

    let response = get(&app, "/resource/lecture.mp3").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"], "Authentication token required");
}

#[tokio::test]
async fn unknown_token_is_unauthorized() {
    let dir = lecture_root();
    let app = router(test_config(dir.path()));

    let response = get_with_token(&app, "/resource/lecture.mp3", "Zm9v.deadbeef", None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"], "Token not found");
}

#[tokio::test]
async fn full_transfer_sets_framing_and_cache_headers() {
    let dir = lecture_root();
    let app = router(test_config(dir.path()));
    let token = issue_token(&app, "class-1", "alice").await;

    let response = get_with_token(&app, "/resource/lecture.mp3", &token, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers[header::CONTENT_LENGTH], "2000");
    assert_eq!(headers[header::CONTENT_TYPE], "audio/mpeg");
    assert_eq!(headers[header::ACCEPT_RANGES], "bytes");
    assert_eq!(headers[header::CACHE_CONTROL], "no-cache, no-store, must-revalidate");
    assert_eq!(headers[header::PRAGMA], "no-cache");
    assert_eq!(headers[header::EXPIRES], "0");
    assert_eq!(headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff");

    assert_eq!(body_bytes(response).await, pattern(2000));
}

#[tokio::test]
async fn token_in_query_is_accepted() {
    let dir = lecture_root();
    let app = router(test_config(dir.path()));
    let token = issue_token(&app, "class-1", "alice").await;

    let response = get(&app, &format!("/resource/lecture.mp3?token={token}")).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn unparseable_query_is_a_missing_token() {
    let dir = lecture_root();
    let app = router(test_config(dir.path()));
    let token = issue_token(&app, "class-1", "alice").await;

    let uri = format!("/resource/lecture.mp3?token={token}&token=other");
    let response = get(&app, &uri).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"], "Authentication token required");

    // The header still works alongside a query that does not parse.
    let response = get_with_token(&app, &uri, &token, None).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn header_token_wins_over_query() {
    let dir = lecture_root();
    let app = router(test_config(dir.path()));
    let token = issue_token(&app, "class-1", "alice").await;

    let uri = format!("/resource/lecture.mp3?token={token}");
    let response = get_with_token(&app, &uri, "Zm9v.bogus", None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn percent_encoded_names_resolve() {
    let dir = lecture_root();
    let app = router(test_config(dir.path()));
    let token = issue_token(&app, "class-1", "alice").await;

    let response = get_with_token(&app, "/resource/week%202/intro.mp3", &token, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await.len(), 300);
}

#[tokio::test]
async fn partial_transfer_for_closed_range() {
    let dir = lecture_root();
    let app = router(test_config(dir.path()));
    let token = issue_token(&app, "class-1", "alice").await;

    let response = get_with_token(&app, "/resource/lecture.mp3", &token, Some("bytes=0-99")).await;
    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(response.headers()[header::CONTENT_RANGE], "bytes 0-99/2000");
    assert_eq!(response.headers()[header::CONTENT_LENGTH], "100");
    assert_eq!(body_bytes(response).await, pattern(100));
}

#[tokio::test]
async fn range_errors_map_to_client_errors() {
    let dir = lecture_root();
    let app = router(test_config(dir.path()));
    let token = issue_token(&app, "class-1", "alice").await;

    let response = get_with_token(&app, "/resource/lecture.mp3", &token, Some("bytes=2000-")).await;
    assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
    assert_eq!(response.headers()[header::CONTENT_RANGE], "bytes */2000");

    let response = get_with_token(&app, "/resource/lecture.mp3", &token, Some("bytes=900-100")).await;
    assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);

    let response = get_with_token(&app, "/resource/lecture.mp3", &token, Some("bytes=-100")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Rejected ranges never hold a slot.
    let body = body_json(get(&app, "/health").await).await;
    assert_eq!(body["activeStreams"], 0);
}

#[tokio::test]
async fn traversal_is_forbidden() {
    let dir = lecture_root();
    let app = router(test_config(dir.path()));
    let token = issue_token(&app, "class-1", "alice").await;

    for uri in [
        "/resource/../secret.txt",
        "/resource/..%2f..%2fetc%2fpasswd",
        "/resource/%2e%2e/%2e%2e/etc/passwd",
        "/resource/week%202/..%2f..%2fsecret",
        "/resource/..%5c..%5cwindows",
    ] {
        let response = get_with_token(&app, uri, &token, None).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "{uri}");
        let body = body_json(response).await;
        assert_eq!(body["error"], "Access denied");
        assert!(!body.to_string().contains(dir.path().to_str().unwrap()));
    }
}

#[tokio::test]
async fn missing_resource_is_not_found() {
    let dir = lecture_root();
    let app = router(test_config(dir.path()));
    let token = issue_token(&app, "class-1", "alice").await;

    let response = get_with_token(&app, "/resource/absent.mp3", &token, None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error"], "Resource not found");

    // Directories are not servable files.
    let response = get_with_token(&app, "/resource/week%202", &token, None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn capacity_ceiling_rejects_then_recovers() {
    let dir = lecture_root();
    let mut config = test_config(dir.path());
    config.streams.max_concurrent = 1;
    let app = router(config);
    let token = issue_token(&app, "class-1", "alice").await;

    // An unread body keeps its slot.
    let held = get_with_token(&app, "/resource/lecture.mp3", &token, None).await;
    assert_eq!(held.status(), StatusCode::OK);

    let rejected = get_with_token(&app, "/resource/lecture.mp3", &token, None).await;
    assert_eq!(rejected.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(rejected.headers()[header::RETRY_AFTER], "1");
    assert_eq!(body_json(rejected).await["error"], "Too many concurrent streams");

    drop(held);

    let response = get_with_token(&app, "/resource/lecture.mp3", &token, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await.len(), 2000);
}

#[tokio::test]
async fn streams_endpoint_lists_live_sessions_without_paths() {
    let dir = lecture_root();
    let app = router(test_config(dir.path()));
    let token = issue_token(&app, "class-1", "alice").await;

    let held = get_with_token(&app, "/resource/lecture.mp3", &token, Some("bytes=0-9")).await;
    assert_eq!(held.status(), StatusCode::PARTIAL_CONTENT);

    let body = body_json(get(&app, "/streams").await).await;
    assert_eq!(body["count"], 1);
    assert_eq!(body["max"], 50);
    let stream = &body["streams"][0];
    assert_eq!(stream["resourceId"], "class-1");
    assert_eq!(stream["requesterId"], "alice");
    assert_eq!(stream["resource"], LECTURE);
    assert!(stream["sessionId"].is_string());
    assert!(!body.to_string().contains(dir.path().to_str().unwrap()));

    let _ = body_bytes(held).await;
    let body = body_json(get(&app, "/streams").await).await;
    assert_eq!(body["count"], 0);
}

#[tokio::test]
async fn config_lists_servable_resources() {
    let dir = lecture_root();
    let app = router(test_config(dir.path()));
    let _ = issue_token(&app, "class-1", "alice").await;

    let response = get(&app, "/config").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;

    let resources = body["resources"].as_array().unwrap();
    assert_eq!(resources.len(), 1);
    assert_eq!(resources[0]["name"], LECTURE);
    assert_eq!(resources[0]["path"], "/resource/lecture.mp3");
    assert_eq!(resources[0]["size"], 2000);

    assert_eq!(body["serverInfo"]["authorizedTokens"], 1);
    assert_eq!(body["serverInfo"]["activeStreams"], 0);
}

#[tokio::test]
async fn debug_endpoints_hidden_when_disabled() {
    let dir = lecture_root();
    let mut config = test_config(dir.path());
    config.debug.enabled = false;
    let app = router(config);

    assert_eq!(get(&app, "/config").await.status(), StatusCode::NOT_FOUND);
    assert_eq!(get(&app, "/streams").await.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_route_is_json_not_found() {
    let dir = lecture_root();
    let app = router(test_config(dir.path()));

    let response = get(&app, "/audio/lecture.mp3").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error"], "Not found");
}

#[tokio::test]
async fn cors_preflight_succeeds_without_body() {
    let dir = lecture_root();
    let app = router(test_config(dir.path()));

    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/resource/lecture.mp3")
        .header(header::ORIGIN, "https://player.example")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "x-auth-token")
        .body(Body::empty())
        .unwrap();
    let response = send(&app, request).await;

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(
        headers[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "https://player.example"
    );
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
    assert_eq!(headers[header::ACCESS_CONTROL_MAX_AGE], "86400");
    let allowed = headers[header::ACCESS_CONTROL_ALLOW_HEADERS]
        .to_str()
        .unwrap()
        .to_ascii_lowercase();
    assert!(allowed.contains("x-auth-token"));
    assert!(body_bytes(response).await.is_empty());
}

#[tokio::test]
async fn bare_options_returns_empty_ok() {
    let dir = lecture_root();
    let app = router(test_config(dir.path()));

    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/auth")
        .body(Body::empty())
        .unwrap();
    let response = send(&app, request).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_bytes(response).await.is_empty());
}

#[tokio::test]
async fn allow_listed_origins_only() {
    let dir = lecture_root();
    let mut config = test_config(dir.path());
    config.cors.allowed_origins = vec!["https://school.example".to_string()];
    let app = router(config);

    let request = Request::get("/health")
        .header(header::ORIGIN, "https://school.example")
        .body(Body::empty())
        .unwrap();
    let response = send(&app, request).await;
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "https://school.example"
    );

    let request = Request::get("/health")
        .header(header::ORIGIN, "https://elsewhere.example")
        .body(Body::empty())
        .unwrap();
    let response = send(&app, request).await;
    assert!(response
        .headers()
        .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        .is_none());
}

#[tokio::test]
async fn request_id_is_generated_and_echoed() {
    let dir = lecture_root();
    let app = router(test_config(dir.path()));

    let response = get(&app, "/health").await;
    let generated = response.headers()["x-request-id"].to_str().unwrap();
    assert_eq!(generated.len(), 36);

    let request = Request::get("/health")
        .header("x-request-id", "abc-123")
        .body(Body::empty())
        .unwrap();
    let response = send(&app, request).await;
    assert_eq!(response.headers()["x-request-id"], "abc-123");
}

#[tokio::test]
async fn each_server_owns_its_tokens() {
    let dir = lecture_root();
    let first = router(test_config(dir.path()));
    let second = router(test_config(dir.path()));

    let token = issue_token(&first, "class-1", "alice").await;
    let response = get_with_token(&second, "/resource/lecture.mp3", &token, None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
