//! Route handlers.
//!
//! `GET /resource/<name>` checks run in a fixed order so the cheapest and
//! least revealing rejections come first: token, path confinement, existence,
//! capacity, then range.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::{header, HeaderMap, Uri},
    response::Response,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::auth::authority::now_millis;
use crate::auth::token::log_prefix;
use crate::content::{list_resources, ResolveError, ResourceEntry};
use crate::http::error::ApiError;
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::security::X_AUTH_TOKEN;
use crate::sessions::{NewSession, SessionSnapshot};
use crate::transfer;

const RESOURCE_PREFIX: &str = "/resource/";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
    pub active_streams: usize,
    /// Seconds since the server started.
    pub uptime: f64,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        timestamp: now_millis(),
        active_streams: state.sessions.active_count(),
        uptime: state.uptime_secs(),
    })
}

/// `POST /auth` body. The `classId`/`studentId` spellings are still accepted.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthRequest {
    #[serde(default, alias = "classId")]
    pub resource_id: Option<String>,
    #[serde(default, alias = "studentId")]
    pub requester_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub token: String,
    pub expires_at: u64,
    pub requester_id: String,
    pub message: &'static str,
}

pub async fn auth(
    State(state): State<AppState>,
    payload: Result<Json<AuthRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>, ApiError> {
    let Json(request) = payload.map_err(|rejection| {
        tracing::debug!(error = %rejection.body_text(), "Rejected auth body");
        ApiError::BadRequest("Invalid request body".to_string())
    })?;

    let resource_id = request.resource_id.unwrap_or_default();
    let issued = state
        .authority
        .issue(&resource_id, request.requester_id.as_deref())?;

    Ok(Json(AuthResponse {
        token: issued.token.into_string(),
        expires_at: issued.expires_at,
        requester_id: issued.requester_id,
        message: "Authentication successful",
    }))
}

#[derive(Debug, Default, Deserialize)]
pub struct TokenQuery {
    pub token: Option<String>,
}

/// The header wins over the query parameter; empty values count as absent.
fn extract_token<'a>(headers: &'a HeaderMap, query: Option<&'a str>) -> Option<&'a str> {
    headers
        .get(&X_AUTH_TOKEN)
        .and_then(|v| v.to_str().ok())
        .filter(|t| !t.is_empty())
        .or(query.filter(|t| !t.is_empty()))
}

pub async fn resource(
    State(state): State<AppState>,
    query: Result<Query<TokenQuery>, QueryRejection>,
    uri: Uri,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    // An unparseable query carries no usable token; the header may still.
    let query_token = query.ok().and_then(|Query(q)| q.token);
    let token = extract_token(&headers, query_token.as_deref()).ok_or(ApiError::MissingToken)?;
    let record = state.authority.verify(token)?;

    // Raw, still percent-encoded: the resolver does the one and only decode.
    let requested = uri.path().strip_prefix(RESOURCE_PREFIX).unwrap_or_default();

    let path = match state.resolver.locate(requested).await {
        Ok(path) => path,
        Err(ResolveError::Denied) => {
            metrics::record_access_denied();
            tracing::warn!(
                requested = %requested,
                requester_id = %record.requester_id,
                token = %log_prefix(token),
                "Access denied: potential probing attempt"
            );
            return Err(ApiError::AccessDenied);
        }
        Err(err) => return Err(err.into()),
    };

    let relative = path
        .strip_prefix(state.resolver.root())
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_default();

    let guard = state
        .sessions
        .try_acquire(NewSession {
            resource_id: record.resource_id.clone(),
            requester_id: record.requester_id.clone(),
            resource: relative,
            resource_path: path.clone(),
        })
        .map_err(|err| {
            tracing::warn!(
                requester_id = %record.requester_id,
                limit = err.limit,
                "Stream rejected at capacity"
            );
            ApiError::from(err)
        })?;

    state.authority.record_access(token);

    Ok(transfer::serve(&path, headers.get(header::RANGE), guard).await?)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerInfo {
    pub uptime: f64,
    pub active_streams: usize,
    pub authorized_tokens: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigResponse {
    pub resources: Vec<ResourceEntry>,
    pub server_info: ServerInfo,
}

/// `GET /config`: servable files plus server counters. Debug only.
pub async fn config_listing(State(state): State<AppState>) -> Result<Json<ConfigResponse>, ApiError> {
    if !state.config.debug.enabled {
        return Err(ApiError::UnknownRoute);
    }

    let resources = list_resources(state.resolver.root(), &state.config.content.extensions)
        .await
        .map_err(|e| ApiError::Internal(format!("listing content root: {e}")))?;

    Ok(Json(ConfigResponse {
        resources,
        server_info: ServerInfo {
            uptime: state.uptime_secs(),
            active_streams: state.sessions.active_count(),
            authorized_tokens: state.authority.len(),
        },
    }))
}

/// `GET /streams`: live sessions. Debug only.
pub async fn streams(State(state): State<AppState>) -> Result<Json<SessionSnapshot>, ApiError> {
    if !state.config.debug.enabled {
        return Err(ApiError::UnknownRoute);
    }
    Ok(Json(state.sessions.snapshot()))
}

pub async fn not_found() -> ApiError {
    ApiError::UnknownRoute
}

pub async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}
