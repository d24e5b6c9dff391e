//! Mapping of subsystem errors onto HTTP responses.
//!
//! Every error body is `{"error": "<message>"}`. Internal detail (I/O errors,
//! paths) is logged and replaced with a generic message.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::auth::TokenError;
use crate::content::ResolveError;
use crate::sessions::CapacityExceeded;
use crate::transfer::{RangeError, TransferError};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Authentication token required")]
    MissingToken,

    #[error("{0}")]
    TokenInvalid(TokenError),

    #[error("Access denied")]
    AccessDenied,

    #[error("Resource not found")]
    NotFound,

    #[error("Not found")]
    UnknownRoute,

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("Too many concurrent streams")]
    CapacityExceeded,

    #[error("Malformed range header")]
    MalformedRange,

    #[error("Requested range not satisfiable")]
    RangeNotSatisfiable { total: u64 },

    #[error("{0}")]
    BadRequest(String),

    #[error("Internal server error")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingToken | ApiError::TokenInvalid(_) => StatusCode::UNAUTHORIZED,
            ApiError::AccessDenied => StatusCode::FORBIDDEN,
            ApiError::NotFound | ApiError::UnknownRoute => StatusCode::NOT_FOUND,
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::CapacityExceeded => StatusCode::TOO_MANY_REQUESTS,
            ApiError::MalformedRange | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::RangeNotSatisfiable { .. } => StatusCode::RANGE_NOT_SATISFIABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if let ApiError::Internal(detail) = &self {
            tracing::error!(error = %detail, "Request failed");
        }

        let mut response = (status, Json(json!({ "error": self.to_string() }))).into_response();
        let headers = response.headers_mut();
        match self {
            ApiError::CapacityExceeded => {
                headers.insert(header::RETRY_AFTER, HeaderValue::from_static("1"));
            }
            ApiError::RangeNotSatisfiable { total } => {
                if let Ok(value) = HeaderValue::from_str(&format!("bytes */{total}")) {
                    headers.insert(header::CONTENT_RANGE, value);
                }
            }
            _ => {}
        }
        response
    }
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::MissingResource => ApiError::BadRequest(err.to_string()),
            TokenError::NotFound | TokenError::Expired => ApiError::TokenInvalid(err),
        }
    }
}

impl From<ResolveError> for ApiError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::Denied => ApiError::AccessDenied,
            ResolveError::NotFound => ApiError::NotFound,
        }
    }
}

impl From<CapacityExceeded> for ApiError {
    fn from(_: CapacityExceeded) -> Self {
        ApiError::CapacityExceeded
    }
}

impl From<TransferError> for ApiError {
    fn from(err: TransferError) -> Self {
        match err {
            TransferError::Range(RangeError::Malformed) => ApiError::MalformedRange,
            TransferError::Range(RangeError::Unsatisfiable { total }) => {
                ApiError::RangeNotSatisfiable { total }
            }
            TransferError::NotFound => ApiError::NotFound,
            TransferError::Io(e) => ApiError::Internal(e.to_string()),
        }
    }
}
