//! Range Transfer Engine.
//!
//! # Responsibilities
//! - Size the resource and compute the serving window
//! - Emit 200 (whole resource) or 206 (window) with correct framing headers
//! - Stream the bytes while holding the session slot
//! - Release the slot exactly once: on EOF, on I/O error, or when the body is
//!   dropped early because the client went away

use std::io::{self, SeekFrom};
use std::path::Path;
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use futures_util::Stream;
use thiserror::Error;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;

use crate::content::content_type;
use crate::observability::metrics;
use crate::sessions::SessionGuard;
use crate::transfer::range::{parse_range, ByteRange, RangeError};

/// Read buffer size for file streaming.
const CHUNK_SIZE: usize = 64 * 1024;

#[derive(Debug, Error)]
pub enum TransferError {
    #[error(transparent)]
    Range(#[from] RangeError),

    #[error("Resource not found")]
    NotFound,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Lifecycle of one transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferState {
    /// Response built, body not yet polled.
    Pending,
    Streaming,
    Completed,
    Aborted,
}

impl TransferState {
    pub fn is_terminal(self) -> bool {
        matches!(self, TransferState::Completed | TransferState::Aborted)
    }
}

/// Response body that owns the session slot for the duration of the transfer.
pub struct TransferStream<S> {
    inner: S,
    guard: Option<SessionGuard>,
    state: TransferState,
    expected: u64,
    sent: u64,
}

impl<S> TransferStream<S> {
    pub fn new(inner: S, guard: SessionGuard, expected: u64) -> Self {
        Self {
            inner,
            guard: Some(guard),
            state: TransferState::Pending,
            expected,
            sent: 0,
        }
    }

    pub fn state(&self) -> TransferState {
        self.state
    }

    /// Bytes yielded so far.
    pub fn sent(&self) -> u64 {
        self.sent
    }

    fn finish(&mut self, outcome: TransferState) {
        self.state = outcome;
        let Some(guard) = self.guard.take() else {
            return;
        };

        match outcome {
            TransferState::Completed => {
                metrics::record_transfer("completed", self.sent);
                tracing::info!(
                    session_id = %guard.id(),
                    resource = %guard.record().resource,
                    bytes = self.sent,
                    "Stream completed"
                );
            }
            _ => {
                metrics::record_transfer("aborted", self.sent);
            }
        }
        drop(guard);
    }
}

impl<S> Stream for TransferStream<S>
where
    S: Stream<Item = io::Result<Bytes>> + Unpin,
{
    type Item = io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        match this.state {
            TransferState::Completed | TransferState::Aborted => return Poll::Ready(None),
            TransferState::Pending => this.state = TransferState::Streaming,
            TransferState::Streaming => {}
        }

        match Pin::new(&mut this.inner).poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                this.sent += chunk.len() as u64;
                // hyper stops polling once Content-Length bytes are out, so the
                // trailing `None` may never be requested.
                if this.sent >= this.expected {
                    this.finish(TransferState::Completed);
                }
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(Some(Err(err))) => {
                if let Some(guard) = &this.guard {
                    tracing::error!(
                        session_id = %guard.id(),
                        error = %err,
                        sent = this.sent,
                        "Stream error"
                    );
                }
                this.finish(TransferState::Aborted);
                Poll::Ready(Some(Err(err)))
            }
            Poll::Ready(None) if this.sent < this.expected => {
                // The file shrank underneath us; the declared length cannot be honoured.
                let err = io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("resource ended after {} of {} bytes", this.sent, this.expected),
                );
                if let Some(guard) = &this.guard {
                    tracing::error!(session_id = %guard.id(), error = %err, "Stream error");
                }
                this.finish(TransferState::Aborted);
                Poll::Ready(Some(Err(err)))
            }
            Poll::Ready(None) => {
                this.finish(TransferState::Completed);
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<S> Drop for TransferStream<S> {
    fn drop(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        if self.sent >= self.expected {
            self.finish(TransferState::Completed);
            return;
        }
        if let Some(guard) = &self.guard {
            tracing::debug!(
                session_id = %guard.id(),
                sent = self.sent,
                "Client disconnected"
            );
        }
        self.finish(TransferState::Aborted);
    }
}

/// Serve `path`, honouring an optional `Range` header.
///
/// `guard` is moved into the response body. If anything fails before the body
/// exists, the guard drops here and the slot is released immediately.
pub async fn serve(
    path: &Path,
    range_header: Option<&HeaderValue>,
    guard: SessionGuard,
) -> Result<Response, TransferError> {
    let mut file = File::open(path).await.map_err(|err| match err.kind() {
        io::ErrorKind::NotFound => TransferError::NotFound,
        _ => TransferError::Io(err),
    })?;
    let total = file.metadata().await?.len();

    let range = match range_header {
        None => None,
        Some(value) => {
            let value = value.to_str().map_err(|_| RangeError::Malformed)?;
            Some(parse_range(value, total)?)
        }
    };

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&content_type(path))
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    insert_no_cache(&mut headers);

    let (status, window) = match range {
        Some(range) => {
            file.seek(SeekFrom::Start(range.start)).await?;
            headers.insert(
                header::CONTENT_RANGE,
                HeaderValue::from_str(&range.content_range(total))
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?,
            );
            (StatusCode::PARTIAL_CONTENT, Some(range))
        }
        None => (StatusCode::OK, full_window(total)),
    };

    let length = window.map_or(0, |w| w.len());
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));

    tracing::info!(
        session_id = %guard.id(),
        resource = %guard.record().resource,
        requester_id = %guard.record().requester_id,
        status = status.as_u16(),
        window = ?window,
        total,
        "Streaming"
    );

    let stream = ReaderStream::with_capacity(file.take(length), CHUNK_SIZE);
    let body = Body::from_stream(TransferStream::new(stream, guard, length));

    Ok((status, headers, body).into_response())
}

/// Window covering the whole resource, or `None` for an empty one.
fn full_window(total: u64) -> Option<ByteRange> {
    (total > 0).then(|| ByteRange {
        start: 0,
        end: total - 1,
    })
}

/// Headers that keep token-scoped bytes out of every cache.
pub fn insert_no_cache(headers: &mut HeaderMap) {
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-cache, no-store, must-revalidate"),
    );
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(header::EXPIRES, HeaderValue::from_static("0"));
}
