//! Concurrent transfer accounting.
//!
//! # Responsibilities
//! - Enforce the `max_concurrent` ceiling on in-flight transfers
//! - Hand out RAII guards that release their slot exactly once
//! - Expose a read-only snapshot for health/debug reporting

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::auth::authority::now_millis;
use crate::observability::metrics;

/// One in-flight transfer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub session_id: Uuid,
    pub resource_id: String,
    pub requester_id: String,
    /// Root-relative resource name as requested.
    pub resource: String,
    /// Absolute path on disk. Never serialized.
    #[serde(skip)]
    pub resource_path: PathBuf,
    /// Start time, milliseconds since the Unix epoch.
    pub started_at: u64,
}

/// What a caller knows about a transfer before it is admitted.
#[derive(Debug, Clone)]
pub struct NewSession {
    pub resource_id: String,
    pub requester_id: String,
    pub resource: String,
    pub resource_path: PathBuf,
}

/// Returned when the ceiling is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Too many concurrent streams (limit {limit})")]
pub struct CapacityExceeded {
    pub limit: usize,
}

/// Point-in-time view of the tracker.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub count: usize,
    pub max: usize,
    pub streams: Vec<SessionRecord>,
}

#[derive(Debug)]
struct TrackerInner {
    max_concurrent: usize,
    sessions: Mutex<HashMap<Uuid, SessionRecord>>,
}

/// Tracks live transfers. Cheap to clone; clones share state.
#[derive(Debug, Clone)]
pub struct SessionTracker {
    inner: Arc<TrackerInner>,
}

impl SessionTracker {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            inner: Arc::new(TrackerInner {
                max_concurrent,
                sessions: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Configured ceiling.
    pub fn max_concurrent(&self) -> usize {
        self.inner.max_concurrent
    }

    /// Admit a transfer if below the ceiling.
    ///
    /// The count check and the insert happen under one lock, so concurrent
    /// callers can never push the live count past the ceiling.
    pub fn try_acquire(&self, session: NewSession) -> Result<SessionGuard, CapacityExceeded> {
        let mut sessions = self.inner.sessions.lock().expect("session tracker mutex poisoned");

        if sessions.len() >= self.inner.max_concurrent {
            metrics::record_capacity_rejection();
            return Err(CapacityExceeded {
                limit: self.inner.max_concurrent,
            });
        }

        let record = SessionRecord {
            session_id: Uuid::new_v4(),
            resource_id: session.resource_id,
            requester_id: session.requester_id,
            resource: session.resource,
            resource_path: session.resource_path,
            started_at: now_millis(),
        };
        sessions.insert(record.session_id, record.clone());
        metrics::set_active_streams(sessions.len());
        drop(sessions);

        tracing::debug!(
            session_id = %record.session_id,
            resource = %record.resource,
            requester_id = %record.requester_id,
            "Session acquired"
        );

        Ok(SessionGuard {
            tracker: self.clone(),
            record,
        })
    }

    /// Remove a session. Returns whether it was still live; repeat calls are no-ops.
    pub fn release(&self, session_id: Uuid) -> bool {
        let mut sessions = self.inner.sessions.lock().expect("session tracker mutex poisoned");
        let removed = sessions.remove(&session_id).is_some();
        if removed {
            metrics::set_active_streams(sessions.len());
        }
        removed
    }

    /// Number of live sessions.
    pub fn active_count(&self) -> usize {
        self.inner
            .sessions
            .lock()
            .expect("session tracker mutex poisoned")
            .len()
    }

    /// Copy of the live sessions, oldest first.
    pub fn snapshot(&self) -> SessionSnapshot {
        let sessions = self.inner.sessions.lock().expect("session tracker mutex poisoned");
        let mut streams: Vec<SessionRecord> = sessions.values().cloned().collect();
        drop(sessions);

        streams.sort_by_key(|s| s.started_at);
        SessionSnapshot {
            count: streams.len(),
            max: self.inner.max_concurrent,
            streams,
        }
    }
}

/// Holds one slot in the tracker. The slot is released when the guard drops.
#[derive(Debug)]
pub struct SessionGuard {
    tracker: SessionTracker,
    record: SessionRecord,
}

impl SessionGuard {
    pub fn id(&self) -> Uuid {
        self.record.session_id
    }

    pub fn record(&self) -> &SessionRecord {
        &self.record
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if self.tracker.release(self.record.session_id) {
            tracing::debug!(session_id = %self.record.session_id, "Session released");
        }
    }
}
