//! Token Authority: issues, verifies and expires access tokens.
//!
//! Records live in memory for the lifetime of the process. A token is valid
//! while its record exists and `now <= expires_at`; the signature is only
//! produced at issuance and lookups are map-based.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use thiserror::Error;

use crate::auth::token::{anonymous_requester, log_prefix, AccessToken, TokenSigner};
use crate::observability::metrics;

/// Reasons a token cannot be issued or accepted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("Token not found")]
    NotFound,

    #[error("Token expired")]
    Expired,

    #[error("resourceId is required")]
    MissingResource,
}

impl TokenError {
    /// Stable label for metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            TokenError::NotFound => "not_found",
            TokenError::Expired => "expired",
            TokenError::MissingResource => "missing_resource",
        }
    }
}

/// Server-side bookkeeping for one issued token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRecord {
    pub resource_id: String,
    pub requester_id: String,
    /// Issue time, milliseconds since the Unix epoch.
    pub created_at: u64,
    /// Last valid instant, milliseconds since the Unix epoch.
    pub expires_at: u64,
    pub access_count: u64,
}

/// Result of a successful issuance.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: AccessToken,
    pub expires_at: u64,
    pub requester_id: String,
}

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Mints and validates tokens. Cheap to clone; clones share the record map.
#[derive(Clone, Debug)]
pub struct TokenAuthority {
    signer: TokenSigner,
    ttl: Duration,
    records: Arc<DashMap<String, TokenRecord>>,
}

impl TokenAuthority {
    pub fn new(signer: TokenSigner, ttl: Duration) -> Self {
        Self {
            signer,
            ttl,
            records: Arc::new(DashMap::new()),
        }
    }

    /// Token time-to-live.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a token for `resource_id`, valid for the configured TTL.
    pub fn issue(
        &self,
        resource_id: &str,
        requester_id: Option<&str>,
    ) -> Result<IssuedToken, TokenError> {
        self.issue_at(resource_id, requester_id, now_millis())
    }

    /// Issue a token as if the current time were `now_ms`.
    pub fn issue_at(
        &self,
        resource_id: &str,
        requester_id: Option<&str>,
        now_ms: u64,
    ) -> Result<IssuedToken, TokenError> {
        let resource_id = resource_id.trim();
        if resource_id.is_empty() {
            return Err(TokenError::MissingResource);
        }

        let requester_id = match requester_id.map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => anonymous_requester(),
        };

        let expires_at = now_ms.saturating_add(self.ttl.as_millis() as u64);

        // Identical identity within the same millisecond would mint the same
        // string; nudge the issue time until the token is fresh.
        let mut issued_at = now_ms;
        let token = loop {
            let candidate = self.signer.mint(resource_id, &requester_id, issued_at);
            match self.records.entry(candidate.as_str().to_string()) {
                Entry::Occupied(_) => issued_at += 1,
                Entry::Vacant(slot) => {
                    slot.insert(TokenRecord {
                        resource_id: resource_id.to_string(),
                        requester_id: requester_id.clone(),
                        created_at: now_ms,
                        expires_at,
                        access_count: 0,
                    });
                    break candidate;
                }
            }
        };

        metrics::record_token_issued();
        tracing::info!(
            resource_id = %resource_id,
            requester_id = %requester_id,
            token = %token.log_prefix(),
            expires_at,
            "Token issued"
        );

        Ok(IssuedToken {
            token,
            expires_at,
            requester_id,
        })
    }

    /// Check that `token` exists and has not expired.
    pub fn verify(&self, token: &str) -> Result<TokenRecord, TokenError> {
        self.verify_at(token, now_millis())
    }

    /// Verify as if the current time were `now_ms`. Expired records are evicted.
    pub fn verify_at(&self, token: &str, now_ms: u64) -> Result<TokenRecord, TokenError> {
        let result = match self.records.get(token) {
            None => Err(TokenError::NotFound),
            Some(record) if now_ms <= record.expires_at => Ok(record.value().clone()),
            Some(_) => Err(TokenError::Expired),
        };

        if let Err(reason) = &result {
            if *reason == TokenError::Expired {
                self.records
                    .remove_if(token, |_, record| now_ms > record.expires_at);
            }
            metrics::record_token_rejected(reason.as_label());
            tracing::debug!(token = %log_prefix(token), reason = %reason, "Token rejected");
        }

        result
    }

    /// Bump the access counter of a live token. Returns the new count.
    pub fn record_access(&self, token: &str) -> Option<u64> {
        self.records.get_mut(token).map(|mut record| {
            record.access_count += 1;
            record.access_count
        })
    }

    /// Remove every record whose expiry is in the past. Returns how many went.
    pub fn sweep(&self) -> usize {
        self.sweep_at(now_millis())
    }

    pub fn sweep_at(&self, now_ms: u64) -> usize {
        let mut removed = 0;
        self.records.retain(|_, record| {
            let keep = record.expires_at >= now_ms;
            if !keep {
                removed += 1;
            }
            keep
        });
        removed
    }

    /// Number of live records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
