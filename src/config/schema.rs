//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gate.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Root configuration for the media gate.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GateConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Content root and listing settings.
    pub content: ContentConfig,

    /// Token issuance and expiry.
    pub tokens: TokenConfig,

    /// Concurrent transfer ceiling.
    pub streams: StreamConfig,

    /// Cross-origin settings.
    pub cors: CorsConfig,

    /// Debug endpoints.
    pub debug: DebugConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3000").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
        }
    }
}

/// Content root configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ContentConfig {
    /// Directory every served resource must live under.
    pub root: PathBuf,

    /// File extensions reported by the resource listing (without the dot).
    pub extensions: Vec<String>,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./audio"),
            extensions: vec!["mp3".into(), "wav".into(), "m4a".into()],
        }
    }
}

/// Token configuration.
#[derive(Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TokenConfig {
    /// Token time-to-live in seconds.
    pub ttl_secs: u64,

    /// Interval between expired-token sweeps in seconds.
    pub sweep_interval_secs: u64,

    /// HMAC secret. Generated at startup when absent.
    #[serde(skip_serializing)]
    pub secret: Option<String>,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 60 * 60,
            sweep_interval_secs: 5 * 60,
            secret: None,
        }
    }
}

impl fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenConfig")
            .field("ttl_secs", &self.ttl_secs)
            .field("sweep_interval_secs", &self.sweep_interval_secs)
            .field("secret", &self.secret.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Stream concurrency configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Maximum simultaneous in-flight transfers.
    pub max_concurrent: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self { max_concurrent: 50 }
    }
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Allowed origins. `*` mirrors whatever origin the request carries.
    pub allowed_origins: Vec<String>,

    /// Preflight cache lifetime in seconds.
    pub max_age_secs: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["*".to_string()],
            max_age_secs: 24 * 60 * 60,
        }
    }
}

/// Debug endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DebugConfig {
    /// Expose `/config` and `/streams`.
    pub enabled: bool,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
