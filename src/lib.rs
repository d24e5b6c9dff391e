//! Media Gate Library
//!
//! Token-gated, range-seekable delivery of files from one content root.

// Core subsystems
pub mod auth;
pub mod config;
pub mod content;
pub mod http;
pub mod sessions;
pub mod transfer;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
pub mod security;

pub use config::GateConfig;
pub use http::GateServer;
pub use lifecycle::Shutdown;
