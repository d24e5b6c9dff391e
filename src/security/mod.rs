//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → cors.rs (preflight answered here, origin checked)
//!     → [handlers: token check, path confinement]
//!     → headers.rs (nosniff on the way out)
//! ```
//!
//! # Design Decisions
//! - Authorization and path confinement live with their subsystems (auth/, content/)
//! - Fail closed: reject on any security check failure
//! - No trust in client input

pub mod cors;
pub mod headers;

pub use cors::{answer_options, cors_layer, X_AUTH_TOKEN};
pub use headers::nosniff;
