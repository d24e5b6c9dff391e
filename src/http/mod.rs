//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware stack)
//!     → request.rs (request ID, span)
//!     → handlers.rs (auth, resource, health, debug listings)
//!         → auth / content / sessions / transfer
//!     → error.rs (subsystem errors → status + JSON body)
//!     → Send to client
//! ```

pub mod error;
pub mod handlers;
pub mod request;
pub mod server;

pub use error::ApiError;
pub use request::X_REQUEST_ID;
pub use server::{AppState, GateServer, StartupError};
