//! Transfer subsystem.
//!
//! # Data Flow
//! ```text
//! located path + SessionGuard + Range header
//!     → engine.rs (open, size the file)
//!     → range.rs (parse window against size)
//!     → engine.rs (200/206 headers, TransferStream body owning the guard)
//!     → hyper polls the body until EOF, error, or disconnect
//! ```
//!
//! # Design Decisions
//! - The session slot is released by the body, not by the handler
//! - A window is validated before any header is written
//! - Out-of-range requests are errors, never silently reinterpreted

pub mod engine;
pub mod range;

pub use engine::{insert_no_cache, serve, TransferError, TransferState, TransferStream};
pub use range::{parse_range, ByteRange, RangeError};
