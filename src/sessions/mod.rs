//! Session subsystem.
//!
//! A session is one in-progress transfer. It is created after the token is
//! verified and the resource resolved, and it lives inside the response body
//! until the transfer completes, fails, or the client goes away.

pub mod tracker;

pub use tracker::{
    CapacityExceeded, NewSession, SessionGuard, SessionRecord, SessionSnapshot, SessionTracker,
};
