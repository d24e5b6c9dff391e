//! Token subsystem.
//!
//! # Data Flow
//! ```text
//! POST /auth {resourceId, requesterId?}
//!     → authority.rs (issue: sign payload, insert TokenRecord)
//!     → token.rs (payload + HMAC-SHA256 signature)
//!
//! GET /resource/<name> (token in X-Auth-Token or ?token=)
//!     → authority.rs (verify: lookup, expiry check, lazy eviction)
//!
//! Background:
//!     sweeper.rs (fixed interval) → authority.rs (sweep expired records)
//! ```
//!
//! # Design Decisions
//! - Records are process-lifetime and in memory only
//! - Lookups are map-based; the signature matters only at issuance
//! - Expiry is inclusive: a token is accepted at exactly `expires_at`

pub mod authority;
pub mod sweeper;
pub mod token;

pub use authority::{IssuedToken, TokenAuthority, TokenError, TokenRecord};
pub use sweeper::TokenSweeper;
pub use token::{AccessToken, TokenSigner};
