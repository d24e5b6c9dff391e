//! Content subsystem.
//!
//! # Data Flow
//! ```text
//! requested name (raw URL segment)
//!     → resolver.rs (decode, normalize, confine to root)
//!     → resolver.rs locate (exists? regular file? symlink stays inside?)
//!     → absolute path handed to the transfer engine
//!
//! GET /config
//!     → catalog.rs (list root, filter by extension)
//! ```

pub mod catalog;
pub mod resolver;

pub use catalog::{content_type, list_resources, resource_url, ResourceEntry};
pub use resolver::{ResolveError, ResourceResolver};
