//! Safe mapping of requested names onto the content root.
//!
//! # Responsibilities
//! - Percent-decode the requested name
//! - Normalize `.` / `..` segments lexically
//! - Fail closed on anything that would leave the root
//! - Reject symlinks whose target lies outside the root (`locate`)

use std::io;
use std::path::{Component, Path, PathBuf};

use percent_encoding::percent_decode_str;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// The name escapes the root or cannot be decoded.
    #[error("Access denied")]
    Denied,

    /// The name is confined to the root but no regular file exists there.
    #[error("Resource not found")]
    NotFound,
}

/// Maps resource names to absolute paths confined to one directory.
#[derive(Debug, Clone)]
pub struct ResourceResolver {
    root: PathBuf,
}

impl ResourceResolver {
    /// Create a resolver for `root`. The directory must exist.
    pub fn new(root: impl AsRef<Path>) -> io::Result<Self> {
        let root = std::fs::canonicalize(root.as_ref())?;
        if !root.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "content root is not a directory",
            ));
        }
        Ok(Self { root })
    }

    /// The canonical content root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Lexically resolve `requested` (possibly percent-encoded) under the root.
    ///
    /// Existence is not checked; see [`ResourceResolver::locate`].
    pub fn resolve(&self, requested: &str) -> Result<PathBuf, ResolveError> {
        let decoded = percent_decode_str(requested)
            .decode_utf8()
            .map_err(|_| ResolveError::Denied)?;

        if decoded.contains('\0') {
            return Err(ResolveError::Denied);
        }

        let mut segments: Vec<&str> = Vec::new();
        for segment in decoded.split(['/', '\\']) {
            match segment {
                "" | "." => {}
                ".." => {
                    if segments.pop().is_none() {
                        return Err(ResolveError::Denied);
                    }
                }
                other => segments.push(other),
            }
        }

        let mut path = self.root.clone();
        for segment in segments {
            path.push(segment);
        }

        if !is_confined(&path, &self.root) {
            return Err(ResolveError::Denied);
        }
        Ok(path)
    }

    /// Resolve and confirm a regular file exists at the result.
    ///
    /// Symlinks are followed; a link pointing outside the root is denied.
    pub async fn locate(&self, requested: &str) -> Result<PathBuf, ResolveError> {
        let path = self.resolve(requested)?;

        let canonical = match tokio::fs::canonicalize(&path).await {
            Ok(p) => p,
            Err(_) => return Err(ResolveError::NotFound),
        };
        if !canonical.starts_with(&self.root) {
            return Err(ResolveError::Denied);
        }

        match tokio::fs::metadata(&canonical).await {
            Ok(meta) if meta.is_file() => Ok(canonical),
            _ => Err(ResolveError::NotFound),
        }
    }
}

fn is_confined(path: &Path, root: &Path) -> bool {
    path.starts_with(root)
        && path
            .strip_prefix(root)
            .map(|rest| rest.components().all(|c| matches!(c, Component::Normal(_))))
            .unwrap_or(false)
}
