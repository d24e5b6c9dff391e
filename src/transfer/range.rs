//! `Range` request header parsing.
//!
//! Supports a single `bytes=start-end` or `bytes=start-` range. Suffix ranges
//! (`bytes=-N`) and multi-range requests are rejected as malformed.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RangeError {
    #[error("Malformed range header")]
    Malformed,

    #[error("Requested range not satisfiable")]
    Unsatisfiable { total: u64 },
}

/// An inclusive byte window within a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    /// Number of bytes in the window.
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// `Content-Range` header value for this window.
    pub fn content_range(&self, total: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, total)
    }
}

/// Parse a `Range` header value against a resource of `total` bytes.
///
/// An end position past the last byte is clamped to it. A start past the end
/// or at/after `total` is unsatisfiable.
pub fn parse_range(header: &str, total: u64) -> Result<ByteRange, RangeError> {
    let ranges = header
        .trim()
        .strip_prefix("bytes=")
        .ok_or(RangeError::Malformed)?;

    if ranges.contains(',') {
        return Err(RangeError::Malformed);
    }

    let (start, end) = ranges.split_once('-').ok_or(RangeError::Malformed)?;
    let start = parse_position(start)?;
    let end = match end.trim() {
        "" => None,
        value => Some(parse_position(value)?),
    };

    if start >= total {
        return Err(RangeError::Unsatisfiable { total });
    }

    let last = total - 1;
    let end = match end {
        Some(end) if end < start => return Err(RangeError::Unsatisfiable { total }),
        Some(end) => end.min(last),
        None => last,
    };

    Ok(ByteRange { start, end })
}

fn parse_position(value: &str) -> Result<u64, RangeError> {
    let value = value.trim();
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(RangeError::Malformed);
    }
    value.parse().map_err(|_| RangeError::Malformed)
}
