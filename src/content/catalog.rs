//! Resource listing and content typing.

use std::io;
use std::path::Path;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::Serialize;

/// Characters left unescaped in a single path segment.
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'!')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// One servable file in the content root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceEntry {
    pub name: String,
    /// URL path that fetches this resource.
    pub path: String,
    pub size: u64,
}

/// URL path for a resource name.
pub fn resource_url(name: &str) -> String {
    format!("/resource/{}", utf8_percent_encode(name, SEGMENT))
}

/// MIME type for a file, from its extension.
pub fn content_type(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

/// List regular files directly under `root` whose extension is in `extensions`.
pub async fn list_resources(root: &Path, extensions: &[String]) -> io::Result<Vec<ResourceEntry>> {
    let mut entries = Vec::new();
    let mut dir = tokio::fs::read_dir(root).await?;

    while let Some(entry) = dir.next_entry().await? {
        let metadata = entry.metadata().await?;
        if !metadata.is_file() {
            continue;
        }

        let path = entry.path();
        let matches = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| extensions.iter().any(|allowed| allowed.eq_ignore_ascii_case(ext)))
            .unwrap_or(false);
        if !matches {
            continue;
        }

        // Names that are not valid UTF-8 cannot be requested over HTTP anyway.
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };

        entries.push(ResourceEntry {
            path: resource_url(&name),
            size: metadata.len(),
            name,
        });
    }

    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}
