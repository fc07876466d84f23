//! Filename derivation for the final artifact.
//!
//! Order: `Content-Disposition` (`filename*` over `filename`), then the last
//! path segment of the resolved URL, then a timestamp-derived name. Whatever
//! wins is sanitized for the local filesystem.

mod content_disposition;
mod path;
mod sanitize;

pub use content_disposition::parse_content_disposition_filename;
pub use path::filename_from_url_path;
pub use sanitize::sanitize_filename;

use std::time::{SystemTime, UNIX_EPOCH};

/// Name used when neither the header nor the URL yield anything usable.
pub fn timestamp_filename() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    format!("download-{}", nanos)
}

pub fn derive_filename(url: &str, content_disposition: Option<&str>) -> String {
    let candidate = content_disposition
        .and_then(parse_content_disposition_filename)
        .map(|raw| sanitize_filename(&raw))
        .filter(|s| is_usable(s))
        .or_else(|| {
            filename_from_url_path(url)
                .map(|raw| sanitize_filename(&raw))
                .filter(|s| is_usable(s))
        });
    candidate.unwrap_or_else(timestamp_filename)
}

fn is_usable(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".."
}
