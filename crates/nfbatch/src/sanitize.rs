//! Helpers for sanitizing data before it enters tracing span attributes or logs.
//!
//! Batch directories live under user home folders and invoice text carries
//! taxpayer identifiers, so spans only get file names and short excerpts.

use std::path::Path;

const LOG_EXCERPT_CHARS: usize = 200;

/// Returns only the filename component of a path (no directory).
pub fn redact_path(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("<unknown>")
        .to_string()
}

/// Truncates a service response body for logging, on a char boundary.
pub fn truncate_for_log(body: &str) -> String {
    let trimmed = body.trim();
    match trimmed.char_indices().nth(LOG_EXCERPT_CHARS) {
        Some((idx, _)) => format!("{}... ({} bytes total)", &trimmed[..idx], trimmed.len()),
        None => trimmed.to_string(),
    }
}
