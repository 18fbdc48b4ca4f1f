//! Helpers for trimming data before it enters outcomes or tracing spans.

use std::path::Path;

/// Returns only the filename component of a path (no directory).
///
/// Safe for span fields: reveals the file name without exposing the full path.
pub fn redact_path(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("<unknown>")
        .to_string()
}

/// Keeps the last `limit` characters of tool output.
///
/// Converters print their fatal error last, so the tail is what matters.
/// Cuts on a character boundary and marks the cut with a leading ellipsis.
pub fn truncate_diagnostics(text: &str, limit: usize) -> String {
    let text = text.trim();
    let count = text.chars().count();
    if count <= limit {
        return text.to_string();
    }
    if limit == 0 {
        return String::new();
    }

    let skip = count - (limit - 1);
    let tail: String = text.chars().skip(skip).collect();
    format!("…{}", tail)
}
