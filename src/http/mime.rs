//! MIME type detection based on file extensions.

use std::path::Path;

const DEFAULT_MIME: &str = "application/octet-stream";

/// Returns the MIME type for a file name, falling back to
/// `application/octet-stream` for unknown extensions.
///
/// ```
/// # use vhostd::http::mime::from_path;
/// assert_eq!(from_path("site/app.CSS"), "text/css");
/// assert_eq!(from_path("blob"), "application/octet-stream");
/// ```
pub fn from_path(path: impl AsRef<Path>) -> &'static str {
    let ext = path
        .as_ref()
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some("html") | Some("htm") => "text/html; charset=utf-8",
        Some("css") => "text/css",
        Some("js") | Some("mjs") => "text/javascript",
        Some("json") => "application/json",
        Some("xml") => "application/xml",
        Some("txt") => "text/plain; charset=utf-8",
        Some("csv") => "text/csv",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("ico") => "image/x-icon",
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        Some("pdf") => "application/pdf",
        Some("wasm") => "application/wasm",
        Some("zip") => "application/zip",
        _ => DEFAULT_MIME,
    }
}

/// Whether content of this type is worth gzip-compressing.
pub fn is_compressible(mime: &str) -> bool {
    mime.starts_with("text/")
        || mime.starts_with("application/json")
        || mime.starts_with("application/xml")
        || mime.starts_with("application/javascript")
        || mime.starts_with("image/svg+xml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_extensions() {
        assert_eq!(from_path("index.html"), "text/html; charset=utf-8");
        assert_eq!(from_path("a/b/logo.png"), "image/png");
        assert_eq!(from_path("data.JSON"), "application/json");
    }

    #[test]
    fn compressible_types() {
        assert!(is_compressible("text/css"));
        assert!(is_compressible("image/svg+xml"));
        assert!(!is_compressible("image/png"));
    }
}
