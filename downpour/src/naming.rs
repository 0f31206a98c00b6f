//! Centralized file naming for downloads.
//!
//! This module is the single source of truth for turning a URL and a
//! destination into a concrete file path:
//! - File names are derived from the URL's last path segment.
//! - A configured default extension is forced when the name lacks it.
//! - A destination whose last segment has no extension is treated as a
//!   directory and the derived name is appended.
//!
//! All other modules should use these functions rather than constructing
//! paths directly.

use std::path::{Path, PathBuf};

/// Fallback name for URLs with no usable path segment.
pub const DEFAULT_FILE_NAME: &str = "download.bin";

/// Derive a file name from the URL's last path segment.
///
/// Query and fragment parts are stripped first. URLs that end in a slash
/// (or have no path at all) fall back to [`DEFAULT_FILE_NAME`].
///
/// # Examples
///
/// ```
/// use downpour::naming::file_name_from_url;
///
/// assert_eq!(file_name_from_url("http://x/y/app.apk"), "app.apk");
/// assert_eq!(file_name_from_url("http://x/y/app.apk?token=abc"), "app.apk");
/// assert_eq!(file_name_from_url("http://x/y/"), "download.bin");
/// ```
pub fn file_name_from_url(url: &str) -> String {
    let without_fragment = url.split('#').next().unwrap_or(url);
    let without_query = without_fragment.split('?').next().unwrap_or(without_fragment);
    let candidate = without_query.rsplit('/').next().unwrap_or("");

    if candidate.is_empty() {
        DEFAULT_FILE_NAME.to_string()
    } else {
        candidate.to_string()
    }
}

/// Force a default extension onto a file name that lacks it.
///
/// The extension is given without a leading dot. A name that already ends
/// in `.{extension}` is returned unchanged.
pub fn ensure_extension(name: &str, extension: Option<&str>) -> String {
    match extension {
        Some(ext) if !name.ends_with(&format!(".{}", ext)) => format!("{}.{}", name, ext),
        _ => name.to_string(),
    }
}

/// Resolve the concrete file path for a download destination.
///
/// A destination that exists as a directory, or whose last segment carries
/// no extension, is treated as a directory: the file name derived from the
/// URL (with the default extension forced) is appended. Anything else is
/// used as the file path as-is.
pub fn resolve_destination(dest: &Path, url: &str, default_extension: Option<&str>) -> PathBuf {
    let looks_like_file = dest
        .file_name()
        .map(|name| name.to_string_lossy().contains('.'))
        .unwrap_or(false);

    if dest.is_dir() || !looks_like_file {
        let name = ensure_extension(&file_name_from_url(url), default_extension);
        dest.join(name)
    } else {
        dest.to_path_buf()
    }
}
