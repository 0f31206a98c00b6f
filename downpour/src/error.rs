//! Error types for the download engine.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::managed::FailureReason;

/// Result type for download operations.
pub type DownloadResult<T> = Result<T, DownloadError>;

/// Errors that can occur while downloading a file.
///
/// All of these are caught at the task/reconciler boundary and converted
/// into a single failure event; none propagate to the caller as panics.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Connection or transport failure.
    #[error("network error: {0}")]
    Network(String),

    /// The request exceeded its timeout.
    #[error("request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// The server rejected the requested byte range (HTTP 416).
    #[error("range exceeds file size")]
    RangeNotSatisfiable,

    /// Any other non-success HTTP status.
    #[error("http error {0}")]
    HttpStatus(u16),

    /// The stream ended before the expected total was reached.
    #[error("size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch { expected: u64, actual: u64 },

    /// Failed to create a directory.
    #[error("failed to create directory {}: {source}", path.display())]
    CreateDir { path: PathBuf, source: io::Error },

    /// Failed to read a file.
    #[error("failed to read {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },

    /// Failed to write a file.
    #[error("failed to write {}: {source}", path.display())]
    Write { path: PathBuf, source: io::Error },

    /// An externally-managed transfer failed with a mapped reason.
    #[error("{0}")]
    Transfer(FailureReason),

    /// A version string could not be parsed.
    #[error("invalid version: {0}")]
    InvalidVersion(String),

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Fallback wrapping any unexpected fault.
    #[error("unknown error: {0}")]
    Unknown(String),
}
