//! The external transfer facility interface.

use std::fmt;
use std::path::PathBuf;

use crate::error::DownloadResult;

use super::status::TransferStatus;

/// Identifier assigned by the external facility when a transfer is enqueued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransferId(pub i64);

impl fmt::Display for TransferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Parameters for enqueuing a transfer with the external facility.
#[derive(Debug, Clone)]
pub struct TransferRequest {
    /// Source URL.
    pub url: String,
    /// Destination directory or file path.
    pub destination: PathBuf,
    /// Explicit file name; derived from the URL by the facility when absent.
    pub file_name: Option<String>,
    /// Expected content type of the completed file.
    pub mime_type: Option<String>,
}

impl TransferRequest {
    /// Create a request for the given URL and destination.
    pub fn new(url: impl Into<String>, destination: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            destination: destination.into(),
            file_name: None,
            mime_type: None,
        }
    }

    /// Set an explicit file name.
    pub fn with_file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = Some(name.into());
        self
    }

    /// Set the expected content type.
    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }
}

/// A completed transfer resolved to a concrete file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedTransfer {
    /// Absolute path of the downloaded file.
    pub file_path: PathBuf,
    /// Content type reported by the facility, when known.
    pub content_type: Option<String>,
}

/// An external download facility that owns transfer execution.
///
/// The engine never drives the bytes itself on this path; it only enqueues
/// work, polls for status snapshots, and resolves completed transfers to
/// usable file paths. Implementations wrap whatever the host platform
/// provides.
pub trait TransferManager: Send + Sync {
    /// Hand a transfer to the facility. Returns its id.
    fn enqueue(&self, request: &TransferRequest) -> DownloadResult<TransferId>;

    /// Fetch a fresh status snapshot. `None` when the facility no longer
    /// knows the id.
    fn query(&self, id: TransferId) -> DownloadResult<Option<TransferStatus>>;

    /// Resolve a successful transfer to its file path and content type.
    fn resolve_completed(&self, id: TransferId) -> DownloadResult<CompletedTransfer>;

    /// Remove a transfer (and any partial file) from the facility.
    fn remove(&self, id: TransferId) -> DownloadResult<()>;
}
