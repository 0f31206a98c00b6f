//! Status and reason taxonomy for externally-managed transfers.
//!
//! The external facility reports opaque numeric status and reason codes.
//! This module is the single exhaustive mapping from those codes to typed
//! reasons and human-readable messages - observers never see a raw code.

use std::fmt;

/// Snapshot of a managed transfer's state at one poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStatus {
    /// Queued, not yet started.
    Pending,
    /// Actively transferring. The total is unknown until the facility has
    /// seen the response headers.
    Running {
        so_far: u64,
        total_bytes: Option<u64>,
    },
    /// Temporarily stopped; the facility will retry by itself.
    Paused(PauseReason),
    /// All bytes are on disk.
    Successful,
    /// The facility gave up.
    Failed(FailureReason),
}

impl TransferStatus {
    /// Whether this status ends the transfer's lifecycle.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Successful | Self::Failed(_))
    }
}

/// Why a managed transfer is paused. Logged only; never terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseReason {
    /// Waiting for an unmetered connection.
    QueuedForWifi,
    /// Waiting for any network connection.
    WaitingForNetwork,
    /// Waiting before retrying after a transient error.
    WaitingToRetry,
    /// Paused for an unreported reason.
    Unknown,
}

impl PauseReason {
    /// Map the facility's pause reason code.
    pub fn from_code(code: u32) -> Self {
        match code {
            1 => Self::WaitingToRetry,
            2 => Self::WaitingForNetwork,
            3 => Self::QueuedForWifi,
            _ => Self::Unknown,
        }
    }

    /// Human-readable description.
    pub fn message(&self) -> &'static str {
        match self {
            Self::QueuedForWifi => "waiting for an unmetered network",
            Self::WaitingForNetwork => "waiting for a network connection",
            Self::WaitingToRetry => "waiting to retry",
            Self::Unknown => "paused",
        }
    }
}

/// Why a managed transfer failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    /// A storage issue prevented saving the file.
    FileError,
    /// The server answered with a code the facility cannot handle.
    UnhandledHttpCode,
    /// An error receiving or processing data.
    HttpDataError,
    /// The redirect chain was too long.
    TooManyRedirects,
    /// Not enough storage space.
    InsufficientSpace,
    /// No external storage device was found.
    DeviceNotFound,
    /// The facility could not resume an interrupted transfer.
    CannotResume,
    /// The destination file already exists.
    FileAlreadyExists,
    /// Anything else.
    Unknown,
}

impl FailureReason {
    /// Map the facility's failure reason code.
    pub fn from_code(code: u32) -> Self {
        match code {
            1001 => Self::FileError,
            1002 => Self::UnhandledHttpCode,
            1004 => Self::HttpDataError,
            1005 => Self::TooManyRedirects,
            1006 => Self::InsufficientSpace,
            1007 => Self::DeviceNotFound,
            1008 => Self::CannotResume,
            1009 => Self::FileAlreadyExists,
            _ => Self::Unknown,
        }
    }

    /// Human-readable description delivered to observers.
    pub fn message(&self) -> &'static str {
        match self {
            Self::FileError => "file error",
            Self::UnhandledHttpCode => "unhandled HTTP code",
            Self::HttpDataError => "data receive or processing error",
            Self::TooManyRedirects => "too many redirects",
            Self::InsufficientSpace => "insufficient storage space",
            Self::DeviceNotFound => "storage device not found",
            Self::CannotResume => "cannot resume download",
            Self::FileAlreadyExists => "file already exists",
            Self::Unknown => "unknown error",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}
