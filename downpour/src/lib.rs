//! Downpour - resumable background file downloads.
//!
//! This library provides a small download engine built around two ways of
//! moving a file from a URL to disk:
//!
//! - **Direct downloads** (`task`) - a `DownloadTask` fetches the resource
//!   over HTTP(S) on its own thread, resumes from a partial file using byte
//!   range requests, and reports throttled progress.
//! - **Managed transfers** (`managed`) - a `TransferReconciler` observes a
//!   download owned by an external transfer facility by polling its status
//!   and translating status/reason codes into the same event contract.
//!
//! Both paths deliver events through a single observer contract: zero or
//! more progress updates followed by exactly one of success or failure.
//!
//! # Architecture
//!
//! ```text
//! DownloadTask ──► RangeClient (HTTP) ──► disk
//!      │
//!      └──► DownloadNotifier ──► DownloadObserver (caller)
//!
//! TransferReconciler ──► TransferManager (external facility)
//!      │                        │
//!      └──► DownloadObserver    └──► CompletedStore (ledger)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use downpour::{DownloadRequest, DownloadTask};
//!
//! let request = DownloadRequest::new(
//!     "https://example.com/releases/app.apk",
//!     "/home/user/Downloads",
//! );
//! let task = Arc::new(DownloadTask::new(request, observer));
//! task.start();
//! // ... later, from any thread:
//! task.stop();
//! ```

pub mod config;
pub mod error;
pub mod event;
pub mod http;
pub mod log;
pub mod managed;
pub mod naming;
pub mod registry;
pub mod task;
pub mod upgrade;

pub use config::DownloadConfig;
pub use error::{DownloadError, DownloadResult};
pub use event::{DownloadEvent, DownloadObserver};
pub use http::{HttpRangeClient, RangeClient, RangeResponse};
pub use registry::{TaskId, TaskRegistry};
pub use task::{DownloadRequest, DownloadTarget, DownloadTask};
