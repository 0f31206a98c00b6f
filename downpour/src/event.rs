//! Event delivery between a download's execution context and its observer.
//!
//! A running download produces a stream of [`DownloadEvent`]s: zero or more
//! progress updates followed by exactly one terminal event (success or
//! failure). The [`DownloadNotifier`] carries that stream across the thread
//! boundary to a [`DownloadObserver`] on a dedicated dispatch thread,
//! preserving emission order.
//!
//! Guarantees:
//!
//! - Events are delivered in the order they were emitted.
//! - No progress event is delivered after a terminal event.
//! - At most one terminal event is delivered per task run.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// How often the dispatch thread checks for shutdown while idle.
const DISPATCH_TICK: Duration = Duration::from_millis(50);

/// A single event in a download's observable lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadEvent {
    /// Bytes transferred so far, against the expected total.
    Progress { total_bytes: u64, current_bytes: u64 },
    /// The transfer completed and the file is on disk.
    Success { file_path: PathBuf },
    /// The transfer failed; carries a human-readable message when known.
    Failed { message: Option<String> },
}

impl DownloadEvent {
    /// Whether this event ends the task's observable lifecycle.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success { .. } | Self::Failed { .. })
    }
}

/// Listener contract consumed by the hosting layer.
pub trait DownloadObserver: Send + Sync {
    /// Called with the expected total and the bytes transferred so far.
    fn on_progress(&self, total_bytes: u64, current_bytes: u64);

    /// Called exactly once when the file has been fully downloaded.
    fn on_success(&self, file_path: &Path);

    /// Called exactly once when the download failed.
    fn on_error(&self, message: Option<&str>);
}

/// Producer side of the notifier, cloned into the download thread.
#[derive(Clone)]
pub struct NotifierHandle {
    tx: Sender<DownloadEvent>,
    terminal_sent: Arc<AtomicBool>,
}

impl NotifierHandle {
    /// Emit a progress event. Ignored once a terminal event was emitted.
    pub fn progress(&self, total_bytes: u64, current_bytes: u64) {
        if self.terminal_sent.load(Ordering::SeqCst) {
            return;
        }
        let _ = self.tx.send(DownloadEvent::Progress {
            total_bytes,
            current_bytes,
        });
    }

    /// Emit the success event. Only the first terminal event wins.
    pub fn success(&self, file_path: PathBuf) {
        if self.terminal_sent.swap(true, Ordering::SeqCst) {
            return;
        }
        let _ = self.tx.send(DownloadEvent::Success { file_path });
    }

    /// Emit the failure event. Only the first terminal event wins.
    pub fn failed(&self, message: Option<String>) {
        if self.terminal_sent.swap(true, Ordering::SeqCst) {
            return;
        }
        let _ = self.tx.send(DownloadEvent::Failed { message });
    }
}

/// Delivers download events to an observer on a dedicated dispatch thread.
///
/// Dropping the notifier drains any queued events and joins the dispatch
/// thread. The thread also exits by itself as soon as it has forwarded a
/// terminal event.
pub struct DownloadNotifier {
    tx: Sender<DownloadEvent>,
    terminal_sent: Arc<AtomicBool>,
    closed: Arc<AtomicBool>,
    dispatcher: Option<JoinHandle<()>>,
}

impl DownloadNotifier {
    /// Start a notifier delivering events to the given observer.
    pub fn start(observer: Arc<dyn DownloadObserver>) -> Self {
        let (tx, rx) = mpsc::channel::<DownloadEvent>();
        let closed = Arc::new(AtomicBool::new(false));
        let closed_flag = Arc::clone(&closed);

        let dispatcher = thread::spawn(move || loop {
            match rx.recv_timeout(DISPATCH_TICK) {
                Ok(event) => {
                    let terminal = event.is_terminal();
                    match event {
                        DownloadEvent::Progress {
                            total_bytes,
                            current_bytes,
                        } => observer.on_progress(total_bytes, current_bytes),
                        DownloadEvent::Success { file_path } => observer.on_success(&file_path),
                        DownloadEvent::Failed { message } => observer.on_error(message.as_deref()),
                    }
                    if terminal {
                        break;
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    if closed_flag.load(Ordering::SeqCst) {
                        break;
                    }
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        });

        Self {
            tx,
            terminal_sent: Arc::new(AtomicBool::new(false)),
            closed,
            dispatcher: Some(dispatcher),
        }
    }

    /// Get a producer handle for the download thread.
    pub fn handle(&self) -> NotifierHandle {
        NotifierHandle {
            tx: self.tx.clone(),
            terminal_sent: Arc::clone(&self.terminal_sent),
        }
    }
}

impl Drop for DownloadNotifier {
    fn drop(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
        if let Some(handle) = self.dispatcher.take() {
            handle.join().ok();
        }
    }
}
