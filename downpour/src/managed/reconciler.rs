//! Polling reconciliation of an externally-managed transfer.
//!
//! [`TransferReconciler`] observes one transfer by id: a repeating task on
//! a shared tokio runtime queries the facility at a short fixed interval,
//! translates each status snapshot into observer events, and stops on the
//! first terminal status. The polling never blocks longer than one status
//! query; the facility owns the actual byte transfer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::error::DownloadError;
use crate::event::DownloadObserver;

use super::status::TransferStatus;
use super::store::CompletedStore;
use super::transfer::{TransferId, TransferManager, TransferRequest};

/// How often the reconciler queries the facility.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Observes a transfer owned by an external facility and converts its
/// status into the download event contract.
///
/// `start()` short-circuits to success when the ledger already records a
/// completed file that still exists - the session-level counterpart of
/// byte-range resumption inside a single transfer.
pub struct TransferReconciler<M: TransferManager + 'static> {
    manager: Arc<M>,
    store: Arc<CompletedStore>,
    observer: Arc<dyn DownloadObserver>,
    request: TransferRequest,
    poll_interval: Duration,
    active: Arc<AtomicBool>,
    cancel: Mutex<Option<CancellationToken>>,
    current_id: Mutex<Option<TransferId>>,
}

impl<M: TransferManager + 'static> TransferReconciler<M> {
    /// Create a reconciler for one transfer request.
    pub fn new(
        manager: Arc<M>,
        store: Arc<CompletedStore>,
        observer: Arc<dyn DownloadObserver>,
        request: TransferRequest,
    ) -> Self {
        Self {
            manager,
            store,
            observer,
            request,
            poll_interval: DEFAULT_POLL_INTERVAL,
            active: Arc::new(AtomicBool::new(false)),
            cancel: Mutex::new(None),
            current_id: Mutex::new(None),
        }
    }

    /// Set the poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Whether a poll loop is currently active.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Enqueue the transfer (unless already completed) and start polling.
    ///
    /// A no-op while a poll loop is already active.
    pub fn start(&self, runtime: &Handle) {
        if self
            .active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!(url = %self.request.url, "reconciler already active, ignoring start");
            return;
        }

        // Session-level short-circuit: trust the recorded path when the
        // file still exists. Existence is the only check made.
        if let Some(path) = self.store.get(&self.request.url) {
            if path.exists() {
                info!(path = %path.display(), "already downloaded, skipping enqueue");
                self.active.store(false, Ordering::SeqCst);
                self.observer.on_success(&path);
                return;
            }
        }

        // Drop any stale transfer left over from a previous run.
        if let Some(stale) = self.current_id.lock().take() {
            debug!(%stale, "removing stale transfer before re-enqueue");
            self.manager.remove(stale).ok();
        }

        let id = match self.manager.enqueue(&self.request) {
            Ok(id) => id,
            Err(err) => {
                self.active.store(false, Ordering::SeqCst);
                warn!(error = %err, "failed to enqueue transfer");
                self.observer.on_error(Some(&err.to_string()));
                return;
            }
        };
        *self.current_id.lock() = Some(id);
        info!(%id, url = %self.request.url, "transfer enqueued, polling for status");

        let token = CancellationToken::new();
        *self.cancel.lock() = Some(token.clone());

        runtime.spawn(poll_loop(
            Arc::clone(&self.manager),
            Arc::clone(&self.store),
            Arc::clone(&self.observer),
            self.request.url.clone(),
            id,
            self.poll_interval,
            token,
            Arc::clone(&self.active),
        ));
    }

    /// Halt the polling loop and forget the observation.
    ///
    /// Does not cancel the underlying transfer - the facility keeps
    /// running it.
    pub fn stop(&self) {
        if let Some(token) = self.cancel.lock().take() {
            token.cancel();
        }
        self.active.store(false, Ordering::SeqCst);
    }
}

/// Query the facility until a terminal status or cancellation.
#[allow(clippy::too_many_arguments)]
async fn poll_loop<M: TransferManager>(
    manager: Arc<M>,
    store: Arc<CompletedStore>,
    observer: Arc<dyn DownloadObserver>,
    key: String,
    id: TransferId,
    interval: Duration,
    token: CancellationToken,
    active: Arc<AtomicBool>,
) {
    loop {
        if token.is_cancelled() {
            break;
        }

        match manager.query(id) {
            Ok(Some(status)) => {
                if handle_status(&manager, &store, observer.as_ref(), &key, id, status, &active) {
                    break;
                }
            }
            Ok(None) => {
                debug!(%id, "transfer no longer known to the facility");
            }
            Err(err) => {
                warn!(%id, error = %err, "status query failed");
            }
        }

        tokio::select! {
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }
}

/// Convert one status snapshot into events. Returns true on terminal.
fn handle_status<M: TransferManager>(
    manager: &Arc<M>,
    store: &Arc<CompletedStore>,
    observer: &dyn DownloadObserver,
    key: &str,
    id: TransferId,
    status: TransferStatus,
    active: &AtomicBool,
) -> bool {
    match status {
        TransferStatus::Pending => {
            trace!(%id, "transfer pending");
            false
        }
        TransferStatus::Running { so_far, total_bytes } => {
            // The total is unknown until the facility has response headers;
            // no progress is reported before then.
            if let Some(total) = total_bytes {
                observer.on_progress(total, so_far);
            }
            false
        }
        TransferStatus::Paused(reason) => {
            debug!(%id, reason = reason.message(), "transfer paused");
            false
        }
        TransferStatus::Successful => {
            match manager.resolve_completed(id) {
                Ok(completed) => {
                    if let Err(err) = store.put(key, &completed.file_path) {
                        warn!(error = %err, "failed to persist completed transfer");
                    }
                    info!(
                        %id,
                        path = %completed.file_path.display(),
                        content_type = completed.content_type.as_deref().unwrap_or("unknown"),
                        "transfer completed"
                    );
                    active.store(false, Ordering::SeqCst);
                    observer.on_success(&completed.file_path);
                }
                Err(err) => {
                    warn!(%id, error = %err, "failed to resolve completed transfer");
                    active.store(false, Ordering::SeqCst);
                    observer.on_error(Some(&err.to_string()));
                }
            }
            true
        }
        TransferStatus::Failed(reason) => {
            let message = DownloadError::Transfer(reason).to_string();
            warn!(%id, %message, "transfer failed");
            active.store(false, Ordering::SeqCst);
            observer.on_error(Some(&message));
            true
        }
    }
}
