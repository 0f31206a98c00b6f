//! Resumable single-file download task.
//!
//! [`DownloadTask`] orchestrates one download attempt on its own thread:
//! it computes the resume offset from the destination file's current size,
//! issues a ranged GET, streams the body to disk in fixed-size chunks, and
//! reports throttled progress followed by exactly one terminal event.
//!
//! # Lifecycle
//!
//! ```text
//! Idle ──start()──► Running ──► Succeeded | Failed
//!                      │
//!                   stop() ──► Idle   (no terminal event)
//! ```
//!
//! `start()` is idempotent while a run is active. `stop()` is cooperative:
//! the streaming loop observes the flag at chunk boundaries and exits
//! without emitting a terminal event, leaving the partial file in place for
//! the next resume.

use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::error::{DownloadError, DownloadResult};
use crate::event::{DownloadNotifier, DownloadObserver, NotifierHandle};
use crate::http::{HttpRangeClient, RangeClient};
use crate::naming;

/// Size of one read chunk in bytes.
const CHUNK_SIZE: usize = 1024;

/// Default connect timeout for one attempt.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default read timeout for one attempt.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(20);

/// Everything needed to perform one download.
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    /// Source URL.
    pub url: String,
    /// Destination directory, or a full file path.
    pub destination: PathBuf,
    /// Explicit file name; derived from the URL when absent.
    pub file_name: Option<String>,
    /// Extension forced onto the derived name when it lacks one.
    pub default_extension: Option<String>,
    /// Connect timeout for this attempt.
    pub connect_timeout: Duration,
    /// Read timeout for this attempt.
    pub read_timeout: Duration,
}

impl DownloadRequest {
    /// Create a request with default timeouts.
    pub fn new(url: impl Into<String>, destination: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            destination: destination.into(),
            file_name: None,
            default_extension: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }

    /// Set an explicit file name instead of deriving one from the URL.
    pub fn with_file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = Some(name.into());
        self
    }

    /// Force this extension when the file name lacks it.
    pub fn with_default_extension(mut self, extension: impl Into<String>) -> Self {
        self.default_extension = Some(extension.into());
        self
    }

    /// Set the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the read timeout.
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }
}

/// The resolved destination of a running task.
///
/// `already_written` is always the on-disk file size at task start - it is
/// re-read on every run, never cached from a previous one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTarget {
    /// Concrete file path being written.
    pub file: PathBuf,
    /// Resume offset in bytes.
    pub already_written: u64,
}

/// Outcome of one streaming run, before event conversion.
enum RunOutcome {
    /// EOF reached and the size check passed.
    Completed(PathBuf),
    /// The cancellation flag was observed; no terminal event is due.
    Cancelled,
}

/// Integer-percent throttle for progress events.
///
/// Emits only when the integer percent changes, bounding event volume to at
/// most 101 per transfer. The sentinel below zero guarantees the first real
/// percent always reports.
struct PercentGate {
    last_reported: i64,
}

impl PercentGate {
    fn new() -> Self {
        Self { last_reported: -1 }
    }

    /// Returns true when this (current, total) pair should be reported.
    fn update(&mut self, current_bytes: u64, total_bytes: u64) -> bool {
        if total_bytes == 0 {
            return false;
        }
        let percent = (current_bytes * 100 / total_bytes) as i64;
        if percent != self.last_reported {
            self.last_reported = percent;
            true
        } else {
            false
        }
    }
}

/// A single resumable download with cooperative cancellation.
///
/// The task exclusively owns its destination file for the duration of one
/// run; the caller must not start two tasks for the same path concurrently.
pub struct DownloadTask<C: RangeClient = HttpRangeClient> {
    request: DownloadRequest,
    client: Arc<C>,
    observer: Arc<dyn DownloadObserver>,
    running: Arc<AtomicBool>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl DownloadTask<HttpRangeClient> {
    /// Create a task using the HTTP client with the request's timeouts.
    pub fn new(request: DownloadRequest, observer: Arc<dyn DownloadObserver>) -> Self {
        let client = HttpRangeClient::new(request.connect_timeout, request.read_timeout);
        Self::with_client(request, Arc::new(client), observer)
    }
}

impl<C: RangeClient + 'static> DownloadTask<C> {
    /// Create a task with a custom client implementation.
    pub fn with_client(
        request: DownloadRequest,
        client: Arc<C>,
        observer: Arc<dyn DownloadObserver>,
    ) -> Self {
        Self {
            request,
            client,
            observer,
            running: Arc::new(AtomicBool::new(false)),
            worker: Mutex::new(None),
        }
    }

    /// Start the download on a dedicated thread.
    ///
    /// A no-op while a run is already active - no second connection is
    /// opened and no duplicate event stream is produced.
    pub fn start(&self) {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!(url = %self.request.url, "download already running, ignoring start");
            return;
        }

        let request = self.request.clone();
        let client = Arc::clone(&self.client);
        let observer = Arc::clone(&self.observer);
        let running = Arc::clone(&self.running);

        let worker = thread::spawn(move || {
            let notifier = DownloadNotifier::start(observer);
            let events = notifier.handle();
            run_transfer(&request, client.as_ref(), &events, &running);
            // Dropping the notifier drains queued events to the observer.
        });

        *self.worker.lock() = Some(worker);
    }

    /// Request cancellation.
    ///
    /// Cooperative: a read already in flight completes first. Safe to call
    /// repeatedly and when not running. Emits no event by itself.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Whether a run is currently active.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Block until the current run's thread has finished.
    pub fn join(&self) {
        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            handle.join().ok();
        }
    }
}

/// Run one transfer and convert its result into events.
fn run_transfer<C: RangeClient>(
    request: &DownloadRequest,
    client: &C,
    events: &NotifierHandle,
    running: &AtomicBool,
) {
    match execute(request, client, events, running) {
        Ok(RunOutcome::Completed(file_path)) => {
            running.store(false, Ordering::SeqCst);
            info!(path = %file_path.display(), "download complete");
            events.success(file_path);
        }
        Ok(RunOutcome::Cancelled) => {
            debug!(url = %request.url, "download cancelled");
        }
        Err(err) => {
            running.store(false, Ordering::SeqCst);
            debug!(url = %request.url, error = %err, "download failed");
            events.failed(Some(err.to_string()));
        }
    }
}

/// One download attempt: resolve the target, request the range, stream.
fn execute<C: RangeClient>(
    request: &DownloadRequest,
    client: &C,
    events: &NotifierHandle,
    running: &AtomicBool,
) -> DownloadResult<RunOutcome> {
    let target = resolve_target(request)?;
    debug!(
        path = %target.file.display(),
        offset = target.already_written,
        "starting transfer"
    );

    let response = client.get(&request.url, target.already_written)?;
    match response.status {
        200 | 206 => {}
        416 => return Err(DownloadError::RangeNotSatisfiable),
        status => return Err(DownloadError::HttpStatus(status)),
    }

    // Expected final size = existing bytes + the ranged response's length.
    // A server that omits content-length leaves the total unknown, which
    // suppresses both progress percent and the completion size check.
    let expected_total = response
        .content_length
        .map(|remaining| target.already_written + remaining);

    stream_to_file(response.body, &target, expected_total, events, running)
}

/// Resolve the destination file and read the resume offset.
fn resolve_target(request: &DownloadRequest) -> DownloadResult<DownloadTarget> {
    let extension = request.default_extension.as_deref();
    let file = match &request.file_name {
        Some(name) => request
            .destination
            .join(naming::ensure_extension(name, extension)),
        None => naming::resolve_destination(&request.destination, &request.url, extension),
    };

    if let Some(parent) = file.parent() {
        fs::create_dir_all(parent).map_err(|e| DownloadError::CreateDir {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }

    let already_written = fs::metadata(&file).map(|m| m.len()).unwrap_or(0);

    Ok(DownloadTarget {
        file,
        already_written,
    })
}

/// Stream the body to the destination file in append mode.
///
/// The cancellation flag is checked before and immediately after each read,
/// so a stop() request halts without writing a chunk read after the flag
/// was cleared.
fn stream_to_file(
    mut body: Box<dyn Read + Send>,
    target: &DownloadTarget,
    expected_total: Option<u64>,
    events: &NotifierHandle,
    running: &AtomicBool,
) -> DownloadResult<RunOutcome> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&target.file)
        .map_err(|e| DownloadError::Write {
            path: target.file.clone(),
            source: e,
        })?;
    let mut writer = BufWriter::new(file);
    let mut buffer = [0u8; CHUNK_SIZE];
    let mut file_size = target.already_written;
    let mut percents = PercentGate::new();

    loop {
        if !running.load(Ordering::SeqCst) {
            return Ok(RunOutcome::Cancelled);
        }
        let bytes_read = body
            .read(&mut buffer)
            .map_err(|e| DownloadError::Network(e.to_string()))?;
        if !running.load(Ordering::SeqCst) {
            return Ok(RunOutcome::Cancelled);
        }
        if bytes_read == 0 {
            break;
        }

        writer
            .write_all(&buffer[..bytes_read])
            .map_err(|e| DownloadError::Write {
                path: target.file.clone(),
                source: e,
            })?;
        file_size += bytes_read as u64;

        if let Some(total) = expected_total {
            if percents.update(file_size, total) {
                events.progress(total, file_size);
            }
        }
    }

    writer.flush().map_err(|e| DownloadError::Write {
        path: target.file.clone(),
        source: e,
    })?;

    // Guards against silently-truncated transfers: EOF before the expected
    // total is a failure even though the stream ended without error.
    match expected_total {
        Some(total) if file_size != total => Err(DownloadError::SizeMismatch {
            expected: total,
            actual: file_size,
        }),
        _ => Ok(RunOutcome::Completed(target.file.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::RangeResponse;
    use std::io::Cursor;
    use std::sync::Mutex as StdMutex;
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq)]
    enum Recorded {
        Progress(u64, u64),
        Success(PathBuf),
        Error(Option<String>),
    }

    #[derive(Default)]
    struct RecordingObserver {
        events: StdMutex<Vec<Recorded>>,
    }

    impl RecordingObserver {
        fn events(&self) -> Vec<Recorded> {
            self.events.lock().unwrap().clone()
        }

        fn terminal(&self) -> Option<Recorded> {
            self.events()
                .into_iter()
                .find(|e| matches!(e, Recorded::Success(_) | Recorded::Error(_)))
        }
    }

    impl DownloadObserver for RecordingObserver {
        fn on_progress(&self, total_bytes: u64, current_bytes: u64) {
            self.events
                .lock()
                .unwrap()
                .push(Recorded::Progress(total_bytes, current_bytes));
        }

        fn on_success(&self, file_path: &Path) {
            self.events
                .lock()
                .unwrap()
                .push(Recorded::Success(file_path.to_path_buf()));
        }

        fn on_error(&self, message: Option<&str>) {
            self.events
                .lock()
                .unwrap()
                .push(Recorded::Error(message.map(str::to_string)));
        }
    }

    struct ScriptedClient {
        status: u16,
        content_length: Option<u64>,
        payload: Vec<u8>,
        offsets: StdMutex<Vec<u64>>,
    }

    impl ScriptedClient {
        fn new(status: u16, content_length: Option<u64>, payload: Vec<u8>) -> Self {
            Self {
                status,
                content_length,
                payload,
                offsets: StdMutex::new(Vec::new()),
            }
        }
    }

    impl RangeClient for ScriptedClient {
        fn get(&self, _url: &str, offset: u64) -> DownloadResult<RangeResponse> {
            self.offsets.lock().unwrap().push(offset);
            Ok(RangeResponse {
                status: self.status,
                content_length: self.content_length,
                body: Box::new(Cursor::new(self.payload.clone())),
            })
        }
    }

    fn run_to_completion(task: &DownloadTask<ScriptedClient>) {
        task.start();
        task.join();
    }

    #[test]
    fn test_percent_gate_first_report_always_fires() {
        let mut gate = PercentGate::new();
        assert!(gate.update(0, 1000));
        assert!(!gate.update(5, 1000));
    }

    #[test]
    fn test_percent_gate_reports_only_integer_changes() {
        let mut gate = PercentGate::new();
        let mut reports = 0;
        for current in 0..=10_000u64 {
            if gate.update(current, 10_000) {
                reports += 1;
            }
        }
        assert_eq!(reports, 101);
    }

    #[test]
    fn test_percent_gate_unknown_total_suppressed() {
        let mut gate = PercentGate::new();
        assert!(!gate.update(100, 0));
    }

    #[test]
    fn test_full_download_success() {
        let temp = TempDir::new().unwrap();
        let payload = vec![7u8; 1000];
        let client = Arc::new(ScriptedClient::new(200, Some(1000), payload));
        let observer = Arc::new(RecordingObserver::default());
        let request = DownloadRequest::new("http://x/y/app.apk", temp.path());
        let task = DownloadTask::with_client(request, Arc::clone(&client), observer.clone());

        run_to_completion(&task);

        let expected = temp.path().join("app.apk");
        assert_eq!(observer.terminal(), Some(Recorded::Success(expected.clone())));
        assert_eq!(fs::metadata(&expected).unwrap().len(), 1000);
        assert_eq!(*client.offsets.lock().unwrap(), vec![0]);
        assert!(!task.is_running());
    }

    #[test]
    fn test_resume_requests_existing_offset() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("app.apk");
        fs::write(&file, vec![1u8; 400]).unwrap();

        let client = Arc::new(ScriptedClient::new(206, Some(600), vec![2u8; 600]));
        let observer = Arc::new(RecordingObserver::default());
        let request = DownloadRequest::new("http://x/y/app.apk", temp.path());
        let task = DownloadTask::with_client(request, Arc::clone(&client), observer.clone());

        run_to_completion(&task);

        assert_eq!(*client.offsets.lock().unwrap(), vec![400]);
        assert_eq!(fs::metadata(&file).unwrap().len(), 1000);
        assert_eq!(observer.terminal(), Some(Recorded::Success(file)));
    }

    #[test]
    fn test_range_not_satisfiable_fails() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("app.apk"), vec![0u8; 5000]).unwrap();

        let client = Arc::new(ScriptedClient::new(416, None, Vec::new()));
        let observer = Arc::new(RecordingObserver::default());
        let request = DownloadRequest::new("http://x/y/app.apk", temp.path());
        let task = DownloadTask::with_client(request, client, observer.clone());

        run_to_completion(&task);

        match observer.terminal() {
            Some(Recorded::Error(Some(message))) => assert!(message.contains("range")),
            other => panic!("expected range failure, got {:?}", other),
        }
    }

    #[test]
    fn test_http_error_status_fails() {
        let temp = TempDir::new().unwrap();
        let client = Arc::new(ScriptedClient::new(503, None, Vec::new()));
        let observer = Arc::new(RecordingObserver::default());
        let request = DownloadRequest::new("http://x/y/app.apk", temp.path());
        let task = DownloadTask::with_client(request, client, observer.clone());

        run_to_completion(&task);

        match observer.terminal() {
            Some(Recorded::Error(Some(message))) => assert!(message.contains("503")),
            other => panic!("expected http failure, got {:?}", other),
        }
    }

    #[test]
    fn test_truncated_stream_reports_size_mismatch() {
        let temp = TempDir::new().unwrap();
        // Server promises 1000 bytes but closes the stream after 900.
        let client = Arc::new(ScriptedClient::new(200, Some(1000), vec![9u8; 900]));
        let observer = Arc::new(RecordingObserver::default());
        let request = DownloadRequest::new("http://x/y/app.apk", temp.path());
        let task = DownloadTask::with_client(request, client, observer.clone());

        run_to_completion(&task);

        match observer.terminal() {
            Some(Recorded::Error(Some(message))) => assert!(message.contains("size mismatch")),
            other => panic!("expected size mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_content_length_suppresses_progress() {
        let temp = TempDir::new().unwrap();
        let client = Arc::new(ScriptedClient::new(200, None, vec![3u8; 2048]));
        let observer = Arc::new(RecordingObserver::default());
        let request = DownloadRequest::new("http://x/y/app.apk", temp.path());
        let task = DownloadTask::with_client(request, client, observer.clone());

        run_to_completion(&task);

        let events = observer.events();
        assert!(events
            .iter()
            .all(|e| !matches!(e, Recorded::Progress(_, _))));
        assert!(matches!(observer.terminal(), Some(Recorded::Success(_))));
    }

    #[test]
    fn test_progress_percents_non_decreasing_and_bounded() {
        let temp = TempDir::new().unwrap();
        let client = Arc::new(ScriptedClient::new(200, Some(10_000), vec![4u8; 10_000]));
        let observer = Arc::new(RecordingObserver::default());
        let request = DownloadRequest::new("http://x/y/app.apk", temp.path());
        let task = DownloadTask::with_client(request, client, observer.clone());

        run_to_completion(&task);

        let percents: Vec<u64> = observer
            .events()
            .iter()
            .filter_map(|e| match e {
                Recorded::Progress(total, current) => Some(current * 100 / total),
                _ => None,
            })
            .collect();
        assert!(!percents.is_empty());
        assert!(percents.len() <= 101);
        assert!(percents.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_cancelled_before_first_read_emits_nothing() {
        let temp = TempDir::new().unwrap();
        let target = DownloadTarget {
            file: temp.path().join("app.apk"),
            already_written: 0,
        };
        let observer = Arc::new(RecordingObserver::default());
        let notifier = DownloadNotifier::start(observer.clone());
        let running = AtomicBool::new(false);

        let outcome = stream_to_file(
            Box::new(Cursor::new(vec![1u8; 100])),
            &target,
            Some(100),
            &notifier.handle(),
            &running,
        )
        .unwrap();
        drop(notifier);

        assert!(matches!(outcome, RunOutcome::Cancelled));
        assert!(observer.events().is_empty());
        // Nothing was written past the point of cancellation.
        assert!(!target.file.exists() || fs::metadata(&target.file).unwrap().len() == 0);
    }

    #[test]
    fn test_explicit_file_name_overrides_url() {
        let temp = TempDir::new().unwrap();
        let client = Arc::new(ScriptedClient::new(200, Some(10), vec![5u8; 10]));
        let observer = Arc::new(RecordingObserver::default());
        let request = DownloadRequest::new("http://x/y/app.apk", temp.path())
            .with_file_name("renamed")
            .with_default_extension("apk");
        let task = DownloadTask::with_client(request, client, observer.clone());

        run_to_completion(&task);

        let expected = temp.path().join("renamed.apk");
        assert_eq!(observer.terminal(), Some(Recorded::Success(expected)));
    }

    #[test]
    fn test_destination_directory_created() {
        let temp = TempDir::new().unwrap();
        let nested = temp.path().join("a/b/c");
        let client = Arc::new(ScriptedClient::new(200, Some(10), vec![6u8; 10]));
        let observer = Arc::new(RecordingObserver::default());
        let request = DownloadRequest::new("http://x/y/app.apk", &nested);
        let task = DownloadTask::with_client(request, client, observer.clone());

        run_to_completion(&task);

        assert!(nested.join("app.apk").exists());
    }
}
