//! Registry of in-flight download tasks.
//!
//! The hosting layer often needs to stop one specific download out of
//! several, and to sweep everything on shutdown. [`TaskRegistry`] keeps a
//! concurrent map from [`TaskId`] to a task handle: tasks are inserted at
//! start and removed when their terminal event fires, so the map only ever
//! contains live work. The registry itself is a cheap clone sharing one
//! underlying map.

use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, info};

use crate::event::DownloadObserver;
use crate::task::{DownloadRequest, DownloadTask};

/// Identifier of one registered download task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(pub u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Control surface the registry needs from a task.
pub trait TaskHandle: Send + Sync {
    /// Request cooperative cancellation.
    fn stop(&self);

    /// Whether the task currently has an active run.
    fn is_running(&self) -> bool;
}

impl<C: crate::http::RangeClient + 'static> TaskHandle for DownloadTask<C> {
    fn stop(&self) {
        DownloadTask::stop(self);
    }

    fn is_running(&self) -> bool {
        DownloadTask::is_running(self)
    }
}

#[derive(Default)]
struct RegistryInner {
    tasks: DashMap<TaskId, Arc<dyn TaskHandle>>,
    next_id: AtomicU64,
}

/// Concurrent map of task id to live task handle.
#[derive(Clone, Default)]
pub struct TaskRegistry {
    inner: Arc<RegistryInner>,
}

impl TaskRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next task id.
    pub fn allocate_id(&self) -> TaskId {
        TaskId(self.inner.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Register a task under a previously allocated id.
    pub fn register(&self, id: TaskId, task: Arc<dyn TaskHandle>) {
        self.inner.tasks.insert(id, task);
    }

    /// Remove a task, returning its handle when it was registered.
    pub fn remove(&self, id: TaskId) -> Option<Arc<dyn TaskHandle>> {
        self.inner.tasks.remove(&id).map(|(_, task)| task)
    }

    /// Stop one task by id. Returns false when the id is unknown.
    pub fn stop(&self, id: TaskId) -> bool {
        match self.inner.tasks.get(&id) {
            Some(task) => {
                task.stop();
                true
            }
            None => false,
        }
    }

    /// Number of registered tasks.
    pub fn len(&self) -> usize {
        self.inner.tasks.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.tasks.is_empty()
    }

    /// Stop every registered task and clear the registry.
    pub fn shutdown(&self) {
        info!(tasks = self.inner.tasks.len(), "stopping all registered downloads");
        for entry in self.inner.tasks.iter() {
            entry.value().stop();
        }
        self.inner.tasks.clear();
    }

    /// Create, register, and start a download in one step.
    ///
    /// The observer is wrapped so the task deregisters itself when its
    /// terminal event fires.
    pub fn start_download(
        &self,
        request: DownloadRequest,
        observer: Arc<dyn DownloadObserver>,
    ) -> TaskId {
        let id = self.allocate_id();
        let observer = Arc::new(DeregisterOnTerminal {
            registry: self.clone(),
            id,
            inner: observer,
        });
        let task = Arc::new(DownloadTask::new(request, observer));
        self.register(id, Arc::clone(&task) as Arc<dyn TaskHandle>);
        task.start();
        debug!(%id, "download registered and started");
        id
    }
}

/// Observer decorator that removes the task from the registry on its
/// terminal event, then forwards to the inner observer.
struct DeregisterOnTerminal {
    registry: TaskRegistry,
    id: TaskId,
    inner: Arc<dyn DownloadObserver>,
}

impl DeregisterOnTerminal {
    fn deregister(&self) {
        if let Some(task) = self.registry.remove(self.id) {
            task.stop();
        }
    }
}

impl DownloadObserver for DeregisterOnTerminal {
    fn on_progress(&self, total_bytes: u64, current_bytes: u64) {
        self.inner.on_progress(total_bytes, current_bytes);
    }

    fn on_success(&self, file_path: &Path) {
        self.deregister();
        self.inner.on_success(file_path);
    }

    fn on_error(&self, message: Option<&str>) {
        self.deregister();
        self.inner.on_error(message);
    }
}
