//! Insertion-ordered list of tasks, as a front end's table sees it.
//!
//! Row index == insertion order, and removal is by row only. Each task's
//! notifications are re-emitted to one [`RegistrySink`] as "row i changed",
//! where `i` is the task's index at delivery time, so rows keep receiving
//! the right index after earlier rows are removed.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use crate::task::{DownloadTask, Subscription, TaskEvent, TaskId, TaskObserver, TaskStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryEvent {
    RowInserted(usize),
    RowUpdated(usize),
    RowRemoved(usize),
}

/// Receiver of row events. Called on the thread that caused the change,
/// which for updates is a task worker. Insert and remove events are delivered
/// with the registry locked, so a sink must not call back into the registry
/// synchronously; hand events to another thread (e.g. an mpsc channel) instead.
pub trait RegistrySink: Send + Sync {
    fn on_registry_event(&self, event: RegistryEvent);
}

impl<F> RegistrySink for F
where
    F: Fn(RegistryEvent) + Send + Sync,
{
    fn on_registry_event(&self, event: RegistryEvent) {
        self(event)
    }
}

impl RegistrySink for std::sync::mpsc::Sender<RegistryEvent> {
    fn on_registry_event(&self, event: RegistryEvent) {
        // A closed receiver means the front end is gone; nothing left to render.
        let _ = self.send(event);
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("row {index} out of bounds (len {len})")]
    OutOfBounds { index: usize, len: usize },
    #[error("row {index} is still {status}; cancel it or let it finish first")]
    TaskActive { index: usize, status: TaskStatus },
}

struct Entry {
    task: DownloadTask,
    subscription: Subscription,
}

struct Inner {
    entries: RwLock<Vec<Entry>>,
    sink: Arc<dyn RegistrySink>,
}

impl Inner {
    fn read(&self) -> RwLockReadGuard<'_, Vec<Entry>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Entry>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn index_of(&self, task: TaskId) -> Option<usize> {
        self.read().iter().position(|e| e.task.id() == task)
    }
}

/// Maps one task's events to its current row.
struct RowForwarder {
    registry: Weak<Inner>,
    task: TaskId,
}

impl TaskObserver for RowForwarder {
    fn on_event(&self, event: &TaskEvent) {
        let Some(inner) = self.registry.upgrade() else {
            return;
        };
        // Lock released before the sink runs; the sink may call back into the registry.
        if let Some(index) = inner.index_of(self.task) {
            tracing::trace!(task = %event.task(), row = index, "row updated");
            inner.sink.on_registry_event(RegistryEvent::RowUpdated(index));
        }
    }
}

pub struct TaskRegistry {
    inner: Arc<Inner>,
}

impl TaskRegistry {
    pub fn new(sink: Arc<dyn RegistrySink>) -> Self {
        Self {
            inner: Arc::new(Inner {
                entries: RwLock::new(Vec::new()),
                sink,
            }),
        }
    }

    /// Appends `task` as the last row and starts forwarding its events.
    /// Returns the new row index.
    pub fn add(&self, task: DownloadTask) -> usize {
        let forwarder = RowForwarder {
            registry: Arc::downgrade(&self.inner),
            task: task.id(),
        };
        let mut entries = self.inner.write();
        // Forwarded updates block on the lock until the insert is announced.
        let subscription = task.subscribe(Arc::new(forwarder));
        entries.push(Entry { task, subscription });
        let index = entries.len() - 1;
        self.inner.sink.on_registry_event(RegistryEvent::RowInserted(index));
        index
    }

    pub fn get(&self, index: usize) -> Option<DownloadTask> {
        self.inner.read().get(index).map(|e| e.task.clone())
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current rows, in order.
    pub fn tasks(&self) -> Vec<DownloadTask> {
        self.inner.read().iter().map(|e| e.task.clone()).collect()
    }

    /// Removes row `index`; later rows shift down by one.
    ///
    /// Only COMPLETE, CANCELLED and ERROR tasks can be removed. Waits for the
    /// task's worker to exit so its file is closed when this returns; for a
    /// just-cancelled task that is at most one curl progress interval.
    pub fn remove_at(&self, index: usize) -> Result<DownloadTask, RegistryError> {
        let task = {
            let mut entries = self.inner.write();
            let len = entries.len();
            let entry = entries
                .get(index)
                .ok_or(RegistryError::OutOfBounds { index, len })?;
            let status = entry.task.status();
            if status.is_active() {
                return Err(RegistryError::TaskActive { index, status });
            }
            let Entry { task, subscription } = entries.remove(index);
            task.unsubscribe(subscription);
            self.inner.sink.on_registry_event(RegistryEvent::RowRemoved(index));
            task
        };
        task.wait();
        tracing::debug!(task = %task.id(), row = index, "row removed");
        Ok(task)
    }
}

impl Drop for TaskRegistry {
    fn drop(&mut self) {
        for entry in self.inner.write().drain(..) {
            entry.task.unsubscribe(entry.subscription);
        }
    }
}
