//! Task notifications and the subscriber list that fans them out.
//!
//! Events are delivered synchronously on whichever thread caused them (the
//! task's worker for size/progress/completion, the caller for pause/resume/
//! cancel). Observers that feed a single-threaded front end must hand the
//! event over to that thread themselves, e.g. through a channel.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use super::status::TaskStatus;
use super::lock;

/// Process-unique identity of a download task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl TaskId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        TaskId(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TaskEvent {
    StatusChanged {
        task: TaskId,
        old: TaskStatus,
        new: TaskStatus,
    },
    /// The server declared the resource length. Sent once, before any byte is written.
    SizeKnown { task: TaskId, size: u64 },
    /// A chunk was written. `bytes` is strictly increasing within one run.
    Progress {
        task: TaskId,
        bytes: u64,
        percent: f32,
    },
}

impl TaskEvent {
    pub fn task(&self) -> TaskId {
        match self {
            TaskEvent::StatusChanged { task, .. }
            | TaskEvent::SizeKnown { task, .. }
            | TaskEvent::Progress { task, .. } => *task,
        }
    }
}

/// Receiver of task notifications. Closures `Fn(&TaskEvent)` implement it.
pub trait TaskObserver: Send + Sync {
    fn on_event(&self, event: &TaskEvent);
}

impl<F> TaskObserver for F
where
    F: Fn(&TaskEvent) + Send + Sync,
{
    fn on_event(&self, event: &TaskEvent) {
        self(event)
    }
}

/// Handle returned by `subscribe`; the only way to unsubscribe.
#[must_use = "dropping a Subscription makes the observer impossible to remove"]
#[derive(Debug, PartialEq, Eq)]
pub struct Subscription {
    task: TaskId,
    id: u64,
}

impl Subscription {
    pub fn task(&self) -> TaskId {
        self.task
    }
}

pub(crate) struct Observers {
    task: TaskId,
    next_id: AtomicU64,
    entries: Mutex<Vec<(u64, Arc<dyn TaskObserver>)>>,
}

impl Observers {
    pub(crate) fn new(task: TaskId) -> Self {
        Self {
            task,
            next_id: AtomicU64::new(0),
            entries: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn subscribe(&self, observer: Arc<dyn TaskObserver>) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        lock(&self.entries).push((id, observer));
        Subscription {
            task: self.task,
            id,
        }
    }

    /// Removes exactly the observer behind `subscription`. False if it belongs
    /// to another task or was already removed.
    pub(crate) fn unsubscribe(&self, subscription: Subscription) -> bool {
        if subscription.task != self.task {
            return false;
        }
        let mut entries = lock(&self.entries);
        let before = entries.len();
        entries.retain(|(id, _)| *id != subscription.id);
        entries.len() != before
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    /// Delivers `event` to a snapshot of the current observers. The list lock
    /// is not held during delivery, so observers may (un)subscribe re-entrantly.
    pub(crate) fn emit(&self, event: &TaskEvent) {
        let snapshot: Vec<Arc<dyn TaskObserver>> = lock(&self.entries)
            .iter()
            .map(|(_, o)| Arc::clone(o))
            .collect();
        for observer in snapshot {
            observer.on_event(event);
        }
    }
}
