//! `DownloadTask`: lifecycle commands, observable state and the worker thread.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use crate::storage::StorageWriter;
use crate::url_model::TaskUrl;

use super::error::TransferError;
use super::events::{Observers, Subscription, TaskEvent, TaskId, TaskObserver};
use super::status::{StatusCell, TaskActions, TaskStatus};
use super::transfer::{self, RunOutcome, TransferOptions};
use super::{lock, percent};

/// `total_size` value while the server has not declared a length yet.
/// Declared lengths are always positive, so zero is free.
const UNKNOWN_SIZE: u64 = 0;

pub(crate) struct TaskShared {
    pub(crate) id: TaskId,
    pub(crate) url: TaskUrl,
    pub(crate) destination: PathBuf,
    pub(crate) options: TransferOptions,
    pub(crate) state: StatusCell,
    total_size: AtomicU64,
    bytes_transferred: AtomicU64,
    observers: Observers,
    last_error: Mutex<Option<String>>,
    /// Held by pause/cancel while flipping status and by the worker around
    /// each chunk write, so no byte lands after a pause has returned.
    chunk_gate: Mutex<()>,
    /// Held by a worker for its whole run: one writer per file at a time.
    run_gate: Mutex<()>,
    /// Threads of runs not yet joined; a stopped run may outlive its successor's spawn.
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl TaskShared {
    pub(crate) fn total_size(&self) -> Option<u64> {
        match self.total_size.load(Ordering::Acquire) {
            UNKNOWN_SIZE => None,
            n => Some(n),
        }
    }

    pub(crate) fn bytes_transferred(&self) -> u64 {
        self.bytes_transferred.load(Ordering::Acquire)
    }

    /// Sets the size once, from the live run only, and announces it.
    pub(crate) fn record_total_size(&self, generation: u64, size: u64) {
        if !self.state.is_current(generation) {
            return;
        }
        if self
            .total_size
            .compare_exchange(UNKNOWN_SIZE, size, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            tracing::debug!(task = %self.id, size, "size known");
            self.observers.emit(&TaskEvent::SizeKnown {
                task: self.id,
                size,
            });
        }
    }

    /// Writes one chunk for run `generation` and advances the byte count.
    /// Returns `Ok(false)` without writing when the run is no longer live.
    pub(crate) fn commit_chunk(
        &self,
        generation: u64,
        writer: &mut StorageWriter,
        chunk: &[u8],
    ) -> io::Result<bool> {
        let bytes = {
            let _gate = lock(&self.chunk_gate);
            if !self.state.is_current(generation) {
                return Ok(false);
            }
            writer.write_chunk(chunk)?;
            let len = chunk.len() as u64;
            self.bytes_transferred.fetch_add(len, Ordering::AcqRel) + len
        };
        self.observers.emit(&TaskEvent::Progress {
            task: self.id,
            bytes,
            percent: percent(bytes, self.total_size()),
        });
        Ok(true)
    }

    /// Applies a lifecycle command and announces it. `None` when not allowed.
    fn command(
        &self,
        allowed: impl Fn(TaskStatus) -> bool,
        to: TaskStatus,
        new_run: bool,
        stops_run: bool,
    ) -> Option<u64> {
        let changed = if stops_run {
            let _gate = lock(&self.chunk_gate);
            self.state.transition(allowed, to, new_run)
        } else {
            self.state.transition(allowed, to, new_run)
        };
        let (old, generation) = changed?;
        tracing::info!(
            task = %self.id,
            from = %old,
            to = %to,
            bytes = self.bytes_transferred(),
            "status changed"
        );
        self.observers.emit(&TaskEvent::StatusChanged {
            task: self.id,
            old,
            new: to,
        });
        Some(generation)
    }

    /// Ends run `generation` with `to` unless it was stopped or superseded.
    fn finish(&self, generation: u64, to: TaskStatus) -> bool {
        if !self.state.finish(generation, to) {
            return false;
        }
        self.observers.emit(&TaskEvent::StatusChanged {
            task: self.id,
            old: TaskStatus::Downloading,
            new: to,
        });
        true
    }

    fn fail(&self, generation: u64, err: TransferError) {
        if !self.state.is_current(generation) {
            tracing::debug!(task = %self.id, "ignoring failure of stopped run: {}", err);
            return;
        }
        tracing::warn!(
            task = %self.id,
            url = %self.url,
            dest = %self.destination.display(),
            offset = self.bytes_transferred(),
            kind = err.kind(),
            "transfer failed: {}",
            err
        );
        *lock(&self.last_error) = Some(err.to_string());
        self.finish(generation, TaskStatus::Error);
    }

    fn spawn_run(self: &Arc<Self>, generation: u64) {
        let shared = Arc::clone(self);
        let spawned = thread::Builder::new()
            .name(format!("dlm-task-{}", self.id.get()))
            .spawn(move || shared.run_worker(generation));
        match spawned {
            Ok(handle) => {
                let mut workers = lock(&self.workers);
                workers.retain(|w| !w.is_finished());
                workers.push(handle);
            }
            Err(e) => self.fail(generation, TransferError::Spawn(e)),
        }
    }

    fn run_worker(&self, generation: u64) {
        let _run = lock(&self.run_gate);
        if !self.state.is_current(generation) {
            return;
        }
        tracing::debug!(
            task = %self.id,
            offset = self.bytes_transferred(),
            dest = %self.destination.display(),
            "transfer started"
        );
        match transfer::run(self, generation) {
            Ok(RunOutcome::Finished) => {
                if self.finish(generation, TaskStatus::Complete) {
                    tracing::info!(task = %self.id, bytes = self.bytes_transferred(), "download complete");
                }
            }
            Ok(RunOutcome::Stopped) => {
                tracing::debug!(task = %self.id, bytes = self.bytes_transferred(), "transfer stopped");
            }
            Err(e) => self.fail(generation, e),
        }
    }
}

/// A resumable download of one URL into one local file.
///
/// Cloning yields another handle to the same task. The transfer starts as soon
/// as the task is created and runs on its own thread; every method here is
/// non-blocking except [`DownloadTask::wait`].
#[derive(Clone)]
pub struct DownloadTask {
    shared: Arc<TaskShared>,
}

impl DownloadTask {
    /// Creates the task and starts downloading into `download_dir/<file name>`.
    pub fn start(url: TaskUrl, download_dir: &Path, options: TransferOptions) -> Self {
        let task = Self::new(url, download_dir, options);
        task.shared.spawn_run(0);
        task
    }

    /// Like [`DownloadTask::start`], with `observer` attached before the first
    /// event can fire.
    pub fn start_observed(
        url: TaskUrl,
        download_dir: &Path,
        options: TransferOptions,
        observer: Arc<dyn TaskObserver>,
    ) -> (Self, Subscription) {
        let task = Self::new(url, download_dir, options);
        let subscription = task.subscribe(observer);
        task.shared.spawn_run(0);
        (task, subscription)
    }

    fn new(url: TaskUrl, download_dir: &Path, options: TransferOptions) -> Self {
        let id = TaskId::next();
        let destination = download_dir.join(url.file_name());
        tracing::info!(task = %id, url = %url, dest = %destination.display(), "task created");
        Self {
            shared: Arc::new(TaskShared {
                id,
                url,
                destination,
                options,
                state: StatusCell::new(),
                total_size: AtomicU64::new(UNKNOWN_SIZE),
                bytes_transferred: AtomicU64::new(0),
                observers: Observers::new(id),
                last_error: Mutex::new(None),
                chunk_gate: Mutex::new(()),
                run_gate: Mutex::new(()),
                workers: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn id(&self) -> TaskId {
        self.shared.id
    }

    pub fn url(&self) -> &TaskUrl {
        &self.shared.url
    }

    pub fn destination(&self) -> &Path {
        &self.shared.destination
    }

    /// Resource length, once the server has declared it.
    pub fn size(&self) -> Option<u64> {
        self.shared.total_size()
    }

    /// Bytes written to the destination file so far, across all runs.
    pub fn bytes_transferred(&self) -> u64 {
        self.shared.bytes_transferred()
    }

    /// Percentage in `[0, 100]`; 0 while the size is unknown.
    pub fn progress(&self) -> f32 {
        percent(self.bytes_transferred(), self.size())
    }

    pub fn status(&self) -> TaskStatus {
        self.shared.state.status()
    }

    pub fn actions(&self) -> TaskActions {
        self.status().actions()
    }

    /// Message of the failure that put the task in ERROR, until the next resume.
    pub fn last_error(&self) -> Option<String> {
        lock(&self.shared.last_error).clone()
    }

    /// DOWNLOADING → PAUSED. Once this returns `true` no further byte is written
    /// by the current run; the run itself winds down in the background.
    pub fn pause(&self) -> bool {
        self.shared
            .command(
                |s| s == TaskStatus::Downloading,
                TaskStatus::Paused,
                false,
                true,
            )
            .is_some()
    }

    /// PAUSED/ERROR → DOWNLOADING with a fresh run from `bytes_transferred()`.
    pub fn resume(&self) -> bool {
        let Some(generation) = self.shared.command(
            |s| matches!(s, TaskStatus::Paused | TaskStatus::Error),
            TaskStatus::Downloading,
            true,
            false,
        ) else {
            return false;
        };
        *lock(&self.shared.last_error) = None;
        self.shared.spawn_run(generation);
        true
    }

    /// DOWNLOADING/PAUSED/ERROR → CANCELLED. An in-flight read is aborted at
    /// curl's next progress callback; the partial file is kept.
    pub fn cancel(&self) -> bool {
        self.shared
            .command(|s| !s.is_terminal(), TaskStatus::Cancelled, false, true)
            .is_some()
    }

    pub fn subscribe(&self, observer: Arc<dyn TaskObserver>) -> Subscription {
        self.shared.observers.subscribe(observer)
    }

    pub fn unsubscribe(&self, subscription: Subscription) -> bool {
        self.shared.observers.unsubscribe(subscription)
    }

    /// Blocks until the worker threads started so far have exited, i.e. the
    /// file handle and connection are released. Returns at once when idle.
    pub fn wait(&self) {
        loop {
            let handle = lock(&self.shared.workers).pop();
            match handle {
                Some(handle) => {
                    if handle.join().is_err() {
                        tracing::error!(task = %self.shared.id, "transfer thread panicked");
                    }
                }
                None => break,
            }
        }
    }
}

impl std::fmt::Debug for DownloadTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadTask")
            .field("id", &self.id())
            .field("url", &self.url().as_str())
            .field("status", &self.status())
            .field("bytes_transferred", &self.bytes_transferred())
            .field("size", &self.size())
            .finish()
    }
}
