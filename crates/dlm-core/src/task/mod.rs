//! The resumable download task.
//!
//! A task fetches one URL into one file. It starts downloading on creation,
//! can be paused, resumed (continuing with `Range: bytes=<written>-`) and
//! cancelled, and reports status, size and progress changes to observers.
//! Failures never escape a task: they move it to [`TaskStatus::Error`], from
//! which an explicit [`DownloadTask::resume`] retries.

mod error;
mod events;
mod handle;
mod response;
mod status;
mod transfer;

pub use error::TransferError;
pub use events::{Subscription, TaskEvent, TaskId, TaskObserver};
pub use handle::DownloadTask;
pub use status::{TaskActions, TaskStatus};
pub use transfer::TransferOptions;

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Locks `m`, recovering the data if a panicking thread poisoned it.
pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Download progress in percent, clamped to `[0, 100]`; 0 while `total` is unknown.
pub fn percent(bytes: u64, total: Option<u64>) -> f32 {
    match total {
        Some(total) if total > 0 => {
            ((bytes as f64 / total as f64) * 100.0).clamp(0.0, 100.0) as f32
        }
        _ => 0.0,
    }
}
