//! Task status, the actions each status allows, and the atomic status word.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Lifecycle status of a download task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TaskStatus {
    Downloading = 0,
    Paused = 1,
    Complete = 2,
    Cancelled = 3,
    Error = 4,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 5] = [
        TaskStatus::Downloading,
        TaskStatus::Paused,
        TaskStatus::Complete,
        TaskStatus::Cancelled,
        TaskStatus::Error,
    ];

    /// Display label used by front ends.
    pub fn label(self) -> &'static str {
        match self {
            TaskStatus::Downloading => "Downloading",
            TaskStatus::Paused => "Paused",
            TaskStatus::Complete => "Complete",
            TaskStatus::Cancelled => "Cancelled",
            TaskStatus::Error => "Error",
        }
    }

    /// No operation can bring a terminal task back to life.
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Complete | TaskStatus::Cancelled)
    }

    /// A task in this status may still transfer bytes (now or after resume
    /// from pause) and must not be removed from a registry.
    pub fn is_active(self) -> bool {
        matches!(self, TaskStatus::Downloading | TaskStatus::Paused)
    }

    /// User actions that make sense in this status.
    pub fn actions(self) -> TaskActions {
        match self {
            TaskStatus::Downloading => TaskActions {
                pause: true,
                cancel: true,
                ..TaskActions::NONE
            },
            TaskStatus::Paused => TaskActions {
                resume: true,
                cancel: true,
                ..TaskActions::NONE
            },
            TaskStatus::Error => TaskActions {
                resume: true,
                remove: true,
                ..TaskActions::NONE
            },
            TaskStatus::Complete | TaskStatus::Cancelled => TaskActions {
                remove: true,
                ..TaskActions::NONE
            },
        }
    }

    fn from_code(code: u8) -> TaskStatus {
        match code {
            0 => TaskStatus::Downloading,
            1 => TaskStatus::Paused,
            2 => TaskStatus::Complete,
            3 => TaskStatus::Cancelled,
            _ => TaskStatus::Error,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Which lifecycle affordances a front end should enable for a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TaskActions {
    pub pause: bool,
    pub resume: bool,
    pub cancel: bool,
    pub remove: bool,
}

impl TaskActions {
    pub const NONE: TaskActions = TaskActions {
        pause: false,
        resume: false,
        cancel: false,
        remove: false,
    };
}

/// Status plus run generation packed into one atomic word.
///
/// Layout: `generation << 8 | status`. The generation is bumped every time a
/// new transfer run starts, so a run can tell "still DOWNLOADING for me" from
/// "DOWNLOADING again for a newer run" with a single load.
pub(crate) struct StatusCell(AtomicU64);

fn pack(generation: u64, status: TaskStatus) -> u64 {
    (generation << 8) | status as u64
}

fn unpack(word: u64) -> (u64, TaskStatus) {
    (word >> 8, TaskStatus::from_code((word & 0xff) as u8))
}

impl StatusCell {
    /// Starts DOWNLOADING at generation 0.
    pub(crate) fn new() -> Self {
        Self(AtomicU64::new(pack(0, TaskStatus::Downloading)))
    }

    pub(crate) fn status(&self) -> TaskStatus {
        unpack(self.0.load(Ordering::Acquire)).1
    }

    /// True while run `generation` is the live run and the task is DOWNLOADING.
    pub(crate) fn is_current(&self, generation: u64) -> bool {
        self.0.load(Ordering::Acquire) == pack(generation, TaskStatus::Downloading)
    }

    /// Moves to `to` if the current status satisfies `allowed`. With
    /// `new_run` the generation is bumped. Returns the previous status and the
    /// resulting generation, or `None` when the transition is not allowed.
    pub(crate) fn transition(
        &self,
        allowed: impl Fn(TaskStatus) -> bool,
        to: TaskStatus,
        new_run: bool,
    ) -> Option<(TaskStatus, u64)> {
        let mut current = self.0.load(Ordering::Acquire);
        loop {
            let (generation, status) = unpack(current);
            if !allowed(status) {
                return None;
            }
            let next_generation = if new_run { generation + 1 } else { generation };
            match self.0.compare_exchange_weak(
                current,
                pack(next_generation, to),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Some((status, next_generation)),
                Err(actual) => current = actual,
            }
        }
    }

    /// Ends run `generation` with `to`. Fails if the run was superseded or stopped.
    pub(crate) fn finish(&self, generation: u64, to: TaskStatus) -> bool {
        self.0
            .compare_exchange(
                pack(generation, TaskStatus::Downloading),
                pack(generation, to),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }
}
