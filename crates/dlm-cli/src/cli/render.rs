//! Text rendering of registry rows (the table a GUI would draw).

use dlm_core::task::TaskActions;
use dlm_core::{DownloadTask, TaskStatus};
use std::collections::HashMap;

pub(crate) fn header() -> String {
    format!(
        "{:<4} {:<11} {:>8} {:>12} {}",
        "ROW", "STATUS", "PROGRESS", "SIZE", "URL"
    )
}

pub(crate) fn format_size(size: Option<u64>) -> String {
    size.map(|s| s.to_string()).unwrap_or_else(|| "-".to_string())
}

pub(crate) fn format_row(row: usize, task: &DownloadTask) -> String {
    format_fields(row, task.status(), task.progress(), task.size(), task.url().as_str())
}

fn format_fields(
    row: usize,
    status: TaskStatus,
    progress: f32,
    size: Option<u64>,
    url: &str,
) -> String {
    format!(
        "{:<4} {:<11} {:>7.1}% {:>12} {}",
        row,
        status.label(),
        progress,
        format_size(size),
        url
    )
}

/// Space-separated names of the enabled actions, e.g. `"pause cancel"`.
pub(crate) fn describe_actions(actions: TaskActions) -> String {
    [
        (actions.pause, "pause"),
        (actions.resume, "resume"),
        (actions.cancel, "cancel"),
        (actions.remove, "clear"),
    ]
    .iter()
    .filter(|(enabled, _)| *enabled)
    .map(|(_, name)| *name)
    .collect::<Vec<_>>()
    .join(" ")
}

/// Throttles per-chunk row updates to status changes and 10% steps.
#[derive(Default)]
pub(crate) struct RowTracker {
    last: HashMap<u64, (TaskStatus, u32)>,
}

impl RowTracker {
    pub(crate) fn should_render(&mut self, task: &DownloadTask) -> bool {
        self.observe(task.id().get(), task.status(), task.progress())
    }

    fn observe(&mut self, id: u64, status: TaskStatus, progress: f32) -> bool {
        let step = (progress / 10.0).floor() as u32;
        let current = (status, step);
        if self.last.get(&id) == Some(&current) {
            return false;
        }
        self.last.insert(id, current);
        true
    }
}
