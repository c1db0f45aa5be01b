//! `dlm get` – download URLs in parallel and wait until every task settles.

use anyhow::{bail, Context, Result};
use dlm_core::config::DlmConfig;
use dlm_core::{DownloadTask, RegistryEvent, TaskRegistry, TaskStatus, TaskUrl};
use std::path::Path;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;

use crate::cli::render::{format_row, header, RowTracker};

const POLL: Duration = Duration::from_millis(250);

pub fn run_get(cfg: &DlmConfig, download_dir: &Path, urls: &[String]) -> Result<()> {
    let mut parsed = Vec::with_capacity(urls.len());
    for raw in urls {
        match TaskUrl::parse(raw) {
            Ok(url) => parsed.push(url),
            Err(e) => eprintln!("skipping {raw}: {e}"),
        }
    }
    if parsed.is_empty() {
        bail!("no valid URLs to download");
    }

    std::fs::create_dir_all(download_dir)
        .with_context(|| format!("create download dir {}", download_dir.display()))?;

    let (tx, rx) = mpsc::channel();
    let registry = TaskRegistry::new(Arc::new(tx));
    let options = cfg.transfer_options();
    for url in parsed {
        tracing::info!("queueing {}", url);
        registry.add(DownloadTask::start(url, download_dir, options.clone()));
    }

    println!("{}", header());
    let mut tracker = RowTracker::default();
    loop {
        match rx.recv_timeout(POLL) {
            Ok(RegistryEvent::RowUpdated(row)) | Ok(RegistryEvent::RowInserted(row)) => {
                if let Some(task) = registry.get(row) {
                    if tracker.should_render(&task) {
                        println!("{}", format_row(row, &task));
                    }
                }
            }
            Ok(RegistryEvent::RowRemoved(_)) | Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
        if registry.tasks().iter().all(|t| !t.status().is_active()) {
            break;
        }
    }

    let tasks = registry.tasks();
    let mut failed = 0usize;
    for (row, task) in tasks.iter().enumerate() {
        task.wait();
        println!("{}", format_row(row, task));
        if task.status() == TaskStatus::Error {
            failed += 1;
            if let Some(err) = task.last_error() {
                eprintln!("row {row}: {err}");
            }
        } else {
            println!("  saved to {}", task.destination().display());
        }
    }

    if failed > 0 {
        bail!("{} of {} download(s) failed", failed, tasks.len());
    }
    Ok(())
}
