//! Integration tests: registry row indices and event forwarding.

mod common;

use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::range_server::{RangeServer, ServerBehavior};
use common::{body, wait_until, LONG};
use dlm_core::{
    DownloadTask, RegistryError, RegistryEvent, TaskRegistry, TaskStatus, TaskUrl,
    TransferOptions,
};
use tempfile::tempdir;

#[derive(Clone, Default)]
struct Rows(Arc<Mutex<Vec<RegistryEvent>>>);

impl Rows {
    fn registry(&self) -> TaskRegistry {
        let events = Arc::clone(&self.0);
        TaskRegistry::new(Arc::new(move |e: RegistryEvent| events.lock().unwrap().push(e)))
    }

    fn take(&self) -> Vec<RegistryEvent> {
        std::mem::take(&mut *self.0.lock().unwrap())
    }
}

fn task(server: &RangeServer, name: &str, dir: &std::path::Path) -> DownloadTask {
    let url = TaskUrl::parse(&server.url(name)).unwrap();
    DownloadTask::start(url, dir, TransferOptions::default())
}

#[test]
fn rows_follow_insertion_order() {
    let server = RangeServer::start(body(2048));
    let dir = tempdir().unwrap();
    let rows = Rows::default();
    let registry = rows.registry();

    let a = task(&server, "a.bin", dir.path());
    let b = task(&server, "b.bin", dir.path());
    assert_eq!(registry.add(a.clone()), 0);
    assert_eq!(registry.add(b.clone()), 1);
    assert_eq!(registry.len(), 2);
    assert_eq!(registry.get(0).unwrap().id(), a.id());
    assert_eq!(registry.get(1).unwrap().id(), b.id());
    assert!(registry.get(2).is_none());

    let ids: Vec<_> = registry.tasks().iter().map(DownloadTask::id).collect();
    assert_eq!(ids, [a.id(), b.id()]);

    let inserted: Vec<_> = rows
        .take()
        .into_iter()
        .filter(|e| matches!(e, RegistryEvent::RowInserted(_)))
        .collect();
    assert_eq!(
        inserted,
        [RegistryEvent::RowInserted(0), RegistryEvent::RowInserted(1)]
    );
}

#[test]
fn removal_shifts_rows_and_retargets_updates() {
    let fast = RangeServer::start(body(2048));
    let slow = RangeServer::start_with(body(256 * 1024), ServerBehavior::throttled());
    let dir = tempdir().unwrap();
    let rows = Rows::default();
    let registry = rows.registry();

    let done = task(&fast, "done.bin", dir.path());
    assert!(wait_until(LONG, || done.status() == TaskStatus::Complete));
    registry.add(done.clone());
    let running = task(&slow, "running.bin", dir.path());
    registry.add(running.clone());
    assert!(wait_until(LONG, || running.bytes_transferred() > 0));

    assert_eq!(
        registry.remove_at(1).unwrap_err(),
        RegistryError::TaskActive {
            index: 1,
            status: TaskStatus::Downloading
        }
    );
    assert_eq!(
        registry.remove_at(5).unwrap_err(),
        RegistryError::OutOfBounds { index: 5, len: 2 }
    );

    let removed = registry.remove_at(0).unwrap();
    assert_eq!(removed.id(), done.id());
    assert_eq!(registry.len(), 1);
    assert_eq!(registry.get(0).unwrap().id(), running.id());

    rows.take();
    assert!(wait_until(LONG, || running.status() == TaskStatus::Complete));
    running.wait();

    let events = rows.take();
    assert!(!events.is_empty(), "remaining row keeps reporting");
    assert!(
        events.iter().all(|e| *e == RegistryEvent::RowUpdated(0)),
        "updates must target the shifted index: {:?}",
        events
    );
}

#[test]
fn removed_row_reports_removal_and_stops_forwarding() {
    let server = RangeServer::start_with(
        body(4096),
        ServerBehavior {
            fail_status: Some(404),
            ..ServerBehavior::default()
        },
    );
    let dir = tempdir().unwrap();
    let rows = Rows::default();
    let registry = rows.registry();

    let failed = task(&server, "failed.bin", dir.path());
    registry.add(failed.clone());
    assert!(wait_until(LONG, || failed.status() == TaskStatus::Error));

    rows.take();
    registry.remove_at(0).unwrap();
    assert_eq!(rows.take(), [RegistryEvent::RowRemoved(0)]);
    assert!(registry.is_empty());

    server.set_behavior(|b| b.fail_status = None);
    assert!(failed.resume());
    assert!(wait_until(LONG, || failed.status() == TaskStatus::Complete));
    failed.wait();
    assert!(rows.take().is_empty(), "removed task must not reach the sink");
}

#[test]
fn paused_task_cannot_be_removed_until_cancelled() {
    let server = RangeServer::start_with(body(128 * 1024), ServerBehavior::throttled());
    let dir = tempdir().unwrap();
    let rows = Rows::default();
    let registry = rows.registry();

    let t = task(&server, "held.bin", dir.path());
    registry.add(t.clone());
    assert!(wait_until(LONG, || t.bytes_transferred() > 0));
    assert!(t.pause());
    assert!(matches!(
        registry.remove_at(0),
        Err(RegistryError::TaskActive {
            status: TaskStatus::Paused,
            ..
        })
    ));

    assert!(t.cancel());
    let removed = registry.remove_at(0).unwrap();
    assert_eq!(removed.status(), TaskStatus::Cancelled);
}

#[test]
fn channel_sink_marshals_events_to_consumer_thread() {
    let server = RangeServer::start(body(8192));
    let dir = tempdir().unwrap();
    let (tx, rx) = mpsc::channel();
    let registry = TaskRegistry::new(Arc::new(tx));

    registry.add(task(&server, "chan.bin", dir.path()));
    assert_eq!(
        rx.recv_timeout(Duration::from_secs(5)).unwrap(),
        RegistryEvent::RowInserted(0)
    );
    let t = registry.get(0).unwrap();
    assert!(wait_until(LONG, || t.status() == TaskStatus::Complete));
    let updates: Vec<_> = rx.try_iter().collect();
    assert!(updates.iter().all(|e| *e == RegistryEvent::RowUpdated(0)));
}
