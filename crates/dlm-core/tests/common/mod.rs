#![allow(dead_code)]

pub mod range_server;

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use dlm_core::{TaskEvent, TaskObserver};

/// Patterned body whose bytes reveal their own offset mod 251.
pub fn body(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

/// Polls `cond` every 5ms until it holds or `timeout` passes.
pub fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    cond()
}

pub const LONG: Duration = Duration::from_secs(20);

/// Observer that records every event it sees.
#[derive(Clone, Default)]
pub struct Recorder {
    events: Arc<Mutex<Vec<TaskEvent>>>,
}

impl Recorder {
    pub fn observer(&self) -> Arc<dyn TaskObserver> {
        let events = Arc::clone(&self.events);
        Arc::new(move |e: &TaskEvent| events.lock().unwrap().push(e.clone()))
    }

    pub fn events(&self) -> Vec<TaskEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn progress_bytes(&self) -> Vec<u64> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                TaskEvent::Progress { bytes, .. } => Some(bytes),
                _ => None,
            })
            .collect()
    }
}
