//! Minimal HTTP/1.1 server supporting open-ended Range GETs for integration tests.
//!
//! Serves a single body that can be swapped at runtime. Every GET's `Range`
//! header is recorded. Behavior (failure status, missing Content-Length,
//! ignored ranges, throttling, stalling) can be changed between requests.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ServerBehavior {
    /// If false, GET ignores Range and always returns 200 with the full body.
    pub support_ranges: bool,
    /// Respond with this status (and a short body) instead of the resource.
    pub fail_status: Option<u16>,
    /// Send the body without a Content-Length header (delimited by close).
    pub omit_content_length: bool,
    /// Body is written in pieces of this many bytes ...
    pub piece_size: usize,
    /// ... with this pause after each piece.
    pub piece_delay: Duration,
    /// Send the head, then sit idle this long before the body.
    pub stall_after_head: Option<Duration>,
}

impl Default for ServerBehavior {
    fn default() -> Self {
        Self {
            support_ranges: true,
            fail_status: None,
            omit_content_length: false,
            piece_size: 16 * 1024,
            piece_delay: Duration::ZERO,
            stall_after_head: None,
        }
    }
}

impl ServerBehavior {
    /// Slow enough that a test can act while the transfer is in flight.
    pub fn throttled() -> Self {
        Self {
            piece_size: 1024,
            piece_delay: Duration::from_millis(5),
            ..Self::default()
        }
    }
}

struct State {
    body: Vec<u8>,
    behavior: ServerBehavior,
    ranges: Vec<Option<String>>,
}

pub struct RangeServer {
    base: String,
    state: Arc<Mutex<State>>,
}

impl RangeServer {
    pub fn start(body: Vec<u8>) -> Self {
        Self::start_with(body, ServerBehavior::default())
    }

    /// Starts a server in a background thread. It runs until the process exits.
    pub fn start_with(body: Vec<u8>, behavior: ServerBehavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().unwrap().port();
        let state = Arc::new(Mutex::new(State {
            body,
            behavior,
            ranges: Vec::new(),
        }));
        let shared = Arc::clone(&state);
        thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                let state = Arc::clone(&shared);
                thread::spawn(move || handle(stream, &state));
            }
        });
        Self {
            base: format!("http://127.0.0.1:{}", port),
            state,
        }
    }

    /// URL of the resource under the given file name (the path is not interpreted).
    pub fn url(&self, name: &str) -> String {
        format!("{}/files/{}", self.base, name)
    }

    pub fn set_behavior(&self, f: impl FnOnce(&mut ServerBehavior)) {
        f(&mut self.state.lock().unwrap().behavior);
    }

    pub fn set_body(&self, body: Vec<u8>) {
        self.state.lock().unwrap().body = body;
    }

    /// `Range` header of every GET received so far, in arrival order.
    pub fn ranges(&self) -> Vec<Option<String>> {
        self.state.lock().unwrap().ranges.clone()
    }

    pub fn request_count(&self) -> usize {
        self.state.lock().unwrap().ranges.len()
    }
}

fn read_head(stream: &mut TcpStream) -> Option<String> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        match stream.read(&mut chunk) {
            Ok(0) | Err(_) => return None,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
        if buf.len() > 64 * 1024 {
            return None;
        }
    }
    String::from_utf8(buf).ok()
}

fn handle(mut stream: TcpStream, state: &Mutex<State>) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));
    let Some(request) = read_head(&mut stream) else {
        return;
    };
    let (method, range) = parse_request(&request);
    if !method.eq_ignore_ascii_case("GET") {
        let _ = stream.write_all(b"HTTP/1.1 405 Method Not Allowed\r\nContent-Length: 0\r\n\r\n");
        return;
    }

    let (behavior, body) = {
        let mut state = state.lock().unwrap();
        state.ranges.push(range.clone());
        (state.behavior.clone(), state.body.clone())
    };

    if let Some(code) = behavior.fail_status {
        let msg = b"request failed";
        let head = format!(
            "HTTP/1.1 {} Failed\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            code,
            msg.len()
        );
        let _ = stream.write_all(head.as_bytes());
        let _ = stream.write_all(msg);
        return;
    }

    let total = body.len();
    let start = range
        .as_deref()
        .and_then(range_start)
        .filter(|_| behavior.support_ranges);
    let (status, slice) = match start {
        Some(start) if start >= total => ("416 Range Not Satisfiable", &body[0..0]),
        Some(start) => ("206 Partial Content", &body[start..]),
        None => ("200 OK", &body[..]),
    };

    let mut head = format!("HTTP/1.1 {}\r\nConnection: close\r\n", status);
    if !behavior.omit_content_length {
        head.push_str(&format!("Content-Length: {}\r\n", slice.len()));
    }
    if let Some(start) = start.filter(|s| *s < total) {
        head.push_str(&format!(
            "Content-Range: bytes {}-{}/{}\r\n",
            start,
            total - 1,
            total
        ));
    }
    head.push_str("\r\n");
    if stream.write_all(head.as_bytes()).is_err() {
        return;
    }
    if let Some(stall) = behavior.stall_after_head {
        thread::sleep(stall);
    }
    for piece in slice.chunks(behavior.piece_size.max(1)) {
        if stream.write_all(piece).is_err() {
            return;
        }
        if !behavior.piece_delay.is_zero() {
            thread::sleep(behavior.piece_delay);
        }
    }
}

/// Start offset of `bytes=N-` or `bytes=N-M`.
fn range_start(value: &str) -> Option<usize> {
    let range = value.trim().strip_prefix("bytes=")?;
    let (start, _) = range.split_once('-')?;
    start.trim().parse().ok()
}

/// Returns (method, raw Range header value).
fn parse_request(request: &str) -> (&str, Option<String>) {
    let mut lines = request.lines();
    let method = lines
        .next()
        .and_then(|l| l.split_whitespace().next())
        .unwrap_or("");
    let range = lines
        .take_while(|l| !l.trim().is_empty())
        .filter_map(|l| l.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("range"))
        .map(|(_, value)| value.trim().to_string());
    (method, range)
}
