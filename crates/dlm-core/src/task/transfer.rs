//! One transfer run: ranged GET from the current offset, written chunk by chunk.
//!
//! The run owns the curl handle and the destination file for its whole
//! lifetime; both are dropped on every return path. Pause and cancel are seen
//! in two places: before each chunk is written, and in curl's progress
//! callback, which fires even while the socket is idle and aborts a read that
//! would otherwise block.

use std::cell::{Cell, RefCell};
use std::time::Duration;

use crate::storage::StorageWriter;

use super::error::TransferError;
use super::handle::TaskShared;
use super::response::ResponseHead;

/// Transport and chunking tunables for a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferOptions {
    /// Largest slice of body written and reported as one progress step.
    pub chunk_size: usize,
    pub connect_timeout: Duration,
    /// Abort when throughput stays below `low_speed_limit` bytes/s for `low_speed_time`.
    pub low_speed_limit: u32,
    pub low_speed_time: Duration,
    pub max_redirections: u32,
    pub user_agent: Option<String>,
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self {
            chunk_size: 1024,
            connect_timeout: Duration::from_secs(30),
            low_speed_limit: 1024,
            low_speed_time: Duration::from_secs(60),
            max_redirections: 10,
            user_agent: None,
        }
    }
}

/// How a run ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RunOutcome {
    /// Body fully received (or nothing was left to fetch).
    Finished,
    /// Paused, cancelled or replaced by a newer run before the end.
    Stopped,
}

/// Executes run `generation` for `shared`, resuming at its current byte count.
pub(crate) fn run(shared: &TaskShared, generation: u64) -> Result<RunOutcome, TransferError> {
    let offset = shared.bytes_transferred();
    if let Some(total) = shared.total_size() {
        if offset >= total {
            return Ok(RunOutcome::Finished);
        }
    }

    let mut writer = StorageWriter::open(&shared.destination, offset)?;
    let opts = &shared.options;
    let chunk_size = opts.chunk_size.max(1);

    let mut easy = curl::easy::Easy::new();
    easy.url(shared.url.as_str())?;
    easy.follow_location(true)?;
    easy.max_redirections(opts.max_redirections)?;
    easy.connect_timeout(opts.connect_timeout)?;
    easy.low_speed_limit(opts.low_speed_limit)?;
    easy.low_speed_time(opts.low_speed_time)?;
    // libcurl clamps this to its own minimum (1 KiB); we re-slice below anyway.
    easy.buffer_size(chunk_size)?;
    if let Some(agent) = &opts.user_agent {
        easy.useragent(agent)?;
    }
    // Range: curl expects "start-" and sends "Range: bytes=start-".
    easy.range(&format!("{}-", offset))?;
    easy.progress(true)?;

    let head = RefCell::new(ResponseHead::default());
    let accepted = Cell::new(false);
    let failure: RefCell<Option<TransferError>> = RefCell::new(None);

    let performed = {
        let mut transfer = easy.transfer();
        transfer.header_function(|line| {
            head.borrow_mut().observe_line(line);
            true
        })?;
        transfer.progress_function(|_, _, _, _| shared.state.is_current(generation))?;
        transfer.write_function(|data| {
            if !accepted.get() {
                accepted.set(true);
                if let Err(e) = accept_response(shared, generation, &head.borrow(), offset) {
                    *failure.borrow_mut() = Some(e);
                    return Ok(0);
                }
            }
            for chunk in data.chunks(chunk_size) {
                match shared.commit_chunk(generation, &mut writer, chunk) {
                    Ok(true) => {}
                    Ok(false) => return Ok(0),
                    Err(e) => {
                        *failure.borrow_mut() = Some(TransferError::Storage(e));
                        return Ok(0);
                    }
                }
            }
            Ok(data.len())
        })?;
        transfer.perform()
    };

    if let Some(e) = failure.into_inner() {
        return Err(e);
    }
    if !shared.state.is_current(generation) {
        return Ok(RunOutcome::Stopped);
    }
    performed?;

    if !accepted.get() {
        // No body arrived: the head alone decides (e.g. 404 without body, length 0).
        let mut head = head.into_inner();
        if head.status.is_none() {
            head.status = easy.response_code().ok().filter(|c| *c != 0);
        }
        accept_response(shared, generation, &head, offset)?;
    }

    writer.sync()?;
    Ok(RunOutcome::Finished)
}

/// Validates the final response head before the first body byte is written.
fn accept_response(
    shared: &TaskShared,
    generation: u64,
    head: &ResponseHead,
    offset: u64,
) -> Result<(), TransferError> {
    let declared = head.declared_length()?;
    match shared.total_size() {
        None => shared.record_total_size(generation, declared),
        Some(total) => {
            let expected = total.saturating_sub(offset);
            if declared != expected {
                return Err(TransferError::LengthMismatch { expected, declared });
            }
        }
    }
    Ok(())
}
