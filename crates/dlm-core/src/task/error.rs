//! Failure of one transfer run. Never leaves the task; it only drives ERROR.

use std::io;

#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    /// Connection, TLS, timeout or other libcurl failure.
    #[error("transport: {0}")]
    Curl(#[from] curl::Error),
    /// Response status outside 2xx.
    #[error("server responded with HTTP {0}")]
    Http(u32),
    /// No parseable status line was received.
    #[error("no HTTP status in response")]
    NoStatus,
    /// Content-Length absent, unparseable or zero.
    #[error("invalid content length: {0:?}")]
    InvalidContentLength(Option<u64>),
    /// On resume the server declared a length that does not match the
    /// remainder of the size recorded earlier (resource changed, or Range ignored).
    #[error("resume length mismatch: expected {expected} remaining bytes, server declared {declared}")]
    LengthMismatch { expected: u64, declared: u64 },
    /// Opening or writing the destination file failed.
    #[error("storage: {0}")]
    Storage(#[from] io::Error),
    #[error("cannot start transfer thread: {0}")]
    Spawn(io::Error),
}

impl TransferError {
    /// Coarse class used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            TransferError::Curl(_) | TransferError::Http(_) => "transport",
            TransferError::NoStatus | TransferError::InvalidContentLength(_) => "protocol",
            TransferError::LengthMismatch { .. } => "consistency",
            TransferError::Storage(_) | TransferError::Spawn(_) => "local-io",
        }
    }
}
