//! Response status line and `Content-Length`, collected from curl header callbacks.

use super::error::TransferError;

/// What the transfer needs from the final response head.
///
/// curl reports the heads of redirects and interim (1xx) responses too; each new
/// status line resets the state so only the last head survives.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct ResponseHead {
    pub(crate) status: Option<u32>,
    pub(crate) content_length: Option<u64>,
}

impl ResponseHead {
    /// Feed one raw header line as delivered by curl (CRLF included).
    pub(crate) fn observe_line(&mut self, raw: &[u8]) {
        let Ok(line) = std::str::from_utf8(raw) else {
            return;
        };
        let line = line.trim();
        if line.starts_with("HTTP/") {
            *self = ResponseHead {
                status: line.split_whitespace().nth(1).and_then(|c| c.parse().ok()),
                content_length: None,
            };
            return;
        }
        if let Some((name, value)) = line.split_once(':') {
            if name.trim().eq_ignore_ascii_case("content-length") {
                self.content_length = value.trim().parse().ok();
            }
        }
    }

    /// Checks the status class and returns the declared, positive body length.
    pub(crate) fn declared_length(&self) -> Result<u64, TransferError> {
        match self.status {
            Some(code) if (200..300).contains(&code) => {}
            Some(code) => return Err(TransferError::Http(code)),
            None => return Err(TransferError::NoStatus),
        }
        match self.content_length {
            Some(len) if len > 0 => Ok(len),
            other => Err(TransferError::InvalidContentLength(other)),
        }
    }
}
