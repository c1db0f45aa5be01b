//! URL validation and destination filename derivation.
//!
//! A [`TaskUrl`] is the only way to hand a locator to a download task, so every
//! task is guaranteed an absolute `http`/`https` URL. The local filename comes
//! from the last path segment, sanitized for Linux filesystems.

mod path;
mod sanitize;

pub use path::last_path_segment;
pub use sanitize::sanitize_file_name;

use std::fmt;
use std::str::FromStr;

/// Default filename when the URL path yields nothing usable.
pub const DEFAULT_FILENAME: &str = "download.bin";

/// Rejection reasons for a download URL. No task is created for any of these.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UrlError {
    #[error("unsupported URL scheme in {0:?}: only http:// and https:// are accepted")]
    UnsupportedScheme(String),
    #[error("malformed URL {input:?}: {reason}")]
    Malformed { input: String, reason: String },
}

/// An absolute HTTP(S) URL accepted for download. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskUrl(url::Url);

impl TaskUrl {
    /// Validates `input` as a download URL. Syntax only; nothing is fetched.
    pub fn parse(input: &str) -> Result<Self, UrlError> {
        let trimmed = input.trim();
        let lower = trimmed.to_ascii_lowercase();
        if !lower.starts_with("http://") && !lower.starts_with("https://") {
            return Err(UrlError::UnsupportedScheme(trimmed.to_string()));
        }
        let parsed = url::Url::parse(trimmed).map_err(|e| UrlError::Malformed {
            input: trimmed.to_string(),
            reason: e.to_string(),
        })?;
        if parsed.host_str().map_or(true, str::is_empty) {
            return Err(UrlError::Malformed {
                input: trimmed.to_string(),
                reason: "missing host".to_string(),
            });
        }
        Ok(Self(parsed))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn as_url(&self) -> &url::Url {
        &self.0
    }

    /// Local filename for this URL: the sanitized last path segment, or
    /// [`DEFAULT_FILENAME`] when the path ends in `/` or has no usable segment.
    pub fn file_name(&self) -> String {
        let sanitized = last_path_segment(&self.0)
            .map(|seg| sanitize_file_name(&seg))
            .unwrap_or_default();
        if sanitized.is_empty() || sanitized == "." || sanitized == ".." {
            DEFAULT_FILENAME.to_string()
        } else {
            sanitized
        }
    }
}

impl FromStr for TaskUrl {
    type Err = UrlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for TaskUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}
