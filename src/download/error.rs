//! Error types for the download module.
//!
//! A [`TransferError`] always marks the owning record failed; cancellation is
//! not an error and is reported through `TransferOutcome::Cancelled` instead.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while streaming a transfer to disk.
#[derive(Debug, Error)]
pub enum TransferError {
    /// Network-level error (DNS resolution, connection refused, TLS errors,
    /// mid-stream disconnects).
    #[error("network error downloading {url}: {source}")]
    Network {
        /// The media URL that failed.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// HTTP error response (4xx client errors, 5xx server errors).
    #[error("HTTP {status} downloading {url}")]
    HttpStatus {
        /// The media URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// File system error at the destination (open, write, flush).
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// The destination path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The media URL is malformed.
    #[error("invalid media URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// The per-transfer HTTP client could not be constructed (usually a
    /// rejected proxy route).
    #[error("failed to build transfer client: {detail}")]
    ClientBuild {
        /// What went wrong while building the client.
        detail: String,
    },
}

impl TransferError {
    /// Creates a network error from a reqwest error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates an IO error for the given destination path.
    pub fn io(path: PathBuf, source: std::io::Error) -> Self {
        Self::Io { path, source }
    }
}
