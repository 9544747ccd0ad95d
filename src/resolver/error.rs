//! Error types for source resolution.
//!
//! Resolution failures are never fatal: the scheduler converts them into a
//! failed record without starting a transfer.

use thiserror::Error;

/// Errors that can occur while resolving a host page to a media URL.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// Network-level error fetching the host page (includes the short fetch
    /// timeout expiring).
    #[error("network error fetching {url}: {source}")]
    Network {
        /// The page URL that failed.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// The host answered with a non-success status.
    #[error("HTTP {status} fetching {url}")]
    HttpStatus {
        /// The page URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The page fetched but the expected player configuration was absent:
    /// layout changed, content blocked, or the URL never was a player page.
    #[error("no embedded player configuration found at {url}")]
    PatternNotFound {
        /// The page URL that was scanned.
        url: String,
    },

    /// The submitted source URL is malformed.
    #[error("invalid source URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// No registered resolver can handle the source URL.
    #[error("no resolver can handle {url}")]
    Unsupported {
        /// The unhandled URL string.
        url: String,
    },

    /// The resolver HTTP client could not be constructed.
    #[error("failed to build resolver client: {detail}")]
    ClientBuild {
        /// What went wrong while building the client.
        detail: String,
    },
}

impl ResolveError {
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

    /// Creates a pattern-not-found error.
    pub fn pattern_not_found(url: impl Into<String>) -> Self {
        Self::PatternNotFound { url: url.into() }
    }

    /// Creates an invalid-URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }
}
