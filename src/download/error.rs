//! Error types for the download module.
//!
//! [`NetworkError`] covers every failure to retrieve a document or file from
//! the remote host. [`DownloadError`] covers the write path of a single file
//! download and wraps network failures that happen mid-transfer.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while retrieving a remote document or file.
#[derive(Debug, Error)]
pub enum NetworkError {
    /// Transport-level error (DNS resolution, connection refused, TLS errors, etc.)
    #[error("network error fetching {url}: {source}")]
    Request {
        /// The URL that failed.
        url: String,
        /// The underlying client error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("timeout fetching {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// Server answered with a non-success status.
    #[error("HTTP {status} fetching {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The URL is malformed or uses an unsupported scheme.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },
}

impl NetworkError {
    /// Creates a request error, promoting client timeouts to [`NetworkError::Timeout`].
    pub fn request(url: impl Into<String>, source: reqwest::Error) -> Self {
        let url = url.into();
        if source.is_timeout() {
            Self::Timeout { url }
        } else {
            Self::Request { url, source }
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }
}

/// Errors that can occur while downloading one archive to disk.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// The remote side failed before or during the transfer.
    #[error(transparent)]
    Network(#[from] NetworkError),

    /// File system error during download (create file, write, rename).
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Received body length does not match the advertised `Content-Length`.
    #[error("incomplete download of {url}: expected {expected_bytes} bytes, got {actual_bytes}")]
    Incomplete {
        /// The URL being downloaded.
        url: String,
        /// Advertised size in bytes.
        expected_bytes: u64,
        /// Bytes actually received.
        actual_bytes: u64,
    },
}

impl DownloadError {
    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a length mismatch error.
    pub fn incomplete(url: impl Into<String>, expected_bytes: u64, actual_bytes: u64) -> Self {
        Self::Incomplete {
            url: url.into(),
            expected_bytes,
            actual_bytes,
        }
    }
}

// `From<NetworkError>` is the only blanket conversion: io and reqwest errors
// need the path or URL attached, so they go through the constructors above.
