//! Transport abstraction shared by the listing fetcher and the driver.
//!
//! The HTTP session is constructed once per run and handed around as a
//! `&dyn Transport`, so tests can substitute an in-memory fake.

use std::path::Path;

use async_trait::async_trait;
use url::Url;

use super::{DownloadError, NetworkError};

/// Receives byte-level progress for one file transfer.
pub trait ProgressSink: Send + Sync {
    /// A transfer of `label` is starting; `total_bytes` is known when the
    /// server advertised a length.
    fn start(&self, label: &str, total_bytes: Option<u64>);

    /// `bytes` more bytes were written to disk.
    fn advance(&self, bytes: u64);

    /// The transfer ended, successfully or not.
    fn finish(&self);
}

/// Progress sink that discards every update.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn start(&self, _label: &str, _total_bytes: Option<u64>) {}

    fn advance(&self, _bytes: u64) {}

    fn finish(&self) {}
}

/// A text document and the URL it was finally served from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedDocument {
    /// URL after following redirects; relative links resolve against it.
    pub url: Url,
    /// Decoded body text.
    pub body: String,
}

/// Retrieval operations the pipeline needs from the network.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetches a text document (the directory listing).
    ///
    /// # Errors
    ///
    /// Returns [`NetworkError`] when the host is unreachable, the request
    /// times out, or the server answers with a non-success status.
    async fn fetch_document(&self, url: &Url) -> Result<FetchedDocument, NetworkError>;

    /// Streams the body at `url` into the file at `dest`, creating or
    /// truncating it. Returns the number of bytes written.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError`] on network faults, write faults, or a body
    /// shorter or longer than the advertised length.
    async fn download_to(
        &self,
        url: &Url,
        dest: &Path,
        progress: &dyn ProgressSink,
    ) -> Result<u64, DownloadError>;
}
