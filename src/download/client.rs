//! HTTP client wrapper for listing fetches and streaming archive downloads.
//!
//! This module provides the `HttpClient` struct which implements
//! [`Transport`] on top of a single pooled `reqwest` client.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, instrument};
use url::Url;

use super::constants::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS, WRITE_BUFFER_BYTES};
use super::error::{DownloadError, NetworkError};
use super::transport::{FetchedDocument, ProgressSink, Transport};
use crate::user_agent;

/// Connect and read timeouts for the HTTP session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTimeouts {
    /// Connection establishment timeout in seconds.
    pub connect_secs: u64,
    /// Whole-request timeout in seconds (covers slow archive bodies).
    pub read_secs: u64,
}

impl Default for HttpTimeouts {
    fn default() -> Self {
        Self {
            connect_secs: CONNECT_TIMEOUT_SECS,
            read_secs: READ_TIMEOUT_SECS,
        }
    }
}

/// HTTP client for listing fetches and file downloads.
///
/// Created once per run and reused for every request, taking advantage of
/// connection pooling.
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
///
/// use url::Url;
/// use zipgrab_core::download::{HttpClient, NoProgress, Transport};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = HttpClient::new();
/// let url = Url::parse("https://example.com/files/game.zip")?;
/// let bytes = client
///     .download_to(&url, Path::new("./game.zip.part"), &NoProgress)
///     .await?;
/// println!("Downloaded {bytes} bytes");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient {
    /// Creates a new HTTP client with default timeouts.
    ///
    /// Default configuration:
    /// - Connect timeout: 30 seconds
    /// - Read timeout: 5 minutes
    /// - Gzip decompression: enabled
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails to build with the static
    /// configuration. This should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new() -> Self {
        Self::with_timeouts(HttpTimeouts::default())
            .expect("failed to build HTTP client with static configuration")
    }

    /// Creates a new HTTP client with explicit timeout values.
    ///
    /// # Errors
    ///
    /// Returns the builder error when the TLS backend or system proxy
    /// configuration cannot be initialised.
    #[instrument(level = "debug")]
    pub fn with_timeouts(timeouts: HttpTimeouts) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(timeouts.connect_secs))
            .timeout(Duration::from_secs(timeouts.read_secs))
            .gzip(true)
            .user_agent(user_agent::default_user_agent())
            .build()?;
        Ok(Self { client })
    }

    async fn send_get(&self, url: &Url) -> Result<reqwest::Response, NetworkError> {
        if !matches!(url.scheme(), "http" | "https") {
            return Err(NetworkError::invalid_url(url.as_str()));
        }

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| NetworkError::request(url.as_str(), e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NetworkError::http_status(url.as_str(), status.as_u16()));
        }

        Ok(response)
    }
}

#[async_trait]
impl Transport for HttpClient {
    #[instrument(skip(self), fields(url = %url))]
    async fn fetch_document(&self, url: &Url) -> Result<FetchedDocument, NetworkError> {
        let response = self.send_get(url).await?;
        let final_url = response.url().clone();
        // `text()` honours the charset in Content-Type and replaces invalid
        // sequences, falling back to UTF-8.
        let body = response
            .text()
            .await
            .map_err(|e| NetworkError::request(url.as_str(), e))?;
        debug!(bytes = body.len(), final_url = %final_url, "fetched document");
        Ok(FetchedDocument {
            url: final_url,
            body,
        })
    }

    #[instrument(skip(self, progress), fields(url = %url, dest = %dest.display()))]
    async fn download_to(
        &self,
        url: &Url,
        dest: &Path,
        progress: &dyn ProgressSink,
    ) -> Result<u64, DownloadError> {
        debug!("starting download");
        let response = self.send_get(url).await?;
        let content_length = response.content_length();

        let file = File::create(dest)
            .await
            .map_err(|e| DownloadError::io(dest, e))?;

        let label = dest
            .file_name()
            .map_or_else(|| url.to_string(), |name| name.to_string_lossy().into_owned());
        progress.start(&label, content_length);
        let streamed = stream_to_file(file, response, url, dest, progress).await;
        progress.finish();
        let bytes_written = streamed?;

        if let Some(expected) = content_length
            && expected != bytes_written
        {
            return Err(DownloadError::incomplete(
                url.as_str(),
                expected,
                bytes_written,
            ));
        }

        debug!(bytes = bytes_written, "download streamed");
        Ok(bytes_written)
    }
}

/// Streams response body to file, returning bytes written.
async fn stream_to_file(
    file: File,
    response: reqwest::Response,
    url: &Url,
    file_path: &Path,
    progress: &dyn ProgressSink,
) -> Result<u64, DownloadError> {
    let mut writer = BufWriter::with_capacity(WRITE_BUFFER_BYTES, file);
    let mut stream = response.bytes_stream();
    let mut bytes_written: u64 = 0;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| NetworkError::request(url.as_str(), e))?;

        writer
            .write_all(&chunk)
            .await
            .map_err(|e| DownloadError::io(file_path, e))?;

        bytes_written += chunk.len() as u64;
        progress.advance(chunk.len() as u64);
    }

    writer
        .flush()
        .await
        .map_err(|e| DownloadError::io(file_path, e))?;
    writer
        .into_inner()
        .sync_all()
        .await
        .map_err(|e| DownloadError::io(file_path, e))?;

    Ok(bytes_written)
}
