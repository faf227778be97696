//! HTTP transport for listing fetches and streaming archive downloads.
//!
//! # Features
//!
//! - One pooled client per run behind the [`Transport`] trait
//! - Streaming downloads (memory-efficient for large archives)
//! - Configurable timeouts (30s connect, 5min read by default)
//! - `Content-Length` verification of received bodies
//! - Retry classification with exponential backoff ([`RetryPolicy`])
//!
//! # Example
//!
//! ```no_run
//! use url::Url;
//! use zipgrab_core::download::{HttpClient, Transport};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = HttpClient::new();
//! let listing = client
//!     .fetch_document(&Url::parse("https://archive.org/download/SomeCollection/")?)
//!     .await?;
//! println!("{} bytes of listing from {}", listing.body.len(), listing.url);
//! # Ok(())
//! # }
//! ```

mod client;
pub(crate) mod constants;
mod error;
mod retry;
mod transport;

pub use client::{HttpClient, HttpTimeouts};
pub use error::{DownloadError, NetworkError};
pub use retry::{DEFAULT_MAX_RETRIES, FailureType, RetryDecision, RetryPolicy, classify_error};
pub use transport::{FetchedDocument, NoProgress, ProgressSink, Transport};
