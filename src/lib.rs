//! zipgrab core library
//!
//! Mirrors the archives exposed under a remote directory listing: fetch the
//! listing, pick out the links ending in the target suffix, download each
//! file, and unpack it into a folder named after it.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`listing`] - Listing fetch and hyperlink extraction
//! - [`naming`] - Local file and folder names, collision handling
//! - [`download`] - HTTP transport, streaming downloads, retry policy
//! - [`extract`] - Staged, path-safe zip extraction
//! - [`driver`] - Per-entry download-and-extract state machine
//! - [`config`] - Run configuration

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod download;
pub mod driver;
pub mod extract;
pub mod listing;
pub mod naming;
mod user_agent;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export commonly used types
pub use config::RunConfiguration;
pub use download::{
    DEFAULT_MAX_RETRIES, DownloadError, FailureType, HttpClient, HttpTimeouts, NetworkError,
    NoProgress, ProgressSink, RetryDecision, RetryPolicy, Transport, classify_error,
};
pub use driver::{Driver, EntryError, EntryReport, EntryState, RunReport, RunSummary};
pub use extract::{ExtractError, extract_into, extract_zip};
pub use listing::{
    DEFAULT_SUFFIX, Listing, RemoteEntry, SuffixError, TargetSuffix, extract_links, fetch_listing,
};
pub use naming::{LocalTarget, NameNormalizer, NormalizeError};
