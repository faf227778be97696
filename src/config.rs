//! Run configuration consumed by the driver.

use std::path::PathBuf;

use url::Url;

use crate::download::{HttpTimeouts, RetryPolicy};
use crate::listing::TargetSuffix;

/// Everything one run needs, fixed before the listing is fetched.
///
/// Built by the binary from CLI flags, the config file, and defaults, in that
/// order of precedence.
#[derive(Debug, Clone)]
pub struct RunConfiguration {
    /// Absolute http(s) URL of the directory listing.
    pub base_url: Url,
    /// Local directory receiving archives and extraction folders.
    pub dest_root: PathBuf,
    /// Skip the download when the archive already exists locally.
    pub skip_existing: bool,
    /// Re-extract even when the extraction folder is already populated.
    pub force_reextract: bool,
    /// File suffix selecting links from the listing.
    pub suffix: TargetSuffix,
    /// Retry behaviour for file downloads.
    pub retry_policy: RetryPolicy,
    /// HTTP session timeouts.
    pub http: HttpTimeouts,
}

impl RunConfiguration {
    /// Creates a configuration with default policies for the given endpoints.
    #[must_use]
    pub fn new(base_url: Url, dest_root: impl Into<PathBuf>) -> Self {
        Self {
            base_url,
            dest_root: dest_root.into(),
            skip_existing: false,
            force_reextract: false,
            suffix: TargetSuffix::default(),
            retry_policy: RetryPolicy::default(),
            http: HttpTimeouts::default(),
        }
    }

    /// Sets the skip-existing policy.
    #[must_use]
    pub fn with_skip_existing(mut self, skip_existing: bool) -> Self {
        self.skip_existing = skip_existing;
        self
    }

    /// Sets the force-re-extract policy.
    #[must_use]
    pub fn with_force_reextract(mut self, force_reextract: bool) -> Self {
        self.force_reextract = force_reextract;
        self
    }

    /// Sets the target suffix.
    #[must_use]
    pub fn with_suffix(mut self, suffix: TargetSuffix) -> Self {
        self.suffix = suffix;
        self
    }

    /// Sets the download retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Sets the HTTP timeouts.
    #[must_use]
    pub fn with_http_timeouts(mut self, http: HttpTimeouts) -> Self {
        self.http = http;
        self
    }
}
