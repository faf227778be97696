//! Constants for the download module (timeouts, buffer sizes).

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default HTTP read timeout (5 minutes for large archives).
pub const READ_TIMEOUT_SECS: u64 = 300;

/// Suffix appended to a destination path while its body is still streaming.
pub const PARTIAL_FILE_SUFFIX: &str = ".part";

/// Write buffer used when streaming response bodies to disk (256 KiB).
pub const WRITE_BUFFER_BYTES: usize = 256 * 1024;
