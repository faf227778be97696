//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

use zipgrab_core::{DEFAULT_MAX_RETRIES, DEFAULT_SUFFIX};

/// Mirror every archive linked from a remote directory listing.
///
/// Fetches the listing at `--base-url`, downloads each linked archive into
/// `--dest`, and extracts it into a folder named after the file.
#[derive(Parser, Debug)]
#[command(name = "zipgrab")]
#[command(author, version, about)]
pub struct Args {
    /// Directory listing URL (http or https)
    #[arg(long, value_name = "URL")]
    pub base_url: Option<String>,

    /// Destination directory for archives and extraction folders
    #[arg(long, value_name = "DIR")]
    pub dest: Option<PathBuf>,

    /// Do not download archives that already exist in the destination
    #[arg(long)]
    pub skip_existing: bool,

    /// Extract again even when the extraction folder is already populated
    #[arg(long)]
    pub force_reextract: bool,

    /// File suffix selecting links from the listing
    #[arg(long, value_name = "EXT", default_value = DEFAULT_SUFFIX)]
    pub suffix: String,

    /// Maximum download attempts per file for transient failures (0-10)
    #[arg(short = 'r', long, default_value_t = DEFAULT_MAX_RETRIES as u8, value_parser = clap::value_parser!(u8).range(0..=10))]
    pub max_retries: u8,

    /// HTTP connect timeout in seconds (1-3600)
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub connect_timeout: Option<u64>,

    /// HTTP read timeout in seconds (1-3600)
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub read_timeout: Option<u64>,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored log output
    #[arg(long)]
    pub no_color: bool,

    /// Config file path (defaults to $XDG_CONFIG_HOME/zipgrab/config.toml)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}
