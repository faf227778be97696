//! CLI entry point for zipgrab.

use std::io::{self, IsTerminal};
use std::process::ExitCode;

use anyhow::{Context, Result};
use tracing::{debug, error, info};
use zipgrab_core::{Driver, HttpClient, ProgressSink, RunReport, fetch_listing};

mod app_config;
mod cli;
mod progress;
mod terminal;

use progress::TerminalProgress;

/// How the process ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProcessExit {
    /// The listing was processed; individual entries may still have failed.
    Success,
    /// Configuration was invalid or the listing could not be fetched.
    Failure,
}

impl From<ProcessExit> for ExitCode {
    fn from(exit: ProcessExit) -> Self {
        match exit {
            ProcessExit::Success => ExitCode::SUCCESS,
            ProcessExit::Failure => ExitCode::FAILURE,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(exit) => exit.into(),
        Err(error) => {
            eprintln!("Error: {error:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<ProcessExit> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let (args, sources) = app_config::parse_cli_with_sources();
    let file_config = app_config::load_file_config(args.config.as_deref())?;
    let settings = app_config::resolve_settings(&args, &sources, file_config.as_ref())?;

    let no_color = terminal::is_no_color_requested(args.no_color);
    let progress = TerminalProgress::new();
    terminal::init_tracing(
        settings.default_log_level(),
        sources.forces_log_level(),
        no_color,
        progress.log_writer(),
    );
    debug!(?args, "CLI arguments parsed");

    let config = settings.run;
    info!(
        base_url = %config.base_url,
        dest = %config.dest_root.display(),
        suffix = %config.suffix,
        "zipgrab starting"
    );

    std::fs::create_dir_all(&config.dest_root).with_context(|| {
        format!(
            "Failed to create destination directory '{}'",
            config.dest_root.display()
        )
    })?;

    let client =
        HttpClient::with_timeouts(config.http).context("Failed to initialise HTTP client")?;

    let listing = match fetch_listing(&client, &config.base_url).await {
        Ok(listing) => listing,
        Err(error) => {
            error!(error = %error, "failed to fetch listing");
            return Ok(ProcessExit::Failure);
        }
    };

    debug!(listing_url = %listing.base_url(), "listing fetched");

    let suffix = config.suffix.clone();
    let show_progress = terminal::should_show_progress(
        io::stderr().is_terminal(),
        settings.quiet,
        terminal::is_dumb_terminal(),
    );

    let mut driver = Driver::new(config, &client);
    if show_progress {
        driver = driver.with_progress(&progress as &dyn ProgressSink);
    }
    let report = driver.run(listing.entries(&suffix)).await;

    print_summary(&report, settings.quiet);
    Ok(ProcessExit::Success)
}

fn print_summary(report: &RunReport, quiet: bool) {
    for failure in report.failures() {
        let reason = failure
            .error
            .as_ref()
            .map_or_else(|| "unknown error".to_string(), ToString::to_string);
        eprintln!("failed: {} ({reason})", failure.url);
    }

    if quiet {
        return;
    }
    let summary = &report.summary;
    if summary.total() == 0 {
        eprintln!("No matching archives found in listing.");
        return;
    }
    eprintln!(
        "Done: {} extracted, {} already extracted, {} failed ({} downloaded, {} download skipped, {} duplicate links)",
        summary.completed,
        summary.skipped,
        summary.failed,
        summary.downloaded,
        summary.download_skipped,
        summary.duplicates,
    );
}
