//! Per-entry outcomes and run totals.

use thiserror::Error;
use url::Url;

use crate::download::DownloadError;
use crate::extract::ExtractError;
use crate::naming::{LocalTarget, NormalizeError};

/// Steps an entry passes through while it is processed.
///
/// ```text
/// Pending -> Downloaded | SkippedDownload -> Extracted | SkippedExtract -> Done
/// ```
///
/// `Failed` can follow any step before `Done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    /// Not started.
    Pending,
    /// Archive fetched and moved onto its final path.
    Downloaded,
    /// Archive already present and skip-existing is on.
    SkippedDownload,
    /// Archive unpacked into its folder.
    Extracted,
    /// Folder already populated and re-extraction not forced.
    SkippedExtract,
    /// All steps recorded.
    Done,
    /// A step failed; later steps did not run.
    Failed,
}

/// Failure of a single entry. Never aborts the run.
#[derive(Debug, Error)]
pub enum EntryError {
    /// No usable local name.
    #[error(transparent)]
    Normalize(#[from] NormalizeError),

    /// Download failed after all attempts.
    #[error(transparent)]
    Download(#[from] DownloadError),

    /// Archive could not be unpacked.
    #[error(transparent)]
    Extract(#[from] ExtractError),
}

/// What happened to one listing entry.
#[derive(Debug)]
pub struct EntryReport {
    /// Remote archive URL.
    pub url: Url,
    /// Local target, absent when naming failed.
    pub target: Option<LocalTarget>,
    /// States visited, starting with [`EntryState::Pending`].
    pub states: Vec<EntryState>,
    /// Download attempts made (0 when skipped).
    pub download_attempts: u32,
    /// Bytes written by the successful download.
    pub bytes_downloaded: Option<u64>,
    /// Regular files written by extraction.
    pub files_extracted: Option<usize>,
    /// Cause of failure.
    pub error: Option<EntryError>,
}

impl EntryReport {
    pub(crate) fn new(url: Url) -> Self {
        Self {
            url,
            target: None,
            states: vec![EntryState::Pending],
            download_attempts: 0,
            bytes_downloaded: None,
            files_extracted: None,
            error: None,
        }
    }

    pub(crate) fn advance(&mut self, state: EntryState) {
        self.states.push(state);
    }

    pub(crate) fn fail(&mut self, error: impl Into<EntryError>) {
        self.error = Some(error.into());
        self.states.push(EntryState::Failed);
    }

    /// Last state reached.
    #[must_use]
    pub fn final_state(&self) -> EntryState {
        self.states.last().copied().unwrap_or(EntryState::Pending)
    }

    /// True when the entry ended in [`EntryState::Failed`].
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.final_state() == EntryState::Failed
    }

    /// True when `state` was visited.
    #[must_use]
    pub fn reached(&self, state: EntryState) -> bool {
        self.states.contains(&state)
    }
}

/// Counters over a whole run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Entries whose archive was extracted.
    pub completed: usize,
    /// Entries whose extraction folder was already populated.
    pub skipped: usize,
    /// Entries that failed at any step.
    pub failed: usize,
    /// Downloads performed.
    pub downloaded: usize,
    /// Downloads skipped because the archive already existed.
    pub download_skipped: usize,
    /// Listing entries ignored because their URL was already processed.
    pub duplicates: usize,
}

impl RunSummary {
    /// Entries processed (duplicates excluded).
    #[must_use]
    pub fn total(&self) -> usize {
        self.completed + self.skipped + self.failed
    }

    pub(crate) fn record(&mut self, entry: &EntryReport) {
        if entry.reached(EntryState::Downloaded) {
            self.downloaded += 1;
        }
        if entry.reached(EntryState::SkippedDownload) {
            self.download_skipped += 1;
        }
        match entry.final_state() {
            EntryState::Failed => self.failed += 1,
            _ if entry.reached(EntryState::Extracted) => self.completed += 1,
            _ => self.skipped += 1,
        }
    }
}

/// Entry reports in processing order plus totals.
#[derive(Debug, Default)]
pub struct RunReport {
    /// One report per distinct URL, in listing order.
    pub entries: Vec<EntryReport>,
    /// Totals.
    pub summary: RunSummary,
}

impl RunReport {
    pub(crate) fn push(&mut self, entry: EntryReport) {
        self.summary.record(&entry);
        self.entries.push(entry);
    }

    pub(crate) fn record_duplicate(&mut self) {
        self.summary.duplicates += 1;
    }

    /// Reports of entries that failed.
    pub fn failures(&self) -> impl Iterator<Item = &EntryReport> {
        self.entries.iter().filter(|entry| entry.is_failed())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::download::NetworkError;

    fn report(states: &[EntryState]) -> EntryReport {
        let mut entry = EntryReport::new(Url::parse("https://example.com/a.zip").unwrap());
        for state in states {
            entry.advance(*state);
        }
        entry
    }

    #[test]
    fn test_summary_counts_completed_and_skipped() {
        let mut run = RunReport::default();
        run.push(report(&[
            EntryState::Downloaded,
            EntryState::Extracted,
            EntryState::Done,
        ]));
        run.push(report(&[
            EntryState::SkippedDownload,
            EntryState::SkippedExtract,
            EntryState::Done,
        ]));

        assert_eq!(
            run.summary,
            RunSummary {
                completed: 1,
                skipped: 1,
                failed: 0,
                downloaded: 1,
                download_skipped: 1,
                duplicates: 0,
            }
        );
        assert_eq!(run.summary.total(), 2);
    }

    #[test]
    fn test_summary_counts_failure_after_download() {
        let mut entry = report(&[EntryState::Downloaded]);
        entry.fail(ExtractError::task("cancelled"));

        let mut run = RunReport::default();
        run.push(entry);

        assert_eq!(run.summary.failed, 1);
        assert_eq!(run.summary.downloaded, 1);
        assert_eq!(run.summary.completed, 0);
        assert_eq!(run.failures().count(), 1);
    }

    #[test]
    fn test_entry_report_final_state() {
        let mut entry = report(&[]);
        assert_eq!(entry.final_state(), EntryState::Pending);
        entry.fail(DownloadError::from(NetworkError::http_status(
            "https://example.com/a.zip",
            404,
        )));
        assert!(entry.is_failed());
        assert!(matches!(entry.error, Some(EntryError::Download(_))));
    }
}
