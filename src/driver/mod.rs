//! Download-and-extract driver.
//!
//! Processes listing entries one at a time, in listing order:
//!
//! 1. derive the local target ([`NameNormalizer`]),
//! 2. download the archive unless skip-existing applies,
//! 3. extract it unless its folder is already populated and re-extraction
//!    is not forced.
//!
//! A failure at any step is recorded in that entry's [`EntryReport`] and the
//! run moves on to the next entry.

mod report;

use std::collections::HashSet;
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::config::RunConfiguration;
use crate::download::constants::PARTIAL_FILE_SUFFIX;
use crate::download::{
    DownloadError, NoProgress, ProgressSink, RetryDecision, Transport, classify_error,
};
use crate::extract::{self, ExtractError};
use crate::listing::RemoteEntry;
use crate::naming::{LocalTarget, NameNormalizer};

pub use report::{EntryError, EntryReport, EntryState, RunReport, RunSummary};

/// Drives every listing entry through download and extraction.
pub struct Driver<'a> {
    config: RunConfiguration,
    transport: &'a dyn Transport,
    progress: &'a dyn ProgressSink,
}

impl<'a> Driver<'a> {
    /// Creates a driver using `transport` for every download.
    #[must_use]
    pub fn new(config: RunConfiguration, transport: &'a dyn Transport) -> Self {
        Self {
            config,
            transport,
            progress: &NoProgress,
        }
    }

    /// Reports download progress to `progress`.
    #[must_use]
    pub fn with_progress(mut self, progress: &'a dyn ProgressSink) -> Self {
        self.progress = progress;
        self
    }

    /// Configuration this driver runs with.
    #[must_use]
    pub fn config(&self) -> &RunConfiguration {
        &self.config
    }

    /// Processes `entries` in order and reports every outcome.
    ///
    /// Entries whose URL was already seen in this run are ignored and only
    /// counted as duplicates.
    #[instrument(skip_all, fields(dest_root = %self.config.dest_root.display()))]
    pub async fn run<I>(&self, entries: I) -> RunReport
    where
        I: IntoIterator<Item = RemoteEntry>,
    {
        if let Err(error) = tokio::fs::create_dir_all(&self.config.dest_root).await {
            warn!(error = %error, "cannot create destination root");
        }

        let mut normalizer =
            NameNormalizer::new(self.config.dest_root.clone(), self.config.suffix.clone());
        let mut seen: HashSet<Url> = HashSet::new();
        let mut report = RunReport::default();

        for entry in entries {
            if !seen.insert(entry.url.clone()) {
                debug!(url = %entry.url, "ignoring duplicate listing entry");
                report.record_duplicate();
                continue;
            }
            let outcome = self.process_entry(&mut normalizer, entry).await;
            report.push(outcome);
        }

        let summary = &report.summary;
        info!(
            completed = summary.completed,
            skipped = summary.skipped,
            failed = summary.failed,
            downloaded = summary.downloaded,
            download_skipped = summary.download_skipped,
            duplicates = summary.duplicates,
            "run finished"
        );
        report
    }

    #[instrument(skip_all, fields(url = %entry.url))]
    async fn process_entry(
        &self,
        normalizer: &mut NameNormalizer,
        entry: RemoteEntry,
    ) -> EntryReport {
        let mut report = EntryReport::new(entry.url.clone());

        let target = match normalizer.normalize(&entry) {
            Ok(target) => target,
            Err(error) => {
                warn!(error = %error, "cannot derive a local name");
                report.fail(error);
                return report;
            }
        };
        report.target = Some(target.clone());

        if self.config.skip_existing && path_exists(&target.dest_path).await {
            info!(file = %target.clean_file_name, "archive present, skipping download");
            report.advance(EntryState::SkippedDownload);
        } else {
            let (result, attempts) = self.download(&entry.url, &target).await;
            report.download_attempts = attempts;
            match result {
                Ok(bytes) => {
                    info!(file = %target.clean_file_name, bytes, "downloaded");
                    report.bytes_downloaded = Some(bytes);
                    report.advance(EntryState::Downloaded);
                }
                Err(error) => {
                    warn!(file = %target.clean_file_name, attempts, error = %error, "download failed");
                    report.fail(error);
                    return report;
                }
            }
        }

        if !self.config.force_reextract && dir_is_populated(&target.extract_dir).await {
            info!(dir = %target.extract_dir.display(), "already extracted, skipping");
            report.advance(EntryState::SkippedExtract);
        } else {
            match extract_blocking(target.dest_path.clone(), target.extract_dir.clone()).await {
                Ok(files) => {
                    info!(dir = %target.extract_dir.display(), files, "extracted");
                    report.files_extracted = Some(files);
                    report.advance(EntryState::Extracted);
                }
                Err(error) => {
                    warn!(file = %target.clean_file_name, error = %error, "extraction failed");
                    report.fail(error);
                    return report;
                }
            }
        }

        report.advance(EntryState::Done);
        report
    }

    /// Downloads into `<dest_path>.part` with retries, then renames it into
    /// place. Returns the outcome and the number of attempts made.
    async fn download(&self, url: &Url, target: &LocalTarget) -> (Result<u64, DownloadError>, u32) {
        let part_path = partial_path(&target.dest_path);
        let policy = &self.config.retry_policy;
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            debug!(attempt, "attempting download");

            let error = match self
                .transport
                .download_to(url, &part_path, self.progress)
                .await
            {
                Ok(bytes) => match tokio::fs::rename(&part_path, &target.dest_path).await {
                    Ok(()) => return (Ok(bytes), attempt),
                    Err(e) => DownloadError::io(&target.dest_path, e),
                },
                Err(error) => error,
            };

            match policy.should_retry(classify_error(&error), attempt) {
                RetryDecision::Retry {
                    delay,
                    attempt: next_attempt,
                } => {
                    info!(
                        url = %url,
                        attempt = next_attempt,
                        max_attempts = policy.max_attempts(),
                        delay_ms = delay.as_millis(),
                        error = %error,
                        "retrying download"
                    );
                    tokio::time::sleep(delay).await;
                }
                RetryDecision::DoNotRetry { reason } => {
                    debug!(url = %url, %reason, "not retrying download");
                    remove_partial(&part_path).await;
                    return (Err(error), attempt);
                }
            }
        }
    }
}

/// `<path>.part`, the name a download is written under until complete.
#[must_use]
pub fn partial_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(PARTIAL_FILE_SUFFIX);
    PathBuf::from(name)
}

async fn remove_partial(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "removed partial download"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "failed to remove partial download"),
    }
}

async fn path_exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

async fn dir_is_populated(path: &Path) -> bool {
    match tokio::fs::read_dir(path).await {
        Ok(mut entries) => matches!(entries.next_entry().await, Ok(Some(_))),
        Err(_) => false,
    }
}

async fn extract_blocking(archive: PathBuf, extract_dir: PathBuf) -> Result<usize, ExtractError> {
    tokio::task::spawn_blocking(move || extract::extract_into(&archive, &extract_dir))
        .await
        .map_err(|e| ExtractError::task(e.to_string()))?
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;
    use std::io::{Cursor, Write};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use tempfile::TempDir;
    use zip::ZipWriter;
    use zip::write::SimpleFileOptions;

    use super::*;
    use crate::download::{FetchedDocument, NetworkError, RetryPolicy};

    /// Serves canned responses per URL; the last response repeats.
    #[derive(Default)]
    struct FakeTransport {
        responses: Mutex<HashMap<String, Vec<Result<Vec<u8>, u16>>>>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeTransport {
        fn serve(self, url: &str, responses: Vec<Result<Vec<u8>, u16>>) -> Self {
            self.responses
                .lock()
                .unwrap()
                .insert(url.to_string(), responses);
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transport for FakeTransport {
        async fn fetch_document(&self, url: &Url) -> Result<FetchedDocument, NetworkError> {
            Err(NetworkError::invalid_url(url.as_str()))
        }

        async fn download_to(
            &self,
            url: &Url,
            dest: &Path,
            _progress: &dyn ProgressSink,
        ) -> Result<u64, DownloadError> {
            self.calls.lock().unwrap().push(url.to_string());
            let response = {
                let mut responses = self.responses.lock().unwrap();
                let queue = responses.get_mut(url.as_str()).unwrap();
                if queue.len() > 1 {
                    queue.remove(0)
                } else {
                    queue[0].clone()
                }
            };
            match response {
                Ok(body) => {
                    std::fs::write(dest, &body).unwrap();
                    Ok(body.len() as u64)
                }
                Err(status) => {
                    std::fs::write(dest, b"partial").unwrap();
                    Err(NetworkError::http_status(url.as_str(), status).into())
                }
            }
        }
    }

    fn zip_bytes(members: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, data) in members {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(data.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    fn entry(url: &str) -> RemoteEntry {
        let url = Url::parse(url).unwrap();
        let raw_name = url.path_segments().unwrap().next_back().unwrap().to_string();
        RemoteEntry { url, raw_name }
    }

    fn config(dest: &Path) -> RunConfiguration {
        RunConfiguration::new(Url::parse("https://host.test/set/").unwrap(), dest)
            .with_retry_policy(RetryPolicy::immediate(3))
    }

    #[tokio::test]
    async fn test_run_downloads_and_extracts_in_order() {
        let tmp = TempDir::new().unwrap();
        let transport = FakeTransport::default()
            .serve("https://host.test/set/A.zip", vec![Ok(zip_bytes(&[("a.txt", "a")]))])
            .serve("https://host.test/set/B.zip", vec![Ok(zip_bytes(&[("b.txt", "b")]))])
            .serve("https://host.test/set/C.zip", vec![Ok(zip_bytes(&[("c.txt", "c")]))]);

        let driver = Driver::new(config(tmp.path()), &transport);
        let report = driver
            .run([
                entry("https://host.test/set/A.zip"),
                entry("https://host.test/set/B.zip"),
                entry("https://host.test/set/C.zip"),
            ])
            .await;

        assert_eq!(
            transport.calls(),
            [
                "https://host.test/set/A.zip",
                "https://host.test/set/B.zip",
                "https://host.test/set/C.zip",
            ]
        );
        assert_eq!(report.summary.completed, 3);
        assert_eq!(report.summary.downloaded, 3);
        assert_eq!(
            report.entries[0].states,
            [
                EntryState::Pending,
                EntryState::Downloaded,
                EntryState::Extracted,
                EntryState::Done
            ]
        );
        assert!(tmp.path().join("A.zip").is_file());
        assert_eq!(std::fs::read_to_string(tmp.path().join("B/b.txt")).unwrap(), "b");
        assert!(!partial_path(&tmp.path().join("C.zip")).exists());
    }

    #[tokio::test]
    async fn test_run_with_skip_existing_does_not_download_again() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("A.zip"), zip_bytes(&[("a.txt", "a")])).unwrap();
        let transport = FakeTransport::default()
            .serve("https://host.test/set/A.zip", vec![Ok(zip_bytes(&[("new.txt", "n")]))]);

        let driver = Driver::new(config(tmp.path()).with_skip_existing(true), &transport);
        let report = driver.run([entry("https://host.test/set/A.zip")]).await;

        assert!(transport.calls().is_empty());
        assert_eq!(report.summary.download_skipped, 1);
        assert_eq!(report.summary.completed, 1);
        assert!(tmp.path().join("A/a.txt").exists());
    }

    #[tokio::test]
    async fn test_run_skips_populated_extract_dir_unless_forced() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("A")).unwrap();
        std::fs::write(tmp.path().join("A/old.txt"), "old").unwrap();
        let transport = FakeTransport::default()
            .serve("https://host.test/set/A.zip", vec![Ok(zip_bytes(&[("a.txt", "a")]))]);

        let report = Driver::new(config(tmp.path()), &transport)
            .run([entry("https://host.test/set/A.zip")])
            .await;
        assert_eq!(report.summary.skipped, 1);
        assert_eq!(report.entries[0].final_state(), EntryState::Done);
        assert!(report.entries[0].reached(EntryState::SkippedExtract));
        assert!(tmp.path().join("A/old.txt").exists());

        let report = Driver::new(config(tmp.path()).with_force_reextract(true), &transport)
            .run([entry("https://host.test/set/A.zip")])
            .await;
        assert_eq!(report.summary.completed, 1);
        assert!(tmp.path().join("A/a.txt").exists());
        assert!(!tmp.path().join("A/old.txt").exists());
    }

    #[tokio::test]
    async fn test_run_empty_extract_dir_is_not_treated_as_extracted() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("A")).unwrap();
        let transport = FakeTransport::default()
            .serve("https://host.test/set/A.zip", vec![Ok(zip_bytes(&[("a.txt", "a")]))]);

        let report = Driver::new(config(tmp.path()), &transport)
            .run([entry("https://host.test/set/A.zip")])
            .await;

        assert_eq!(report.summary.completed, 1);
        assert!(tmp.path().join("A/a.txt").exists());
    }

    #[tokio::test]
    async fn test_run_retries_transient_failures() {
        let tmp = TempDir::new().unwrap();
        let transport = FakeTransport::default().serve(
            "https://host.test/set/A.zip",
            vec![Err(503), Err(502), Ok(zip_bytes(&[("a.txt", "a")]))],
        );

        let report = Driver::new(config(tmp.path()), &transport)
            .run([entry("https://host.test/set/A.zip")])
            .await;

        assert_eq!(transport.calls().len(), 3);
        assert_eq!(report.entries[0].download_attempts, 3);
        assert_eq!(report.summary.completed, 1);
    }

    #[tokio::test]
    async fn test_run_permanent_failure_leaves_no_file_and_continues() {
        let tmp = TempDir::new().unwrap();
        let transport = FakeTransport::default()
            .serve("https://host.test/set/A.zip", vec![Err(404)])
            .serve("https://host.test/set/B.zip", vec![Ok(zip_bytes(&[("b.txt", "b")]))]);

        let report = Driver::new(config(tmp.path()), &transport)
            .run([
                entry("https://host.test/set/A.zip"),
                entry("https://host.test/set/B.zip"),
            ])
            .await;

        assert_eq!(transport.calls().len(), 2);
        assert_eq!(report.entries[0].download_attempts, 1);
        assert!(report.entries[0].is_failed());
        assert!(matches!(
            report.entries[0].error,
            Some(EntryError::Download(_))
        ));
        assert!(!tmp.path().join("A.zip").exists());
        assert!(!partial_path(&tmp.path().join("A.zip")).exists());
        assert_eq!(report.summary.failed, 1);
        assert_eq!(report.summary.completed, 1);
    }

    #[tokio::test]
    async fn test_run_exhausted_retries_fail_entry() {
        let tmp = TempDir::new().unwrap();
        let transport =
            FakeTransport::default().serve("https://host.test/set/A.zip", vec![Err(500)]);

        let report = Driver::new(config(tmp.path()), &transport)
            .run([entry("https://host.test/set/A.zip")])
            .await;

        assert_eq!(transport.calls().len(), 3);
        assert!(report.entries[0].is_failed());
        assert!(!partial_path(&tmp.path().join("A.zip")).exists());
    }

    #[tokio::test]
    async fn test_run_corrupt_archive_fails_only_that_entry() {
        let tmp = TempDir::new().unwrap();
        let transport = FakeTransport::default()
            .serve("https://host.test/set/A.zip", vec![Ok(zip_bytes(&[("a.txt", "a")]))])
            .serve("https://host.test/set/B.zip", vec![Ok(b"garbage".to_vec())])
            .serve("https://host.test/set/C.zip", vec![Ok(zip_bytes(&[("c.txt", "c")]))]);

        let report = Driver::new(config(tmp.path()), &transport)
            .run([
                entry("https://host.test/set/A.zip"),
                entry("https://host.test/set/B.zip"),
                entry("https://host.test/set/C.zip"),
            ])
            .await;

        assert_eq!(report.summary.failed, 1);
        assert_eq!(report.summary.completed, 2);
        let failed = report.failures().next().unwrap();
        assert_eq!(failed.url.as_str(), "https://host.test/set/B.zip");
        assert!(failed.reached(EntryState::Downloaded));
        assert!(matches!(failed.error, Some(EntryError::Extract(_))));
        assert!(!tmp.path().join("B").exists());
    }

    #[tokio::test]
    async fn test_run_ignores_duplicate_urls() {
        let tmp = TempDir::new().unwrap();
        let transport = FakeTransport::default()
            .serve("https://host.test/set/A.zip", vec![Ok(zip_bytes(&[("a.txt", "a")]))]);

        let report = Driver::new(config(tmp.path()), &transport)
            .run([
                entry("https://host.test/set/A.zip"),
                entry("https://host.test/set/A.zip"),
            ])
            .await;

        assert_eq!(transport.calls().len(), 1);
        assert_eq!(report.entries.len(), 1);
        assert_eq!(report.summary.duplicates, 1);
    }

    #[tokio::test]
    async fn test_run_colliding_names_get_distinct_targets() {
        let tmp = TempDir::new().unwrap();
        let transport = FakeTransport::default()
            .serve("https://host.test/one/game.zip", vec![Ok(zip_bytes(&[("1.txt", "1")]))])
            .serve("https://host.test/two/game.zip", vec![Ok(zip_bytes(&[("2.txt", "2")]))]);

        let report = Driver::new(config(tmp.path()), &transport)
            .run([
                entry("https://host.test/one/game.zip"),
                entry("https://host.test/two/game.zip"),
            ])
            .await;

        assert_eq!(report.summary.completed, 2);
        assert!(tmp.path().join("game/1.txt").exists());
        assert!(tmp.path().join("game_2/2.txt").exists());
    }

    #[tokio::test]
    async fn test_run_staging_dir_of_one_entry_never_replaces_another() {
        let tmp = TempDir::new().unwrap();
        let transport = FakeTransport::default()
            .serve(
                "https://host.test/set/.game.partial.zip",
                vec![Ok(zip_bytes(&[("first.txt", "1")]))],
            )
            .serve("https://host.test/set/game.zip", vec![Ok(zip_bytes(&[("second.txt", "2")]))]);

        let report = Driver::new(config(tmp.path()), &transport)
            .run([
                entry("https://host.test/set/.game.partial.zip"),
                entry("https://host.test/set/game.zip"),
            ])
            .await;

        assert_eq!(report.summary.completed, 2);
        assert_eq!(
            std::fs::read_to_string(tmp.path().join(".game.partial/first.txt")).unwrap(),
            "1"
        );
        assert!(tmp.path().join("game_2/second.txt").exists());
    }

    #[tokio::test]
    async fn test_run_extract_dir_never_blocks_another_partial_download() {
        let tmp = TempDir::new().unwrap();
        let transport = FakeTransport::default()
            .serve(
                "https://host.test/set/game.zip.part.zip",
                vec![Ok(zip_bytes(&[("first.txt", "1")]))],
            )
            .serve("https://host.test/set/game.zip", vec![Ok(zip_bytes(&[("second.txt", "2")]))]);

        let report = Driver::new(config(tmp.path()), &transport)
            .run([
                entry("https://host.test/set/game.zip.part.zip"),
                entry("https://host.test/set/game.zip"),
            ])
            .await;

        assert_eq!(report.summary.completed, 2);
        assert!(tmp.path().join("game.zip.part/first.txt").exists());
        assert!(tmp.path().join("game_2/second.txt").exists());
    }

    #[tokio::test]
    async fn test_run_with_skip_existing_ignores_leftover_partial_download() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("A.zip.part"), b"truncated junk").unwrap();
        let transport = FakeTransport::default()
            .serve("https://host.test/set/A.zip", vec![Ok(zip_bytes(&[("a.txt", "fresh")]))]);

        let report = Driver::new(config(tmp.path()).with_skip_existing(true), &transport)
            .run([entry("https://host.test/set/A.zip")])
            .await;

        assert_eq!(transport.calls(), ["https://host.test/set/A.zip"]);
        assert_eq!(report.summary.downloaded, 1);
        assert_eq!(report.summary.completed, 1);
        assert_eq!(
            std::fs::read_to_string(tmp.path().join("A/a.txt")).unwrap(),
            "fresh"
        );
        assert!(!tmp.path().join("A.zip.part").exists());
    }

    #[tokio::test]
    async fn test_run_empty_entries_is_successful_noop() {
        let tmp = TempDir::new().unwrap();
        let transport = FakeTransport::default();

        let report = Driver::new(config(tmp.path()), &transport)
            .run(Vec::<RemoteEntry>::new())
            .await;

        assert!(report.entries.is_empty());
        assert_eq!(report.summary, RunSummary::default());
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn test_run_invalid_name_fails_entry_without_request() {
        let tmp = TempDir::new().unwrap();
        let transport = FakeTransport::default();

        let report = Driver::new(config(tmp.path()), &transport)
            .run([entry("https://host.test/set/.zip")])
            .await;

        assert!(transport.calls().is_empty());
        assert!(matches!(
            report.entries[0].error,
            Some(EntryError::Normalize(_))
        ));
        assert!(report.entries[0].target.is_none());
    }

    #[test]
    fn test_partial_path_appends_suffix() {
        assert_eq!(
            partial_path(Path::new("/data/My Game.zip")),
            PathBuf::from("/data/My Game.zip.part")
        );
    }
}
