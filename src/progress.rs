//! Progress bars for archive downloads.
//!
//! Log lines share stderr with the bar, so [`TerminalProgress::log_writer`]
//! hands tracing a writer that suspends the visible bar while a line is
//! printed.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::fmt::MakeWriter;
use zipgrab_core::ProgressSink;

const BAR_TEMPLATE: &str =
    "{spinner} {msg} [{bar:30}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})";
const SPINNER_TEMPLATE: &str = "{spinner} {msg} {bytes} ({bytes_per_sec})";

type BarSlot = Arc<Mutex<Option<ProgressBar>>>;

/// One indicatif bar per transfer on stderr.
#[derive(Debug, Default)]
pub(crate) struct TerminalProgress {
    current: BarSlot,
}

impl TerminalProgress {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Stderr writer for tracing that keeps log lines off the live bar.
    pub(crate) fn log_writer(&self) -> BarAwareStderr {
        BarAwareStderr {
            current: Arc::clone(&self.current),
        }
    }
}

impl ProgressSink for TerminalProgress {
    fn start(&self, label: &str, total_bytes: Option<u64>) {
        let bar = match total_bytes {
            Some(total) => {
                let bar = ProgressBar::new(total);
                bar.set_style(
                    ProgressStyle::with_template(BAR_TEMPLATE)
                        .map(|style| style.progress_chars("=> "))
                        .unwrap_or_else(|_| ProgressStyle::default_bar()),
                );
                bar
            }
            None => {
                let bar = ProgressBar::new_spinner();
                bar.set_style(
                    ProgressStyle::with_template(SPINNER_TEMPLATE)
                        .unwrap_or_else(|_| ProgressStyle::default_spinner()),
                );
                bar
            }
        };
        bar.set_message(label.trim_end_matches(".part").to_string());
        bar.enable_steady_tick(Duration::from_millis(100));

        if let Ok(mut current) = self.current.lock()
            && let Some(previous) = current.replace(bar)
        {
            previous.finish_and_clear();
        }
    }

    fn advance(&self, bytes: u64) {
        if let Ok(current) = self.current.lock()
            && let Some(bar) = current.as_ref()
        {
            bar.inc(bytes);
        }
    }

    fn finish(&self) {
        if let Ok(mut current) = self.current.lock()
            && let Some(bar) = current.take()
        {
            bar.finish_and_clear();
        }
    }
}

/// [`MakeWriter`] for stderr that shares the bar slot of a [`TerminalProgress`].
#[derive(Debug, Clone)]
pub(crate) struct BarAwareStderr {
    current: BarSlot,
}

impl<'a> MakeWriter<'a> for BarAwareStderr {
    type Writer = LogLine;

    fn make_writer(&'a self) -> Self::Writer {
        LogLine {
            current: Arc::clone(&self.current),
            buffer: Vec::new(),
        }
    }
}

/// One formatted event, written to stderr when dropped.
pub(crate) struct LogLine {
    current: BarSlot,
    buffer: Vec<u8>,
}

impl LogLine {
    fn emit(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        let line = std::mem::take(&mut self.buffer);
        let write = || {
            let mut stderr = io::stderr().lock();
            let _ = stderr.write_all(&line);
            let _ = stderr.flush();
        };
        let bar = self
            .current
            .lock()
            .ok()
            .and_then(|current| current.as_ref().cloned());
        match bar {
            Some(bar) => bar.suspend(write),
            None => write(),
        }
    }
}

impl Write for LogLine {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.emit();
        Ok(())
    }
}

impl Drop for LogLine {
    fn drop(&mut self) {
        self.emit();
    }
}
