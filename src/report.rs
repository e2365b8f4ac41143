//! Where run-time notices go: unusual characters and batch progress.

use anyhow::{Context, Result};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Receives notices while images are being cleaned.
pub trait Reporter {
    /// A character that was neither in the table nor below the threshold.
    fn unusual_character(&mut self, ch: char, source: &Path);
    /// `processed` files have been handled so far in a batch.
    fn progress(&mut self, processed: usize);
}

/// The one-line notice for an unusual character.
pub fn unusual_character_message(ch: char, source: &Path) -> String {
    format!(
        "Found unicode character {ch} ({}) in {}",
        ch as u32,
        source.display()
    )
}

/// Prints notices to the console, or writes them to a log file when one is set.
///
/// Progress lines always go to the console, whatever the log filter is.
pub struct ConsoleReporter {
    log_file: Option<(PathBuf, File)>,
    stderr: bool,
}

impl ConsoleReporter {
    pub fn stdout() -> Self {
        Self {
            log_file: None,
            stderr: false,
        }
    }

    /// Send console lines to stderr, keeping stdout free for machine output.
    pub fn on_stderr(mut self) -> Self {
        self.stderr = true;
        self
    }

    /// Create (truncate) `path` and send unusual-character notices there.
    pub fn with_log_file(path: &Path) -> Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("Failed to create log file {}", path.display()))?;
        log::debug!("Logging unusual characters to {}", path.display());
        Ok(Self {
            log_file: Some((path.to_path_buf(), file)),
            stderr: false,
        })
    }

    fn console(&self, line: &str) {
        if self.stderr {
            eprintln!("{line}");
        } else {
            println!("{line}");
        }
    }
}

impl Reporter for ConsoleReporter {
    fn unusual_character(&mut self, ch: char, source: &Path) {
        let message = unusual_character_message(ch, source);
        let Some((path, file)) = &mut self.log_file else {
            self.console(&message);
            return;
        };
        if let Err(e) = writeln!(file, "{message}").and_then(|_| file.flush()) {
            log::warn!("Failed to write to {}: {e}", path.display());
        }
    }

    fn progress(&mut self, processed: usize) {
        self.console(&format!("Processed {processed} images"));
    }
}

/// Keeps every notice in memory.
#[derive(Debug, Default)]
pub struct CollectingReporter {
    pub notices: Vec<String>,
    pub progress: Vec<usize>,
}

impl Reporter for CollectingReporter {
    fn unusual_character(&mut self, ch: char, source: &Path) {
        self.notices.push(unusual_character_message(ch, source));
    }

    fn progress(&mut self, processed: usize) {
        self.progress.push(processed);
    }
}
