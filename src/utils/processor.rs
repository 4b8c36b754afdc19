//! Shared log scanning loop.
//!
//! Both commands walk the same way through their input files: open each
//! file in argument order (rotations oldest first), classify every line,
//! hand matched lines to the command's consumer, and keep running counts.
//! [`LogScanner`] owns that loop so progress display, error accounting,
//! and multi-file sequencing stay identical across commands.
//!
//! Lines that fail the audit grammar entirely are foreign (sshd auth
//! traffic, kernel noise) and are simply not counted as matches. Lines
//! that match the grammar but fail field conversion are counted as
//! skipped; they never abort the scan. An unreadable input file does.

use anyhow::{Context, Result};
use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::audit::parser::{LogLineParser, ParsedLine};
use crate::utils::format::format_number;
use crate::utils::progress::ProgressBar;
use crate::utils::reader::open_log;

/// Most conversion failures retained verbatim for the summary; beyond
/// this only the count grows.
const MAX_REPORTED_LINE_ERRORS: usize = 10;

/// Counters collected over a scan.
#[derive(Debug, Default, Clone)]
pub struct ScanStats {
    /// Every line read, audit or not.
    pub total_lines: usize,
    /// Lines classified as SFTP audit lines.
    pub matched_lines: usize,
    /// Lines that matched the audit grammar but failed to convert.
    pub skipped_lines: usize,
    /// The first few conversion failures, as `file:line: cause`.
    pub line_errors: Vec<String>,
    pub files_processed: usize,
    /// Scan was interrupted; counts cover a prefix of the input.
    pub cancelled: bool,
}

impl ScanStats {
    pub fn report(&self) {
        eprintln!("\nScan summary:");
        eprintln!("  Files processed : {}", format_number(self.files_processed));
        eprintln!("  Total lines     : {}", format_number(self.total_lines));
        eprintln!("  Audit lines     : {}", format_number(self.matched_lines));
        if self.skipped_lines > 0 {
            eprintln!(
                "  Skipped lines   : {} (matched but unconvertible)",
                format_number(self.skipped_lines)
            );
            for error in &self.line_errors {
                eprintln!("    {error}");
            }
            if self.skipped_lines > self.line_errors.len() {
                eprintln!(
                    "    ... and {} more",
                    format_number(self.skipped_lines - self.line_errors.len())
                );
            }
        }
    }
}

/// Drives a line consumer over a sequence of log files.
pub struct LogScanner<'a> {
    files: &'a [String],
    progress_label: String,
    cancel: Option<Arc<AtomicBool>>,
}

impl<'a> LogScanner<'a> {
    pub fn new(files: &'a [String], progress_label: &str) -> Self {
        Self {
            files,
            progress_label: progress_label.to_string(),
            cancel: None,
        }
    }

    /// Attach a cancellation flag, checked before every line. When the
    /// flag is raised the scan stops after the line in flight and returns
    /// normally with `cancelled` set, so callers can still flush what was
    /// reconstructed so far.
    #[must_use]
    pub fn with_cancel(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Scan all files, feeding every classified line to `handler`.
    pub fn scan<F>(self, mut handler: F) -> Result<ScanStats>
    where
        F: FnMut(&ParsedLine),
    {
        let parser = LogLineParser::new();
        let mut stats = ScanStats::default();

        'files: for (file_idx, log_file) in self.files.iter().enumerate() {
            eprintln!(
                "[{}/{}] Processing: {}",
                file_idx + 1,
                self.files.len(),
                log_file
            );

            let file_size = std::fs::metadata(log_file).ok().map(|m| m.len() as usize);
            let progress = if let Some(size) = file_size {
                ProgressBar::new(size, &self.progress_label)
            } else {
                ProgressBar::new_spinner(&self.progress_label)
            };

            let reader = open_log(log_file)?;
            let mut file_lines = 0;
            let mut bytes_read = 0;

            for line in reader.lines() {
                if self
                    .cancel
                    .as_ref()
                    .is_some_and(|flag| flag.load(Ordering::SeqCst))
                {
                    stats.cancelled = true;
                    progress.finish_with_message("Interrupted");
                    break 'files;
                }
                file_lines += 1;
                stats.total_lines += 1;

                let line = line.with_context(|| {
                    format!("Failed to read line {file_lines} from {log_file}")
                })?;
                bytes_read += line.len() + 1;

                // Update every 10k lines for smooth animation.
                if file_lines % 10_000 == 0 {
                    if let Some(size) = file_size {
                        progress.update(bytes_read.min(size));
                    } else {
                        progress.update(file_lines);
                    }
                }

                match parser.parse(&line) {
                    Ok(Some(parsed)) => {
                        stats.matched_lines += 1;
                        handler(&parsed);
                    }
                    Ok(None) => {}
                    Err(err) => {
                        stats.skipped_lines += 1;
                        if stats.line_errors.len() < MAX_REPORTED_LINE_ERRORS {
                            stats
                                .line_errors
                                .push(format!("{log_file}:{file_lines}: {err}"));
                        }
                    }
                }
            }

            progress.finish_with_message(&format!(
                "Processed {} lines",
                format_number(file_lines)
            ));
            stats.files_processed += 1;
        }

        Ok(stats)
    }
}
