//! Session distillation command.
//!
//! Reconstructs the account/session/command model from one or more audit
//! logs and writes both projections as JSON lines.
//!
//! # Usage
//!
//! ```bash
//! # Single file
//! sftp-audit distill sftp.log
//!
//! # A day's rotations, oldest first; sessions spanning midnight resolve
//! # across the file boundary
//! sftp-audit distill logs/sftp.log.1.gz logs/sftp.log
//!
//! # Tune outputs and the identity lookback
//! sftp-audit distill sftp.log --accounts-out acct.jsonl --sessions-out sess.jsonl --lookback-days 3
//! ```

use anyhow::Result;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::audit::distiller::SessionDistiller;
use crate::sink::{JsonlSink, SessionSink};
use crate::utils::format::format_number;
use crate::utils::processor::LogScanner;

pub fn run(
    log_files: &[String],
    accounts_out: &str,
    sessions_out: &str,
    lookback_days: u32,
    cancel: Arc<AtomicBool>,
) -> Result<()> {
    let mut distiller = SessionDistiller::new(lookback_days);
    let mut sink = JsonlSink::new(accounts_out, sessions_out);

    // One distiller across all files: the registries have to survive
    // rotation boundaries for lookback resolution to work.
    let scan_stats = LogScanner::new(log_files, "Distilling")
        .with_cancel(cancel)
        .scan(|line| distiller.ingest(line, &mut sink))?;

    // Flushes on interruption too: whatever was reconstructed is complete
    // as far as it goes.
    sink.flush()?;

    if scan_stats.cancelled {
        println!("\nScan interrupted; partial results flushed.");
    }
    scan_stats.report();
    let stats = distiller.stats();
    println!(
        "\nDistilled {} accounts and {} sessions from {} audit lines",
        format_number(stats.accounts_created),
        format_number(stats.sessions_created),
        format_number(stats.lines_ingested)
    );
    if stats.sink_errors > 0 {
        println!(
            "Sink write errors (entities kept in memory): {}",
            format_number(stats.sink_errors)
        );
    }
    println!("Accounts written to {accounts_out}");
    println!("Sessions written to {sessions_out}");

    Ok(())
}
