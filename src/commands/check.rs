//! Integrity check command.
//!
//! Scans audit logs for protocol anomalies (unclosed handles, missing
//! session boundaries, orphaned operations) and client error responses,
//! and writes a text report. Counts are always shown; the per-error
//! detail section is opt-in because busy servers produce a lot of benign
//! `No such file` responses.
//!
//! # Usage
//!
//! ```bash
//! # Default 00:05:00-23:55:00 check window
//! sftp-audit check sftp.log
//!
//! # Narrow the window and include client error details in the report
//! sftp-audit check sftp.log --window-start 01:00:00 --window-end 23:00:00 --print-errors
//!
//! # Machine-readable export alongside the text report
//! sftp-audit check sftp.log --export-csv findings.csv
//! ```

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::audit::checker::{AnomalyRecord, CheckWindow, ErrorRecord, IntegrityChecker};
use crate::utils::format::format_number;
use crate::utils::processor::LogScanner;
use crate::utils::time::parse_window_time;

pub fn run(
    log_files: &[String],
    window_start: &str,
    window_end: &str,
    output: &str,
    print_errors: bool,
    export_csv: Option<&str>,
    cancel: Arc<AtomicBool>,
) -> Result<()> {
    let window = CheckWindow::new(
        parse_window_time(window_start)?,
        parse_window_time(window_end)?,
    );
    let mut checker = IntegrityChecker::new(window);

    // One checker across all files, so a session that closes in the next
    // rotation is not flagged at the file boundary.
    let scan_stats = LogScanner::new(log_files, "Checking")
        .with_cancel(cancel)
        .scan(|line| checker.observe(line))?;

    if scan_stats.cancelled {
        // Live sessions are mid-flight on an interrupted scan; the
        // end-of-run sweep would flag every one of them.
        println!("\nScan interrupted; report covers the lines read so far.");
    } else {
        checker.finish();
    }

    scan_stats.report();

    println!(
        "\nSFTP log line count (total)            :  {}",
        format_number(scan_stats.total_lines)
    );
    println!(
        "Anomaly events (potential log issues)  :  {}",
        format_number(checker.anomalies().len())
    );
    println!(
        "Error events (client activity issues)  :  {}",
        format_number(checker.errors().len())
    );

    if checker.anomalies().is_empty() && checker.errors().is_empty() {
        println!("\nNo anomalies or client errors detected.");
    } else {
        write_report(output, checker.anomalies(), checker.errors(), print_errors)?;
        println!("\nReport written to {output}");
    }

    if let Some(csv_path) = export_csv {
        export_records(csv_path, checker.anomalies(), checker.errors())?;
        println!("Findings exported to {csv_path}");
    }

    Ok(())
}

fn write_report(
    path: &str,
    anomalies: &[AnomalyRecord],
    errors: &[ErrorRecord],
    print_errors: bool,
) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Failed to create report: {path}"))?;
    let mut out = BufWriter::new(file);

    writeln!(out, "{}", "=".repeat(80))?;
    writeln!(out, "SFTP Log Anomalies - {} total", anomalies.len())?;
    writeln!(out, "{}", "=".repeat(80))?;
    for anomaly in anomalies {
        writeln!(out, "{anomaly}")?;
    }

    writeln!(out, "{}", "=".repeat(80))?;
    writeln!(out, "SFTP Client Errors - {} total", errors.len())?;
    writeln!(out, "{}", "=".repeat(80))?;
    if print_errors {
        for error in errors {
            writeln!(out, "{error}")?;
        }
    } else {
        writeln!(out, "SFTP client error details not requested.")?;
    }

    out.flush()
        .with_context(|| format!("Failed to write report: {path}"))
}

/// Write both record kinds into one CSV, anomalies first, with a
/// `record_type` discriminator column.
fn export_records(path: &str, anomalies: &[AnomalyRecord], errors: &[ErrorRecord]) -> Result<()> {
    let mut writer =
        csv::Writer::from_path(path).with_context(|| format!("Failed to create CSV: {path}"))?;
    writer.write_record([
        "record_type",
        "session_key",
        "timestamp",
        "message",
        "status_text",
        "preceding_operation",
    ])?;

    for anomaly in anomalies {
        let timestamp = anomaly.timestamp.format("%Y-%m-%d %H:%M:%S%.3f").to_string();
        writer.write_record([
            "anomaly",
            anomaly.session_key.as_str(),
            timestamp.as_str(),
            anomaly.message.as_str(),
            "",
            "",
        ])?;
    }
    for error in errors {
        let timestamp = error.timestamp.format("%Y-%m-%d %H:%M:%S%.3f").to_string();
        writer.write_record([
            "error",
            error.session_key.as_str(),
            timestamp.as_str(),
            "",
            error.status_text.as_str(),
            error.preceding_op.name(),
        ])?;
    }

    writer
        .flush()
        .with_context(|| format!("Failed to write CSV: {path}"))?;
    Ok(())
}
