use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use sftp_audit_tools::commands;

#[derive(Parser)]
#[command(name = "sftp-audit")]
#[command(about = "SFTP audit log distillation and integrity tools", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconstruct accounts and sessions from audit logs
    Distill {
        /// Path to audit log file(s) - rotations in chronological order
        #[arg(required = true)]
        log_files: Vec<String>,

        /// Output JSON-lines file for account projections
        #[arg(long, default_value = "accounts.jsonl")]
        accounts_out: String,

        /// Output JSON-lines file for session projections
        #[arg(long, default_value = "sessions.jsonl")]
        sessions_out: String,

        /// Calendar days probed backward when resolving a session
        /// identity (bridges the midnight log rollover)
        #[arg(long, default_value = "2")]
        lookback_days: u32,
    },

    /// Scan audit logs for protocol anomalies and client errors
    Check {
        /// Path to audit log file(s) - rotations in chronological order
        #[arg(required = true)]
        log_files: Vec<String>,

        /// Start of the time-of-day window inside which anomalies are
        /// recorded (24hr clock)
        #[arg(long, default_value = "00:05:00")]
        window_start: String,

        /// End of the anomaly-recording window (24hr clock)
        #[arg(long, default_value = "23:55:00")]
        window_end: String,

        /// Report file path
        #[arg(short, long, default_value = "logcheck.txt")]
        output: String,

        /// Include per-error client detail lines in the report
        #[arg(long)]
        print_errors: bool,

        /// Export anomaly and error records to a CSV file
        #[arg(long)]
        export_csv: Option<String>,
    },

    /// Generate shell completion scripts
    GenerateCompletion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Raised on Ctrl-C; scans stop after the line in flight and flush
    // partial results.
    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = cancel.clone();
        ctrlc::set_handler(move || cancel.store(true, Ordering::SeqCst))
            .context("Failed to install interrupt handler")?;
    }

    match cli.command {
        Commands::Distill {
            log_files,
            accounts_out,
            sessions_out,
            lookback_days,
        } => commands::distill::run(
            &log_files,
            &accounts_out,
            &sessions_out,
            lookback_days,
            cancel,
        ),
        Commands::Check {
            log_files,
            window_start,
            window_end,
            output,
            print_errors,
            export_csv,
        } => commands::check::run(
            &log_files,
            &window_start,
            &window_end,
            &output,
            print_errors,
            export_csv.as_deref(),
            cancel,
        ),
        Commands::GenerateCompletion { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "sftp-audit", &mut std::io::stdout());
            Ok(())
        }
    }
}
