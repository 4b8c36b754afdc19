//! # SFTP Audit Tools
//!
//! Command-line tools for working with OpenSSH `internal-sftp` audit
//! logs: distill the raw line stream into a normalized
//! account/session/command model, and check the same stream for protocol
//! anomalies.
//!
//! ## Overview
//!
//! An `internal-sftp` log interleaves the operations of many concurrent
//! client sessions, one line per operation, with no session identifier on
//! the line. Both tools classify each line, derive a session identity
//! from the account, the process id, and a rollover-tolerant time bucket,
//! and maintain per-session state across a single forward pass:
//!
//! - `distill` rebuilds accounts, sessions, and their ordered command
//!   lists and streams upserts to a persistence sink (JSON lines out of
//!   the box).
//! - `check` tracks open file and directory handles per session and
//!   reports anomalies: unclosed handles, missing session boundaries,
//!   orphaned operations, repeated error responses.
//!
//! Designed for large production logs: streaming line parser, one pass,
//! direct analysis of `.gz` and `.zst` rotations.
//!
//! ## Architecture
//!
//! - [`audit`] - Line classification, identity derivation, the
//!   reconstruction engine, and the integrity checker
//! - [`sink`] - Persistence sink contract and the JSON-lines sink
//! - [`commands`] - Subcommand drivers
//! - [`utils`] - Scan loop, compressed-file reader, progress, formatting
//!
//! ## Example Usage
//!
//! ```bash
//! # Reconstruct sessions from a day of rotations
//! sftp-audit distill logs/sftp.log.1.gz logs/sftp.log
//!
//! # Integrity report with client error details
//! sftp-audit check logs/sftp.log --print-errors
//!
//! # Suppress findings near the midnight rollover (default window shown)
//! sftp-audit check logs/sftp.log --window-start 00:05:00 --window-end 23:55:00
//! ```

pub mod audit;
pub mod commands;
pub mod sink;
pub mod utils;
