//! Command implementations.
//!
//! Each module implements one subcommand of the `sftp-audit` binary:
//!
//! - [`distill`] - Reconstruct accounts and sessions, write JSON lines
//! - [`check`] - Scan for protocol anomalies and client errors
//!
//! Both commands share the multi-file scan loop in
//! [`crate::utils::processor`] and accept plain, `.gz`, and `.zst` logs.

pub mod check;
pub mod distill;
