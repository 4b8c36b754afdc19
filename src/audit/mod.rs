//! Core audit log parsing, session reconstruction, and integrity checking.
//!
//! ## Key Components
//!
//! - [`parser`] - Raw line matching and operation classification
//! - [`types`] - The account/session/command model and its projections
//! - [`session`] - Derived session identity keys and the epoch anchor
//! - [`distiller`] - Session reconstruction engine feeding a sink
//! - [`checker`] - Integrity checker producing anomaly/error records
//!
//! ## Example
//!
//! ```no_run
//! use sftp_audit_tools::audit::distiller::SessionDistiller;
//! use sftp_audit_tools::audit::parser::LogLineParser;
//! use sftp_audit_tools::sink::MemorySink;
//!
//! let parser = LogLineParser::new();
//! let mut distiller = SessionDistiller::default();
//! let mut sink = MemorySink::default();
//!
//! for raw in std::io::stdin().lines() {
//!     if let Ok(Some(line)) = parser.parse(&raw.unwrap()) {
//!         distiller.ingest(&line, &mut sink);
//!     }
//! }
//! ```

pub mod checker;
pub mod distiller;
pub mod parser;
pub mod session;
pub mod types;
