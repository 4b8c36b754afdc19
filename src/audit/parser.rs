//! Raw log line classification.
//!
//! An `internal-sftp` audit line carries a timestamp, a username, a process
//! id, and a free-text operation description:
//!
//! ```text
//! Mar  1 12:00:00 sftp01 internal-sftp[2211]: audit time=2024-03-01 12:00:00.125 user=alice pid=100 open "/srv/in/upload.csv" flags WRITE,CREATE mode 0644
//! ```
//!
//! [`LogLineParser::parse`] matches the structural pattern, rejects the
//! surrounding sshd traffic (authentication, connection events), and
//! classifies the operation text against a fixed prefix table. Several
//! prefixes could in principle prefix one another, so classification is by
//! longest matching prefix rather than table order; ties cannot occur
//! because the table holds no duplicate prefixes.

use chrono::NaiveDateTime;
use regex::Regex;
use thiserror::Error;

use crate::audit::types::OperationKind;
use crate::utils::time::parse_log_timestamp;

/// Textual operation prefixes as emitted by sftp-server, each mapped to
/// its operation kind.
const OPERATION_PREFIXES: &[(&str, OperationKind)] = &[
    ("session opened ", OperationKind::SessionStart),
    ("session closed ", OperationKind::SessionFinish),
    ("open ", OperationKind::FileOpen),
    ("close ", OperationKind::FileClose),
    ("forced close ", OperationKind::ForceFileClose),
    ("opendir ", OperationKind::DirOpen),
    ("closedir ", OperationKind::DirClose),
    ("forced closedir ", OperationKind::ForceDirClose),
    ("mkdir ", OperationKind::Mkdir),
    ("rmdir ", OperationKind::Rmdir),
    ("sent status ", OperationKind::StatusResponse),
    ("stat name ", OperationKind::Stat),
    ("lstat name ", OperationKind::LStat),
    ("statfs ", OperationKind::StatFs),
    ("rename old ", OperationKind::Rename),
    ("posix-rename old ", OperationKind::PosixRename),
    ("remove name ", OperationKind::Remove),
    ("set ", OperationKind::Set),
];

/// A structurally matched line that could not be converted.
///
/// These are recoverable: the scan counts and skips them. Lines that do
/// not match the audit grammar at all are not errors, just foreign.
#[derive(Debug, Error)]
pub enum LineError {
    #[error("unparseable timestamp '{0}'")]
    Timestamp(String),
    #[error("unparseable pid '{0}'")]
    Pid(String),
}

/// One classified audit line.
#[derive(Debug, Clone)]
pub struct ParsedLine {
    pub timestamp: NaiveDateTime,
    pub user: String,
    pub pid: u32,
    pub kind: OperationKind,
    pub target: String,
    /// Old name for the rename family, empty otherwise.
    pub source: String,
}

/// Matches and classifies `internal-sftp` audit lines.
pub struct LogLineParser {
    pattern: Regex,
}

impl Default for LogLineParser {
    fn default() -> Self {
        Self::new()
    }
}

impl LogLineParser {
    pub fn new() -> Self {
        // Anchored on the internal-sftp tag so sshd authentication and
        // connection lines never match.
        let pattern = Regex::new(
            r"^.* internal-sftp.*time=(\d{4}-\d{1,2}-\d{1,2} [0-9:.]+) user=(\S+) pid=(\d+) (.*)$",
        )
        .expect("valid audit line pattern");
        Self { pattern }
    }

    /// Parse one raw line.
    ///
    /// Returns `Ok(None)` when the line is not an SFTP audit line,
    /// `Err` when it is one but a captured field fails to convert.
    pub fn parse(&self, line: &str) -> Result<Option<ParsedLine>, LineError> {
        let Some(captures) = self.pattern.captures(line) else {
            return Ok(None);
        };

        let raw_time = &captures[1];
        let timestamp =
            parse_log_timestamp(raw_time).map_err(|_| LineError::Timestamp(raw_time.to_string()))?;
        let raw_pid = &captures[3];
        let pid: u32 = raw_pid
            .parse()
            .map_err(|_| LineError::Pid(raw_pid.to_string()))?;

        let (kind, target, source) = classify_operation(&captures[4]);

        Ok(Some(ParsedLine {
            timestamp,
            user: captures[2].to_string(),
            pid,
            kind,
            target,
            source,
        }))
    }
}

/// Classify an operation description into (kind, target, source).
///
/// The longest matching table prefix wins. Target extraction depends on
/// the kind: status responses keep the whole remainder, session starts
/// take the bracketed client address, renames take their two quoted
/// names, and the other known kinds take the first quoted token.
pub fn classify_operation(op_text: &str) -> (OperationKind, String, String) {
    let mut matched: Option<(&str, OperationKind)> = None;
    for &(prefix, kind) in OPERATION_PREFIXES {
        if op_text.starts_with(prefix)
            && matched.map_or(true, |(best, _)| prefix.len() > best.len())
        {
            matched = Some((prefix, kind));
        }
    }

    let Some((prefix, kind)) = matched else {
        return (OperationKind::Unknown, String::new(), String::new());
    };

    let remainder = &op_text[prefix.len()..];
    match kind {
        OperationKind::StatusResponse => (kind, remainder.to_string(), String::new()),
        OperationKind::SessionStart => (kind, bracketed_address(op_text), String::new()),
        OperationKind::Rename | OperationKind::PosixRename => {
            let (old_name, rest) = quoted_token(remainder);
            let (new_name, _) = quoted_token(rest);
            (kind, new_name, old_name)
        }
        _ => {
            let (target, _) = quoted_token(remainder);
            (kind, target, String::new())
        }
    }
}

/// Client address of a `session opened` line: the text between the first
/// `[` and the last `]`.
fn bracketed_address(op_text: &str) -> String {
    match (op_text.find('['), op_text.rfind(']')) {
        (Some(start), Some(end)) if start + 1 <= end => op_text[start + 1..end].to_string(),
        _ => String::new(),
    }
}

/// Contents of the first single- or double-quoted token in `text`, plus
/// the text following its closing quote. The token ends at the first
/// closing quote of either kind.
fn quoted_token(text: &str) -> (String, &str) {
    let Some(open) = text.find(['"', '\'']) else {
        return (String::new(), "");
    };
    let body = &text[open + 1..];
    match body.find(['"', '\'']) {
        Some(close) => (body[..close].to_string(), &body[close + 1..]),
        None => (body.to_string(), ""),
    }
}
