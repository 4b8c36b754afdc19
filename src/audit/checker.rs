//! Session integrity checker.
//!
//! Walks the same classified line stream as the reconstruction engine but
//! keeps only protocol state: which file and directory handles each live
//! session has open, and what the session last did. From that it flags
//! log anomalies (unclosed handles, missing session boundaries, orphaned
//! operations) and collects client error responses.
//!
//! Two policies keep the report useful on real logs:
//!
//! - A time-of-day window (default 00:05:00-23:55:00) gates anomaly
//!   recording. Lines outside the window still update state but never
//!   warn, because entries that straddle the midnight log rollover would
//!   otherwise show up as spurious unclosed or unopened handles.
//! - Each session warns at most once per check pass. A single protocol
//!   slip tends to cascade (an unmatched open makes every later close
//!   look wrong); first finding wins.

use chrono::{NaiveDateTime, NaiveTime};
use std::collections::HashMap;

use crate::audit::parser::ParsedLine;
use crate::audit::types::OperationKind;

/// Time-of-day interval inside which anomalies are recorded.
///
/// Bounds are exclusive. Lines outside the window update session state
/// but never generate findings.
#[derive(Debug, Clone, Copy)]
pub struct CheckWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl Default for CheckWindow {
    fn default() -> Self {
        Self {
            start: NaiveTime::from_hms_opt(0, 5, 0).expect("valid window start"),
            end: NaiveTime::from_hms_opt(23, 55, 0).expect("valid window end"),
        }
    }
}

impl CheckWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, time: NaiveTime) -> bool {
        time > self.start && time < self.end
    }
}

/// Lifecycle state of one file or directory handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
    Opened,
    Closed,
    /// The open drew an error status response and never really existed.
    Aborted,
}

/// A suspected logging or protocol anomaly.
#[derive(Debug, Clone)]
pub struct AnomalyRecord {
    pub session_key: String,
    pub timestamp: NaiveDateTime,
    pub message: String,
}

impl std::fmt::Display for AnomalyRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{},time={},{}",
            self.session_key,
            self.timestamp.format("%Y-%m-%d %H:%M:%S%.3f"),
            self.message
        )
    }
}

/// A client operation that drew an error status response.
#[derive(Debug, Clone)]
pub struct ErrorRecord {
    pub session_key: String,
    pub timestamp: NaiveDateTime,
    pub status_text: String,
    pub preceding_op: OperationKind,
}

impl std::fmt::Display for ErrorRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{},time={},sent status message '{}' in response to operation '{}'.",
            self.session_key,
            self.timestamp.format("%Y-%m-%d %H:%M:%S%.3f"),
            self.status_text,
            self.preceding_op
        )
    }
}

#[derive(Debug)]
struct SessionState {
    last_op: OperationKind,
    last_target: String,
    last_op_time: NaiveDateTime,
    open_files: HashMap<String, HandleState>,
    open_dirs: HashMap<String, HandleState>,
    warned: bool,
}

impl SessionState {
    fn new(time: NaiveDateTime) -> Self {
        Self {
            last_op: OperationKind::Unknown,
            last_target: String::new(),
            last_op_time: time,
            open_files: HashMap::new(),
            open_dirs: HashMap::new(),
            warned: false,
        }
    }
}

/// Tracks live sessions keyed by `user=<user>,pid=<pid>` and accumulates
/// anomaly and error records across a run.
///
/// The key deliberately skips the hashed identity used for persistence:
/// within one run, user and pid are unique enough, and the plain form
/// doubles as the session label in report lines.
pub struct IntegrityChecker {
    window: CheckWindow,
    sessions: HashMap<String, SessionState>,
    anomalies: Vec<AnomalyRecord>,
    errors: Vec<ErrorRecord>,
}

impl Default for IntegrityChecker {
    fn default() -> Self {
        Self::new(CheckWindow::default())
    }
}

impl IntegrityChecker {
    pub fn new(window: CheckWindow) -> Self {
        Self {
            window,
            sessions: HashMap::new(),
            anomalies: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Feed one classified line through the state machine.
    pub fn observe(&mut self, line: &ParsedLine) {
        let key = session_key(&line.user, line.pid);
        let in_window = self.window.contains(line.timestamp.time());

        let mut state = match self.sessions.remove(&key) {
            Some(mut previous) => {
                if line.kind == OperationKind::SessionStart {
                    // The previous session for this user+pid never logged
                    // a close. Flag it, check its handles, start fresh.
                    if in_window && !previous.warned {
                        self.record_anomaly(
                            &key,
                            line.timestamp,
                            "detected new session without close of previous session \
                             for same user+PID; closing old session"
                                .to_string(),
                        );
                        previous.warned = true;
                    }
                    self.sweep_handles(&key, &mut previous, in_window);
                    SessionState::new(line.timestamp)
                } else {
                    previous
                }
            }
            None => SessionState::new(line.timestamp),
        };

        if in_window
            && !state.warned
            && state.last_op == OperationKind::Unknown
            && line.kind != OperationKind::SessionStart
            && line.kind != OperationKind::StatusResponse
        {
            self.record_anomaly(
                &key,
                line.timestamp,
                format!(
                    "detected operation '{}' without prior session open",
                    line.kind
                ),
            );
            state.warned = true;
        } else {
            match line.kind {
                OperationKind::FileOpen => {
                    let name = normalize_path(&line.target);
                    if in_window
                        && !state.warned
                        && state.open_files.get(&name) == Some(&HandleState::Opened)
                    {
                        self.record_anomaly(
                            &key,
                            line.timestamp,
                            format!(
                                "detected open of file '{name}' that had been previously open"
                            ),
                        );
                        state.warned = true;
                    }
                    state.open_files.insert(name, HandleState::Opened);
                }
                OperationKind::FileClose | OperationKind::ForceFileClose => {
                    let name = normalize_path(&line.target);
                    if in_window
                        && !state.warned
                        && state.open_files.get(&name) != Some(&HandleState::Opened)
                    {
                        self.record_anomaly(
                            &key,
                            line.timestamp,
                            format!("detected close of file '{name}' without prior open"),
                        );
                        state.warned = true;
                    }
                    state.open_files.insert(name, HandleState::Closed);
                }
                OperationKind::DirOpen => {
                    let name = normalize_path(&line.target);
                    if in_window
                        && !state.warned
                        && state.open_dirs.get(&name) == Some(&HandleState::Opened)
                    {
                        self.record_anomaly(
                            &key,
                            line.timestamp,
                            format!(
                                "detected open of directory '{name}' that had been previously open"
                            ),
                        );
                        state.warned = true;
                    }
                    state.open_dirs.insert(name, HandleState::Opened);
                }
                OperationKind::DirClose | OperationKind::ForceDirClose => {
                    let name = normalize_path(&line.target);
                    if in_window
                        && !state.warned
                        && state.open_dirs.get(&name) != Some(&HandleState::Opened)
                    {
                        self.record_anomaly(
                            &key,
                            line.timestamp,
                            format!("detected close of directory '{name}' without prior opendir"),
                        );
                        state.warned = true;
                    }
                    state.open_dirs.insert(name, HandleState::Closed);
                }
                OperationKind::StatusResponse => {
                    if in_window
                        && !state.warned
                        && (state.last_op == OperationKind::Unknown
                            || state.last_op == OperationKind::StatusResponse)
                    {
                        self.record_anomaly(
                            &key,
                            line.timestamp,
                            format!(
                                "detected status response '{}' without any prior client activity",
                                line.target
                            ),
                        );
                        state.warned = true;
                    }
                    // Error records are not gated by the window or the
                    // one-shot flag; the error section of the report has
                    // its own toggle.
                    self.errors.push(ErrorRecord {
                        session_key: key.clone(),
                        timestamp: line.timestamp,
                        status_text: line.target.clone(),
                        preceding_op: state.last_op,
                    });
                    match state.last_op {
                        OperationKind::FileOpen => {
                            state
                                .open_files
                                .insert(state.last_target.clone(), HandleState::Aborted);
                        }
                        OperationKind::DirOpen => {
                            state
                                .open_dirs
                                .insert(state.last_target.clone(), HandleState::Aborted);
                        }
                        _ => {}
                    }
                }
                OperationKind::SessionFinish => {
                    self.sweep_handles(&key, &mut state, in_window);
                    // Clean end of session: state is dropped, not reinserted.
                    return;
                }
                _ => {}
            }
        }

        state.last_op = line.kind;
        state.last_target = normalize_path(&line.target);
        state.last_op_time = line.timestamp;
        self.sessions.insert(key, state);
    }

    /// End-of-run sweep over sessions that never logged a close.
    ///
    /// A session whose last activity falls outside the window is assumed
    /// to continue in the next log file and is skipped. For the rest, the
    /// handle check and the missing-close check are distinct passes: a
    /// session that leaked a handle *and* never closed gets one finding
    /// from each, while a session that already warned during the line
    /// scan gets neither.
    pub fn finish(&mut self) {
        let mut remaining: Vec<(String, SessionState)> = self.sessions.drain().collect();
        remaining.sort_by(|a, b| a.0.cmp(&b.0));

        for (key, mut state) in remaining {
            if !self.window.contains(state.last_op_time.time()) {
                continue;
            }
            let warned_before = state.warned;
            let last_seen = state.last_op_time;
            self.sweep_handles(&key, &mut state, true);
            if !warned_before {
                self.record_anomaly(
                    &key,
                    last_seen,
                    "detected session missing final session close".to_string(),
                );
            }
        }
    }

    /// Report any handle still open when a session ends (or is torn down
    /// by a replacement session). One finding at most per call.
    fn sweep_handles(&mut self, key: &str, state: &mut SessionState, in_window: bool) {
        let mut leaked: Vec<String> = Vec::new();

        let mut files: Vec<&String> = state
            .open_files
            .iter()
            .filter(|(_, s)| **s == HandleState::Opened)
            .map(|(path, _)| path)
            .collect();
        files.sort();
        for path in files {
            leaked.push(format!("file '{path}' was opened but never closed"));
        }

        let mut dirs: Vec<&String> = state
            .open_dirs
            .iter()
            .filter(|(_, s)| **s == HandleState::Opened)
            .map(|(path, _)| path)
            .collect();
        dirs.sort();
        for path in dirs {
            leaked.push(format!("directory '{path}' was opened but never closed"));
        }

        for message in leaked {
            if in_window && !state.warned {
                self.record_anomaly(key, state.last_op_time, message);
                state.warned = true;
            }
        }
    }

    fn record_anomaly(&mut self, key: &str, timestamp: NaiveDateTime, message: String) {
        self.anomalies.push(AnomalyRecord {
            session_key: key.to_string(),
            timestamp,
            message,
        });
    }

    pub fn anomalies(&self) -> &[AnomalyRecord] {
        &self.anomalies
    }

    pub fn errors(&self) -> &[ErrorRecord] {
        &self.errors
    }
}

/// Report key for a session: user and pid are unique enough within one
/// run and keep report lines readable.
pub fn session_key(user: &str, pid: u32) -> String {
    format!("user={user},pid={pid}")
}

/// Collapse redundant separators and `.`/`..` segments so cosmetic path
/// variants ("/a/b//c", "/a/./b/c") never read as mismatched handles.
pub fn normalize_path(path: &str) -> String {
    if path.is_empty() {
        return String::new();
    }
    let absolute = path.starts_with('/');
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.last().is_some_and(|s| *s != "..") {
                    segments.pop();
                } else if !absolute {
                    segments.push("..");
                }
            }
            other => segments.push(other),
        }
    }
    if absolute {
        format!("/{}", segments.join("/"))
    } else if segments.is_empty() {
        ".".to_string()
    } else {
        segments.join("/")
    }
}
