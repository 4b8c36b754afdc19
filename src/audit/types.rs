//! Data structures for the distilled SFTP session model.
//!
//! An audit log describes client activity as a flat stream of operation
//! lines. These types hold the reconstructed view of that stream: accounts
//! own sessions, sessions own an ordered command list. The `*Projection`
//! structs are the wire form handed to persistence sinks, with integer
//! enum values and absent-as-zero fields matching the downstream schema.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::audit::session::millis_since_anchor;

/// Client operation kinds recognized in an `internal-sftp` audit log.
///
/// The discriminants are the wire values written into session projections
/// and must not be reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OperationKind {
    Unknown = 0,
    SessionStart = 1,
    SessionFinish = 2,
    FileOpen = 3,
    FileClose = 4,
    ForceFileClose = 5,
    DirOpen = 6,
    DirClose = 7,
    ForceDirClose = 8,
    Mkdir = 9,
    Rmdir = 10,
    StatusResponse = 11,
    Stat = 12,
    LStat = 13,
    StatFs = 14,
    Rename = 15,
    PosixRename = 16,
    Remove = 17,
    Set = 18,
}

impl OperationKind {
    /// Integer value used in serialized projections.
    pub const fn wire_value(self) -> u8 {
        self as u8
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Unknown => "Unknown",
            Self::SessionStart => "SessionStart",
            Self::SessionFinish => "SessionFinish",
            Self::FileOpen => "FileOpen",
            Self::FileClose => "FileClose",
            Self::ForceFileClose => "ForceFileClose",
            Self::DirOpen => "DirOpen",
            Self::DirClose => "DirClose",
            Self::ForceDirClose => "ForceDirClose",
            Self::Mkdir => "Mkdir",
            Self::Rmdir => "Rmdir",
            Self::StatusResponse => "StatusResponse",
            Self::Stat => "Stat",
            Self::LStat => "LStat",
            Self::StatFs => "StatFs",
            Self::Rename => "Rename",
            Self::PosixRename => "PosixRename",
            Self::Remove => "Remove",
            Self::Set => "Set",
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of a client operation, taken from `sent status` responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum StatusKind {
    #[default]
    Success = 0,
    Failure = 1,
    NoSuchFile = 2,
    Unsupported = 3,
    PermissionDenied = 4,
}

impl StatusKind {
    pub const fn wire_value(self) -> u8 {
        self as u8
    }

    /// Map the free text of a `sent status` line onto a status kind.
    ///
    /// sftp-server emits a fixed set of status strings; anything
    /// unrecognized is treated as a generic failure.
    pub fn from_status_text(text: &str) -> Self {
        if text.starts_with("Success") {
            Self::Success
        } else if text.starts_with("No such file") {
            Self::NoSuchFile
        } else if text.starts_with("Permission denied") {
            Self::PermissionDenied
        } else if text.starts_with("Operation unsupported") {
            Self::Unsupported
        } else {
            Self::Failure
        }
    }
}

/// One client operation inside a session.
#[derive(Debug, Clone)]
pub struct Command {
    pub kind: OperationKind,
    /// Milliseconds from the epoch anchor to the operation's log time.
    pub time_offset: i64,
    pub target: String,
    /// Populated for the rename family, empty otherwise.
    pub source: String,
    pub status: StatusKind,
}

impl Command {
    pub fn new(kind: OperationKind, time_offset: i64, target: String, source: String) -> Self {
        Self {
            kind,
            time_offset,
            target,
            source,
            status: StatusKind::Success,
        }
    }
}

/// An SFTP account, created the first time a username is seen.
///
/// Accounts live for the whole run; `session_ids` grows as sessions are
/// attributed to the account.
#[derive(Debug, Clone)]
pub struct Account {
    pub id: u32,
    pub name: String,
    pub session_ids: Vec<String>,
}

impl Account {
    pub fn new(id: u32, name: String) -> Self {
        Self {
            id,
            name,
            session_ids: Vec::new(),
        }
    }

    pub fn projection(&self) -> AccountProjection {
        AccountProjection {
            account_name: self.name.clone(),
            account_id: self.id,
            sessions: self.session_ids.clone(),
        }
    }
}

/// One client session: everything a single `internal-sftp` process did
/// for one account, identified by a derived hash key.
#[derive(Debug, Clone)]
pub struct Session {
    /// Derived identity key, see [`crate::audit::session::derive_key`].
    pub id: String,
    pub account_id: u32,
    pub pid: u32,
    /// Milliseconds from the epoch anchor to the session start.
    pub start_offset: i64,
    /// Set when a `session closed` line is seen.
    pub end_offset: Option<i64>,
    /// Client IPv4 address from the `session opened` line.
    pub ip_address: Option<u32>,
    pub commands: Vec<Command>,
}

impl Session {
    pub fn new(id: String, account_id: u32, pid: u32, start_time: NaiveDateTime) -> Self {
        Self {
            id,
            account_id,
            pid,
            start_offset: millis_since_anchor(start_time),
            end_offset: None,
            ip_address: None,
            commands: Vec::new(),
        }
    }

    /// Append a command, or fold a status response into the previous one.
    ///
    /// A `StatusResponse` never becomes a command of its own: it reports
    /// the outcome of whatever the client last did, so it mutates the most
    /// recently appended command's status. With no prior command it is
    /// dropped here (the integrity checker flags that case separately).
    pub fn record(&mut self, command: Command) {
        if command.kind == OperationKind::StatusResponse {
            let status = StatusKind::from_status_text(&command.target);
            if let Some(last) = self.commands.last_mut() {
                last.status = status;
            }
        } else {
            self.commands.push(command);
        }
    }

    pub fn projection(&self) -> SessionProjection {
        SessionProjection {
            session_id: self.id.clone(),
            account_id: self.account_id,
            pid: self.pid,
            start_time: self.start_offset,
            end_time: self.end_offset.unwrap_or(0),
            ip_address: self.ip_address.unwrap_or(0),
            commands: self
                .commands
                .iter()
                .enumerate()
                .map(|(i, cmd)| CommandProjection {
                    sequence_id: i,
                    kind: cmd.kind.wire_value(),
                    time_offset: cmd.time_offset,
                    target: cmd.target.clone(),
                    source: cmd.source.clone(),
                    status: cmd.status.wire_value(),
                })
                .collect(),
        }
    }
}

/// Wire form of an account, one JSON document per account.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountProjection {
    pub account_name: String,
    pub account_id: u32,
    pub sessions: Vec<String>,
}

/// Wire form of a session. Absent end time and address serialize as zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionProjection {
    pub session_id: String,
    pub account_id: u32,
    pub pid: u32,
    pub start_time: i64,
    pub end_time: i64,
    pub ip_address: u32,
    pub commands: Vec<CommandProjection>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandProjection {
    pub sequence_id: usize,
    #[serde(rename = "type")]
    pub kind: u8,
    pub time_offset: i64,
    pub target: String,
    pub source: String,
    pub status: u8,
}
