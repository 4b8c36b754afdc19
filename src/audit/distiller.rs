//! Session reconstruction engine.
//!
//! Consumes classified lines in file order and maintains the account and
//! session registries, emitting an upsert to the sink for every line so
//! downstream persistence always holds the latest projection. The engine
//! owns its registries; one engine instance is fed every file of a run so
//! sessions spanning a log rotation keep resolving to the same identity.
//!
//! Registry updates for a line are applied before the sink is notified,
//! and a sink failure is counted rather than propagated, so the in-memory
//! model never ends up half-updated because a backend write failed.

use chrono::NaiveTime;
use std::collections::HashMap;

use crate::audit::parser::ParsedLine;
use crate::audit::session::{derive_key, millis_since_anchor, probe_keys, DEFAULT_LOOKBACK_DAYS};
use crate::audit::types::{Account, Command, OperationKind, Session};
use crate::sink::{SessionSink, UpsertState};

/// Counters reported at the end of a distillation run.
#[derive(Debug, Default, Clone, Copy)]
pub struct DistillStats {
    pub lines_ingested: usize,
    pub accounts_created: usize,
    pub sessions_created: usize,
    /// Failed sink writes; the scan continues past them and the final
    /// summary surfaces the count.
    pub sink_errors: usize,
}

/// Reconstructs accounts and sessions from a stream of classified lines.
pub struct SessionDistiller {
    accounts: HashMap<String, Account>,
    sessions: HashMap<String, Session>,
    next_account_id: u32,
    lookback_days: u32,
    stats: DistillStats,
}

impl Default for SessionDistiller {
    fn default() -> Self {
        Self::new(DEFAULT_LOOKBACK_DAYS)
    }
}

impl SessionDistiller {
    pub fn new(lookback_days: u32) -> Self {
        Self {
            accounts: HashMap::new(),
            sessions: HashMap::new(),
            next_account_id: 1,
            lookback_days,
            stats: DistillStats::default(),
        }
    }

    /// Feed one classified line through the reconstruction algorithm.
    pub fn ingest(&mut self, line: &ParsedLine, sink: &mut dyn SessionSink) {
        self.stats.lines_ingested += 1;

        let account_id = self.resolve_account(line, sink);
        let (key, state) = self.resolve_session(account_id, line, sink);

        let offset = millis_since_anchor(line.timestamp);
        if let Some(session) = self.sessions.get_mut(&key) {
            match line.kind {
                OperationKind::SessionStart => {
                    session.start_offset = offset;
                    session.ip_address = line
                        .target
                        .parse::<std::net::Ipv4Addr>()
                        .ok()
                        .map(u32::from);
                }
                OperationKind::SessionFinish => session.end_offset = Some(offset),
                _ => {}
            }
            session.record(Command::new(
                line.kind,
                offset,
                line.target.clone(),
                line.source.clone(),
            ));

            let projection = session.projection();
            if let Err(err) = sink.upsert_session(&key, &projection, state) {
                self.stats.sink_errors += 1;
                eprintln!("Sink error for session {key}: {err:#}");
            }
        }
    }

    /// Look up the account for a username, creating and announcing it on
    /// first sighting.
    fn resolve_account(&mut self, line: &ParsedLine, sink: &mut dyn SessionSink) -> u32 {
        if let Some(account) = self.accounts.get(&line.user) {
            return account.id;
        }

        let id = self.next_account_id;
        self.next_account_id += 1;
        let account = Account::new(id, line.user.clone());
        let projection = account.projection();
        self.accounts.insert(line.user.clone(), account);
        self.stats.accounts_created += 1;

        if let Err(err) = sink.upsert_account(id, &projection, UpsertState::New) {
            self.stats.sink_errors += 1;
            eprintln!("Sink error for account {}: {err:#}", line.user);
        }
        id
    }

    /// Resolve a line to a session by bounded lookback probing.
    ///
    /// Keys for the line's date and the preceding lookback days are tried
    /// most recent first; the probe is what keeps a session that spans the
    /// midnight log rollover on a single identity. With no hit, a new
    /// session keyed by the line's own date is created and linked into the
    /// owning account.
    fn resolve_session(
        &mut self,
        account_id: u32,
        line: &ParsedLine,
        sink: &mut dyn SessionSink,
    ) -> (String, UpsertState) {
        let date = line.timestamp.date();
        let resolved = probe_keys(account_id, line.pid, date, self.lookback_days)
            .find(|key| self.sessions.contains_key(key));
        if let Some(key) = resolved {
            return (key, UpsertState::Existing);
        }

        let key = derive_key(account_id, line.pid, date.and_time(NaiveTime::MIN));
        let session = Session::new(key.clone(), account_id, line.pid, line.timestamp);
        self.sessions.insert(key.clone(), session);
        self.stats.sessions_created += 1;

        if let Some(account) = self.accounts.get_mut(&line.user) {
            account.session_ids.push(key.clone());
            let projection = account.projection();
            if let Err(err) = sink.upsert_account(account_id, &projection, UpsertState::Existing) {
                self.stats.sink_errors += 1;
                eprintln!("Sink error for account {}: {err:#}", line.user);
            }
        }
        (key, UpsertState::New)
    }

    pub fn stats(&self) -> DistillStats {
        self.stats
    }

    pub fn account(&self, name: &str) -> Option<&Account> {
        self.accounts.get(name)
    }

    pub fn session(&self, key: &str) -> Option<&Session> {
        self.sessions.get(key)
    }

    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}
