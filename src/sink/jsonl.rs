//! JSON-lines persistence sink.
//!
//! Buffers upserts in per-entity caches and writes each output file in one
//! pass at flush time, one JSON document per line. Because the engine
//! re-upserts an entity on every line that touches it, writing eagerly
//! would emit thousands of stale copies of busy sessions; caching by
//! entity id keeps exactly the latest projection, the same dedup-on-id
//! behavior a database-backed sink gets from revision-tracked bulk
//! upserts.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use crate::audit::types::{AccountProjection, SessionProjection};
use crate::sink::{SessionSink, UpsertState};

pub struct JsonlSink {
    accounts_path: PathBuf,
    sessions_path: PathBuf,
    accounts: HashMap<u32, AccountProjection>,
    sessions: HashMap<String, SessionProjection>,
}

impl JsonlSink {
    pub fn new(accounts_path: impl Into<PathBuf>, sessions_path: impl Into<PathBuf>) -> Self {
        Self {
            accounts_path: accounts_path.into(),
            sessions_path: sessions_path.into(),
            accounts: HashMap::new(),
            sessions: HashMap::new(),
        }
    }

}

impl SessionSink for JsonlSink {
    fn upsert_account(
        &mut self,
        id: u32,
        account: &AccountProjection,
        _state: UpsertState,
    ) -> Result<()> {
        // Last write per id wins; earlier projections are strict subsets.
        self.accounts.insert(id, account.clone());
        Ok(())
    }

    fn upsert_session(
        &mut self,
        id: &str,
        session: &SessionProjection,
        _state: UpsertState,
    ) -> Result<()> {
        self.sessions.insert(id.to_string(), session.clone());
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        let mut accounts: Vec<&AccountProjection> = self.accounts.values().collect();
        accounts.sort_by_key(|a| a.account_id);

        let file = File::create(&self.accounts_path).with_context(|| {
            format!("Failed to create {}", self.accounts_path.display())
        })?;
        let mut writer = BufWriter::new(file);
        for account in accounts {
            serde_json::to_writer(&mut writer, account)?;
            writeln!(writer)?;
        }
        writer.flush().with_context(|| {
            format!("Failed to write {}", self.accounts_path.display())
        })?;

        let mut sessions: Vec<&SessionProjection> = self.sessions.values().collect();
        sessions.sort_by(|a, b| {
            a.start_time
                .cmp(&b.start_time)
                .then_with(|| a.session_id.cmp(&b.session_id))
        });

        let file = File::create(&self.sessions_path).with_context(|| {
            format!("Failed to create {}", self.sessions_path.display())
        })?;
        let mut writer = BufWriter::new(file);
        for session in sessions {
            serde_json::to_writer(&mut writer, session)?;
            writeln!(writer)?;
        }
        writer.flush().with_context(|| {
            format!("Failed to write {}", self.sessions_path.display())
        })?;

        Ok(())
    }
}
