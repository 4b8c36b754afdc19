//! Persistence sink contract for reconstructed entities.
//!
//! The reconstruction engine pushes an upsert through a [`SessionSink`]
//! for every line it processes, always carrying the entity's full current
//! projection. Sinks are expected to batch and deduplicate internally;
//! [`flush`](SessionSink::flush) is called exactly once at the end of a
//! run and must persist anything still buffered.
//!
//! [`JsonlSink`] writes JSON lines to disk; [`MemorySink`] records every
//! notification in order and backs the test suite.

pub mod jsonl;

pub use jsonl::JsonlSink;

use anyhow::Result;
use std::collections::HashMap;

use crate::audit::types::{AccountProjection, SessionProjection};

/// Whether an upsert refers to an entity the engine had seen before.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertState {
    New,
    Existing,
}

/// Receives account and session upserts from the reconstruction engine.
pub trait SessionSink {
    fn upsert_account(
        &mut self,
        id: u32,
        account: &AccountProjection,
        state: UpsertState,
    ) -> Result<()>;

    fn upsert_session(
        &mut self,
        id: &str,
        session: &SessionProjection,
        state: UpsertState,
    ) -> Result<()>;

    /// Persist anything still buffered and release backend resources.
    fn flush(&mut self) -> Result<()>;
}

/// In-memory sink that records every notification in arrival order.
///
/// Used by the test suite and as the reference for what a sink observes
/// over a run.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub account_events: Vec<(u32, UpsertState)>,
    pub session_events: Vec<(String, UpsertState)>,
    pub accounts: HashMap<u32, AccountProjection>,
    pub sessions: HashMap<String, SessionProjection>,
    pub flushed: bool,
}

impl SessionSink for MemorySink {
    fn upsert_account(
        &mut self,
        id: u32,
        account: &AccountProjection,
        state: UpsertState,
    ) -> Result<()> {
        self.account_events.push((id, state));
        self.accounts.insert(id, account.clone());
        Ok(())
    }

    fn upsert_session(
        &mut self,
        id: &str,
        session: &SessionProjection,
        state: UpsertState,
    ) -> Result<()> {
        self.session_events.push((id.to_string(), state));
        self.sessions.insert(id.to_string(), session.clone());
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.flushed = true;
        Ok(())
    }
}
