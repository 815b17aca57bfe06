// Session registry - concurrent map of live and recently finished jobs

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tracing::debug;

use super::models::{ProgressSnapshot, SessionId};
use super::progress::ProgressRecord;

/// Owns every progress record. Constructed once and shared by handle.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: DashMap<SessionId, Arc<ProgressRecord>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fresh `queued` record under a new id
    pub fn create(&self, cookie_file: Option<PathBuf>) -> Arc<ProgressRecord> {
        loop {
            let id = SessionId::new();
            if let Entry::Vacant(slot) = self.sessions.entry(id) {
                let record = Arc::new(ProgressRecord::new(id, cookie_file));
                slot.insert(record.clone());
                debug!(session_id = %id, "Session created");
                return record;
            }
        }
    }

    pub fn get(&self, id: &SessionId) -> Option<Arc<ProgressRecord>> {
        self.sessions.get(id).map(|entry| entry.value().clone())
    }

    pub fn snapshot(&self, id: &SessionId) -> Option<ProgressSnapshot> {
        self.get(id).map(|record| record.snapshot())
    }

    /// Snapshots of all sessions, oldest first
    pub fn snapshots(&self) -> Vec<ProgressSnapshot> {
        let mut records: Vec<Arc<ProgressRecord>> =
            self.sessions.iter().map(|entry| entry.value().clone()).collect();
        records.sort_by_key(|r| r.created_at());
        records.iter().map(|r| r.snapshot()).collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Drop terminal records that finished more than `retention` before `now`.
    /// Live jobs are never removed.
    pub fn reap_terminal(&self, retention: Duration, now: OffsetDateTime) -> usize {
        let retention = time::Duration::try_from(retention).unwrap_or(time::Duration::MAX);
        let before = self.sessions.len();
        self.sessions.retain(|_, record| match record.finished_at() {
            Some(finished) if record.is_terminal() => now - finished <= retention,
            _ => true,
        });
        let removed = before.saturating_sub(self.sessions.len());
        if removed > 0 {
            debug!(removed, remaining = self.sessions.len(), "Reaped finished sessions");
        }
        removed
    }
}
