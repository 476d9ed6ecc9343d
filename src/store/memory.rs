// src/store/memory.rs
//! In-process store, used for embedding and tests

use super::{sort_most_recent_first, PersistenceSink, StoredSession};
use crate::error::{RecorderError, Result};
use crate::session::{Session, SessionId, TracePoint, TripSummary, Waypoint};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

#[derive(Debug, Default)]
pub struct MemoryStore {
    sessions: Mutex<BTreeMap<SessionId, StoredSession>>,
    failing: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail until switched back
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(RecorderError::Persistence("store unavailable".to_string()))
        } else {
            Ok(())
        }
    }

    fn with_session<T>(&self, id: SessionId, f: impl FnOnce(&mut StoredSession) -> T) -> Result<T> {
        self.check_writable()?;
        let mut sessions = self.sessions.lock().map_err(RecorderError::persistence)?;
        let stored = sessions
            .get_mut(&id)
            .ok_or_else(|| RecorderError::Persistence(format!("unknown session {}", id)))?;
        Ok(f(stored))
    }
}

impl PersistenceSink for MemoryStore {
    fn save_session(&self, session: &Session) -> Result<SessionId> {
        self.check_writable()?;
        let summary = TripSummary::placeholder(session.id, session.started_at_millis);
        self.sessions
            .lock()
            .map_err(RecorderError::persistence)?
            .insert(session.id, StoredSession::new(summary));
        Ok(session.id)
    }

    fn update_session(&self, id: SessionId, summary: &TripSummary) -> Result<()> {
        self.with_session(id, |stored| stored.summary = summary.clone())
    }

    fn append_trace_point(&self, id: SessionId, point: &TracePoint) -> Result<()> {
        self.with_session(id, |stored| stored.trace.push(*point))
    }

    fn append_waypoint(&self, id: SessionId, waypoint: &Waypoint) -> Result<()> {
        self.with_session(id, |stored| stored.waypoints.push(waypoint.clone()))
    }

    fn list_sessions(&self) -> Result<Vec<TripSummary>> {
        let sessions = self.sessions.lock().map_err(RecorderError::persistence)?;
        let mut summaries: Vec<TripSummary> = sessions.values().map(|s| s.summary.clone()).collect();
        sort_most_recent_first(&mut summaries);
        Ok(summaries)
    }

    fn load_session(&self, id: SessionId) -> Result<StoredSession> {
        self.sessions
            .lock()
            .map_err(RecorderError::persistence)?
            .get(&id)
            .cloned()
            .ok_or_else(|| RecorderError::Persistence(format!("unknown session {}", id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::IN_PROGRESS_NAME;
    use crate::track::RouteAccumulator;

    fn session(id: i64, started: i64) -> Session {
        Session::new(SessionId(id), started, RouteAccumulator::default())
    }

    #[test]
    fn test_save_creates_placeholder() {
        let store = MemoryStore::new();
        let id = store.save_session(&session(1, 100)).unwrap();
        let listed = store.list_sessions().unwrap();
        assert_eq!(id, SessionId(1));
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, IN_PROGRESS_NAME);
    }

    #[test]
    fn test_list_is_most_recent_first() {
        let store = MemoryStore::new();
        store.save_session(&session(1, 100)).unwrap();
        store.save_session(&session(3, 300)).unwrap();
        store.save_session(&session(2, 200)).unwrap();

        let ids: Vec<SessionId> = store.list_sessions().unwrap().iter().map(|s| s.session_id).collect();
        assert_eq!(ids, vec![SessionId(3), SessionId(2), SessionId(1)]);
    }

    #[test]
    fn test_failing_store_rejects_writes() {
        let store = MemoryStore::new();
        store.save_session(&session(1, 100)).unwrap();
        store.set_failing(true);
        let summary = TripSummary::placeholder(SessionId(1), 100);
        assert!(matches!(
            store.update_session(SessionId(1), &summary),
            Err(RecorderError::Persistence(_))
        ));
    }

    #[test]
    fn test_unknown_session() {
        let store = MemoryStore::new();
        assert!(store.load_session(SessionId(9)).is_err());
    }
}
