// src/store/mod.rs
//! Durable storage for recorded sessions
//!
//! The recorder only ever writes through [`PersistenceSink`]; it never reads
//! its own writes back to make decisions. Live writes go through
//! [`PersistenceWriter`] so that storage latency never stalls fix ingestion.

pub mod json;
pub mod memory;
pub mod writer;

pub use json::JsonStore;
pub use memory::MemoryStore;
pub use writer::PersistenceWriter;

use crate::error::Result;
use crate::session::{Session, SessionId, TracePoint, TripSummary, Waypoint};
use serde::{Deserialize, Serialize};

/// Everything stored for one session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredSession {
    pub summary: TripSummary,
    pub trace: Vec<TracePoint>,
    pub waypoints: Vec<Waypoint>,
}

impl StoredSession {
    pub fn new(summary: TripSummary) -> Self {
        Self {
            summary,
            trace: Vec::new(),
            waypoints: Vec::new(),
        }
    }
}

pub trait PersistenceSink: Send + Sync {
    /// Create the durable record for a freshly started session. Records are
    /// keyed by `session.id`, which is also the id returned.
    fn save_session(&self, session: &Session) -> Result<SessionId>;

    fn update_session(&self, id: SessionId, summary: &TripSummary) -> Result<()>;

    fn append_trace_point(&self, id: SessionId, point: &TracePoint) -> Result<()>;

    fn append_waypoint(&self, id: SessionId, waypoint: &Waypoint) -> Result<()>;

    /// Trip summaries, most recent first
    fn list_sessions(&self) -> Result<Vec<TripSummary>>;

    fn load_session(&self, id: SessionId) -> Result<StoredSession>;
}

/// Most-recent-first ordering used by every store
pub(crate) fn sort_most_recent_first(summaries: &mut [TripSummary]) {
    summaries.sort_by(|a, b| {
        b.started_at_millis
            .cmp(&a.started_at_millis)
            .then(b.session_id.cmp(&a.session_id))
    });
}
