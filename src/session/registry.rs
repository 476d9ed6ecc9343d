// src/session/registry.rs
//! Host-owned registry allowing one recording at a time

use super::model::{SessionId, SessionState, TripSummary, Waypoint};
use super::recorder::{RecordingSession, SessionSettings};
use crate::error::{RecorderError, Result};
use crate::gps::fix::{now_millis, LocationFix};
use crate::store::PersistenceWriter;
use tokio::sync::Mutex;

struct Slot {
    active: Option<RecordingSession>,
    last_id: i64,
}

/// Creates sessions and keeps a reference to the one currently recording.
///
/// Starting while another session records is rejected, never queued.
pub struct SessionRegistry {
    settings: SessionSettings,
    writer: PersistenceWriter,
    slot: Mutex<Slot>,
}

impl SessionRegistry {
    pub fn new(settings: SessionSettings, writer: PersistenceWriter) -> Self {
        Self {
            settings,
            writer,
            slot: Mutex::new(Slot {
                active: None,
                last_id: 0,
            }),
        }
    }

    pub fn writer(&self) -> &PersistenceWriter {
        &self.writer
    }

    /// Create and start a new session
    pub async fn begin(&self, initial_fix: Option<LocationFix>) -> Result<RecordingSession> {
        let mut slot = self.slot.lock().await;
        if let Some(active) = &slot.active {
            if active.state() == SessionState::Recording {
                return Err(RecorderError::InvalidTransition {
                    state: SessionState::Recording.as_str(),
                    command: "start",
                });
            }
        }

        // Ids follow the start time but must stay unique within the registry
        let id = now_millis().max(slot.last_id + 1);
        slot.last_id = id;

        let session = RecordingSession::new(SessionId(id), self.settings, self.writer.clone());
        session.start_from(initial_fix).await?;
        slot.active = Some(session.clone());
        Ok(session)
    }

    /// The session currently recording, if any
    pub async fn active(&self) -> Option<RecordingSession> {
        let slot = self.slot.lock().await;
        slot.active.as_ref().filter(|s| s.is_recording()).cloned()
    }

    pub async fn stop(&self, final_name: &str) -> Result<TripSummary> {
        // Held across the stop so a concurrent begin cannot overlap it
        let mut slot = self.slot.lock().await;
        let session = slot.active.take().ok_or(RecorderError::InvalidTransition {
            state: SessionState::Idle.as_str(),
            command: "stop",
        })?;
        session.stop(final_name).await
    }

    pub async fn on_location_fix(&self, fix: LocationFix) {
        if let Some(session) = self.active().await {
            session.on_location_fix(fix).await;
        }
    }

    pub async fn add_waypoint(
        &self,
        name: &str,
        description: &str,
        photo_ref: Option<String>,
    ) -> Result<Waypoint> {
        let session = self.active().await.ok_or(RecorderError::NoActiveSession)?;
        session.add_waypoint(name, description, photo_ref).await
    }

    /// Stored trip summaries, most recent first, straight from the sink
    pub fn list_sessions(&self) -> Result<Vec<TripSummary>> {
        self.writer.sink().list_sessions()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::Coordinate;
    use crate::store::{MemoryStore, PersistenceSink};
    use std::sync::Arc;

    fn registry() -> (SessionRegistry, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let writer = PersistenceWriter::spawn(store.clone());
        (SessionRegistry::new(SessionSettings::default(), writer), store)
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_begin_is_rejected() {
        let (registry, _) = registry();
        let first = registry.begin(None).await.unwrap();

        let err = registry.begin(None).await.unwrap_err();
        assert!(matches!(err, RecorderError::InvalidTransition { command: "start", .. }));
        assert_eq!(registry.active().await.unwrap().id(), first.id());
        assert!(first.is_recording());
        registry.stop("").await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_session_after_stop() {
        let (registry, store) = registry();
        let first = registry.begin(None).await.unwrap();
        registry.stop("One").await.unwrap();
        assert!(registry.active().await.is_none());

        let second = registry.begin(None).await.unwrap();
        assert!(second.id() > first.id());
        registry.stop("Two").await.unwrap();

        registry.writer().flush().await;
        let names: Vec<String> = registry.list_sessions().unwrap().into_iter().map(|s| s.name).collect();
        assert_eq!(store.list_sessions().unwrap().len(), 2);
        assert_eq!(names.len(), 2);
        assert!(names.contains(&"One".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_commands_without_session() {
        let (registry, _) = registry();
        assert!(matches!(
            registry.add_waypoint("a", "b", None).await,
            Err(RecorderError::NoActiveSession)
        ));
        assert!(matches!(
            registry.stop("x").await,
            Err(RecorderError::InvalidTransition { command: "stop", .. })
        ));
        // Fixes without a session are simply dropped
        registry
            .on_location_fix(LocationFix::new(Coordinate { latitude: 0.0, longitude: 0.0 }, Some(1.0), 0))
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_routes_fixes_and_waypoints_to_active() {
        let (registry, _) = registry();
        let session = registry
            .begin(Some(LocationFix::new(Coordinate { latitude: 0.0, longitude: 0.0 }, Some(3.0), 0)))
            .await
            .unwrap();
        registry
            .on_location_fix(LocationFix::new(Coordinate { latitude: 0.0, longitude: 0.001 }, Some(3.0), 1_000))
            .await;
        registry.add_waypoint("Gate", "", None).await.unwrap();

        let snap = session.snapshot();
        assert_eq!(snap.trace.len(), 2);
        assert_eq!(snap.waypoints.get(0).unwrap().coordinate.longitude, 0.001);
        registry.stop("").await.unwrap();
    }
}
