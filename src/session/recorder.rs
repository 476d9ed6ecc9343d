// src/session/recorder.rs
//! Recording session state machine and waypoint capture

use super::model::{Session, SessionId, SessionSnapshot, SessionState, TripSummary, Waypoint};
use crate::config::RecorderConfig;
use crate::error::{RecorderError, Result};
use crate::geo::Coordinate;
use crate::gps::fix::{now_millis, LocationFix};
use crate::store::PersistenceWriter;
use crate::track::{AcceptOutcome, Chronometer, FilterSettings, RouteAccumulator};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;

/// Tunables applied to every session a registry creates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionSettings {
    pub filter: FilterSettings,
    pub tick_interval: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            filter: FilterSettings::default(),
            tick_interval: Duration::from_millis(crate::config::DEFAULT_TICK_INTERVAL_MS),
        }
    }
}

impl From<&RecorderConfig> for SessionSettings {
    fn from(config: &RecorderConfig) -> Self {
        Self {
            filter: config.filter_settings(),
            tick_interval: config.tick_interval(),
        }
    }
}

struct Inner {
    session: Session,
    /// Freshest fix seen while recording, including ones filtered out of the trace
    last_known: Option<LocationFix>,
    chronometer: Option<Chronometer>,
    ingest: Option<JoinHandle<()>>,
}

struct Shared {
    inner: Mutex<Inner>,
    snapshots: watch::Sender<SessionSnapshot>,
}

impl Shared {
    fn publish(&self, inner: &Inner) {
        self.snapshots.send_replace(inner.session.snapshot());
    }

    /// Apply one chronometer tick. Returns false once the session left `Recording`.
    async fn tick(&self, period: Duration) -> bool {
        let mut inner = self.inner.lock().await;
        if inner.session.state != SessionState::Recording {
            return false;
        }
        inner.session.elapsed_millis += period.as_millis() as i64;
        self.publish(&inner);
        true
    }
}

/// A single start-to-stop recording.
///
/// Cloning yields another handle to the same session. Every mutation happens
/// under one lock, so a fix, a tick, a waypoint or a stop is applied as a
/// whole and in the order the lock was acquired.
#[derive(Clone)]
pub struct RecordingSession {
    id: SessionId,
    settings: SessionSettings,
    shared: Arc<Shared>,
    writer: PersistenceWriter,
}

impl fmt::Debug for RecordingSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordingSession")
            .field("id", &self.id)
            .field("state", &self.state())
            .finish()
    }
}

impl RecordingSession {
    /// Create an idle session. Nothing is recorded until [`start`](Self::start).
    pub fn new(id: SessionId, settings: SessionSettings, writer: PersistenceWriter) -> Self {
        let session = Session::new(id, 0, RouteAccumulator::new(id, settings.filter));
        let (snapshots, _) = watch::channel(session.snapshot());

        Self {
            id,
            settings,
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    session,
                    last_known: None,
                    chronometer: None,
                    ingest: None,
                }),
                snapshots,
            }),
            writer,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.shared.snapshots.borrow().state
    }

    pub fn is_recording(&self) -> bool {
        self.state() == SessionState::Recording
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> SessionSnapshot {
        self.shared.snapshots.borrow().clone()
    }

    /// Receive a new snapshot after every accepted mutation
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.shared.snapshots.subscribe()
    }

    pub async fn start(&self) -> Result<()> {
        self.start_from(None).await
    }

    /// Start recording. `initial_fix`, the freshest position known to the
    /// caller, is run through the accumulator straight away.
    ///
    /// The durable record is created on the persistence worker. The session
    /// lock is held while waiting for it, which only holds back other calls
    /// on this session; the runtime keeps running.
    pub async fn start_from(&self, initial_fix: Option<LocationFix>) -> Result<()> {
        let mut inner = self.shared.inner.lock().await;
        if inner.session.state != SessionState::Idle {
            return Err(RecorderError::InvalidTransition {
                state: inner.session.state.as_str(),
                command: "start",
            });
        }

        let started_at_millis = now_millis();
        let record = Session::new(
            self.id,
            started_at_millis,
            RouteAccumulator::new(self.id, self.settings.filter),
        );
        match self.writer.save_session(record).await {
            Ok(stored_id) if stored_id != self.id => tracing::warn!(
                "Sink stored session {} as {}; later writes use {}",
                self.id,
                stored_id,
                self.id
            ),
            Ok(_) => {}
            Err(e) => tracing::warn!("Could not create record for session {}: {}", self.id, e),
        }

        inner.session.state = SessionState::Recording;
        inner.session.started_at_millis = started_at_millis;

        let shared = Arc::clone(&self.shared);
        inner.chronometer = Some(Chronometer::start(self.settings.tick_interval, move |period| {
            let shared = Arc::clone(&shared);
            async move { shared.tick(period).await }
        }));

        tracing::info!("Started recording session {}", self.id);

        if let Some(fix) = initial_fix {
            self.apply_fix(&mut inner, fix);
        }
        self.shared.publish(&inner);
        Ok(())
    }

    /// Feed one location fix. Returns `None` when the session is not
    /// recording; late fixes after a stop are expected and dropped.
    pub async fn on_location_fix(&self, fix: LocationFix) -> Option<AcceptOutcome> {
        let mut inner = self.shared.inner.lock().await;
        if inner.session.state != SessionState::Recording {
            tracing::trace!("Ignoring fix for {} session {}", inner.session.state.as_str(), self.id);
            return None;
        }
        Some(self.apply_fix(&mut inner, fix))
    }

    fn apply_fix(&self, inner: &mut Inner, fix: LocationFix) -> AcceptOutcome {
        inner.last_known = Some(fix);
        let outcome = inner.session.route.accept(fix);
        match outcome {
            AcceptOutcome::Appended { point, .. } => {
                self.writer.append_trace_point(self.id, point);
                self.shared.publish(inner);
            }
            AcceptOutcome::Stationary { .. } => self.shared.publish(inner),
            AcceptOutcome::Dropped => {}
        }
        outcome
    }

    /// Forward fixes from a location feed until the session stops
    pub async fn attach_fixes(&self, mut fixes: broadcast::Receiver<LocationFix>) -> Result<()> {
        let mut inner = self.shared.inner.lock().await;
        if inner.session.state != SessionState::Recording {
            return Err(RecorderError::InvalidTransition {
                state: inner.session.state.as_str(),
                command: "attach fixes",
            });
        }

        let session = self.clone();
        let handle = tokio::spawn(async move {
            loop {
                match fixes.recv().await {
                    Ok(fix) => {
                        session.on_location_fix(fix).await;
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        tracing::warn!("Session {} skipped {} fixes", session.id, missed);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        if let Some(previous) = inner.ingest.replace(handle) {
            previous.abort();
        }
        Ok(())
    }

    /// Add a waypoint at the freshest known position
    pub async fn add_waypoint(
        &self,
        name: &str,
        description: &str,
        photo_ref: Option<String>,
    ) -> Result<Waypoint> {
        self.capture_waypoint(name, description, photo_ref, None).await
    }

    /// Add a waypoint at an explicit position
    pub async fn add_waypoint_at(
        &self,
        name: &str,
        description: &str,
        photo_ref: Option<String>,
        location: Coordinate,
    ) -> Result<Waypoint> {
        self.capture_waypoint(name, description, photo_ref, Some(location)).await
    }

    async fn capture_waypoint(
        &self,
        name: &str,
        description: &str,
        photo_ref: Option<String>,
        location: Option<Coordinate>,
    ) -> Result<Waypoint> {
        let mut inner = self.shared.inner.lock().await;
        if inner.session.state != SessionState::Recording {
            return Err(RecorderError::NoActiveSession);
        }

        let coordinate = location
            .or_else(|| inner.last_known.map(|fix| fix.coordinate))
            .ok_or_else(|| RecorderError::LocationUnavailable("no fix received yet".to_string()))?;

        let waypoint = Waypoint {
            coordinate,
            name: name.to_string(),
            description: description.to_string(),
            photo_ref,
            captured_at_millis: now_millis(),
        };
        inner.session.waypoints.push(waypoint.clone());
        self.writer.append_waypoint(self.id, waypoint.clone());
        self.shared.publish(&inner);

        tracing::info!("Added waypoint '{}' to session {}", waypoint.name, self.id);
        Ok(waypoint)
    }

    /// Stop recording and produce the trip summary.
    ///
    /// The chronometer and any attached fix feed are cancelled and joined
    /// before this returns, so nothing mutates the session afterwards.
    pub async fn stop(&self, final_name: &str) -> Result<TripSummary> {
        let (summary, chronometer, ingest) = {
            let mut inner = self.shared.inner.lock().await;
            if inner.session.state != SessionState::Recording {
                return Err(RecorderError::InvalidTransition {
                    state: inner.session.state.as_str(),
                    command: "stop",
                });
            }

            inner.session.state = SessionState::Stopped;
            let summary = inner.session.summary(final_name);
            self.writer.update_session(self.id, summary.clone());
            self.shared.publish(&inner);
            (summary, inner.chronometer.take(), inner.ingest.take())
        };

        if let Some(chronometer) = chronometer {
            chronometer.stop().await;
        }
        if let Some(ingest) = ingest {
            ingest.abort();
            let _ = ingest.await;
        }

        tracing::info!(
            "Stopped session {} '{}': {:.1} m in {}",
            self.id,
            summary.name,
            summary.distance_m,
            summary.format_duration()
        );
        Ok(summary)
    }
}
