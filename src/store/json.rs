// src/store/json.rs
//! File-backed store: one directory per session
//!
//! ```text
//! <root>/<session id>/summary.json     trip summary, rewritten on update
//! <root>/<session id>/trace.jsonl      one trace point per line, append only
//! <root>/<session id>/waypoints.jsonl  one waypoint per line, append only
//! ```

use super::{sort_most_recent_first, PersistenceSink, StoredSession};
use crate::error::{RecorderError, Result};
use crate::session::{Session, SessionId, TracePoint, TripSummary, Waypoint};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

const SUMMARY_FILE: &str = "summary.json";
const TRACE_FILE: &str = "trace.jsonl";
const WAYPOINTS_FILE: &str = "waypoints.jsonl";

#[derive(Debug, Clone)]
pub struct JsonStore {
    root: PathBuf,
}

impl JsonStore {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .map_err(|e| RecorderError::Persistence(format!("Failed to create store directory {}: {}", root.display(), e)))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn session_dir(&self, id: SessionId) -> PathBuf {
        self.root.join(id.to_string())
    }

    fn existing_session_dir(&self, id: SessionId) -> Result<PathBuf> {
        let dir = self.session_dir(id);
        if dir.join(SUMMARY_FILE).exists() {
            Ok(dir)
        } else {
            Err(RecorderError::Persistence(format!("unknown session {}", id)))
        }
    }

    fn write_summary(&self, dir: &Path, summary: &TripSummary) -> Result<()> {
        let contents = serde_json::to_string_pretty(summary)?;
        // Write-then-rename so a crash never leaves a truncated summary
        let tmp = dir.join(format!("{}.tmp", SUMMARY_FILE));
        fs::write(&tmp, contents).map_err(RecorderError::persistence)?;
        fs::rename(&tmp, dir.join(SUMMARY_FILE)).map_err(RecorderError::persistence)?;
        Ok(())
    }

    fn read_summary(dir: &Path) -> Result<TripSummary> {
        let contents = fs::read_to_string(dir.join(SUMMARY_FILE))?;
        Ok(serde_json::from_str(&contents)?)
    }

    fn append_line<T: Serialize>(path: &Path, value: &T) -> Result<()> {
        let mut line = serde_json::to_string(value)?;
        line.push('\n');
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(RecorderError::persistence)?;
        file.write_all(line.as_bytes()).map_err(RecorderError::persistence)?;
        Ok(())
    }

    fn read_lines<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
        if !path.exists() {
            return Ok(Vec::new());
        }
        let reader = BufReader::new(fs::File::open(path)?);
        let mut values = Vec::new();
        for (number, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(&line) {
                Ok(value) => values.push(value),
                // A torn last line after a crash should not hide the rest of the trip
                Err(e) => tracing::warn!("Skipping line {} of {}: {}", number + 1, path.display(), e),
            }
        }
        Ok(values)
    }
}

impl PersistenceSink for JsonStore {
    fn save_session(&self, session: &Session) -> Result<SessionId> {
        let dir = self.session_dir(session.id);
        fs::create_dir_all(&dir).map_err(RecorderError::persistence)?;
        self.write_summary(&dir, &TripSummary::placeholder(session.id, session.started_at_millis))?;
        Ok(session.id)
    }

    fn update_session(&self, id: SessionId, summary: &TripSummary) -> Result<()> {
        let dir = self.existing_session_dir(id)?;
        self.write_summary(&dir, summary)
    }

    fn append_trace_point(&self, id: SessionId, point: &TracePoint) -> Result<()> {
        let dir = self.existing_session_dir(id)?;
        Self::append_line(&dir.join(TRACE_FILE), point)
    }

    fn append_waypoint(&self, id: SessionId, waypoint: &Waypoint) -> Result<()> {
        let dir = self.existing_session_dir(id)?;
        Self::append_line(&dir.join(WAYPOINTS_FILE), waypoint)
    }

    fn list_sessions(&self) -> Result<Vec<TripSummary>> {
        let mut summaries = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if !path.join(SUMMARY_FILE).exists() {
                continue;
            }
            match Self::read_summary(&path) {
                Ok(summary) => summaries.push(summary),
                Err(e) => tracing::warn!("Skipping unreadable session {}: {}", path.display(), e),
            }
        }
        sort_most_recent_first(&mut summaries);
        Ok(summaries)
    }

    fn load_session(&self, id: SessionId) -> Result<StoredSession> {
        let dir = self.existing_session_dir(id)?;
        Ok(StoredSession {
            summary: Self::read_summary(&dir)?,
            trace: Self::read_lines(&dir.join(TRACE_FILE))?,
            waypoints: Self::read_lines(&dir.join(WAYPOINTS_FILE))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::Coordinate;
    use crate::gps::LocationFix;
    use crate::track::RouteAccumulator;

    fn temp_store(tag: &str) -> JsonStore {
        let dir = std::env::temp_dir().join(format!("route-recorder-{}-{}", tag, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        JsonStore::open(dir).unwrap()
    }

    fn point(id: SessionId, lon: f64, at: i64) -> TracePoint {
        TracePoint {
            session_id: id,
            fix: LocationFix::new(Coordinate { latitude: 0.0, longitude: lon }, Some(3.0), at),
            timestamp_millis: at,
        }
    }

    #[test]
    fn test_session_lifecycle_on_disk() {
        let store = temp_store("lifecycle");
        let id = SessionId(1_000);
        let session = Session::new(id, 1_000, RouteAccumulator::default());
        store.save_session(&session).unwrap();

        store.append_trace_point(id, &point(id, 0.0, 1_000)).unwrap();
        store.append_trace_point(id, &point(id, 0.001, 2_000)).unwrap();
        store
            .append_waypoint(
                id,
                &Waypoint {
                    coordinate: Coordinate { latitude: 0.0, longitude: 0.001 },
                    name: "Bridge".to_string(),
                    description: "old stone bridge".to_string(),
                    photo_ref: None,
                    captured_at_millis: 2_000,
                },
            )
            .unwrap();

        let mut summary = session.summary("Walk");
        summary.distance_m = 111.0;
        store.update_session(id, &summary).unwrap();

        let loaded = store.load_session(id).unwrap();
        assert_eq!(loaded.summary.name, "Walk");
        assert_eq!(loaded.trace.len(), 2);
        assert_eq!(loaded.waypoints[0].name, "Bridge");

        let _ = fs::remove_dir_all(store.root());
    }

    #[test]
    fn test_list_sessions_ordering() {
        let store = temp_store("list");
        for (id, started) in [(1, 10), (2, 30), (3, 20)] {
            store
                .save_session(&Session::new(SessionId(id), started, RouteAccumulator::default()))
                .unwrap();
        }
        let ids: Vec<i64> = store.list_sessions().unwrap().iter().map(|s| s.session_id.0).collect();
        assert_eq!(ids, vec![2, 3, 1]);

        let _ = fs::remove_dir_all(store.root());
    }

    #[test]
    fn test_append_to_unknown_session_fails() {
        let store = temp_store("unknown");
        let id = SessionId(5);
        assert!(matches!(
            store.append_trace_point(id, &point(id, 0.0, 0)),
            Err(RecorderError::Persistence(_))
        ));

        let _ = fs::remove_dir_all(store.root());
    }

    #[test]
    fn test_torn_line_is_skipped() {
        let store = temp_store("torn");
        let id = SessionId(7);
        store
            .save_session(&Session::new(id, 7, RouteAccumulator::default()))
            .unwrap();
        store.append_trace_point(id, &point(id, 0.0, 0)).unwrap();
        let mut file = OpenOptions::new()
            .append(true)
            .open(store.root().join("7").join(TRACE_FILE))
            .unwrap();
        file.write_all(b"{\"session_id\":7,\"coord").unwrap();

        let loaded = store.load_session(id).unwrap();
        assert_eq!(loaded.trace.len(), 1);

        let _ = fs::remove_dir_all(store.root());
    }
}
