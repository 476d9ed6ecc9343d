// src/session/model.rs
//! Session data structures

use crate::geo::Coordinate;
use crate::gps::LocationFix;
use crate::track::{AppendLog, LogView, RouteAccumulator};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Name stored for a trip that is still being recorded
pub const IN_PROGRESS_NAME: &str = "Recording...";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub i64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SessionId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(SessionId)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Idle,
    Recording,
    Stopped,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Recording => "recording",
            SessionState::Stopped => "stopped",
        }
    }
}

/// An accepted fix as part of a session's trace
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TracePoint {
    pub session_id: SessionId,
    #[serde(flatten)]
    pub fix: LocationFix,
    /// Never earlier than the previous point of the same session
    pub timestamp_millis: i64,
}

impl TracePoint {
    pub fn coordinate(&self) -> &Coordinate {
        &self.fix.coordinate
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub coordinate: Coordinate,
    pub name: String,
    pub description: String,
    pub photo_ref: Option<String>,
    pub captured_at_millis: i64,
}

/// Statistics of a finished (or in-progress) trip as handed to storage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripSummary {
    pub session_id: SessionId,
    pub started_at_millis: i64,
    pub name: String,
    pub distance_m: f64,
    pub duration_millis: i64,
    pub average_speed_kmh: f64,
}

impl TripSummary {
    /// Summary stored when recording begins
    pub fn placeholder(session_id: SessionId, started_at_millis: i64) -> Self {
        Self {
            session_id,
            started_at_millis,
            name: IN_PROGRESS_NAME.to_string(),
            distance_m: 0.0,
            duration_millis: 0,
            average_speed_kmh: 0.0,
        }
    }

    pub fn format_duration(&self) -> String {
        let total_seconds = self.duration_millis / 1000;
        let hours = total_seconds / 3600;
        let minutes = (total_seconds % 3600) / 60;
        let seconds = total_seconds % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}s", seconds)
        }
    }
}

/// Average speed in km/h, zero for an empty duration
pub fn average_speed_kmh(distance_m: f64, duration_millis: i64) -> f64 {
    if duration_millis == 0 {
        0.0
    } else {
        (distance_m / 1000.0) / (duration_millis as f64 / 3_600_000.0)
    }
}

/// Name used when the user stops a trip without naming it
pub fn default_trip_name(started_at_millis: i64) -> String {
    match DateTime::from_timestamp_millis(started_at_millis) {
        Some(utc) => format!("Route {}", utc.with_timezone(&Local).format("%Y-%m-%d %H:%M")),
        None => format!("Route {}", started_at_millis),
    }
}

/// One start-to-stop recording
#[derive(Debug)]
pub struct Session {
    pub id: SessionId,
    pub state: SessionState,
    pub started_at_millis: i64,
    pub route: RouteAccumulator,
    pub waypoints: AppendLog<Waypoint>,
    pub elapsed_millis: i64,
}

impl Session {
    pub fn new(id: SessionId, started_at_millis: i64, route: RouteAccumulator) -> Self {
        Self {
            id,
            state: SessionState::Idle,
            started_at_millis,
            route,
            waypoints: AppendLog::new(),
            elapsed_millis: 0,
        }
    }

    pub fn trace(&self) -> LogView<TracePoint> {
        self.route.trace()
    }

    pub fn cumulative_distance_m(&self) -> f64 {
        self.route.cumulative_distance_m()
    }

    /// Final statistics. A blank name is replaced with a dated default.
    pub fn summary(&self, final_name: &str) -> TripSummary {
        let name = if final_name.trim().is_empty() {
            default_trip_name(self.started_at_millis)
        } else {
            final_name.trim().to_string()
        };
        let distance_m = self.cumulative_distance_m();

        TripSummary {
            session_id: self.id,
            started_at_millis: self.started_at_millis,
            name,
            distance_m,
            duration_millis: self.elapsed_millis,
            average_speed_kmh: average_speed_kmh(distance_m, self.elapsed_millis),
        }
    }

    /// O(1) in the trace length: trace and waypoints are shared, not copied
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: Some(self.id),
            state: self.state,
            is_recording: self.state == SessionState::Recording,
            elapsed_millis: self.elapsed_millis,
            cumulative_distance_m: self.cumulative_distance_m(),
            current_speed_kmh: self.route.speed_kmh(),
            trace: self.trace(),
            waypoints: self.waypoints.view(),
        }
    }
}

/// Immutable view of a session published to observers
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub session_id: Option<SessionId>,
    pub state: SessionState,
    pub is_recording: bool,
    pub elapsed_millis: i64,
    pub cumulative_distance_m: f64,
    pub current_speed_kmh: f64,
    pub trace: LogView<TracePoint>,
    pub waypoints: LogView<Waypoint>,
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self {
            session_id: None,
            state: SessionState::Idle,
            is_recording: false,
            elapsed_millis: 0,
            cumulative_distance_m: 0.0,
            current_speed_kmh: 0.0,
            trace: LogView::default(),
            waypoints: LogView::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_average_speed_zero_duration() {
        assert_eq!(average_speed_kmh(1234.0, 0), 0.0);
    }

    #[test]
    fn test_average_speed() {
        assert!((average_speed_kmh(1000.0, 100_000) - 36.0).abs() < 1e-9);
    }

    #[test]
    fn test_blank_name_gets_default() {
        let session = Session::new(SessionId(7), 1_700_000_000_000, RouteAccumulator::default());
        let summary = session.summary("   ");
        assert!(summary.name.starts_with("Route "));
        assert_eq!(session.summary(" Morning loop ").name, "Morning loop");
    }

    #[test]
    fn test_format_duration() {
        let mut summary = TripSummary::placeholder(SessionId(1), 0);
        summary.duration_millis = 3_723_000;
        assert_eq!(summary.format_duration(), "1h 2m 3s");
        summary.duration_millis = 59_000;
        assert_eq!(summary.format_duration(), "59s");
    }

    #[test]
    fn test_session_id_parse() {
        assert_eq!("42".parse::<SessionId>().unwrap(), SessionId(42));
        assert!("abc".parse::<SessionId>().is_err());
    }

    #[test]
    fn test_trace_point_json_is_flat() {
        let point = TracePoint {
            session_id: SessionId(3),
            fix: LocationFix::new(Coordinate { latitude: 1.0, longitude: 2.0 }, Some(4.0), 10),
            timestamp_millis: 10,
        };
        let json = serde_json::to_value(point).unwrap();
        assert_eq!(json["session_id"], 3);
        assert_eq!(json["accuracy_m"], 4.0);
        let back: TracePoint = serde_json::from_value(json).unwrap();
        assert_eq!(back, point);
    }
}
