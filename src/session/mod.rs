// src/session/mod.rs
//! Recording sessions: data model, lifecycle and the active-session registry

pub mod model;
pub mod recorder;
pub mod registry;

pub use model::{
    average_speed_kmh, default_trip_name, Session, SessionId, SessionSnapshot, SessionState,
    TracePoint, TripSummary, Waypoint, IN_PROGRESS_NAME,
};
pub use recorder::{RecordingSession, SessionSettings};
pub use registry::SessionRegistry;
