// src/lib.rs
//! Route Recorder Library
//!
//! Turns a live stream of GPS fixes into a de-noised route trace with
//! distance, elapsed time, speed and waypoints, and stores the finished trip.

pub mod config;
pub mod display;
pub mod error;
pub mod export;
pub mod feed;
pub mod geo;
pub mod gps;
pub mod session;
pub mod store;
pub mod track;

// Re-export main types for convenience
pub use error::{RecorderError, Result};
pub use feed::{FixSource, LocationFeed};
pub use geo::{distance, Coordinate};
pub use gps::LocationFix;
pub use session::{RecordingSession, SessionRegistry, SessionSnapshot, TripSummary};
pub use store::{JsonStore, MemoryStore, PersistenceSink, PersistenceWriter};
