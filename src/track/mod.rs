// src/track/mod.rs
//! Fix filtering, distance accumulation and timing for a recording

pub mod accumulator;
pub mod chronometer;
pub mod filter;
pub mod log;
pub mod speed;

pub use accumulator::{AcceptOutcome, RouteAccumulator};
pub use chronometer::Chronometer;
pub use filter::{FilterSettings, NoiseFilter};
pub use log::{AppendLog, LogView};
pub use speed::SpeedEstimator;
