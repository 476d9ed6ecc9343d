// src/gps/fix.rs
//! A single reported position

use crate::geo::Coordinate;
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Position report from a location provider. Never mutated after creation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationFix {
    pub coordinate: Coordinate,
    /// Horizontal accuracy radius in meters, if the receiver reported one
    pub accuracy_m: Option<f64>,
    pub captured_at_millis: i64,
}

impl LocationFix {
    pub fn new(coordinate: Coordinate, accuracy_m: Option<f64>, captured_at_millis: i64) -> Self {
        Self {
            coordinate,
            accuracy_m,
            captured_at_millis,
        }
    }

    /// Fix stamped with the current wall-clock time
    pub fn now(coordinate: Coordinate, accuracy_m: Option<f64>) -> Self {
        Self::new(coordinate, accuracy_m, now_millis())
    }

    /// Age of the fix relative to `now_millis`, in milliseconds
    pub fn age_millis(&self, now_millis: i64) -> i64 {
        now_millis - self.captured_at_millis
    }
}

/// Wall-clock milliseconds since the Unix epoch
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}
