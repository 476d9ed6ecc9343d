// src/track/filter.rs
//! Jitter rejection for incoming fixes

use crate::config::{
    DEFAULT_MAX_ACCURACY_M, DEFAULT_MOVEMENT_THRESHOLD_M, DEFAULT_STILLNESS_TIMEOUT_MS,
};
use crate::geo::{self, Coordinate};
use crate::gps::LocationFix;
use crate::session::TracePoint;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterSettings {
    pub movement_threshold_m: f64,
    pub max_accuracy_m: f64,
    /// Whether fixes without an accuracy estimate are considered at all
    pub accept_unknown_accuracy: bool,
    pub stillness_timeout_ms: i64,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            movement_threshold_m: DEFAULT_MOVEMENT_THRESHOLD_M,
            max_accuracy_m: DEFAULT_MAX_ACCURACY_M,
            accept_unknown_accuracy: false,
            stillness_timeout_ms: DEFAULT_STILLNESS_TIMEOUT_MS,
        }
    }
}

/// Result of running a fix through both gates
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FilterDecision {
    /// Failed the accuracy gate; not even compared against the trace
    Inaccurate,
    /// Eligible and there is no previous point to compare with
    First,
    Moved { distance_m: f64 },
    Jitter { distance_m: f64 },
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoiseFilter {
    settings: FilterSettings,
}

impl NoiseFilter {
    pub fn new(settings: FilterSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &FilterSettings {
        &self.settings
    }

    /// Accuracy gate. Runs before any distance comparison.
    pub fn is_accurate(&self, fix: &LocationFix) -> bool {
        match fix.accuracy_m {
            Some(accuracy) => accuracy <= self.settings.max_accuracy_m,
            None => self.settings.accept_unknown_accuracy,
        }
    }

    pub fn classify(&self, previous: Option<&Coordinate>, candidate: &LocationFix) -> FilterDecision {
        if !self.is_accurate(candidate) {
            return FilterDecision::Inaccurate;
        }

        let Some(previous) = previous else {
            return FilterDecision::First;
        };

        let distance_m = geo::distance(previous, &candidate.coordinate);
        if distance_m >= self.settings.movement_threshold_m {
            FilterDecision::Moved { distance_m }
        } else {
            FilterDecision::Jitter { distance_m }
        }
    }

    /// Whether `candidate` should extend a trace ending at `previous`.
    /// An eligible fix with no previous point starts the trace.
    pub fn is_genuine_movement(&self, previous: Option<&TracePoint>, candidate: &LocationFix) -> bool {
        matches!(
            self.classify(previous.map(|p| &p.fix.coordinate), candidate),
            FilterDecision::First | FilterDecision::Moved { .. }
        )
    }
}
