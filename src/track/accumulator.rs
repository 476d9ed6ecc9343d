// src/track/accumulator.rs
//! Running trace and cumulative distance for one session

use super::filter::{FilterDecision, FilterSettings, NoiseFilter};
use super::log::{AppendLog, LogView};
use super::speed::SpeedEstimator;
use crate::gps::LocationFix;
use crate::session::{SessionId, TracePoint};

/// What [`RouteAccumulator::accept`] did with a fix
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AcceptOutcome {
    /// Failed the accuracy gate; nothing changed
    Dropped,
    /// Appended to the trace. `segment_m` is zero for the first point.
    Appended { point: TracePoint, segment_m: f64 },
    /// Eligible but below the movement threshold; only the speed may decay
    Stationary { distance_m: f64 },
}

#[derive(Debug)]
pub struct RouteAccumulator {
    session_id: SessionId,
    filter: NoiseFilter,
    speed: SpeedEstimator,
    trace: AppendLog<TracePoint>,
    cumulative_distance_m: f64,
}

impl RouteAccumulator {
    pub fn new(session_id: SessionId, settings: FilterSettings) -> Self {
        Self {
            session_id,
            filter: NoiseFilter::new(settings),
            speed: SpeedEstimator::new(settings.stillness_timeout_ms),
            trace: AppendLog::new(),
            cumulative_distance_m: 0.0,
        }
    }

    pub fn accept(&mut self, fix: LocationFix) -> AcceptOutcome {
        let previous = self.trace.last();
        match self.filter.classify(previous.as_ref().map(|p| &p.fix.coordinate), &fix) {
            FilterDecision::Inaccurate => {
                tracing::debug!(accuracy = ?fix.accuracy_m, "dropping inaccurate fix");
                AcceptOutcome::Dropped
            }
            FilterDecision::First => {
                let point = self.push(fix);
                self.speed.on_first_point(fix.captured_at_millis);
                AcceptOutcome::Appended { point, segment_m: 0.0 }
            }
            FilterDecision::Moved { distance_m } => {
                let point = self.push(fix);
                self.cumulative_distance_m += distance_m;
                self.speed.on_movement(distance_m, fix.captured_at_millis);
                AcceptOutcome::Appended { point, segment_m: distance_m }
            }
            FilterDecision::Jitter { distance_m } => {
                tracing::trace!(distance_m, "fix within movement threshold");
                self.speed.on_stillness(fix.captured_at_millis);
                AcceptOutcome::Stationary { distance_m }
            }
        }
    }

    fn push(&mut self, fix: LocationFix) -> TracePoint {
        let floor = self.trace.last().map_or(i64::MIN, |p| p.timestamp_millis);
        let point = TracePoint {
            session_id: self.session_id,
            fix,
            timestamp_millis: fix.captured_at_millis.max(floor),
        };
        self.trace.push(point);
        point
    }

    /// Accepted points so far. The view shares storage with the trace.
    pub fn trace(&self) -> LogView<TracePoint> {
        self.trace.view()
    }

    pub fn trace_len(&self) -> usize {
        self.trace.len()
    }

    pub fn last_point(&self) -> Option<TracePoint> {
        self.trace.last()
    }

    pub fn cumulative_distance_m(&self) -> f64 {
        self.cumulative_distance_m
    }

    pub fn speed_kmh(&self) -> f64 {
        self.speed.speed_kmh()
    }

    pub fn filter(&self) -> &NoiseFilter {
        &self.filter
    }
}

impl Default for RouteAccumulator {
    fn default() -> Self {
        Self::new(SessionId(0), FilterSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::{self, Coordinate};

    fn fix_at(lat: f64, lon: f64, at: i64) -> LocationFix {
        LocationFix::new(Coordinate { latitude: lat, longitude: lon }, Some(5.0), at)
    }

    fn accumulator(threshold: f64) -> RouteAccumulator {
        RouteAccumulator::new(
            SessionId(1),
            FilterSettings {
                movement_threshold_m: threshold,
                ..FilterSettings::default()
            },
        )
    }

    #[test]
    fn test_accepts_real_movement() {
        let mut acc = accumulator(3.0);
        acc.accept(fix_at(0.0, 0.0, 0));
        let outcome = acc.accept(fix_at(0.0, 0.0001, 1_000));

        assert!(matches!(outcome, AcceptOutcome::Appended { .. }));
        assert_eq!(acc.trace().len(), 2);
        let d = acc.cumulative_distance_m();
        assert!((d - 11.12).abs() / 11.12 < 0.01, "got {}", d);
    }

    #[test]
    fn test_rejects_jitter() {
        let mut acc = accumulator(3.0);
        acc.accept(fix_at(0.0, 0.0, 0));
        let outcome = acc.accept(fix_at(0.0, 0.00001, 1_000));

        assert!(matches!(outcome, AcceptOutcome::Stationary { .. }));
        assert_eq!(acc.trace().len(), 1);
        assert_eq!(acc.cumulative_distance_m(), 0.0);
    }

    #[test]
    fn test_repeated_jitter_never_changes_distance() {
        let mut acc = accumulator(3.0);
        acc.accept(fix_at(0.0, 0.0, 0));
        acc.accept(fix_at(0.0, 0.001, 10_000));
        let before = acc.cumulative_distance_m();

        acc.accept(fix_at(0.0, 0.00101, 11_000));
        acc.accept(fix_at(0.0, 0.00101, 12_000));

        assert_eq!(acc.cumulative_distance_m(), before);
        assert_eq!(acc.trace().len(), 2);
    }

    #[test]
    fn test_first_point_adds_no_distance() {
        let mut acc = accumulator(3.0);
        match acc.accept(fix_at(10.0, 10.0, 500)) {
            AcceptOutcome::Appended { point, segment_m } => {
                assert_eq!(segment_m, 0.0);
                assert_eq!(point.session_id, SessionId(1));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(acc.cumulative_distance_m(), 0.0);
        assert_eq!(acc.speed_kmh(), 0.0);
    }

    #[test]
    fn test_inaccurate_fix_is_dropped() {
        let mut acc = accumulator(3.0);
        let noisy = LocationFix::new(Coordinate { latitude: 0.0, longitude: 0.0 }, Some(40.0), 0);
        assert_eq!(acc.accept(noisy), AcceptOutcome::Dropped);
        assert!(acc.trace().is_empty());
    }

    #[test]
    fn test_distance_is_sum_of_segments() {
        let mut acc = accumulator(2.5);
        let points: Vec<LocationFix> = (0..20)
            .map(|i| fix_at(45.0 + i as f64 * 0.0002, 7.0 + (i % 3) as f64 * 0.0001, i * 1_000))
            .collect();
        for p in &points {
            acc.accept(*p);
        }

        let trace = acc.trace().to_vec();
        let expected: f64 = trace
            .windows(2)
            .map(|w| geo::distance(w[0].coordinate(), w[1].coordinate()))
            .sum();
        assert!((acc.cumulative_distance_m() - expected).abs() < 1e-6);
    }

    #[test]
    fn test_timestamps_never_go_backwards() {
        let mut acc = accumulator(2.5);
        acc.accept(fix_at(0.0, 0.0, 5_000));
        acc.accept(fix_at(0.0, 0.001, 4_000));
        assert_eq!(acc.trace().get(1).unwrap().timestamp_millis, 5_000);
    }

    #[test]
    fn test_speed_from_accepted_fixes() {
        let mut acc = accumulator(2.5);
        acc.accept(fix_at(0.0, 0.0, 0));
        acc.accept(fix_at(0.0, 0.0001, 1_000));
        // ~11.12 m in 1 s
        assert!((acc.speed_kmh() - 40.03).abs() < 0.1, "got {}", acc.speed_kmh());

        // still for more than 3 s
        acc.accept(fix_at(0.0, 0.0001, 4_500));
        assert_eq!(acc.speed_kmh(), 0.0);
    }
}
