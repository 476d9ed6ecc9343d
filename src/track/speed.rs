// src/track/speed.rs
//! Instantaneous speed from consecutive accepted fixes

use crate::config::DEFAULT_STILLNESS_TIMEOUT_MS;

#[derive(Debug, Clone)]
pub struct SpeedEstimator {
    last_accepted_at_millis: Option<i64>,
    last_speed_kmh: f64,
    stillness_timeout_ms: i64,
}

impl SpeedEstimator {
    pub fn new(stillness_timeout_ms: i64) -> Self {
        Self {
            last_accepted_at_millis: None,
            last_speed_kmh: 0.0,
            stillness_timeout_ms,
        }
    }

    pub fn speed_kmh(&self) -> f64 {
        self.last_speed_kmh
    }

    pub fn last_accepted_at_millis(&self) -> Option<i64> {
        self.last_accepted_at_millis
    }

    /// Record the first accepted point. Speed is left untouched.
    pub fn on_first_point(&mut self, at_millis: i64) {
        self.last_accepted_at_millis = Some(at_millis);
    }

    /// Record a genuine movement of `segment_m` meters ending at `at_millis`.
    /// A fix stamped earlier than the previous one never moves the clock back.
    pub fn on_movement(&mut self, segment_m: f64, at_millis: i64) -> f64 {
        let at_millis = match self.last_accepted_at_millis {
            Some(last) => {
                let elapsed_s = (at_millis - last) as f64 / 1000.0;
                if elapsed_s > 0.0 {
                    self.last_speed_kmh = (segment_m / elapsed_s) * 3.6;
                }
                at_millis.max(last)
            }
            None => at_millis,
        };
        self.last_accepted_at_millis = Some(at_millis);
        self.last_speed_kmh
    }

    /// A fix arrived that did not move us. After the stillness timeout the
    /// user is considered stopped; a single noisy sample leaves speed alone.
    pub fn on_stillness(&mut self, at_millis: i64) -> f64 {
        let still_for = self
            .last_accepted_at_millis
            .map_or(i64::MAX, |last| at_millis - last);
        if still_for > self.stillness_timeout_ms {
            self.last_speed_kmh = 0.0;
        }
        self.last_speed_kmh
    }
}

impl Default for SpeedEstimator {
    fn default() -> Self {
        Self::new(DEFAULT_STILLNESS_TIMEOUT_MS)
    }
}
