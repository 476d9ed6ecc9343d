// src/gps/nmea.rs
//! NMEA sentence parsing

use super::fix::LocationFix;
use crate::geo::Coordinate;

/// User equivalent range error used to turn HDOP into meters when the
/// receiver does not emit GST sentences.
pub const NOMINAL_UERE_M: f64 = 5.0;

/// GGA sentences a GST accuracy stays valid for. Receivers usually emit GST
/// after GGA, so one epoch of lag is expected.
const GST_MAX_AGE_FIXES: u8 = 2;

/// Stateful NMEA parser. GGA sentences produce fixes; GST sentences supply
/// the accuracy attached to the following fixes.
#[derive(Debug, Default)]
pub struct NmeaParser {
    gst_accuracy_m: Option<f64>,
    fixes_since_gst: u8,
}

impl NmeaParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a single NMEA sentence, returning a fix when it carried a position
    pub fn parse_sentence(&mut self, line: &str, now_millis: i64) -> Option<LocationFix> {
        let line = line.trim();
        let body = line.split('*').next().unwrap_or(line);
        let parts: Vec<&str> = body.split(',').collect();

        if is_sentence(line, "GGA") {
            self.parse_gga(&parts, now_millis)
        } else if is_sentence(line, "GST") {
            self.parse_gst(&parts);
            None
        } else {
            None
        }
    }

    /// Parse GGA (Global Positioning System Fix Data) sentence
    fn parse_gga(&mut self, parts: &[&str], now_millis: i64) -> Option<LocationFix> {
        if parts.len() < 10 {
            return None;
        }

        // Fix quality 0 means the position fields are stale or empty
        let quality = parts[6].parse::<u8>().ok()?;
        if quality == 0 {
            return None;
        }

        let latitude = parse_angle(parts[2], parts[3], "S")?;
        let longitude = parse_angle(parts[4], parts[5], "W")?;
        let coordinate = Coordinate::new(latitude, longitude).ok()?;

        let hdop_accuracy = parts[8]
            .parse::<f64>()
            .ok()
            .map(|hdop| hdop * NOMINAL_UERE_M);

        let gst_accuracy = self
            .gst_accuracy_m
            .filter(|_| self.fixes_since_gst < GST_MAX_AGE_FIXES);
        self.fixes_since_gst = self.fixes_since_gst.saturating_add(1);

        Some(LocationFix::new(coordinate, gst_accuracy.or(hdop_accuracy), now_millis))
    }

    /// Parse GST (Pseudorange Noise Statistics) sentence
    fn parse_gst(&mut self, parts: &[&str]) {
        if parts.len() < 8 {
            return;
        }
        let lat_err = parts[6].parse::<f64>();
        let lon_err = parts[7].parse::<f64>();
        if let (Ok(lat_err), Ok(lon_err)) = (lat_err, lon_err) {
            self.gst_accuracy_m = Some(lat_err.hypot(lon_err));
            self.fixes_since_gst = 0;
        }
    }
}

fn is_sentence(line: &str, kind: &str) -> bool {
    // $GPGGA, $GNGGA, $GLGGA ... talker id is two characters
    line.starts_with('$') && line.get(3..6) == Some(kind)
}

/// Convert a ddmm.mmmm / dddmm.mmmm field to signed decimal degrees
fn parse_angle(value: &str, hemisphere: &str, negative: &str) -> Option<f64> {
    if value.is_empty() || hemisphere.is_empty() {
        return None;
    }
    let raw = value.parse::<f64>().ok()?;
    let degrees = (raw / 100.0).trunc();
    let minutes = raw - degrees * 100.0;
    let angle = degrees + minutes / 60.0;
    Some(if hemisphere == negative { -angle } else { angle })
}
