// src/display/mod.rs
//! Display modules for live recordings

pub mod terminal;

pub use terminal::TerminalDisplay;

/// Format meters as "850 m" or "12.34 km"
pub fn format_distance(meters: f64) -> String {
    if meters < 1000.0 {
        format!("{:.0} m", meters)
    } else {
        format!("{:.2} km", meters / 1000.0)
    }
}

/// Format milliseconds as HH:MM:SS
pub fn format_elapsed(millis: i64) -> String {
    let total_seconds = millis.max(0) / 1000;
    format!(
        "{:02}:{:02}:{:02}",
        total_seconds / 3600,
        (total_seconds % 3600) / 60,
        total_seconds % 60
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_distance() {
        assert_eq!(format_distance(0.0), "0 m");
        assert_eq!(format_distance(999.4), "999 m");
        assert_eq!(format_distance(12_345.0), "12.35 km");
    }

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(0), "00:00:00");
        assert_eq!(format_elapsed(3_723_999), "01:02:03");
    }
}
