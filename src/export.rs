// src/export.rs
//! Export of stored sessions to common GPS exchange formats

use crate::error::{RecorderError, Result};
use crate::store::StoredSession;
use chrono::{DateTime, SecondsFormat};
use std::fs::File;
use std::io::Write;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ExportFormat {
    Gpx,
    #[value(name = "geojson")]
    GeoJson,
    Csv,
}

impl ExportFormat {
    pub fn extension(&self) -> &str {
        match self {
            ExportFormat::Gpx => "gpx",
            ExportFormat::GeoJson => "geojson",
            ExportFormat::Csv => "csv",
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            ExportFormat::Gpx => "GPX (GPS Exchange)",
            ExportFormat::GeoJson => "GeoJSON",
            ExportFormat::Csv => "CSV",
        }
    }
}

pub struct SessionExporter<'a> {
    session: &'a StoredSession,
}

impl<'a> SessionExporter<'a> {
    pub fn new(session: &'a StoredSession) -> Self {
        Self { session }
    }

    pub fn render(&self, format: ExportFormat) -> Result<String> {
        match format {
            ExportFormat::Gpx => Ok(self.to_gpx()),
            ExportFormat::GeoJson => self.to_geojson(),
            ExportFormat::Csv => Ok(self.to_csv()),
        }
    }

    pub fn export_to_file(&self, path: &Path, format: ExportFormat) -> Result<()> {
        if self.session.trace.is_empty() && self.session.waypoints.is_empty() {
            return Err(RecorderError::Other("Nothing to export".to_string()));
        }

        let content = self.render(format)?;
        let mut file = File::create(path)?;
        file.write_all(content.as_bytes())?;
        Ok(())
    }

    fn to_gpx(&self) -> String {
        let summary = &self.session.summary;
        let mut gpx = String::from(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="route-recorder" xmlns="http://www.topografix.com/GPX/1/1">
"#,
        );

        for waypoint in &self.session.waypoints {
            gpx.push_str(&format!(
                "  <wpt lat=\"{}\" lon=\"{}\">\n    <time>{}</time>\n    <name>{}</name>\n",
                waypoint.coordinate.latitude,
                waypoint.coordinate.longitude,
                rfc3339(waypoint.captured_at_millis),
                escape_xml(&waypoint.name)
            ));
            if !waypoint.description.is_empty() {
                gpx.push_str(&format!("    <desc>{}</desc>\n", escape_xml(&waypoint.description)));
            }
            if let Some(ref photo) = waypoint.photo_ref {
                gpx.push_str(&format!("    <link href=\"{}\"/>\n", escape_xml(photo)));
            }
            gpx.push_str("  </wpt>\n");
        }

        gpx.push_str(&format!("  <trk>\n    <name>{}</name>\n    <trkseg>\n", escape_xml(&summary.name)));
        for point in &self.session.trace {
            gpx.push_str(&format!(
                "      <trkpt lat=\"{}\" lon=\"{}\"><time>{}</time></trkpt>\n",
                point.fix.coordinate.latitude,
                point.fix.coordinate.longitude,
                rfc3339(point.timestamp_millis)
            ));
        }
        gpx.push_str("    </trkseg>\n  </trk>\n</gpx>\n");
        gpx
    }

    fn to_geojson(&self) -> Result<String> {
        let summary = &self.session.summary;
        let line: Vec<[f64; 2]> = self
            .session
            .trace
            .iter()
            .map(|p| [p.fix.coordinate.longitude, p.fix.coordinate.latitude])
            .collect();

        let mut features = vec![serde_json::json!({
            "type": "Feature",
            "geometry": { "type": "LineString", "coordinates": line },
            "properties": {
                "name": summary.name,
                "distance_m": summary.distance_m,
                "duration_ms": summary.duration_millis,
                "average_speed_kmh": summary.average_speed_kmh,
            }
        })];

        features.extend(self.session.waypoints.iter().map(|wp| {
            let mut properties = serde_json::json!({
                "name": wp.name,
                "description": wp.description,
                "timestamp": rfc3339(wp.captured_at_millis),
            });
            if let Some(ref photo) = wp.photo_ref {
                properties["photo"] = serde_json::json!(photo);
            }
            serde_json::json!({
                "type": "Feature",
                "geometry": {
                    "type": "Point",
                    "coordinates": [wp.coordinate.longitude, wp.coordinate.latitude]
                },
                "properties": properties
            })
        }));

        let collection = serde_json::json!({
            "type": "FeatureCollection",
            "features": features
        });
        Ok(serde_json::to_string_pretty(&collection)?)
    }

    fn to_csv(&self) -> String {
        let mut csv = String::from("kind,name,latitude,longitude,accuracy_m,timestamp,description\n");

        for point in &self.session.trace {
            csv.push_str(&format!(
                "trackpoint,,{},{},{},{},\n",
                point.fix.coordinate.latitude,
                point.fix.coordinate.longitude,
                point.fix.accuracy_m.map_or(String::new(), |a| a.to_string()),
                rfc3339(point.timestamp_millis)
            ));
        }

        for waypoint in &self.session.waypoints {
            csv.push_str(&format!(
                "waypoint,{},{},{},,{},{}\n",
                escape_csv(&waypoint.name),
                waypoint.coordinate.latitude,
                waypoint.coordinate.longitude,
                rfc3339(waypoint.captured_at_millis),
                escape_csv(&waypoint.description)
            ));
        }

        csv
    }
}

fn rfc3339(millis: i64) -> String {
    DateTime::from_timestamp_millis(millis)
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_default()
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

fn escape_csv(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}
