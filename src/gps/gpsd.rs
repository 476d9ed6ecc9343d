// src/gps/gpsd.rs
//! GPSD client implementation

use super::fix::LocationFix;
use crate::error::{RecorderError, Result};
use crate::geo::Coordinate;
use chrono::DateTime;
use serde::Deserialize;
use std::collections::HashMap;
use tokio::{
    io::{AsyncWriteExt, BufReader},
    net::TcpStream,
};

#[derive(Debug, Deserialize)]
struct GpsdMessage {
    class: String,
    #[serde(flatten)]
    data: HashMap<String, serde_json::Value>,
}

/// Connect to a gpsd daemon and return a stream reader
pub async fn connect_gpsd(host: &str, port: u16) -> Result<BufReader<TcpStream>> {
    let mut stream = TcpStream::connect(format!("{}:{}", host, port))
        .await
        .map_err(|e| RecorderError::Connection(format!("Failed to connect to gpsd at {}:{}: {}", host, port, e)))?;

    // Send WATCH command to start receiving JSON data
    let watch_cmd = "?WATCH={\"enable\":true,\"json\":true}\n";
    stream
        .write_all(watch_cmd.as_bytes())
        .await
        .map_err(|e| RecorderError::Connection(format!("Failed to send WATCH command: {}", e)))?;

    Ok(BufReader::new(stream))
}

/// Parse a single line of gpsd JSON data. Only TPV reports with a 2D/3D fix
/// yield a location fix; every other class is accepted and ignored.
pub fn parse_gpsd_json(line: &str, now_millis: i64) -> Result<Option<LocationFix>> {
    let msg: GpsdMessage = serde_json::from_str(line)
        .map_err(|e| RecorderError::Parse(format!("Failed to parse gpsd JSON: {}", e)))?;

    match msg.class.as_str() {
        "TPV" => Ok(parse_tpv_message(&msg.data, now_millis)),
        "VERSION" => {
            if let Some(version) = msg.data.get("release").and_then(|v| v.as_str()) {
                tracing::info!("Connected to gpsd version: {}", version);
            }
            Ok(None)
        }
        _ => Ok(None),
    }
}

/// Parse TPV (Time Position Velocity) message
fn parse_tpv_message(msg_data: &HashMap<String, serde_json::Value>, now_millis: i64) -> Option<LocationFix> {
    let get_f64 = |key: &str| msg_data.get(key).and_then(|v| v.as_f64());

    // mode 0/1: no fix
    let mode = msg_data.get("mode").and_then(|v| v.as_u64()).unwrap_or(0);
    if mode < 2 {
        return None;
    }

    let coordinate = Coordinate::new(get_f64("lat")?, get_f64("lon")?).ok()?;

    let accuracy = get_f64("eph").or_else(|| match (get_f64("epx"), get_f64("epy")) {
        (Some(x), Some(y)) => Some(x.max(y)),
        (x, y) => x.or(y),
    });

    let captured_at = msg_data
        .get("time")
        .and_then(|v| v.as_str())
        .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
        .map(|t| t.timestamp_millis())
        .unwrap_or(now_millis);

    Some(LocationFix::new(coordinate, accuracy, captured_at))
}
