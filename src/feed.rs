// src/feed.rs
//! Background location feeds from gpsd or a serial NMEA receiver

use crate::{
    config::RecorderConfig,
    error::{RecorderError, Result},
    gps::{
        fix::{now_millis, LocationFix},
        gpsd,
        nmea::NmeaParser,
    },
};
use std::{sync::Arc, time::Duration};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_serial::SerialPortBuilderExt;

const FIX_CHANNEL_CAPACITY: usize = 256;

/// Location fix source configuration
#[derive(Debug, Clone, PartialEq)]
pub enum FixSource {
    Serial { port: String, baudrate: u32 },
    Gpsd { host: String, port: u16 },
}

impl FixSource {
    pub fn from_config(config: &RecorderConfig) -> Result<Self> {
        match config.source_type.as_str() {
            "serial" => {
                let port = config
                    .serial_port
                    .clone()
                    .ok_or_else(|| RecorderError::Config("serial source needs a serial_port".to_string()))?;
                Ok(FixSource::Serial {
                    port,
                    baudrate: config.serial_baudrate.unwrap_or(9600),
                })
            }
            "gpsd" => Ok(FixSource::Gpsd {
                host: config.gpsd_host.clone().unwrap_or_else(|| "localhost".to_string()),
                port: config.gpsd_port.unwrap_or(2947),
            }),
            other => Err(RecorderError::Config(format!("unknown source type '{}'", other))),
        }
    }
}

/// Fan-out side of a feed: every fix goes to all subscribers and becomes the
/// freshest known position.
#[derive(Clone)]
struct FixPublisher {
    fixes: broadcast::Sender<LocationFix>,
    latest: Arc<watch::Sender<Option<LocationFix>>>,
}

impl FixPublisher {
    fn publish(&self, fix: LocationFix) {
        self.latest.send_replace(Some(fix));
        // No subscribers is fine; the latest fix is still kept
        let _ = self.fixes.send(fix);
    }
}

/// Continuous location provider. Fixes can be consumed as a stream via
/// [`subscribe`](Self::subscribe) or requested one at a time with
/// [`current_fix`](Self::current_fix).
pub struct LocationFeed {
    publisher: FixPublisher,
    reader: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl LocationFeed {
    pub fn new() -> Self {
        let (fixes, _) = broadcast::channel(FIX_CHANNEL_CAPACITY);
        let (latest, _) = watch::channel(None);
        Self {
            publisher: FixPublisher {
                fixes,
                latest: Arc::new(latest),
            },
            reader: std::sync::Mutex::new(None),
        }
    }

    /// Connect to `source` and start reading fixes in the background
    pub async fn start(&self, source: FixSource) -> Result<()> {
        let handle = match source {
            FixSource::Serial { port, baudrate } => self.connect_serial(&port, baudrate)?,
            FixSource::Gpsd { host, port } => self.connect_gpsd(&host, port).await?,
        };

        let previous = self
            .reader
            .lock()
            .map_err(|e| RecorderError::Other(e.to_string()))?
            .replace(handle);
        if let Some(previous) = previous {
            previous.abort();
        }
        Ok(())
    }

    /// Connect to a GPS device via serial port
    fn connect_serial(&self, port: &str, baudrate: u32) -> Result<JoinHandle<()>> {
        tracing::info!("Connecting to GPS on {} at {} baud...", port, baudrate);

        let serial = tokio_serial::new(port, baudrate)
            .timeout(Duration::from_millis(1000))
            .open_native_async()
            .map_err(|e| RecorderError::Connection(format!("Failed to open serial port {}: {}", port, e)))?;

        tracing::info!("Connected to {}", port);

        let publisher = self.publisher.clone();
        Ok(tokio::spawn(async move {
            let mut reader = BufReader::new(serial);
            let mut parser = NmeaParser::new();
            let mut line = String::new();

            loop {
                line.clear();
                match reader.read_line(&mut line).await {
                    Ok(0) => break, // EOF
                    Ok(_) => {
                        if let Some(fix) = parser.parse_sentence(&line, now_millis()) {
                            publisher.publish(fix);
                        }
                    }
                    Err(e) => {
                        tracing::warn!("Error reading from serial port: {}", e);
                        break;
                    }
                }
            }
            tracing::info!("Serial feed ended");
        }))
    }

    /// Connect to gpsd daemon
    async fn connect_gpsd(&self, host: &str, port: u16) -> Result<JoinHandle<()>> {
        tracing::info!("Connecting to gpsd at {}:{}...", host, port);

        let mut reader = gpsd::connect_gpsd(host, port).await?;
        tracing::info!("Connected to gpsd");

        let publisher = self.publisher.clone();
        Ok(tokio::spawn(async move {
            let mut line = String::new();

            loop {
                line.clear();
                match reader.read_line(&mut line).await {
                    Ok(0) => break, // EOF
                    Ok(_) => {
                        let line = line.trim();
                        if line.is_empty() {
                            continue;
                        }
                        match gpsd::parse_gpsd_json(line, now_millis()) {
                            Ok(Some(fix)) => publisher.publish(fix),
                            Ok(None) => {}
                            Err(e) => tracing::warn!("Error parsing gpsd JSON: {}", e),
                        }
                    }
                    Err(e) => {
                        tracing::warn!("Error reading from gpsd: {}", e);
                        break;
                    }
                }
            }
            tracing::info!("gpsd feed ended");
        }))
    }

    /// Inject a fix as if it came from the receiver
    pub fn publish(&self, fix: LocationFix) {
        self.publisher.publish(fix);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LocationFix> {
        self.publisher.fixes.subscribe()
    }

    /// Freshest fix seen so far, however old
    pub fn latest(&self) -> Option<LocationFix> {
        *self.publisher.latest.borrow()
    }

    /// Best-effort current position: the latest fix if it is younger than
    /// `timeout`, otherwise the next one to arrive within `timeout`.
    pub async fn current_fix(&self, timeout: Duration) -> Result<LocationFix> {
        let mut rx = self.publisher.latest.subscribe();
        if let Some(fix) = *rx.borrow_and_update() {
            if fix.age_millis(now_millis()) <= timeout.as_millis() as i64 {
                return Ok(fix);
            }
        }

        match tokio::time::timeout(timeout, rx.changed()).await {
            Ok(Ok(())) => (*rx.borrow())
                .ok_or_else(|| RecorderError::LocationUnavailable("feed reset".to_string())),
            Ok(Err(_)) => Err(RecorderError::LocationUnavailable("feed closed".to_string())),
            Err(_) => Err(RecorderError::LocationUnavailable(format!(
                "no fix within {} ms",
                timeout.as_millis()
            ))),
        }
    }

    /// Stop the background reader. Later calls are no-ops.
    pub async fn stop(&self) {
        let handle = match self.reader.lock() {
            Ok(mut reader) => reader.take(),
            Err(_) => None,
        };
        if let Some(handle) = handle {
            handle.abort();
            let _ = handle.await;
            tracing::debug!("Location feed stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.reader
            .lock()
            .map(|reader| reader.as_ref().is_some_and(|h| !h.is_finished()))
            .unwrap_or(false)
    }
}

impl Default for LocationFeed {
    fn default() -> Self {
        Self::new()
    }
}

/// List available serial ports
pub fn list_serial_ports() -> Result<Vec<String>> {
    let ports = tokio_serial::available_ports()
        .map_err(|e| RecorderError::Other(format!("Failed to list serial ports: {}", e)))?;

    Ok(ports
        .into_iter()
        .map(|port| format!("{} - {:?}", port.port_name, port.port_type))
        .collect())
}
