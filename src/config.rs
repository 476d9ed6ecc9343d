// src/config.rs
//! Configuration management with file-based storage

use crate::error::{RecorderError, Result};
use crate::track::FilterSettings;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Minimum distance between consecutive trace points for movement to count.
pub const DEFAULT_MOVEMENT_THRESHOLD_M: f64 = 2.5;
/// Fixes reporting a worse accuracy than this are dropped.
pub const DEFAULT_MAX_ACCURACY_M: f64 = 25.0;
/// Speed decays to zero after this long without genuine movement.
pub const DEFAULT_STILLNESS_TIMEOUT_MS: i64 = 3_000;
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 1_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    pub movement_threshold_m: f64,
    pub max_accuracy_m: f64,
    pub accept_unknown_accuracy: bool,
    pub stillness_timeout_ms: i64,
    pub tick_interval_ms: u64,
    pub source_type: String, // "gpsd", "serial"
    pub serial_port: Option<String>,
    pub serial_baudrate: Option<u32>,
    pub gpsd_host: Option<String>,
    pub gpsd_port: Option<u16>,
    pub fix_timeout_ms: u64,
    pub store_dir: Option<PathBuf>,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            movement_threshold_m: DEFAULT_MOVEMENT_THRESHOLD_M,
            max_accuracy_m: DEFAULT_MAX_ACCURACY_M,
            accept_unknown_accuracy: false,
            stillness_timeout_ms: DEFAULT_STILLNESS_TIMEOUT_MS,
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            source_type: "gpsd".to_string(),
            serial_port: None,
            serial_baudrate: Some(9600),
            gpsd_host: Some("localhost".to_string()),
            gpsd_port: Some(2947),
            fix_timeout_ms: 5_000,
            store_dir: None,
        }
    }
}

impl RecorderConfig {
    /// Load configuration, falling back to defaults when no file exists
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)
            .map_err(|e| RecorderError::Config(format!("Failed to read config file: {}", e)))?;

        serde_json::from_str(&contents)
            .map_err(|e| RecorderError::Config(format!("Failed to parse config file: {}", e)))
    }

    /// Save configuration to the user's config directory
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| RecorderError::Config(format!("Failed to create config directory: {}", e)))?;
        }

        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)
            .map_err(|e| RecorderError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    fn home_dir() -> Result<PathBuf> {
        std::env::var("HOME")
            .map(PathBuf::from)
            .map_err(|_| RecorderError::Config("HOME environment variable not set".to_string()))
    }

    fn config_path() -> Result<PathBuf> {
        Ok(Self::home_dir()?.join(".config").join("route-recorder").join("config.json"))
    }

    /// Directory holding recorded sessions
    pub fn store_dir(&self) -> Result<PathBuf> {
        match &self.store_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(Self::home_dir()?.join(".local").join("share").join("route-recorder")),
        }
    }

    /// Settings for the noise filter and speed estimator
    pub fn filter_settings(&self) -> FilterSettings {
        FilterSettings {
            movement_threshold_m: self.movement_threshold_m,
            max_accuracy_m: self.max_accuracy_m,
            accept_unknown_accuracy: self.accept_unknown_accuracy,
            stillness_timeout_ms: self.stillness_timeout_ms,
        }
    }

    pub fn tick_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.tick_interval_ms.max(1))
    }

    /// Update serial port settings
    pub fn update_serial(&mut self, port: String, baudrate: u32) {
        self.source_type = "serial".to_string();
        self.serial_port = Some(port);
        self.serial_baudrate = Some(baudrate);
    }

    /// Update gpsd settings
    pub fn update_gpsd(&mut self, host: String, port: u16) {
        self.source_type = "gpsd".to_string();
        self.gpsd_host = Some(host);
        self.gpsd_port = Some(port);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RecorderConfig::default();
        assert_eq!(config.source_type, "gpsd");
        assert_eq!(config.movement_threshold_m, 2.5);
        assert_eq!(config.max_accuracy_m, 25.0);
        assert!(!config.accept_unknown_accuracy);
        assert_eq!(config.tick_interval().as_millis(), 1000);
    }

    #[test]
    fn test_update_serial() {
        let mut config = RecorderConfig::default();
        config.update_serial("/dev/ttyUSB0".to_string(), 115200);
        assert_eq!(config.source_type, "serial");
        assert_eq!(config.serial_port, Some("/dev/ttyUSB0".to_string()));
        assert_eq!(config.serial_baudrate, Some(115200));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: RecorderConfig = serde_json::from_str(r#"{"movement_threshold_m": 3.0}"#).unwrap();
        assert_eq!(config.movement_threshold_m, 3.0);
        assert_eq!(config.stillness_timeout_ms, 3_000);
        assert_eq!(config.gpsd_port, Some(2947));
    }

    #[test]
    fn test_save_and_load_file() {
        let path = std::env::temp_dir()
            .join(format!("route-recorder-config-{}", std::process::id()))
            .join("config.json");
        let mut config = RecorderConfig::default();
        config.update_gpsd("gps.local".to_string(), 3000);
        config.save_to(&path).unwrap();

        let loaded = RecorderConfig::load_from(&path).unwrap();
        assert_eq!(loaded.gpsd_host, Some("gps.local".to_string()));
        assert_eq!(loaded.gpsd_port, Some(3000));

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_missing_file_gives_default() {
        let path = std::env::temp_dir().join("route-recorder-does-not-exist.json");
        let config = RecorderConfig::load_from(&path).unwrap();
        assert_eq!(config.source_type, "gpsd");
    }
}
