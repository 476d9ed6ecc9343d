// src/error.rs
//! Error types for the route recorder

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RecorderError>;

#[derive(Debug, Error)]
pub enum RecorderError {
    /// A command was issued in a state that does not allow it. Nothing changed.
    #[error("cannot {command} while session is {state}")]
    InvalidTransition {
        state: &'static str,
        command: &'static str,
    },
    #[error("no active recording session")]
    NoActiveSession,
    #[error("location unavailable: {0}")]
    LocationUnavailable(String),
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("invalid coordinate ({latitude}, {longitude})")]
    InvalidCoordinate { latitude: f64, longitude: f64 },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serial error: {0}")]
    Serial(#[from] tokio_serial::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Connection error: {0}")]
    Connection(String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Config error: {0}")]
    Config(String),
    #[error("Error: {0}")]
    Other(String),
}

impl RecorderError {
    pub fn persistence(err: impl std::fmt::Display) -> Self {
        RecorderError::Persistence(err.to_string())
    }
}

impl From<anyhow::Error> for RecorderError {
    fn from(error: anyhow::Error) -> Self {
        RecorderError::Other(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_transition_message() {
        let err = RecorderError::InvalidTransition {
            state: "recording",
            command: "start",
        };
        assert_eq!(err.to_string(), "cannot start while session is recording");
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: RecorderError = io.into();
        assert!(matches!(err, RecorderError::Io(_)));
    }
}
