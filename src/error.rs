// src/error.rs
//! Error types for the walk tracker

use std::fmt;

pub type Result<T> = std::result::Result<T, TrackerError>;

#[derive(Debug)]
pub enum TrackerError {
    Io(std::io::Error),
    Json(serde_json::Error),
    Serial(tokio_serial::Error),
    Connection(String),
    Parse(String),
    PermissionDenied,
    LocationUnavailable(String),
    AlreadyTracking,
    NotTracking,
    Storage(String),
    Other(String),
}

impl fmt::Display for TrackerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackerError::Io(e) => write!(f, "IO error: {}", e),
            TrackerError::Json(e) => write!(f, "JSON error: {}", e),
            TrackerError::Serial(e) => write!(f, "Serial error: {}", e),
            TrackerError::Connection(msg) => write!(f, "Connection error: {}", msg),
            TrackerError::Parse(msg) => write!(f, "Parse error: {}", msg),
            TrackerError::PermissionDenied => write!(f, "Location permission denied"),
            TrackerError::LocationUnavailable(msg) => write!(f, "Location unavailable: {}", msg),
            TrackerError::AlreadyTracking => write!(f, "A walk is already being tracked"),
            TrackerError::NotTracking => write!(f, "No walk is currently being tracked"),
            TrackerError::Storage(msg) => write!(f, "Storage error: {}", msg),
            TrackerError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for TrackerError {}

impl From<std::io::Error> for TrackerError {
    fn from(error: std::io::Error) -> Self {
        TrackerError::Io(error)
    }
}

impl From<serde_json::Error> for TrackerError {
    fn from(error: serde_json::Error) -> Self {
        TrackerError::Json(error)
    }
}

impl From<tokio_serial::Error> for TrackerError {
    fn from(error: tokio_serial::Error) -> Self {
        TrackerError::Serial(error)
    }
}

impl From<anyhow::Error> for TrackerError {
    fn from(error: anyhow::Error) -> Self {
        TrackerError::Other(error.to_string())
    }
}
