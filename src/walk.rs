// src/walk.rs
//! Walk and coordinate data structures

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::geo;

/// A single GPS position in WGS84 degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// A completed (or in-progress) recording of a tracked outing.
///
/// Timestamps are epoch milliseconds; `id` is the start timestamp rendered as
/// a string. Stored as JSON with camelCase keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Walk {
    pub id: String,
    pub start_time: i64,
    pub end_time: i64,
    pub duration: i64,
    pub coordinates: Vec<Coordinate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
}

impl Walk {
    /// Open a new walk starting at the given epoch-millisecond timestamp.
    pub fn begin(start_time: i64) -> Self {
        Self {
            id: start_time.to_string(),
            start_time,
            end_time: 0,
            duration: 0,
            coordinates: Vec::new(),
            distance: None,
        }
    }

    /// Close the walk: stamp the end time and derive duration and distance.
    pub fn finalize(&mut self, end_time: i64) {
        self.end_time = end_time;
        self.duration = end_time - self.start_time;
        self.distance = Some(geo::distance_km(&self.coordinates));
    }

    pub fn point_count(&self) -> usize {
        self.coordinates.len()
    }

    /// Total trace length in kilometers, derived on demand when the stored
    /// value is absent.
    pub fn distance_km(&self) -> f64 {
        self.distance
            .unwrap_or_else(|| geo::distance_km(&self.coordinates))
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.start_time).single()
    }
}

/// Current time as epoch milliseconds.
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Format a millisecond duration as HH:MM:SS.
pub fn format_duration(ms: i64) -> String {
    let seconds = ms / 1000;
    let minutes = seconds / 60;
    let hours = minutes / 60;
    format!("{:02}:{:02}:{:02}", hours, minutes % 60, seconds % 60)
}

/// Format an epoch-millisecond timestamp as dd/mm/yyyy HH:MM.
pub fn format_timestamp(ms: i64) -> String {
    match Utc.timestamp_millis_opt(ms).single() {
        Some(ts) => ts.format("%d/%m/%Y %H:%M").to_string(),
        None => "invalid timestamp".to_string(),
    }
}
