// src/location/replay.rs
//! Replayed-trace location source

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::sleep;

use super::{LocationProvider, UPDATE_CHANNEL_CAPACITY};
use crate::error::{Result, TrackerError};
use crate::walk::Coordinate;

const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

/// Location source replaying a fixed coordinate list on an interval.
///
/// The list is consumed front to back: `current_position` takes the next
/// coordinate, and a subscription streams the remainder. Serves as the demo
/// source for the CLI and as the fake provider in tests.
pub struct ReplayLocationSource {
    coordinates: Vec<Coordinate>,
    interval: Duration,
    cursor: Arc<AtomicUsize>,
    active: Arc<AtomicBool>,
}

impl ReplayLocationSource {
    pub fn new(coordinates: Vec<Coordinate>, interval: Duration) -> Self {
        Self {
            coordinates,
            interval,
            cursor: Arc::new(AtomicUsize::new(0)),
            active: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Load a replay track from a JSON array of coordinates.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            TrackerError::Other(format!("Failed to read replay file {}: {}", path.display(), e))
        })?;

        let coordinates: Vec<Coordinate> = serde_json::from_str(&contents).map_err(|e| {
            TrackerError::Parse(format!("Failed to parse replay file {}: {}", path.display(), e))
        })?;

        Ok(Self::new(coordinates, DEFAULT_INTERVAL))
    }
}

#[async_trait]
impl LocationProvider for ReplayLocationSource {
    async fn request_permission(&self) -> Result<bool> {
        Ok(true)
    }

    async fn current_position(&self) -> Result<Coordinate> {
        let index = self.cursor.fetch_add(1, Ordering::SeqCst);
        self.coordinates.get(index).copied().ok_or_else(|| {
            TrackerError::LocationUnavailable("replay track is exhausted".to_string())
        })
    }

    async fn subscribe(&self) -> Result<mpsc::Receiver<Coordinate>> {
        let (tx, rx) = mpsc::channel(UPDATE_CHANNEL_CAPACITY);

        self.active.store(true, Ordering::SeqCst);
        let active = Arc::clone(&self.active);
        let cursor = Arc::clone(&self.cursor);
        let coordinates = self.coordinates.clone();
        let interval = self.interval;

        tokio::spawn(async move {
            while active.load(Ordering::SeqCst) {
                sleep(interval).await;

                let index = cursor.fetch_add(1, Ordering::SeqCst);
                let Some(coordinate) = coordinates.get(index) else {
                    break;
                };
                if tx.send(*coordinate).await.is_err() {
                    break;
                }
            }
        });

        Ok(rx)
    }

    async fn unsubscribe(&self) {
        self.active.store(false, Ordering::SeqCst);
    }
}
