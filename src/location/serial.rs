// src/location/serial.rs
//! Serial NMEA location source

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_serial::{SerialPortBuilderExt, SerialStream};

use super::{nmea, LocationProvider, UPDATE_CHANNEL_CAPACITY};
use crate::error::{Result, TrackerError};
use crate::walk::Coordinate;

const FIRST_FIX_TIMEOUT: Duration = Duration::from_secs(15);

/// Location source reading NMEA sentences from a serial GPS receiver.
pub struct SerialLocationSource {
    port: String,
    baudrate: u32,
    active: Arc<AtomicBool>,
}

impl SerialLocationSource {
    pub fn new(port: impl Into<String>, baudrate: u32) -> Self {
        Self {
            port: port.into(),
            baudrate,
            active: Arc::new(AtomicBool::new(false)),
        }
    }

    fn open(&self) -> Result<SerialStream> {
        tokio_serial::new(self.port.as_str(), self.baudrate)
            .timeout(Duration::from_millis(1000))
            .open_native_async()
            .map_err(|e| {
                TrackerError::Connection(format!(
                    "Failed to open serial port {}: {}",
                    self.port, e
                ))
            })
    }
}

#[async_trait]
impl LocationProvider for SerialLocationSource {
    async fn request_permission(&self) -> Result<bool> {
        Ok(self.open().is_ok())
    }

    async fn current_position(&self) -> Result<Coordinate> {
        let mut reader = BufReader::new(self.open()?);

        let wait = tokio::time::timeout(FIRST_FIX_TIMEOUT, async {
            let mut line = String::new();
            loop {
                line.clear();
                match reader.read_line(&mut line).await {
                    Ok(0) => {
                        return Err(TrackerError::LocationUnavailable(
                            "serial port closed before a fix".to_string(),
                        ))
                    }
                    Ok(_) => {
                        if let Some(coordinate) = nmea::parse_sentence(line.trim()) {
                            return Ok(coordinate);
                        }
                    }
                    Err(e) => return Err(TrackerError::Io(e)),
                }
            }
        })
        .await;

        match wait {
            Ok(result) => result,
            Err(_) => Err(TrackerError::LocationUnavailable(
                "timed out waiting for an NMEA fix".to_string(),
            )),
        }
    }

    async fn subscribe(&self) -> Result<mpsc::Receiver<Coordinate>> {
        let serial = self.open()?;
        let (tx, rx) = mpsc::channel(UPDATE_CHANNEL_CAPACITY);

        self.active.store(true, Ordering::SeqCst);
        let active = Arc::clone(&self.active);

        tokio::spawn(async move {
            let mut reader = BufReader::new(serial);
            let mut line = String::new();

            while active.load(Ordering::SeqCst) {
                line.clear();
                match reader.read_line(&mut line).await {
                    Ok(0) => break, // EOF
                    Ok(_) => {
                        if let Some(coordinate) = nmea::parse_sentence(line.trim()) {
                            if tx.send(coordinate).await.is_err() {
                                break;
                            }
                        }
                    }
                    Err(err) => {
                        tracing::warn!("serial read failed, ending subscription: {}", err);
                        break;
                    }
                }
            }
        });

        Ok(rx)
    }

    async fn unsubscribe(&self) {
        self.active.store(false, Ordering::SeqCst);
    }
}
