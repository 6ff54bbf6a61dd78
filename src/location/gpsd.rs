// src/location/gpsd.rs
//! gpsd-backed location source

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc;

use super::{LocationProvider, UPDATE_CHANNEL_CAPACITY};
use crate::error::{Result, TrackerError};
use crate::walk::Coordinate;

const WATCH_COMMAND: &str = "?WATCH={\"enable\":true,\"json\":true}\n";
const FIRST_FIX_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Deserialize)]
struct GpsdMessage {
    class: String,
    #[serde(flatten)]
    fields: HashMap<String, serde_json::Value>,
}

/// Location source reading TPV reports from a gpsd daemon.
pub struct GpsdLocationSource {
    host: String,
    port: u16,
    active: Arc<AtomicBool>,
}

impl GpsdLocationSource {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            active: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Connect and enable the JSON watch stream.
    async fn connect(&self) -> Result<BufReader<TcpStream>> {
        let mut stream = TcpStream::connect((self.host.as_str(), self.port))
            .await
            .map_err(|e| {
                TrackerError::Connection(format!(
                    "Failed to connect to gpsd at {}:{}: {}",
                    self.host, self.port, e
                ))
            })?;

        stream
            .write_all(WATCH_COMMAND.as_bytes())
            .await
            .map_err(|e| TrackerError::Connection(format!("Failed to send WATCH command: {}", e)))?;

        Ok(BufReader::new(stream))
    }
}

/// Extract a position from one line of gpsd JSON.
///
/// Non-TPV messages and TPV reports without a lat/lon pair yield `None`.
pub fn parse_position(line: &str) -> Result<Option<Coordinate>> {
    let msg: GpsdMessage = serde_json::from_str(line)
        .map_err(|e| TrackerError::Parse(format!("Failed to parse gpsd JSON: {}", e)))?;

    if msg.class != "TPV" {
        return Ok(None);
    }

    let latitude = msg.fields.get("lat").and_then(|v| v.as_f64());
    let longitude = msg.fields.get("lon").and_then(|v| v.as_f64());

    Ok(match (latitude, longitude) {
        (Some(latitude), Some(longitude)) => Some(Coordinate {
            latitude,
            longitude,
        }),
        _ => None,
    })
}

#[async_trait]
impl LocationProvider for GpsdLocationSource {
    async fn request_permission(&self) -> Result<bool> {
        Ok(TcpStream::connect((self.host.as_str(), self.port))
            .await
            .is_ok())
    }

    async fn current_position(&self) -> Result<Coordinate> {
        let mut reader = self.connect().await?;

        let wait = tokio::time::timeout(FIRST_FIX_TIMEOUT, async {
            let mut line = String::new();
            loop {
                line.clear();
                match reader.read_line(&mut line).await {
                    Ok(0) => {
                        return Err(TrackerError::LocationUnavailable(
                            "gpsd closed the connection before a fix".to_string(),
                        ))
                    }
                    Ok(_) => {
                        if let Ok(Some(coordinate)) = parse_position(line.trim()) {
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
                "timed out waiting for a gpsd fix".to_string(),
            )),
        }
    }

    async fn subscribe(&self) -> Result<mpsc::Receiver<Coordinate>> {
        let mut reader = self.connect().await?;
        let (tx, rx) = mpsc::channel(UPDATE_CHANNEL_CAPACITY);

        self.active.store(true, Ordering::SeqCst);
        let active = Arc::clone(&self.active);

        tokio::spawn(async move {
            let mut line = String::new();

            while active.load(Ordering::SeqCst) {
                line.clear();
                match reader.read_line(&mut line).await {
                    Ok(0) => break, // EOF
                    Ok(_) => match parse_position(line.trim()) {
                        Ok(Some(coordinate)) => {
                            if tx.send(coordinate).await.is_err() {
                                break;
                            }
                        }
                        Ok(None) => {}
                        Err(err) => {
                            tracing::debug!("skipping unparseable gpsd line: {}", err);
                        }
                    },
                    Err(err) => {
                        tracing::warn!("gpsd read failed, ending subscription: {}", err);
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tpv_parsing() {
        let json = r#"{"class":"TPV","device":"/dev/ttyUSB0","mode":3,"time":"2023-01-01T12:00:00.000Z","lat":48.117,"lon":11.517,"alt":545.4,"speed":0.091}"#;

        let coordinate = parse_position(json).unwrap().unwrap();
        assert_eq!(coordinate.latitude, 48.117);
        assert_eq!(coordinate.longitude, 11.517);
    }

    #[test]
    fn test_tpv_without_fix() {
        let json = r#"{"class":"TPV","device":"/dev/ttyUSB0","mode":1}"#;
        assert_eq!(parse_position(json).unwrap(), None);
    }

    #[test]
    fn test_non_tpv_message_is_ignored() {
        let json = r#"{"class":"SKY","device":"/dev/ttyUSB0","hdop":1.2,"satellites":[]}"#;
        assert_eq!(parse_position(json).unwrap(), None);
    }

    #[test]
    fn test_invalid_json() {
        let invalid = r#"{"invalid": json"#;
        assert!(parse_position(invalid).is_err());
    }
}
