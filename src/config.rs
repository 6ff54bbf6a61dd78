// src/config.rs
//! Configuration management backed by a JSON config file

use crate::error::{Result, TrackerError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    pub source_type: String, // "gpsd", "serial", "replay"
    pub gpsd_host: Option<String>,
    pub gpsd_port: Option<u16>,
    pub serial_port: Option<String>,
    pub serial_baudrate: Option<u32>,
    pub replay_path: Option<PathBuf>,
    pub data_dir: Option<PathBuf>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            source_type: "gpsd".to_string(),
            gpsd_host: Some("localhost".to_string()),
            gpsd_port: Some(2947),
            serial_port: None,
            serial_baudrate: Some(9600),
            replay_path: None,
            data_dir: None,
        }
    }
}

impl TrackerConfig {
    /// Load configuration from the config file, falling back to defaults
    /// when the file does not exist yet.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&config_path)
            .map_err(|e| TrackerError::Other(format!("Failed to read config file: {}", e)))?;

        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| TrackerError::Other(format!("Failed to parse config file: {}", e)))?;

        Ok(config)
    }

    /// Save configuration to the config file.
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| TrackerError::Other(format!("Failed to create config directory: {}", e)))?;
        }

        let contents = serde_json::to_string_pretty(self)
            .map_err(|e| TrackerError::Other(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(&config_path, contents)
            .map_err(|e| TrackerError::Other(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let home = std::env::var("HOME")
            .map_err(|_| TrackerError::Other("HOME environment variable not set".to_string()))?;

        Ok(PathBuf::from(home)
            .join(".config")
            .join("walk-tracker")
            .join("config.json"))
    }

    /// Directory holding the walk storage files.
    pub fn data_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.data_dir {
            return Ok(dir.clone());
        }

        let home = std::env::var("HOME")
            .map_err(|_| TrackerError::Other("HOME environment variable not set".to_string()))?;

        Ok(PathBuf::from(home)
            .join(".local")
            .join("share")
            .join("walk-tracker"))
    }

    /// Update gpsd settings
    pub fn update_gpsd(&mut self, host: String, port: u16) {
        self.source_type = "gpsd".to_string();
        self.gpsd_host = Some(host);
        self.gpsd_port = Some(port);
    }

    /// Update serial port settings
    pub fn update_serial(&mut self, port: String, baudrate: u32) {
        self.source_type = "serial".to_string();
        self.serial_port = Some(port);
        self.serial_baudrate = Some(baudrate);
    }

    /// Update replay source settings
    pub fn update_replay(&mut self, path: PathBuf) {
        self.source_type = "replay".to_string();
        self.replay_path = Some(path);
    }
}
