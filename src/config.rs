//! Kiosk configuration
//!
//! Loaded from a TOML file at startup. Every field has a default matching the
//! booth's standard wiring, so the application runs without a config file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Complete kiosk configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KioskConfig {
    /// Serial ports and line settings of the show hardware
    pub hardware: HardwareConfig,
    /// Demo playback defaults
    pub demo: DemoConfig,
    /// Slide storage
    pub content: ContentConfig,
    /// Log filter
    pub logging: LoggingConfig,
}

/// Serial ports per device role
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HardwareConfig {
    /// Main ESP32 controller
    pub esp32_1_port: String,
    /// First add-on ESP32
    pub esp32_2_port: String,
    /// Second add-on ESP32
    pub esp32_3_port: String,
    /// Arduino GIGA dispatcher board
    pub dispatcher_port: String,
    pub baud_rate: u32,
    /// Read timeout in seconds
    pub timeout_secs: u64,
}

impl Default for HardwareConfig {
    fn default() -> Self {
        Self {
            esp32_1_port: "/dev/ttyUSB0".to_string(),
            esp32_2_port: "/dev/ttyUSB1".to_string(),
            esp32_3_port: "/dev/ttyUSB2".to_string(),
            dispatcher_port: "/dev/ttyACM0".to_string(),
            baud_rate: 115200,
            timeout_secs: 1,
        }
    }
}

impl HardwareConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Peripheral controller ports in instance order (1-based)
    pub fn peripheral_ports(&self) -> [&str; 3] {
        [&self.esp32_1_port, &self.esp32_2_port, &self.esp32_3_port]
    }
}

/// Demo playback defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    /// Seconds per slide
    pub slide_duration: u64,
    pub loop_enabled: bool,
    /// Network target the dispatcher relays slide signals to
    pub relay_target: String,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            slide_duration: 5,
            loop_enabled: true,
            relay_target: "192.168.1.100".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentConfig {
    /// Slide file loaded at startup and written by `save`
    pub slides_file: PathBuf,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            slides_file: PathBuf::from("data/slides.json"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default `env_logger` filter, overridden by `RUST_LOG`
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl KioskConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }

    /// Load `path` if given, otherwise fall back to defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }
}
