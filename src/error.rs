//! Error types for the show-control core
//!
//! Hardware and content errors are kept apart: device errors are logged and
//! turned into per-device results at the registry boundary, content errors
//! are returned to the operator as a single summary line.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by a single device connection
#[derive(Debug, Error)]
pub enum DeviceError {
    /// The serial endpoint could not be opened
    #[error("failed to open serial port {port}: {source}")]
    Open {
        port: String,
        #[source]
        source: io::Error,
    },

    /// A send was attempted while the device is offline
    #[error("{0} is not connected")]
    NotConnected(String),

    /// Read or write failure on an open endpoint
    #[error("I/O error on {name}: {source}")]
    Io {
        name: String,
        #[source]
        source: io::Error,
    },

    /// Serial support was not compiled in (`serial` feature disabled)
    #[error("serial support not enabled, cannot open {0} (rebuild with --features serial)")]
    Unsupported(String),

    /// No device registered under this key
    #[error("unknown device: {0}")]
    UnknownDevice(String),
}

/// Errors raised while saving or loading slide files
#[derive(Debug, Error)]
pub enum ContentError {
    #[error("failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid JSON slide file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid TOML slide file: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("failed to encode slides as TOML: {0}")]
    TomlSer(#[from] toml::ser::Error),

    /// A key of the `slides` table is not a positive integer
    #[error("invalid slide id: {0:?}")]
    InvalidSlideId(String),
}

pub type DeviceResult<T> = std::result::Result<T, DeviceError>;
pub type ContentResult<T> = std::result::Result<T, ContentError>;
