//! Error types for device and network I/O
use thiserror::Error;

/// Control I/O errors
///
/// `SerialOpen` and `SerialDisconnected` are device-level and end the input
/// for the rest of the run; `Send` concerns a single packet and is transient.
#[derive(Error, Debug)]
pub enum ControlError {
    /// The serial gateway could not be opened or configured
    #[error("Failed to open serial port {port}: {source}")]
    SerialOpen {
        /// Device path
        port: String,
        /// Driver error
        #[source]
        source: serialport::Error,
    },

    /// The serial gateway went away (unplugged, or taken by another process)
    #[error("Serial port {port} disconnected: {source}")]
    SerialDisconnected {
        /// Device path
        port: String,
        /// I/O error reported by the read
        #[source]
        source: std::io::Error,
    },

    /// Enumerating serial ports failed
    #[error("Failed to list serial ports: {0}")]
    Enumerate(#[from] serialport::Error),

    /// One universe packet could not be sent
    #[error("Failed to send universe {universe} to {destination}: {source}")]
    Send {
        /// Universe of the packet
        universe: u16,
        /// Destination address
        destination: std::net::SocketAddr,
        /// Socket error
        #[source]
        source: std::io::Error,
    },

    /// I/O error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Invalid parameter value
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

impl ControlError {
    /// True for errors after which the device must be considered gone
    pub fn is_device_failure(&self) -> bool {
        matches!(
            self,
            ControlError::SerialOpen { .. } | ControlError::SerialDisconnected { .. }
        )
    }
}

/// Result type for control operations
pub type Result<T> = std::result::Result<T, ControlError>;
