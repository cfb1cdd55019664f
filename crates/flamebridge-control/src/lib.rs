//! FlameBridge Control - Device and network I/O
//!
//! This crate connects the real-time core to the outside world:
//! - **DMX input**: Enttec DMX USB Pro framing over a serial port
//! - **sACN output**: E1.31 packets to one or more LED controllers
//! - **Ports**: serial device enumeration for setup
//!
//! The [`dmx::DmxSource`] and [`dmx::UniverseSink`] traits are the seams the
//! bridge loop is written against, so tests can substitute in-memory devices.
//!
//! ## Modules
//!
//! - [`dmx`] - Enttec input and sACN output
//! - [`ports`] - Serial port listing
//! - [`error`] - Error types

#![allow(missing_docs)]

/// Error types
pub mod error;

/// DMX input (Enttec) and output (sACN)
pub mod dmx;

/// Serial port enumeration
pub mod ports;

// Re-exports
pub use dmx::{DmxSource, EnttecInput, FrameDecoder, SacnTransport, UniverseSink};
pub use error::{ControlError, Result};
pub use ports::{callout_device_hint, list_ports, PortInfo};
