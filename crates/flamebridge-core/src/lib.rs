//! FlameBridge Core - Real-time fire pipeline without I/O
//!
//! This crate contains everything between a decoded DMX frame and the bytes of
//! an outgoing universe:
//! - DMX frame model and channel mapping
//! - Per-bank hysteresis and ramp smoothing
//! - The per-pixel fire animation engine
//! - Universe packing and dual-controller routing
//! - Configuration model, validation and loop metrics
//!
//! Serial and network access live in `flamebridge-control`.

#![warn(missing_docs)]

pub mod channel_map;
pub mod config;
pub mod dmx;
pub mod error;
pub mod fire;
pub mod logging;
pub mod metrics;
pub mod packer;
pub mod smoothing;

// --- Re-exports grouped by category ---

// Input side
pub use channel_map::{ChannelMap, ControlSnapshot, GlobalControls};
pub use dmx::{DmxFrame, DMX_CHANNELS};

// Smoothing & animation
pub use fire::{FireEngine, FirePixel, FlameState, Rgb, TickContext};
pub use smoothing::{Bank, IntensitySmoother};

// Output side
pub use packer::{UniverseBuffer, UniversePacker, UniverseSlot, PIXELS_PER_UNIVERSE};

// Configuration, logging & diagnostics
pub use config::{
    BankConfig, BridgeConfig, ChannelConfig, EndpointConfig, FireConfig, GapConfig, InputConfig,
    LayoutConfig, OutputConfig, OutputMode, PixelRange, SmoothingConfig, TimingConfig,
};
pub use error::{ConfigError, Result};
pub use logging::{LogConfig, LogRotation};
pub use metrics::{LoopMetrics, MetricsReport};
