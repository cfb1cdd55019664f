//! DMX input and output
//!
//! ## Input: Enttec DMX USB Pro
//!
//! A USB-serial widget delivers the console's universe as framed messages.
//! [`EnttecInput`] reads them without blocking longer than the port timeout
//! and hands back decoded [`DmxFrame`]s.
//!
//! ## Output: sACN (E1.31)
//!
//! [`SacnTransport`] sends each packed universe to its endpoint, unicast or
//! multicast, with a sequence counter per universe.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use flamebridge_control::dmx::{DmxSource, EnttecInput, SacnTransport, UniverseSink};
//! use flamebridge_core::{BridgeConfig, UniversePacker};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = BridgeConfig::default();
//! let mut input = EnttecInput::open(&config.input)?;
//! let mut output = SacnTransport::new(&config.output)?;
//! let packer = UniversePacker::new(&config.layout, &config.output)?;
//!
//! let frames = input.poll(config.input.max_frames_per_tick)?;
//! println!("{} frame(s) from {}", frames.len(), input.name());
//!
//! // Blackout: a short frame packs as all zeros
//! for buffer in packer.pack(&[]) {
//!     output.send(&buffer)?;
//! }
//! # Ok(())
//! # }
//! ```

use flamebridge_core::{DmxFrame, UniverseBuffer};

use crate::Result;

pub mod enttec;
pub mod sacn;

pub use enttec::{DecoderStats, EnttecInput, FrameDecoder};
pub use sacn::{build_sacn_packet, multicast_address, FrameHeader, SacnTransport};

/// Source of decoded DMX frames
pub trait DmxSource {
    /// Return up to `max_frames` frames, oldest first, without blocking longer
    /// than the device timeout
    ///
    /// An error means the device is gone; callers keep running on stale data.
    fn poll(&mut self, max_frames: usize) -> Result<Vec<DmxFrame>>;

    /// Device name for logs
    fn name(&self) -> &str;
}

/// Destination of packed universes
pub trait UniverseSink {
    /// Send one universe
    fn send(&mut self, buffer: &UniverseBuffer) -> Result<()>;
}
