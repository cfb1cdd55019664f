//! In-memory devices and a tiny layout for bridge tests

use std::collections::VecDeque;
use std::net::{IpAddr, Ipv4Addr};

use flamebridge_control::{ControlError, DmxSource, Result, UniverseSink};
use flamebridge_core::{
    BankConfig, BridgeConfig, DmxFrame, EndpointConfig, FireConfig, LayoutConfig, OutputConfig,
    PixelRange, UniverseBuffer,
};

/// Replays scripted poll results, then reports no data
pub struct ScriptedSource {
    polls: VecDeque<Result<Vec<DmxFrame>>>,
    pub max_seen: Option<usize>,
}

impl ScriptedSource {
    pub fn new(polls: Vec<Result<Vec<DmxFrame>>>) -> Self {
        Self {
            polls: polls.into(),
            max_seen: None,
        }
    }
}

impl DmxSource for ScriptedSource {
    fn poll(&mut self, max_frames: usize) -> Result<Vec<DmxFrame>> {
        self.max_seen = Some(max_frames);
        self.polls.pop_front().unwrap_or_else(|| Ok(Vec::new()))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Keeps every sent universe, or fails every send
#[derive(Default)]
pub struct RecordingSink {
    pub sent: Vec<UniverseBuffer>,
    pub fail: bool,
}

impl UniverseSink for RecordingSink {
    fn send(&mut self, buffer: &UniverseBuffer) -> Result<()> {
        if self.fail {
            return Err(ControlError::InvalidParameter("link down".to_string()));
        }
        self.sent.push(buffer.clone());
        Ok(())
    }
}

/// Two banks of 4 pixels in one universe, flashes off
pub fn small_config() -> BridgeConfig {
    BridgeConfig {
        layout: LayoutConfig {
            total_pixels: 8,
            pixel_spacing: 1,
            gap: None,
            banks: vec![BankConfig::new(0, 4), BankConfig::new(4, 8)],
        },
        output: OutputConfig {
            endpoints: vec![EndpointConfig {
                name: "test".to_string(),
                address: Some(IpAddr::V4(Ipv4Addr::LOCALHOST)),
                universe_start: 1,
                pixels: PixelRange::new(0, 8),
            }],
            ..OutputConfig::default()
        },
        fire: FireConfig {
            white_flash_probability: 0.0,
            blue_flash_probability: 0.0,
            ..FireConfig::default()
        },
        ..BridgeConfig::default()
    }
}

/// Frame with the given (channel, value) pairs set
pub fn frame(values: &[(u16, u8)]) -> DmxFrame {
    let mut frame = DmxFrame::new();
    for &(channel, value) in values {
        frame.set_channel(channel, value);
    }
    frame
}
