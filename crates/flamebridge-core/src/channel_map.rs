//! DMX channel mapping
//!
//! Maps the slots of one DMX frame to the global fire controls and to the
//! per-bank raw intensities. Channel indices are validated once at startup;
//! [`ChannelMap::extract`] itself cannot fail and keeps no state.

use serde::{Deserialize, Serialize};

use crate::config::{BankConfig, ChannelConfig};
use crate::dmx::{DmxFrame, DMX_CHANNELS};
use crate::error::{ConfigError, Result};

/// Process-wide fire modifiers, each 0.0-1.0
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GlobalControls {
    /// Oscillation speed of the brightness envelope
    pub flicker_speed: f32,
    /// 0.0 = yellow, 0.5 = base color, 1.0 = red
    pub color_shift: f32,
    /// Probability and depth of sudden brightness drops
    pub wind_gust: f32,
    /// Overall output level
    pub master_intensity: f32,
}

impl Default for GlobalControls {
    /// Neutral controls used until the first frame arrives
    fn default() -> Self {
        Self {
            flicker_speed: 0.5,
            color_shift: 0.5,
            wind_gust: 0.0,
            master_intensity: 1.0,
        }
    }
}

/// Everything extracted from one frame
#[derive(Debug, Clone, PartialEq)]
pub struct ControlSnapshot {
    /// Global controls
    pub controls: GlobalControls,
    /// Raw intensity per bank id (index = bank id)
    pub bank_levels: Vec<f32>,
}

/// Resolved channel table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelMap {
    flicker_speed: u16,
    color_shift: u16,
    wind_gust: u16,
    master_intensity: u16,
    banks: Vec<u16>,
}

fn check_channel(name: impl Into<String>, channel: u16) -> Result<u16> {
    if channel == 0 || channel as usize > DMX_CHANNELS {
        return Err(ConfigError::ChannelOutOfRange {
            name: name.into(),
            channel,
        });
    }
    Ok(channel)
}

/// Convert a DMX value (0-255) to 0.0-1.0
pub fn normalize(value: u8) -> f32 {
    f32::from(value) / 255.0
}

impl ChannelMap {
    /// Resolve and range-check the channel table
    ///
    /// Bank `n` reads its explicit channel if configured, otherwise
    /// `first_bank + n`.
    pub fn new(channels: &ChannelConfig, banks: &[BankConfig]) -> Result<Self> {
        let bank_channels = banks
            .iter()
            .enumerate()
            .map(|(id, bank)| {
                let channel = match bank.channel {
                    Some(channel) => channel,
                    None => {
                        let channel = usize::from(channels.first_bank) + id;
                        u16::try_from(channel).unwrap_or(u16::MAX)
                    }
                };
                check_channel(format!("bank {}", id), channel)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            flicker_speed: check_channel("flicker_speed", channels.flicker_speed)?,
            color_shift: check_channel("color_shift", channels.color_shift)?,
            wind_gust: check_channel("wind_gust", channels.wind_gust)?,
            master_intensity: check_channel("master_intensity", channels.master_intensity)?,
            banks: bank_channels,
        })
    }

    /// Extract controls and bank levels from a frame
    pub fn extract(&self, frame: &DmxFrame) -> ControlSnapshot {
        let controls = GlobalControls {
            flicker_speed: normalize(frame.channel(self.flicker_speed)),
            color_shift: normalize(frame.channel(self.color_shift)),
            wind_gust: normalize(frame.channel(self.wind_gust)),
            master_intensity: normalize(frame.channel(self.master_intensity)),
        };
        let bank_levels = self
            .banks
            .iter()
            .map(|&channel| normalize(frame.channel(channel)))
            .collect();

        ControlSnapshot {
            controls,
            bank_levels,
        }
    }

    /// Channel of each bank, indexed by bank id
    pub fn bank_channels(&self) -> &[u16] {
        &self.banks
    }

    /// Channels of the global controls (flicker, color, wind, master)
    pub fn control_channels(&self) -> [u16; 4] {
        [
            self.flicker_speed,
            self.color_shift,
            self.wind_gust,
            self.master_intensity,
        ]
    }
}
