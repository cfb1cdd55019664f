//! Bridge configuration
//!
//! One structured value loaded from TOML. Every tunable of the pipeline is a
//! named field here; nothing is looked up by name at runtime. Call
//! [`BridgeConfig::validate`] before opening any device.

use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::net::{IpAddr, Ipv4Addr};
use std::ops::Range;
use std::path::Path;

use crate::channel_map::ChannelMap;
use crate::error::{ConfigError, Result};
use crate::logging::LogConfig;
use crate::packer::{UniversePacker, PIXELS_PER_UNIVERSE};

/// Complete bridge configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Serial gateway settings
    pub input: InputConfig,
    /// DMX channel assignment of the controls
    pub channels: ChannelConfig,
    /// Pixel strip, banks and gap
    pub layout: LayoutConfig,
    /// sACN destinations
    pub output: OutputConfig,
    /// Bank intensity smoothing
    pub smoothing: SmoothingConfig,
    /// Fire animation tunables
    pub fire: FireConfig,
    /// Loop timing
    pub timing: TimingConfig,
    /// Logging
    pub logging: LogConfig,
}

/// Serial gateway (Enttec DMX USB Pro) settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Serial device path (`/dev/ttyUSB0`, `/dev/cu.usbserial-*`, `COM3`)
    pub port: String,
    /// Baud rate of the virtual COM port
    pub baud_rate: u32,
    /// Read timeout per poll in milliseconds
    pub read_timeout_ms: u64,
    /// Maximum frames drained per tick
    pub max_frames_per_tick: usize,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".to_string(),
            baud_rate: 115_200,
            read_timeout_ms: 1,
            max_frames_per_tick: 10,
        }
    }
}

/// 1-based DMX channels feeding the global controls and the banks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Flicker speed channel
    pub flicker_speed: u16,
    /// Color shift channel (yellow to red)
    pub color_shift: u16,
    /// Wind gust channel
    pub wind_gust: u16,
    /// Master intensity channel
    pub master_intensity: u16,
    /// Channel of bank 0; bank `n` defaults to `first_bank + n`
    pub first_bank: u16,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            flicker_speed: 1,
            color_shift: 2,
            wind_gust: 3,
            master_intensity: 6,
            first_bank: 7,
        }
    }
}

/// Half-open pixel index range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelRange {
    /// First pixel
    pub start: usize,
    /// One past the last pixel
    pub end: usize,
}

impl PixelRange {
    /// Create a range
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// As a std range
    pub fn as_range(&self) -> Range<usize> {
        self.start..self.end
    }

    /// Number of pixels
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    /// True when the range holds no pixels
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True when `pixel` lies inside
    pub fn contains(&self, pixel: usize) -> bool {
        self.as_range().contains(&pixel)
    }

    /// True when the two ranges share at least one pixel
    pub fn overlaps(&self, other: &PixelRange) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Unused pixel range between two controllers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GapConfig {
    /// First gap pixel
    pub start: usize,
    /// Number of gap pixels
    pub len: usize,
}

impl GapConfig {
    /// Gap as a pixel range
    ///
    /// Saturates on overflow; [`LayoutConfig::validate`] rejects such gaps.
    pub fn range(&self) -> PixelRange {
        PixelRange::new(self.start, self.start.saturating_add(self.len))
    }
}

/// One bank of pixels sharing an intensity channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankConfig {
    /// First pixel of the bank
    pub start: usize,
    /// One past the last pixel
    pub end: usize,
    /// Explicit DMX channel, overrides `channels.first_bank + id`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<u16>,
}

impl BankConfig {
    /// Create a bank with the default channel
    pub fn new(start: usize, end: usize) -> Self {
        Self {
            start,
            end,
            channel: None,
        }
    }

    /// Bank as a pixel range
    pub fn range(&self) -> PixelRange {
        PixelRange::new(self.start, self.end)
    }
}

/// Static pixel layout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Physical pixels including the gap
    pub total_pixels: usize,
    /// Every Nth pixel of a bank is a flame; the others stay dark
    pub pixel_spacing: usize,
    /// Optional unused gap
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gap: Option<GapConfig>,
    /// Banks in pixel order
    pub banks: Vec<BankConfig>,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            total_pixels: 1500,
            pixel_spacing: 1,
            gap: None,
            banks: vec![
                BankConfig::new(0, 500),
                BankConfig::new(500, 1000),
                BankConfig::new(1000, 1500),
            ],
        }
    }
}

impl LayoutConfig {
    /// True when `pixel` belongs to the unused gap
    pub fn is_gap(&self, pixel: usize) -> bool {
        self.gap.is_some_and(|gap| gap.range().contains(pixel))
    }

    /// Pixels that carry data (total minus gap)
    pub fn addressable_pixels(&self) -> usize {
        self.total_pixels.saturating_sub(self.gap.map_or(0, |gap| gap.len))
    }

    /// Check that banks and gap tile the strip
    ///
    /// Banks must be sorted, non-overlapping and contiguous; the only hole
    /// allowed is the gap, and no bank may intersect it.
    pub fn validate(&self) -> Result<()> {
        if self.total_pixels == 0 {
            return Err(ConfigError::InvalidLayout(
                "total_pixels must be at least 1".to_string(),
            ));
        }
        if self.pixel_spacing == 0 {
            return Err(ConfigError::InvalidValue {
                field: "layout.pixel_spacing",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.banks.is_empty() {
            return Err(ConfigError::InvalidLayout(
                "at least one bank is required".to_string(),
            ));
        }

        if let Some(gap) = self.gap {
            if gap.start.checked_add(gap.len).is_none() {
                return Err(ConfigError::InvalidLayout(format!(
                    "gap start {} + len {} overflows",
                    gap.start, gap.len
                )));
            }
        }
        let gap = self.gap.map(|g| g.range());
        if let Some(gap) = gap {
            if gap.is_empty() || gap.end > self.total_pixels {
                return Err(ConfigError::InvalidLayout(format!(
                    "gap {}..{} must be non-empty and inside 0..{}",
                    gap.start, gap.end, self.total_pixels
                )));
            }
        }

        let mut cursor = 0;
        for (id, bank) in self.banks.iter().enumerate() {
            let range = bank.range();
            if range.is_empty() {
                return Err(ConfigError::InvalidLayout(format!(
                    "bank {} ({}..{}) is empty",
                    id, bank.start, bank.end
                )));
            }
            if let Some(gap) = gap {
                if range.overlaps(&gap) {
                    return Err(ConfigError::BankCrossesGap {
                        bank: id,
                        start: bank.start,
                        end: bank.end,
                        gap_start: gap.start,
                        gap_end: gap.end,
                    });
                }
                if cursor == gap.start {
                    cursor = gap.end;
                }
            }
            if bank.start != cursor {
                return Err(ConfigError::InvalidLayout(format!(
                    "bank {} starts at {} but the previous range ends at {}",
                    id, bank.start, cursor
                )));
            }
            cursor = bank.end;
        }
        if let Some(gap) = gap {
            if cursor == gap.start {
                cursor = gap.end;
            }
        }
        if cursor != self.total_pixels {
            return Err(ConfigError::InvalidLayout(format!(
                "banks and gap cover 0..{} but the strip has {} pixels",
                cursor, self.total_pixels
            )));
        }
        Ok(())
    }
}

/// sACN addressing mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// Each endpoint has its own address
    #[default]
    Unicast,
    /// All universes go to multicast; receivers filter by universe
    Multicast,
}

/// One downstream LED controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Name used in logs
    pub name: String,
    /// Unicast destination (port 5568 is implied)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<IpAddr>,
    /// First sACN universe of this endpoint
    pub universe_start: u16,
    /// Pixels driven by this endpoint
    pub pixels: PixelRange,
}

/// Output configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Unicast or multicast
    pub mode: OutputMode,
    /// Shared multicast group; standard per-universe groups when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multicast_group: Option<Ipv4Addr>,
    /// sACN source name (max 63 bytes are transmitted)
    pub source_name: String,
    /// sACN priority (0-200)
    pub priority: u8,
    /// Downstream controllers
    pub endpoints: Vec<EndpointConfig>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            mode: OutputMode::Unicast,
            multicast_group: None,
            source_name: "FlameBridge".to_string(),
            priority: 100,
            endpoints: vec![EndpointConfig {
                name: "controller-a".to_string(),
                address: Some(IpAddr::V4(Ipv4Addr::new(192, 168, 4, 74))),
                universe_start: 1,
                pixels: PixelRange::new(0, 1500),
            }],
        }
    }
}

/// Bank intensity smoothing
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingConfig {
    /// Raw changes smaller than this (0.0-1.0) are ignored
    pub epsilon: f32,
    /// Fraction of the remaining distance covered per tick
    pub ramp_factor: f32,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            epsilon: 0.02,
            ramp_factor: 0.3,
        }
    }
}

/// Fire animation tunables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FireConfig {
    /// Flame color at the middle of the color shift control
    pub base_color: [u8; 3],
    /// Max per-channel offset rolled once per pixel
    pub color_jitter: u8,
    /// Green gain swing across the color shift control (0.7 = 30%..170%)
    pub color_shift_range: f32,
    /// Override color of a white-hot flash
    pub white_hot_color: [u8; 3],
    /// Override color of a blue flash
    pub blue_flash_color: [u8; 3],
    /// Chance per pixel and flash window of a white-hot flash
    pub white_flash_probability: f32,
    /// Chance per pixel and flash window of a blue flash
    pub blue_flash_probability: f32,
    /// Length of the window the flash probabilities refer to
    pub flash_window_ms: u64,
    /// Shortest flash
    pub flash_min_ms: u64,
    /// Longest flash
    pub flash_max_ms: u64,
    /// Oscillation speed multiplier at flicker speed 0
    pub flicker_speed_min: f32,
    /// Oscillation speed multiplier at flicker speed 1
    pub flicker_speed_max: f32,
    /// Base waxing/waning frequency
    pub oscillation_hz: f32,
    /// Lowest point of the brightness envelope (0.0-1.0)
    pub envelope_floor: f32,
    /// Per-tick dip chance at full wind gust
    pub gust_max_probability: f32,
    /// Deepest brightness drop at full wind gust (0.0-1.0)
    pub gust_max_depth: f32,
    /// Fraction of a dip recovered per tick
    pub gust_recovery: f32,
    /// Seed base; pixel `i` uses `seed + i`
    pub seed: u64,
}

impl Default for FireConfig {
    fn default() -> Self {
        Self {
            base_color: [255, 127, 15],
            color_jitter: 12,
            color_shift_range: 0.7,
            white_hot_color: [255, 255, 200],
            blue_flash_color: [100, 150, 255],
            white_flash_probability: 0.01,
            blue_flash_probability: 0.0033,
            flash_window_ms: 1000,
            flash_min_ms: 100,
            flash_max_ms: 250,
            flicker_speed_min: 0.5,
            flicker_speed_max: 2.0,
            oscillation_hz: 0.15,
            envelope_floor: 0.6,
            gust_max_probability: 0.05,
            gust_max_depth: 0.7,
            gust_recovery: 0.15,
            seed: 0,
        }
    }
}

/// Loop timing
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Target ticks per second
    pub target_fps: u32,
    /// Seconds between status lines
    pub status_interval_secs: u64,
    /// Cap on the animation step after a stall
    pub max_tick_dt_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            target_fps: 60,
            status_interval_secs: 5,
            max_tick_dt_ms: 100,
        }
    }
}

fn check_unit(field: &'static str, value: f32) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(ConfigError::InvalidValue {
            field,
            reason: format!("{} is outside 0.0-1.0", value),
        });
    }
    Ok(())
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        field,
        reason: reason.into(),
    }
}

impl BridgeConfig {
    /// Load and validate a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml(&text)?;
        tracing::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Parse and validate TOML text
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Render as TOML
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Range-check every field and the static layout
    pub fn validate(&self) -> Result<()> {
        self.validate_tunables()?;
        self.layout.validate()?;
        ChannelMap::new(&self.channels, &self.layout.banks)?;
        UniversePacker::new(&self.layout, &self.output)?;
        Ok(())
    }

    fn validate_tunables(&self) -> Result<()> {
        if self.input.max_frames_per_tick == 0 {
            return Err(invalid("input.max_frames_per_tick", "must be at least 1"));
        }
        if self.timing.target_fps == 0 || self.timing.target_fps > 1000 {
            return Err(invalid("timing.target_fps", "must be 1-1000"));
        }
        let frame_ms = 1000 / u64::from(self.timing.target_fps);
        if self.input.read_timeout_ms >= frame_ms.max(1) {
            return Err(invalid(
                "input.read_timeout_ms",
                format!("must be shorter than one tick ({} ms)", frame_ms),
            ));
        }
        if self.timing.status_interval_secs == 0 {
            return Err(invalid("timing.status_interval_secs", "must be at least 1"));
        }
        if self.logging.file_output && self.logging.max_log_files == 0 {
            return Err(invalid("logging.max_log_files", "must be at least 1"));
        }
        if self.timing.max_tick_dt_ms == 0 {
            return Err(invalid("timing.max_tick_dt_ms", "must be at least 1"));
        }

        check_unit("smoothing.epsilon", self.smoothing.epsilon)?;
        if !(self.smoothing.ramp_factor > 0.0 && self.smoothing.ramp_factor <= 1.0) {
            return Err(invalid("smoothing.ramp_factor", "must be in (0.0, 1.0]"));
        }

        let fire = &self.fire;
        check_unit("fire.white_flash_probability", fire.white_flash_probability)?;
        check_unit("fire.blue_flash_probability", fire.blue_flash_probability)?;
        check_unit("fire.color_shift_range", fire.color_shift_range)?;
        check_unit("fire.envelope_floor", fire.envelope_floor)?;
        check_unit("fire.gust_max_probability", fire.gust_max_probability)?;
        check_unit("fire.gust_max_depth", fire.gust_max_depth)?;
        check_unit("fire.gust_recovery", fire.gust_recovery)?;
        if fire.flash_window_ms == 0 {
            return Err(invalid("fire.flash_window_ms", "must be at least 1"));
        }
        if fire.flash_min_ms == 0 || fire.flash_min_ms > fire.flash_max_ms {
            return Err(invalid(
                "fire.flash_min_ms",
                format!(
                    "need 0 < flash_min_ms <= flash_max_ms (got {}..{})",
                    fire.flash_min_ms, fire.flash_max_ms
                ),
            ));
        }
        if !(fire.flicker_speed_min > 0.0 && fire.flicker_speed_min <= fire.flicker_speed_max) {
            return Err(invalid(
                "fire.flicker_speed_min",
                "need 0 < flicker_speed_min <= flicker_speed_max",
            ));
        }
        if !(fire.oscillation_hz > 0.0 && fire.oscillation_hz.is_finite()) {
            return Err(invalid("fire.oscillation_hz", "must be positive"));
        }

        if self.output.priority > 200 {
            return Err(invalid("output.priority", "must be 0-200"));
        }
        if self.output.source_name.is_empty() {
            return Err(invalid("output.source_name", "must not be empty"));
        }
        if self.output.endpoints.is_empty() {
            return Err(invalid("output.endpoints", "at least one endpoint is required"));
        }
        if self.output.mode == OutputMode::Unicast {
            if let Some(endpoint) = self.output.endpoints.iter().find(|e| e.address.is_none()) {
                return Err(ConfigError::MissingAddress(endpoint.name.clone()));
            }
        }
        if let Some(group) = self.output.multicast_group {
            if !group.is_multicast() {
                return Err(invalid(
                    "output.multicast_group",
                    format!("{} is not a multicast address", group),
                ));
            }
        }
        Ok(())
    }

    /// Human-readable report of the configuration
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "FlameBridge configuration");
        let _ = writeln!(out, "\nDMX input (Enttec DMX USB Pro):");
        let _ = writeln!(out, "  Port: {}", self.input.port);
        let _ = writeln!(out, "  Baud rate: {}", self.input.baud_rate);
        let _ = writeln!(
            out,
            "  Channels: flicker {}, color shift {}, wind {}, master {}",
            self.channels.flicker_speed,
            self.channels.color_shift,
            self.channels.wind_gust,
            self.channels.master_intensity
        );

        let _ = writeln!(out, "\nLayout:");
        let _ = writeln!(
            out,
            "  Pixels: {} ({} addressable)",
            self.layout.total_pixels,
            self.layout.addressable_pixels()
        );
        if let Some(gap) = self.layout.gap {
            let range = gap.range();
            let _ = writeln!(out, "  Gap: pixels {}..{}", range.start, range.end);
        }
        if self.layout.pixel_spacing > 1 {
            let _ = writeln!(out, "  Spacing: every {} pixels", self.layout.pixel_spacing);
        }
        for (id, bank) in self.layout.banks.iter().enumerate() {
            let channel = bank
                .channel
                .unwrap_or(self.channels.first_bank.saturating_add(id as u16));
            let flames = bank.range().len().div_ceil(self.layout.pixel_spacing.max(1));
            let _ = writeln!(
                out,
                "  Bank {}: pixels {}..{} ({} flames) on channel {}",
                id, bank.start, bank.end, flames, channel
            );
        }

        let _ = writeln!(out, "\nsACN output ({:?}):", self.output.mode);
        for endpoint in &self.output.endpoints {
            let pixels = endpoint
                .pixels
                .as_range()
                .filter(|&p| !self.layout.is_gap(p))
                .count();
            let universes = pixels.div_ceil(PIXELS_PER_UNIVERSE);
            let destination = match (self.output.mode, endpoint.address) {
                (OutputMode::Unicast, Some(addr)) => addr.to_string(),
                (OutputMode::Multicast, _) => self
                    .output
                    .multicast_group
                    .map_or_else(|| "per-universe multicast".to_string(), |g| g.to_string()),
                (OutputMode::Unicast, None) => "<missing>".to_string(),
            };
            let _ = writeln!(
                out,
                "  {}: {} -> universes {}-{} ({} pixels)",
                endpoint.name,
                destination,
                endpoint.universe_start,
                u32::from(endpoint.universe_start) + universes.saturating_sub(1) as u32,
                pixels
            );
        }

        let _ = writeln!(out, "\nPerformance:");
        let _ = writeln!(out, "  Target FPS: {}", self.timing.target_fps);
        let _ = writeln!(out, "  Serial timeout: {} ms", self.input.read_timeout_ms);
        let _ = writeln!(
            out,
            "  Max frames per tick: {}",
            self.input.max_frames_per_tick
        );
        out
    }
}
