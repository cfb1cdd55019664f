//! Fire animation engine
//!
//! Every flame pixel owns a small state machine and a private seeded RNG, so
//! runs are reproducible under test while pixels still look independent.
//!
//! Per tick a pixel:
//! 1. counts down an active flash, or rolls for a new one while `Normal`
//! 2. advances its sine envelope at a speed set by `flicker_speed`
//! 3. rolls for a wind-gust dip, or recovers from the last one
//! 4. picks its color (base with green shifted by `color_shift`, or the flash
//!    override) and scales it by envelope x dip x bank x master

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f32::consts::TAU;
use std::time::Duration;

use crate::channel_map::GlobalControls;
use crate::config::{FireConfig, LayoutConfig};

/// 8-bit RGB triple
pub type Rgb = [u8; 3];

/// Special-event state of a flame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlameState {
    /// Regular flickering
    Normal,
    /// Short near-white burst
    WhiteHotFlash {
        /// Time left before returning to `Normal`
        remaining: Duration,
    },
    /// Short blue burst
    BlueFlash {
        /// Time left before returning to `Normal`
        remaining: Duration,
    },
}

/// Per-tick inputs shared by all pixels
#[derive(Debug, Clone, Copy)]
pub struct TickContext<'a> {
    /// Time since the previous tick
    pub dt: Duration,
    /// Global controls in effect for this tick
    pub controls: GlobalControls,
    /// Smoothed intensity per bank id
    pub bank_intensities: &'a [f32],
}

/// Green gain for a color shift value
///
/// Monotonically decreasing: `1 + range` at 0.0 (yellow), exactly 1.0 at 0.5
/// (base color), `1 - range` at 1.0 (red).
pub fn green_gain(color_shift: f32, range: f32) -> f32 {
    1.0 + (0.5 - color_shift.clamp(0.0, 1.0)) * 2.0 * range
}

/// Chance of an event within `windows` windows when it has chance `p` per window
fn per_tick_probability(p: f32, windows: f32) -> f32 {
    1.0 - (1.0 - p).powf(windows)
}

/// One flame
#[derive(Debug, Clone)]
pub struct FirePixel {
    index: usize,
    bank: usize,
    base: [f32; 3],
    rate: f32,
    phase: f32,
    dip: f32,
    state: FlameState,
    rng: StdRng,
}

impl FirePixel {
    /// Create a flame with a personality derived from its index
    pub fn new(index: usize, bank: usize, params: &FireConfig) -> Self {
        let mut rng = StdRng::seed_from_u64(params.seed.wrapping_add(index as u64));

        let jitter = i16::from(params.color_jitter);
        let base = params.base_color.map(|channel| {
            let offset = if jitter > 0 {
                rng.random_range(-jitter..=jitter)
            } else {
                0
            };
            f32::from((i16::from(channel) + offset).clamp(0, 255) as u8)
        });
        let rate = rng.random_range(0.5..1.5);
        let phase = rng.random_range(0.0..TAU);

        Self {
            index,
            bank,
            base,
            rate,
            phase,
            dip: 1.0,
            state: FlameState::Normal,
            rng,
        }
    }

    /// Advance by `dt` and return the pixel color
    pub fn advance(
        &mut self,
        dt: Duration,
        controls: &GlobalControls,
        bank_intensity: f32,
        params: &FireConfig,
    ) -> Rgb {
        self.step_state(dt, params);
        self.step_envelope(dt, controls.flicker_speed, params);
        self.step_gust(controls.wind_gust, params);

        let floor = params.envelope_floor;
        let envelope = floor + (1.0 - floor) * (self.phase.sin() + 1.0) * 0.5;
        let combined = envelope
            * self.dip
            * bank_intensity.clamp(0.0, 1.0)
            * controls.master_intensity.clamp(0.0, 1.0);

        let color = match self.state {
            FlameState::Normal => [
                self.base[0],
                self.base[1] * green_gain(controls.color_shift, params.color_shift_range),
                self.base[2],
            ],
            FlameState::WhiteHotFlash { .. } => params.white_hot_color.map(f32::from),
            FlameState::BlueFlash { .. } => params.blue_flash_color.map(f32::from),
        };

        color.map(|c| (c * combined).clamp(0.0, 255.0).round() as u8)
    }

    fn step_state(&mut self, dt: Duration, params: &FireConfig) {
        self.state = match self.state {
            FlameState::WhiteHotFlash { remaining } => match remaining.checked_sub(dt) {
                Some(left) if !left.is_zero() => FlameState::WhiteHotFlash { remaining: left },
                _ => FlameState::Normal,
            },
            FlameState::BlueFlash { remaining } => match remaining.checked_sub(dt) {
                Some(left) if !left.is_zero() => FlameState::BlueFlash { remaining: left },
                _ => FlameState::Normal,
            },
            FlameState::Normal => {
                let windows = dt.as_secs_f32() * 1000.0 / params.flash_window_ms as f32;
                let white_roll: f32 = self.rng.random();
                let blue_roll: f32 = self.rng.random();
                if white_roll < per_tick_probability(params.white_flash_probability, windows) {
                    FlameState::WhiteHotFlash {
                        remaining: self.flash_duration(params),
                    }
                } else if blue_roll < per_tick_probability(params.blue_flash_probability, windows)
                {
                    FlameState::BlueFlash {
                        remaining: self.flash_duration(params),
                    }
                } else {
                    FlameState::Normal
                }
            }
        };
    }

    fn flash_duration(&mut self, params: &FireConfig) -> Duration {
        Duration::from_millis(
            self.rng
                .random_range(params.flash_min_ms..=params.flash_max_ms),
        )
    }

    fn step_envelope(&mut self, dt: Duration, flicker_speed: f32, params: &FireConfig) {
        let speed = params.flicker_speed_min
            + (params.flicker_speed_max - params.flicker_speed_min)
                * flicker_speed.clamp(0.0, 1.0);
        self.phase += TAU * params.oscillation_hz * self.rate * speed * dt.as_secs_f32();
        self.phase = self.phase.rem_euclid(TAU);
    }

    fn step_gust(&mut self, wind_gust: f32, params: &FireConfig) {
        let wind = wind_gust.clamp(0.0, 1.0);
        if wind > 0.0 && self.rng.random::<f32>() < wind * params.gust_max_probability {
            let depth = wind * params.gust_max_depth * self.rng.random_range(0.5..=1.0);
            self.dip = self.dip.min(1.0 - depth);
        } else {
            self.dip += (1.0 - self.dip) * params.gust_recovery;
        }
    }

    /// Pixel index in the strip
    pub fn index(&self) -> usize {
        self.index
    }

    /// Owning bank id
    pub fn bank(&self) -> usize {
        self.bank
    }

    /// Current special-event state
    pub fn state(&self) -> FlameState {
        self.state
    }

    /// Base color after the per-pixel jitter
    pub fn base_color(&self) -> Rgb {
        self.base.map(|c| c as u8)
    }
}

/// All flames of the strip plus the rendered frame
pub struct FireEngine {
    params: FireConfig,
    pixels: Vec<FirePixel>,
    frame: Vec<Rgb>,
}

impl FireEngine {
    /// Create one flame per `pixel_spacing` pixels of every bank
    pub fn new(layout: &LayoutConfig, params: FireConfig) -> Self {
        let spacing = layout.pixel_spacing.max(1);
        let pixels: Vec<FirePixel> = layout
            .banks
            .iter()
            .enumerate()
            .flat_map(|(bank, config)| {
                config
                    .range()
                    .as_range()
                    .step_by(spacing)
                    .map(move |index| (index, bank))
            })
            .map(|(index, bank)| FirePixel::new(index, bank, &params))
            .collect();

        tracing::debug!(
            "Fire engine created: {} flames over {} pixels",
            pixels.len(),
            layout.total_pixels
        );

        Self {
            params,
            pixels,
            frame: vec![[0; 3]; layout.total_pixels],
        }
    }

    /// Advance every flame and return the full strip (gap and non-flame pixels black)
    pub fn render(&mut self, ctx: &TickContext<'_>) -> &[Rgb] {
        for pixel in &mut self.pixels {
            let intensity = ctx
                .bank_intensities
                .get(pixel.bank)
                .copied()
                .unwrap_or(0.0);
            self.frame[pixel.index] =
                pixel.advance(ctx.dt, &ctx.controls, intensity, &self.params);
        }
        &self.frame
    }

    /// Last rendered frame
    pub fn frame(&self) -> &[Rgb] {
        &self.frame
    }

    /// All flames
    pub fn pixels(&self) -> &[FirePixel] {
        &self.pixels
    }

    /// Number of flames currently in a (white-hot, blue) flash
    pub fn active_flashes(&self) -> (usize, usize) {
        self.pixels
            .iter()
            .fold((0, 0), |(white, blue), pixel| match pixel.state {
                FlameState::WhiteHotFlash { .. } => (white + 1, blue),
                FlameState::BlueFlash { .. } => (white, blue + 1),
                FlameState::Normal => (white, blue),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BankConfig;

    const TICK: Duration = Duration::from_millis(16);

    fn calm_params() -> FireConfig {
        FireConfig {
            white_flash_probability: 0.0,
            blue_flash_probability: 0.0,
            ..FireConfig::default()
        }
    }

    fn full() -> GlobalControls {
        GlobalControls {
            flicker_speed: 0.5,
            color_shift: 0.5,
            wind_gust: 0.0,
            master_intensity: 1.0,
        }
    }

    #[test]
    fn test_green_gain_is_monotonic_and_centered() {
        assert_eq!(green_gain(0.5, 0.7), 1.0);
        let mut last = f32::MAX;
        for step in 0..=20 {
            let gain = green_gain(step as f32 / 20.0, 0.7);
            assert!(gain < last);
            last = gain;
        }
        assert!((green_gain(0.0, 0.7) - 1.7).abs() < 1e-6);
        assert!((green_gain(1.0, 0.7) - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_flat_envelope_yields_base_color() {
        let params = FireConfig {
            color_jitter: 0,
            envelope_floor: 1.0,
            ..calm_params()
        };
        let mut pixel = FirePixel::new(0, 0, &params);
        let rgb = pixel.advance(TICK, &full(), 1.0, &params);
        assert_eq!(rgb, [255, 127, 15]);
    }

    #[test]
    fn test_jitter_is_stable_per_pixel() {
        let params = FireConfig::default();
        let a = FirePixel::new(42, 0, &params);
        let b = FirePixel::new(42, 0, &params);
        assert_eq!(a.base_color(), b.base_color());
        for (channel, base) in a.base_color().iter().zip(params.base_color) {
            assert!((i16::from(*channel) - i16::from(base)).abs() <= 12);
        }
    }

    #[test]
    fn test_zero_bank_is_black() {
        let params = FireConfig {
            white_flash_probability: 1.0,
            ..FireConfig::default()
        };
        let mut pixel = FirePixel::new(3, 0, &params);
        for _ in 0..100 {
            assert_eq!(pixel.advance(TICK, &full(), 0.0, &params), [0, 0, 0]);
        }
    }

    #[test]
    fn test_color_shift_moves_green_only() {
        let params = FireConfig {
            envelope_floor: 1.0,
            ..calm_params()
        };
        let pixel = FirePixel::new(7, 0, &params);

        let mut yellow = pixel.clone();
        let mut red = pixel;
        let yellow_rgb = yellow.advance(
            TICK,
            &GlobalControls {
                color_shift: 0.0,
                ..full()
            },
            1.0,
            &params,
        );
        let red_rgb = red.advance(
            TICK,
            &GlobalControls {
                color_shift: 1.0,
                ..full()
            },
            1.0,
            &params,
        );
        assert!(yellow_rgb[1] > red_rgb[1]);
        assert_eq!(yellow_rgb[0], red_rgb[0]);
        assert_eq!(yellow_rgb[2], red_rgb[2]);
    }

    #[test]
    fn test_white_hot_flash_lifecycle() {
        let params = FireConfig {
            white_flash_probability: 1.0,
            envelope_floor: 1.0,
            ..FireConfig::default()
        };
        let mut pixel = FirePixel::new(1, 0, &params);
        let rgb = pixel.advance(TICK, &full(), 1.0, &params);

        match pixel.state() {
            FlameState::WhiteHotFlash { remaining } => {
                assert!(remaining >= Duration::from_millis(100));
                assert!(remaining <= Duration::from_millis(250));
            }
            other => panic!("expected white-hot flash, got {:?}", other),
        }
        assert_eq!(rgb, [255, 255, 200]);

        pixel.advance(Duration::from_millis(300), &full(), 1.0, &params);
        assert_eq!(pixel.state(), FlameState::Normal);
    }

    #[test]
    fn test_blue_flash_boosts_blue() {
        let params = FireConfig {
            white_flash_probability: 0.0,
            blue_flash_probability: 1.0,
            ..FireConfig::default()
        };
        let mut pixel = FirePixel::new(9, 0, &params);
        let rgb = pixel.advance(TICK, &full(), 1.0, &params);
        assert!(matches!(pixel.state(), FlameState::BlueFlash { .. }));
        assert!(rgb[2] > rgb[0]);
        assert!(rgb[2] > rgb[1]);
    }

    #[test]
    fn test_flash_is_scaled_by_intensity() {
        let params = FireConfig {
            white_flash_probability: 1.0,
            envelope_floor: 1.0,
            ..FireConfig::default()
        };
        let mut pixel = FirePixel::new(1, 0, &params);
        let rgb = pixel.advance(TICK, &full(), 0.5, &params);
        assert_eq!(rgb, [128, 128, 100]);
    }

    #[test]
    fn test_wind_gust_dims() {
        let params = FireConfig {
            envelope_floor: 1.0,
            gust_max_probability: 1.0,
            ..calm_params()
        };
        let pixel = FirePixel::new(5, 0, &params);
        let mut calm = pixel.clone();
        let mut windy = pixel;

        let calm_rgb = calm.advance(TICK, &full(), 1.0, &params);
        let windy_rgb = windy.advance(
            TICK,
            &GlobalControls {
                wind_gust: 1.0,
                ..full()
            },
            1.0,
            &params,
        );
        assert!(windy_rgb[0] < calm_rgb[0]);
        assert!(windy_rgb[0] as f32 <= calm_rgb[0] as f32 * 0.66);
    }

    #[test]
    fn test_gust_recovers_without_wind() {
        let params = FireConfig {
            envelope_floor: 1.0,
            gust_max_probability: 1.0,
            ..calm_params()
        };
        let mut pixel = FirePixel::new(5, 0, &params);
        let windy = GlobalControls {
            wind_gust: 1.0,
            ..full()
        };
        pixel.advance(TICK, &windy, 1.0, &params);
        let mut rgb = [0; 3];
        for _ in 0..120 {
            rgb = pixel.advance(TICK, &full(), 1.0, &params);
        }
        assert_eq!(rgb[0], pixel.base_color()[0]);
    }

    #[test]
    fn test_engine_is_deterministic() {
        let layout = LayoutConfig {
            total_pixels: 20,
            pixel_spacing: 1,
            gap: None,
            banks: vec![BankConfig::new(0, 10), BankConfig::new(10, 20)],
        };
        let mut a = FireEngine::new(&layout, FireConfig::default());
        let mut b = FireEngine::new(&layout, FireConfig::default());
        let levels = [1.0, 0.5];
        let ctx = TickContext {
            dt: TICK,
            controls: GlobalControls {
                wind_gust: 0.5,
                ..full()
            },
            bank_intensities: &levels,
        };
        for _ in 0..200 {
            let frame_a = a.render(&ctx).to_vec();
            assert_eq!(frame_a, b.render(&ctx));
        }
    }

    #[test]
    fn test_pixel_spacing_leaves_dark_pixels() {
        let layout = LayoutConfig {
            total_pixels: 12,
            pixel_spacing: 3,
            gap: None,
            banks: vec![BankConfig::new(0, 6), BankConfig::new(6, 12)],
        };
        let mut engine = FireEngine::new(&layout, calm_params());
        assert_eq!(engine.pixels().len(), 4);

        let levels = [1.0, 1.0];
        let frame = engine.render(&TickContext {
            dt: TICK,
            controls: full(),
            bank_intensities: &levels,
        });
        for (index, rgb) in frame.iter().enumerate() {
            if index % 3 == 0 {
                assert!(rgb[0] > 0, "flame {} is dark", index);
            } else {
                assert_eq!(*rgb, [0, 0, 0]);
            }
        }
    }

    #[test]
    fn test_flash_rate_is_rare() {
        let layout = LayoutConfig {
            total_pixels: 1000,
            pixel_spacing: 1,
            gap: None,
            banks: vec![BankConfig::new(0, 1000)],
        };
        let mut engine = FireEngine::new(&layout, FireConfig::default());
        let levels = [1.0];
        let ctx = TickContext {
            dt: TICK,
            controls: full(),
            bank_intensities: &levels,
        };
        let mut flashing_ticks = 0;
        for _ in 0..600 {
            engine.render(&ctx);
            let (white, blue) = engine.active_flashes();
            flashing_ticks += white + blue;
        }
        // ~1.3% of pixels start a flash per second, lasting ~175 ms
        let average = flashing_ticks as f32 / 600.0;
        assert!(average > 0.5 && average < 10.0, "average {}", average);
    }
}
