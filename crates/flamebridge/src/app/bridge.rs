//! The real-time bridge
//!
//! One [`Bridge::tick`] per frame: drain input, map the newest frame, smooth
//! the banks, render the fire, pack and send every universe, then update the
//! metrics. Nothing here blocks beyond the serial read timeout.

use std::fmt::Write as _;
use std::time::{Duration, Instant};

use flamebridge_control::{DmxSource, UniverseSink};
use flamebridge_core::{
    Bank, BridgeConfig, ChannelMap, DmxFrame, FireEngine, GlobalControls, LoopMetrics,
    TickContext, UniversePacker,
};
use tracing::{debug, error, info, warn};

/// Ticks between debug value dumps
const DEBUG_EVERY: u64 = 10;
/// Send failures between repeated warnings
const WARN_EVERY: u64 = 100;

/// Counters of one tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickOutcome {
    /// Frames drained from the input
    pub frames: usize,
    /// Universes sent
    pub sent: usize,
    /// Universes that failed to send
    pub failed: usize,
}

/// DMX in, fire out
pub struct Bridge<I, O> {
    input: Option<I>,
    output: O,
    channel_map: ChannelMap,
    banks: Vec<Bank>,
    controls: GlobalControls,
    last_frame: Option<DmxFrame>,
    engine: FireEngine,
    packer: UniversePacker,
    metrics: LoopMetrics,
    max_frames: usize,
    nominal_dt: Duration,
    max_dt: Duration,
    last_tick: Option<Instant>,
    send_failures: u64,
    debug: bool,
}

impl<I: DmxSource, O: UniverseSink> Bridge<I, O> {
    /// Build the pipeline from a validated configuration
    pub fn new(
        config: &BridgeConfig,
        input: Option<I>,
        output: O,
        now: Instant,
    ) -> flamebridge_core::Result<Self> {
        let channel_map = ChannelMap::new(&config.channels, &config.layout.banks)?;
        let packer = UniversePacker::new(&config.layout, &config.output)?;
        let banks = config
            .layout
            .banks
            .iter()
            .enumerate()
            .map(|(id, bank)| Bank::new(id, bank.range().as_range(), &config.smoothing))
            .collect();
        let engine = FireEngine::new(&config.layout, config.fire.clone());
        let fps = config.timing.target_fps.max(1);

        info!(
            "Bridge ready: {} banks, {} flames, {} universes",
            config.layout.banks.len(),
            engine.pixels().len(),
            packer.universe_count()
        );

        Ok(Self {
            input,
            output,
            channel_map,
            banks,
            controls: GlobalControls::default(),
            last_frame: None,
            engine,
            packer,
            metrics: LoopMetrics::new(
                Duration::from_secs(config.timing.status_interval_secs),
                now,
            ),
            max_frames: config.input.max_frames_per_tick,
            nominal_dt: Duration::from_secs(1) / fps,
            max_dt: Duration::from_millis(config.timing.max_tick_dt_ms),
            last_tick: None,
            send_failures: 0,
            debug: false,
        })
    }

    /// Log raw control values every few ticks
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Run one frame
    pub fn tick(&mut self, now: Instant) -> TickOutcome {
        let mut outcome = TickOutcome::default();

        // 1. Drain input
        let frames = self.poll_input();
        outcome.frames = frames.len();
        self.metrics.record_frames(frames.len(), now);

        // 2. Newest frame wins
        if let Some(frame) = frames.into_iter().last() {
            let snapshot = self.channel_map.extract(&frame);
            self.controls = snapshot.controls;
            for (bank, level) in self.banks.iter_mut().zip(snapshot.bank_levels) {
                bank.set_raw_target(level);
            }
            self.last_frame = Some(frame);
        }

        // 3. Smooth
        let intensities: Vec<f32> = self.banks.iter_mut().map(Bank::update).collect();

        // 4. Animate
        let dt = self
            .last_tick
            .map_or(self.nominal_dt, |last| now.saturating_duration_since(last))
            .min(self.max_dt);
        self.last_tick = Some(now);
        let pixels = self.engine.render(&TickContext {
            dt,
            controls: self.controls,
            bank_intensities: &intensities,
        });

        // 5. Pack and send
        for buffer in self.packer.pack(pixels) {
            match self.output.send(&buffer) {
                Ok(()) => outcome.sent += 1,
                Err(e) => {
                    outcome.failed += 1;
                    self.send_failures += 1;
                    if self.send_failures == 1 || self.send_failures % WARN_EVERY == 0 {
                        warn!(
                            "Universe {} send failed ({} failures so far): {}",
                            buffer.universe, self.send_failures, e
                        );
                    }
                }
            }
        }

        // 6. Metrics
        self.metrics.record_sends(outcome.sent, outcome.failed);
        self.metrics.record_tick();
        if self.debug && self.metrics.total_ticks() % DEBUG_EVERY == 0 {
            debug!("{}", self.debug_line());
        }
        if self.metrics.report_due(now) {
            let report = self.metrics.take_report(now);
            info!("{} | {}", report, self.status_line());
        }

        outcome
    }

    fn poll_input(&mut self) -> Vec<DmxFrame> {
        let Some(input) = self.input.as_mut() else {
            return Vec::new();
        };
        match input.poll(self.max_frames) {
            Ok(frames) => frames,
            Err(e) if e.is_device_failure() => {
                error!(
                    "DMX input {} lost: {}. Continuing with last known values",
                    input.name(),
                    e
                );
                self.input = None;
                Vec::new()
            }
            Err(e) => {
                warn!("DMX input error: {}", e);
                Vec::new()
            }
        }
    }

    /// Banks above 1% and the global controls
    pub fn status_line(&self) -> String {
        let mut line = String::new();
        for bank in self.banks.iter().filter(|b| b.intensity() > 0.01) {
            let _ = write!(line, "B{}:{:3.0}% ", bank.id(), bank.intensity() * 100.0);
        }
        if line.is_empty() {
            line.push_str("All OFF ");
        }
        let c = &self.controls;
        let (white, blue) = self.engine.active_flashes();
        let _ = write!(
            line,
            "| Flicker:{:3.0}% | Y->R:{:3.0}% | Wind:{:3.0}% | Master:{:3.0}% | Flashes: {}W {}B",
            c.flicker_speed * 100.0,
            c.color_shift * 100.0,
            c.wind_gust * 100.0,
            c.master_intensity * 100.0,
            white,
            blue
        );
        if self.input.is_none() {
            line.push_str(" | NO INPUT");
        }
        line
    }

    fn debug_line(&self) -> String {
        let mut line = String::from("DMX:");
        let frame = self.last_frame.clone().unwrap_or_default();
        for channel in self.channel_map.control_channels() {
            let _ = write!(line, " Ch{}:{:3}", channel, frame.channel(channel));
        }
        line.push_str(" | Banks:");
        for bank in &self.banks {
            let _ = write!(line, " {:.2}", bank.intensity());
        }
        line
    }

    /// Send every universe once with all channels at zero
    pub fn blackout(&mut self) -> usize {
        let mut sent = 0;
        for buffer in self.packer.pack(&[]) {
            match self.output.send(&buffer) {
                Ok(()) => sent += 1,
                Err(e) => warn!("Blackout of universe {} failed: {}", buffer.universe, e),
            }
        }
        info!("Blackout sent to {} universe(s)", sent);
        sent
    }

    /// Blackout, then release the input device
    pub fn shutdown(&mut self) {
        self.blackout();
        if let Some(input) = self.input.take() {
            info!("Closing DMX input {}", input.name());
        }
    }

    /// Current global controls
    pub fn controls(&self) -> GlobalControls {
        self.controls
    }

    /// Smoothed intensity per bank
    pub fn bank_intensities(&self) -> Vec<f32> {
        self.banks.iter().map(Bank::intensity).collect()
    }

    /// True while the input device is open
    pub fn has_input(&self) -> bool {
        self.input.is_some()
    }

    /// Output sink
    pub fn output(&self) -> &O {
        &self.output
    }

    /// Loop metrics
    pub fn metrics(&self) -> &LoopMetrics {
        &self.metrics
    }
}
