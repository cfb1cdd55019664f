//! Loop metrics
//!
//! Rolling counters for the status line. Rates are computed over the window
//! since the last report; totals cover the whole run. Every method takes the
//! current [`Instant`] so the metrics can be driven by a fake clock in tests.

use std::fmt;
use std::time::{Duration, Instant};

/// Rolling loop counters
#[derive(Debug, Clone)]
pub struct LoopMetrics {
    interval: Duration,
    window_start: Instant,
    window_ticks: u64,
    window_frames: u64,
    last_frame_at: Option<Instant>,
    total_ticks: u64,
    total_frames: u64,
    total_packets: u64,
    total_send_errors: u64,
}

/// Snapshot of one reporting window
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsReport {
    /// Achieved ticks per second
    pub tick_rate: f64,
    /// Decoded input frames per second
    pub frame_rate: f64,
    /// Time since the last decoded frame; `None` before the first one
    pub input_latency: Option<Duration>,
    /// Ticks since start
    pub total_ticks: u64,
    /// Input frames since start
    pub total_frames: u64,
    /// Universe packets sent since start
    pub total_packets: u64,
    /// Failed universe sends since start
    pub total_send_errors: u64,
}

impl LoopMetrics {
    /// Start counting at `now`, reporting every `interval`
    pub fn new(interval: Duration, now: Instant) -> Self {
        Self {
            interval,
            window_start: now,
            window_ticks: 0,
            window_frames: 0,
            last_frame_at: None,
            total_ticks: 0,
            total_frames: 0,
            total_packets: 0,
            total_send_errors: 0,
        }
    }

    /// Count one completed tick
    pub fn record_tick(&mut self) {
        self.window_ticks += 1;
        self.total_ticks += 1;
    }

    /// Count input frames decoded at `now`
    pub fn record_frames(&mut self, count: usize, now: Instant) {
        if count == 0 {
            return;
        }
        self.window_frames += count as u64;
        self.total_frames += count as u64;
        self.last_frame_at = Some(now);
    }

    /// Count universe sends
    pub fn record_sends(&mut self, sent: usize, failed: usize) {
        self.total_packets += sent as u64;
        self.total_send_errors += failed as u64;
    }

    /// Time since the last decoded frame
    pub fn input_latency(&self, now: Instant) -> Option<Duration> {
        self.last_frame_at
            .map(|at| now.saturating_duration_since(at))
    }

    /// Ticks since start
    pub fn total_ticks(&self) -> u64 {
        self.total_ticks
    }

    /// True once the reporting interval has elapsed
    pub fn report_due(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.window_start) >= self.interval
    }

    /// Build a report and start a new window
    pub fn take_report(&mut self, now: Instant) -> MetricsReport {
        let elapsed = now
            .saturating_duration_since(self.window_start)
            .as_secs_f64();
        let rate = |count: u64| {
            if elapsed > 0.0 {
                count as f64 / elapsed
            } else {
                0.0
            }
        };

        let report = MetricsReport {
            tick_rate: rate(self.window_ticks),
            frame_rate: rate(self.window_frames),
            input_latency: self.input_latency(now),
            total_ticks: self.total_ticks,
            total_frames: self.total_frames,
            total_packets: self.total_packets,
            total_send_errors: self.total_send_errors,
        };

        self.window_start = now;
        self.window_ticks = 0;
        self.window_frames = 0;
        report
    }
}

impl fmt::Display for MetricsReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "FPS: {:.1} | DMX: {:.1} Hz | Latency: ",
            self.tick_rate, self.frame_rate
        )?;
        match self.input_latency {
            Some(latency) => write!(f, "{:.1}ms", latency.as_secs_f64() * 1000.0)?,
            None => write!(f, "no input")?,
        }
        if self.total_send_errors > 0 {
            write!(f, " | Send errors: {}", self.total_send_errors)?;
        }
        Ok(())
    }
}
