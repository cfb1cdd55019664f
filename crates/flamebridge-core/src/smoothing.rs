//! Bank intensity smoothing
//!
//! Consoles jitter by an LSB or two; a bank would visibly shimmer if raw
//! values were applied directly. Each bank runs a hysteresis gate followed by
//! a fixed per-tick exponential ramp.

use std::ops::Range;

use crate::config::SmoothingConfig;

/// Hysteresis filter plus exponential ramp for one bank
#[derive(Debug, Clone, PartialEq)]
pub struct IntensitySmoother {
    epsilon: f32,
    ramp_factor: f32,
    accepted: f32,
    smoothed: f32,
}

impl IntensitySmoother {
    /// Create a smoother starting dark
    pub fn new(epsilon: f32, ramp_factor: f32) -> Self {
        Self {
            epsilon,
            ramp_factor,
            accepted: 0.0,
            smoothed: 0.0,
        }
    }

    /// Create a smoother from configuration
    pub fn from_config(config: &SmoothingConfig) -> Self {
        Self::new(config.epsilon, config.ramp_factor)
    }

    /// Advance one tick towards `raw_target` and return the smoothed value
    ///
    /// The ramp is applied once per call; the loop runs at a fixed rate, so
    /// convergence is counted in ticks rather than wall-clock time.
    pub fn update(&mut self, raw_target: f32) -> f32 {
        let raw_target = raw_target.clamp(0.0, 1.0);
        if (raw_target - self.accepted).abs() >= self.epsilon {
            self.accepted = raw_target;
        }
        self.smoothed += (self.accepted - self.smoothed) * self.ramp_factor;
        self.smoothed
    }

    /// Target currently being approached
    pub fn accepted_target(&self) -> f32 {
        self.accepted
    }

    /// Last smoothed value
    pub fn value(&self) -> f32 {
        self.smoothed
    }
}

/// A contiguous zone of pixels sharing one intensity control
#[derive(Debug, Clone)]
pub struct Bank {
    id: usize,
    pixels: Range<usize>,
    raw_target: f32,
    smoother: IntensitySmoother,
}

impl Bank {
    /// Create a dark bank
    pub fn new(id: usize, pixels: Range<usize>, smoothing: &SmoothingConfig) -> Self {
        Self {
            id,
            pixels,
            raw_target: 0.0,
            smoother: IntensitySmoother::from_config(smoothing),
        }
    }

    /// Record the latest raw level from the console
    pub fn set_raw_target(&mut self, raw: f32) {
        self.raw_target = raw;
    }

    /// Run one smoothing step with the last known raw level
    pub fn update(&mut self) -> f32 {
        self.smoother.update(self.raw_target)
    }

    /// Bank id (position in the layout)
    pub fn id(&self) -> usize {
        self.id
    }

    /// Pixel range of the bank
    pub fn pixels(&self) -> Range<usize> {
        self.pixels.clone()
    }

    /// Last raw level
    pub fn raw_target(&self) -> f32 {
        self.raw_target
    }

    /// Smoothed intensity
    pub fn intensity(&self) -> f32 {
        self.smoother.value()
    }
}
