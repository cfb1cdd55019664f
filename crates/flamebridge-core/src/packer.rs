//! Universe packing and endpoint routing
//!
//! The routing plan is computed once from the static layout: each endpoint's
//! pixel range, minus the gap, is cut into chunks of at most 170 pixels and
//! every chunk gets the next universe id from the endpoint's start. Packing a
//! frame then only copies bytes along that plan.

use std::ops::Range;

use crate::config::{EndpointConfig, LayoutConfig, OutputConfig};
use crate::error::{ConfigError, Result};
use crate::fire::Rgb;

/// RGB pixels that fit in one 512-slot universe (170 x 3 = 510)
pub const PIXELS_PER_UNIVERSE: usize = 170;

/// Highest valid sACN universe id
pub const MAX_UNIVERSE: u32 = 63_999;

/// One universe worth of channel data bound for one endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniverseBuffer {
    /// Index of the endpoint in the output configuration
    pub endpoint: usize,
    /// sACN universe id
    pub universe: u16,
    /// Channel data, at most 510 bytes
    pub data: Vec<u8>,
}

/// Pixels carried by one universe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniverseSlot {
    /// Index of the endpoint in the output configuration
    pub endpoint: usize,
    /// sACN universe id
    pub universe: u16,
    /// Contiguous pixel runs, in order
    pub segments: Vec<Range<usize>>,
}

impl UniverseSlot {
    /// Number of pixels in this universe
    pub fn pixel_count(&self) -> usize {
        self.segments.iter().map(|s| s.len()).sum()
    }
}

/// Precomputed routing plan
#[derive(Debug, Clone)]
pub struct UniversePacker {
    slots: Vec<UniverseSlot>,
}

/// Split an endpoint's range (minus the gap) into universe-sized runs
fn chunk_endpoint(endpoint: &EndpointConfig, layout: &LayoutConfig) -> Vec<Vec<Range<usize>>> {
    let mut chunks = Vec::new();
    let mut current: Vec<Range<usize>> = Vec::new();
    let mut count = 0;

    for pixel in endpoint.pixels.as_range() {
        if layout.is_gap(pixel) {
            continue;
        }
        match current.last_mut() {
            Some(run) if run.end == pixel => run.end += 1,
            _ => current.push(pixel..pixel + 1),
        }
        count += 1;
        if count == PIXELS_PER_UNIVERSE {
            chunks.push(std::mem::take(&mut current));
            count = 0;
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

impl UniversePacker {
    /// Build the routing plan, rejecting layouts that cannot be routed
    ///
    /// Fails when endpoints overlap in pixels or universes, leave a non-gap
    /// pixel unrouted, leave the strip, or split a bank between them.
    pub fn new(layout: &LayoutConfig, output: &OutputConfig) -> Result<Self> {
        let endpoints = &output.endpoints;

        for (i, a) in endpoints.iter().enumerate() {
            if a.pixels.end > layout.total_pixels || a.pixels.start > a.pixels.end {
                return Err(ConfigError::InvalidLayout(format!(
                    "endpoint '{}' pixels {}..{} are outside 0..{}",
                    a.name, a.pixels.start, a.pixels.end, layout.total_pixels
                )));
            }
            for b in &endpoints[i + 1..] {
                if a.pixels.overlaps(&b.pixels) {
                    return Err(ConfigError::OverlappingPixels {
                        first: a.name.clone(),
                        second: b.name.clone(),
                    });
                }
            }
        }

        if let Some(pixel) = (0..layout.total_pixels)
            .find(|&p| !layout.is_gap(p) && !endpoints.iter().any(|e| e.pixels.contains(p)))
        {
            return Err(ConfigError::UnroutedPixel { pixel });
        }

        for (id, bank) in layout.banks.iter().enumerate() {
            let owned = endpoints.iter().any(|e| {
                e.pixels.start <= bank.start && bank.end <= e.pixels.end
            });
            if !owned {
                return Err(ConfigError::BankSplitAcrossEndpoints { bank: id });
            }
        }

        let mut slots = Vec::new();
        let mut universe_ranges: Vec<(u32, u32)> = Vec::with_capacity(endpoints.len());
        for (index, endpoint) in endpoints.iter().enumerate() {
            let chunks = chunk_endpoint(endpoint, layout);
            let first = u32::from(endpoint.universe_start);
            let last = first + (chunks.len() as u32).saturating_sub(1);
            if first == 0 || last > MAX_UNIVERSE {
                return Err(ConfigError::UniverseOutOfRange {
                    endpoint: endpoint.name.clone(),
                    first,
                    last,
                });
            }
            if !chunks.is_empty() {
                if let Some(other) = universe_ranges
                    .iter()
                    .position(|&(start, end)| start <= last && first <= end)
                {
                    return Err(ConfigError::OverlappingUniverses {
                        first: endpoints[other].name.clone(),
                        second: endpoint.name.clone(),
                    });
                }
            }
            universe_ranges.push(if chunks.is_empty() {
                (1, 0)
            } else {
                (first, last)
            });

            for (offset, segments) in chunks.into_iter().enumerate() {
                slots.push(UniverseSlot {
                    endpoint: index,
                    universe: (first + offset as u32) as u16,
                    segments,
                });
            }
        }

        Ok(Self { slots })
    }

    /// Pack a rendered strip into universe buffers
    ///
    /// Pixels missing from `pixels` (short frame) are sent black.
    pub fn pack(&self, pixels: &[Rgb]) -> Vec<UniverseBuffer> {
        self.slots
            .iter()
            .map(|slot| {
                let mut data = Vec::with_capacity(slot.pixel_count() * 3);
                for segment in &slot.segments {
                    for index in segment.clone() {
                        data.extend_from_slice(pixels.get(index).unwrap_or(&[0, 0, 0]));
                    }
                }
                UniverseBuffer {
                    endpoint: slot.endpoint,
                    universe: slot.universe,
                    data,
                }
            })
            .collect()
    }

    /// The routing plan
    pub fn slots(&self) -> &[UniverseSlot] {
        &self.slots
    }

    /// Total universes across all endpoints
    pub fn universe_count(&self) -> usize {
        self.slots.len()
    }
}
