//! DMX512 frame model

/// Number of slots in one DMX universe
pub const DMX_CHANNELS: usize = 512;

/// One decoded control snapshot (512 channel values)
///
/// Channels are addressed 1-based, as on a lighting console.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DmxFrame {
    channels: [u8; DMX_CHANNELS],
}

impl DmxFrame {
    /// Create an all-zero frame
    pub fn new() -> Self {
        Self {
            channels: [0; DMX_CHANNELS],
        }
    }

    /// Create a frame from raw slot data
    ///
    /// Short payloads are zero-padded, anything past slot 512 is ignored.
    pub fn from_slice(data: &[u8]) -> Self {
        let mut frame = Self::new();
        let len = data.len().min(DMX_CHANNELS);
        frame.channels[..len].copy_from_slice(&data[..len]);
        frame
    }

    /// Value of a 1-based channel, 0 when out of range
    pub fn channel(&self, channel: u16) -> u8 {
        match channel as usize {
            1..=DMX_CHANNELS => self.channels[channel as usize - 1],
            _ => 0,
        }
    }

    /// Set a 1-based channel; out-of-range channels are ignored
    pub fn set_channel(&mut self, channel: u16, value: u8) {
        if let 1..=DMX_CHANNELS = channel as usize {
            self.channels[channel as usize - 1] = value;
        }
    }

    /// All 512 slots, channel 1 first
    pub fn as_slice(&self) -> &[u8] {
        &self.channels
    }
}

impl Default for DmxFrame {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channels_are_one_based() {
        let frame = DmxFrame::from_slice(&[10, 20, 30]);
        assert_eq!(frame.channel(1), 10);
        assert_eq!(frame.channel(3), 30);
        assert_eq!(frame.channel(4), 0);
    }

    #[test]
    fn test_out_of_range_channels() {
        let mut frame = DmxFrame::new();
        frame.set_channel(0, 99);
        frame.set_channel(513, 99);
        assert_eq!(frame.channel(0), 0);
        assert_eq!(frame.channel(513), 0);
        assert!(frame.as_slice().iter().all(|&v| v == 0));

        frame.set_channel(512, 7);
        assert_eq!(frame.as_slice()[511], 7);
    }

    #[test]
    fn test_long_payload_is_truncated() {
        let data = vec![1u8; 600];
        let frame = DmxFrame::from_slice(&data);
        assert_eq!(frame.as_slice().len(), DMX_CHANNELS);
        assert_eq!(frame.channel(512), 1);
    }
}
