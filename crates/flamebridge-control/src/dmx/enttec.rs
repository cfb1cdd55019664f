//! Enttec DMX USB Pro input
//!
//! Widget messages are framed as
//! `0x7E, label, length_lo, length_hi, payload[length], 0xE7`.
//! Label 5 carries received DMX as `status, start_code, slots...`. The widget
//! only reports incoming DMX after label 8 ("receive DMX on change") has been
//! sent with payload `[0x00]`, which selects always-send mode.

use std::io::{ErrorKind, Read, Write};
use std::time::Duration;

use flamebridge_core::{DmxFrame, InputConfig};

use crate::dmx::DmxSource;
use crate::{error::ControlError, Result};

/// Start-of-message delimiter
pub const DELIM_START: u8 = 0x7E;
/// End-of-message delimiter
pub const DELIM_END: u8 = 0xE7;
/// Received DMX packet
pub const LABEL_RECEIVED_DMX: u8 = 5;
/// Receive DMX on change / always-send selector
pub const LABEL_RECEIVE_MODE: u8 = 8;

/// Longest payload accepted before a length field is treated as corrupt
const MAX_PAYLOAD: usize = 600;
/// Buffer cap; the oldest bytes are dropped beyond this
const MAX_BUFFER: usize = 8192;
const HEADER_LEN: usize = 4;

/// Decoder counters, for diagnostics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecoderStats {
    /// DMX frames produced
    pub frames: u64,
    /// Times bytes were skipped to find the next start delimiter
    pub resyncs: u64,
    /// Received DMX with a non-zero start code
    pub alternate_start_codes: u64,
    /// Frames flagged by the widget's status byte
    pub status_errors: u64,
    /// Well-formed messages with a label other than received DMX
    pub other_labels: u64,
}

/// Incremental decoder for the widget's byte stream
///
/// Bytes may arrive in any split; incomplete messages stay buffered until the
/// rest arrives. Malformed input never fails, it only costs a resync.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    stats: DecoderStats,
}

impl FrameDecoder {
    /// Create an empty decoder
    pub fn new() -> Self {
        Self::default()
    }

    /// Append raw bytes from the port
    pub fn push(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
        if self.buffer.len() > MAX_BUFFER {
            let excess = self.buffer.len() - MAX_BUFFER;
            self.buffer.drain(..excess);
            self.stats.resyncs += 1;
        }
    }

    /// Bytes waiting for the rest of a message
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Counters since creation
    pub fn stats(&self) -> DecoderStats {
        self.stats
    }

    /// Drop everything up to the next start delimiter after the current one
    fn resync(&mut self) {
        let skip = self.buffer[1..]
            .iter()
            .position(|&b| b == DELIM_START)
            .map_or(self.buffer.len(), |pos| pos + 1);
        self.buffer.drain(..skip);
        self.stats.resyncs += 1;
    }

    /// Decode the next complete DMX frame, if one is buffered
    pub fn next_frame(&mut self) -> Option<DmxFrame> {
        loop {
            match self.buffer.iter().position(|&b| b == DELIM_START) {
                Some(0) => {}
                Some(pos) => {
                    self.buffer.drain(..pos);
                    self.stats.resyncs += 1;
                }
                None => {
                    if !self.buffer.is_empty() {
                        self.buffer.clear();
                        self.stats.resyncs += 1;
                    }
                    return None;
                }
            }

            if self.buffer.len() < HEADER_LEN {
                return None;
            }
            let label = self.buffer[1];
            let len = usize::from(u16::from_le_bytes([self.buffer[2], self.buffer[3]]));
            if len > MAX_PAYLOAD {
                self.resync();
                continue;
            }
            let total = HEADER_LEN + len + 1;
            if self.buffer.len() < total {
                return None;
            }
            if self.buffer[total - 1] != DELIM_END {
                self.resync();
                continue;
            }

            let message: Vec<u8> = self.buffer.drain(..total).collect();
            let payload = &message[HEADER_LEN..HEADER_LEN + len];

            if label != LABEL_RECEIVED_DMX {
                tracing::trace!("Skipping widget message with label {}", label);
                self.stats.other_labels += 1;
                continue;
            }
            if payload.len() < 2 {
                self.stats.resyncs += 1;
                continue;
            }
            let (status, start_code) = (payload[0], payload[1]);
            if status != 0 {
                tracing::debug!("Widget reported receive status {:#04x}", status);
                self.stats.status_errors += 1;
            }
            if start_code != 0 {
                self.stats.alternate_start_codes += 1;
                continue;
            }

            self.stats.frames += 1;
            return Some(DmxFrame::from_slice(&payload[2..]));
        }
    }
}

/// Encode one widget message
pub fn encode_message(label: u8, payload: &[u8]) -> Vec<u8> {
    let len = payload.len() as u16;
    let mut message = Vec::with_capacity(HEADER_LEN + payload.len() + 1);
    message.push(DELIM_START);
    message.push(label);
    message.extend_from_slice(&len.to_le_bytes());
    message.extend_from_slice(payload);
    message.push(DELIM_END);
    message
}

fn is_no_data(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
    )
}

/// Enttec DMX USB Pro receiver over any byte port
pub struct EnttecInput<P> {
    port: P,
    name: String,
    decoder: FrameDecoder,
    read_buf: Vec<u8>,
}

impl EnttecInput<Box<dyn serialport::SerialPort>> {
    /// Open the configured serial device
    pub fn open(config: &InputConfig) -> Result<Self> {
        if let Some(callout) = crate::ports::callout_device_hint(&config.port) {
            tracing::warn!(
                "{} is a dial-in device and may block on open; use {} instead",
                config.port,
                callout
            );
        }
        let port = serialport::new(&config.port, config.baud_rate)
            .timeout(Duration::from_millis(config.read_timeout_ms))
            .open()
            .map_err(|source| ControlError::SerialOpen {
                port: config.port.clone(),
                source,
            })?;
        tracing::info!(
            "Opened DMX input {} at {} baud",
            config.port,
            config.baud_rate
        );
        Self::new(port, &config.port)
    }
}

impl<P: Read + Write> EnttecInput<P> {
    /// Wrap an open port and switch the widget to always-send mode
    pub fn new(mut port: P, name: &str) -> Result<Self> {
        port.write_all(&encode_message(LABEL_RECEIVE_MODE, &[0x00]))
            .and_then(|()| port.flush())
            .map_err(|source| ControlError::SerialDisconnected {
                port: name.to_string(),
                source,
            })?;
        tracing::debug!("Enabled always-send receive mode on {}", name);

        Ok(Self {
            port,
            name: name.to_string(),
            decoder: FrameDecoder::new(),
            read_buf: vec![0; 1024],
        })
    }

    /// Decoder counters
    pub fn stats(&self) -> DecoderStats {
        self.decoder.stats()
    }

    /// The underlying port
    pub fn port(&self) -> &P {
        &self.port
    }

    /// Read whatever the port has and decode up to `max_frames` frames
    ///
    /// Each read waits at most the port timeout; leftover bytes stay buffered
    /// for the next call.
    pub fn poll(&mut self, max_frames: usize) -> Result<Vec<DmxFrame>> {
        let mut frames = Vec::new();
        for _ in 0..=max_frames {
            while frames.len() < max_frames {
                match self.decoder.next_frame() {
                    Some(frame) => frames.push(frame),
                    None => break,
                }
            }
            if frames.len() >= max_frames {
                break;
            }

            match self.port.read(&mut self.read_buf) {
                Ok(0) => break,
                Ok(n) => self.decoder.push(&self.read_buf[..n]),
                Err(e) if is_no_data(e.kind()) => break,
                Err(source) => {
                    return Err(ControlError::SerialDisconnected {
                        port: self.name.clone(),
                        source,
                    })
                }
            }
        }

        while frames.len() < max_frames {
            match self.decoder.next_frame() {
                Some(frame) => frames.push(frame),
                None => break,
            }
        }
        Ok(frames)
    }
}

impl<P: Read + Write> DmxSource for EnttecInput<P> {
    fn poll(&mut self, max_frames: usize) -> Result<Vec<DmxFrame>> {
        EnttecInput::poll(self, max_frames)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
