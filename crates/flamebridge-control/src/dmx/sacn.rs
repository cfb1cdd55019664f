//! sACN (E1.31) output
//!
//! sACN (Streaming ACN) carries DMX512 over UDP port 5568, either unicast to
//! a controller or multicast to `239.255.hi.lo` of the universe.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};
use uuid::Uuid;

use flamebridge_core::{OutputConfig, OutputMode, UniverseBuffer};

use crate::dmx::UniverseSink;
use crate::{error::ControlError, Result};

/// UDP port of sACN
pub const SACN_PORT: u16 = 5568;

/// Highest valid universe
pub const MAX_UNIVERSE: u16 = 63_999;

/// Bytes before the first slot (root, framing and DMP layers plus start code)
pub const HEADER_LEN: usize = 126;

const ACN_PACKET_IDENTIFIER: [u8; 12] = [
    0x41, 0x53, 0x43, 0x2d, 0x45, 0x31, 0x2e, 0x31, 0x37, 0x00, 0x00, 0x00,
];

/// Standard multicast group of a universe
pub fn multicast_address(universe: u16) -> Ipv4Addr {
    let [hi, lo] = universe.to_be_bytes();
    Ipv4Addr::new(239, 255, hi, lo)
}

fn flags_and_length(length: usize) -> [u8; 2] {
    (0x7000u16 | length as u16).to_be_bytes()
}

/// Fields of the framing layer that vary per packet
#[derive(Debug, Clone, Copy)]
pub struct FrameHeader<'a> {
    /// Component identifier of the sender
    pub cid: &'a [u8; 16],
    /// Source name, truncated to 63 bytes
    pub source_name: &'a str,
    /// Priority (0-200)
    pub priority: u8,
    /// Sequence number
    pub sequence: u8,
    /// Universe
    pub universe: u16,
}

/// Build an E1.31 data packet carrying `data` (at most 512 slots)
pub fn build_sacn_packet(header: &FrameHeader<'_>, data: &[u8]) -> Vec<u8> {
    let total = HEADER_LEN + data.len();
    let mut packet = vec![0u8; total];

    // Root Layer
    let mut offset = 0;

    // Preamble Size (16-bit)
    packet[offset..offset + 2].copy_from_slice(&0x0010u16.to_be_bytes());
    offset += 2;

    // Post-amble Size (16-bit)
    offset += 2;

    // ACN Packet Identifier (12 bytes)
    packet[offset..offset + 12].copy_from_slice(&ACN_PACKET_IDENTIFIER);
    offset += 12;

    packet[offset..offset + 2].copy_from_slice(&flags_and_length(total - 16));
    offset += 2;

    // Vector: VECTOR_ROOT_E131_DATA
    packet[offset..offset + 4].copy_from_slice(&0x00000004u32.to_be_bytes());
    offset += 4;

    packet[offset..offset + 16].copy_from_slice(header.cid);
    offset += 16;

    // Framing Layer
    packet[offset..offset + 2].copy_from_slice(&flags_and_length(total - 38));
    offset += 2;

    // Vector: VECTOR_E131_DATA_PACKET
    packet[offset..offset + 4].copy_from_slice(&0x00000002u32.to_be_bytes());
    offset += 4;

    // Source Name (64 bytes, null-terminated)
    let source_bytes = header.source_name.as_bytes();
    let copy_len = source_bytes.len().min(63);
    packet[offset..offset + copy_len].copy_from_slice(&source_bytes[..copy_len]);
    offset += 64;

    packet[offset] = header.priority;
    offset += 1;

    // Synchronization Address - 0 for no sync
    offset += 2;

    packet[offset] = header.sequence;
    offset += 1;

    // Options
    offset += 1;

    packet[offset..offset + 2].copy_from_slice(&header.universe.to_be_bytes());
    offset += 2;

    // DMP Layer
    packet[offset..offset + 2].copy_from_slice(&flags_and_length(total - 115));
    offset += 2;

    // Vector: VECTOR_DMP_SET_PROPERTY
    packet[offset] = 0x02;
    offset += 1;

    // Address Type & Data Type
    packet[offset] = 0xa1;
    offset += 1;

    // First Property Address
    offset += 2;

    // Address Increment
    packet[offset..offset + 2].copy_from_slice(&0x0001u16.to_be_bytes());
    offset += 2;

    // Property value count: start code + slots
    packet[offset..offset + 2].copy_from_slice(&((data.len() + 1) as u16).to_be_bytes());
    offset += 2;

    // DMX Start Code
    packet[offset] = 0x00;
    offset += 1;

    packet[offset..].copy_from_slice(data);
    packet
}

/// sACN sender for all endpoints of the strip
pub struct SacnTransport {
    socket: UdpSocket,
    cid: [u8; 16],
    source_name: String,
    priority: u8,
    mode: OutputMode,
    multicast_group: Option<Ipv4Addr>,
    endpoints: Vec<Option<IpAddr>>,
    port: u16,
    sequences: HashMap<u16, u8>,
}

impl SacnTransport {
    /// Bind a non-blocking socket for the configured endpoints
    pub fn new(config: &OutputConfig) -> Result<Self> {
        if config.priority > 200 {
            return Err(ControlError::InvalidParameter(format!(
                "sACN priority {} (must be 0-200)",
                config.priority
            )));
        }

        let socket = UdpSocket::bind("0.0.0.0:0")?;
        socket.set_nonblocking(true)?;
        if config.mode == OutputMode::Multicast {
            socket.set_multicast_loop_v4(false)?;
        }

        // Generate a UUID for this component
        let cid = *Uuid::new_v4().as_bytes();

        tracing::info!(
            "sACN transport ready ({:?}, {} endpoint(s), source '{}')",
            config.mode,
            config.endpoints.len(),
            config.source_name
        );

        Ok(Self {
            socket,
            cid,
            source_name: config.source_name.clone(),
            priority: config.priority,
            mode: config.mode,
            multicast_group: config.multicast_group,
            endpoints: config.endpoints.iter().map(|e| e.address).collect(),
            port: SACN_PORT,
            sequences: HashMap::new(),
        })
    }

    /// Send to a non-standard UDP port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Component identifier used in every packet
    pub fn cid(&self) -> &[u8; 16] {
        &self.cid
    }

    /// Next sequence number of a universe
    pub fn sequence(&self, universe: u16) -> u8 {
        self.sequences.get(&universe).copied().unwrap_or(0)
    }

    /// Where a buffer goes
    pub fn destination(&self, buffer: &UniverseBuffer) -> Result<SocketAddr> {
        let ip = match self.mode {
            OutputMode::Multicast => IpAddr::V4(
                self.multicast_group
                    .unwrap_or_else(|| multicast_address(buffer.universe)),
            ),
            OutputMode::Unicast => self
                .endpoints
                .get(buffer.endpoint)
                .copied()
                .flatten()
                .ok_or_else(|| {
                    ControlError::InvalidParameter(format!(
                        "no address for endpoint {}",
                        buffer.endpoint
                    ))
                })?,
        };
        Ok(SocketAddr::new(ip, self.port))
    }
}

impl UniverseSink for SacnTransport {
    fn send(&mut self, buffer: &UniverseBuffer) -> Result<()> {
        if buffer.universe == 0 || buffer.universe > MAX_UNIVERSE {
            return Err(ControlError::InvalidParameter(format!(
                "Invalid sACN universe: {} (must be 1-63999)",
                buffer.universe
            )));
        }
        if buffer.data.len() > 512 {
            return Err(ControlError::InvalidParameter(format!(
                "{} slots for universe {} (max 512)",
                buffer.data.len(),
                buffer.universe
            )));
        }

        let destination = self.destination(buffer)?;
        let sequence = self.sequence(buffer.universe);
        let packet = build_sacn_packet(
            &FrameHeader {
                cid: &self.cid,
                source_name: &self.source_name,
                priority: self.priority,
                sequence,
                universe: buffer.universe,
            },
            &buffer.data,
        );

        self.socket
            .send_to(&packet, destination)
            .map_err(|source| ControlError::Send {
                universe: buffer.universe,
                destination,
                source,
            })?;
        self.sequences
            .insert(buffer.universe, sequence.wrapping_add(1));

        tracing::trace!("Sent sACN packet for universe {}", buffer.universe);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CID: [u8; 16] = [7; 16];

    fn header(universe: u16) -> FrameHeader<'static> {
        FrameHeader {
            cid: &CID,
            source_name: "FlameBridge",
            priority: 100,
            sequence: 0,
            universe,
        }
    }

    #[test]
    fn test_sacn_packet_structure() {
        let packet = build_sacn_packet(&header(1), &[0u8; 512]);

        // Full universe
        assert_eq!(packet.len(), 638);

        // Check ACN Packet Identifier
        assert_eq!(&packet[4..16], &ACN_PACKET_IDENTIFIER);

        // Root, framing and DMP lengths
        assert_eq!(&packet[16..18], &[0x72, 0x6e]);
        assert_eq!(&packet[38..40], &[0x72, 0x58]);
        assert_eq!(&packet[115..117], &[0x72, 0x0b]);

        // Property value count: 513
        assert_eq!(&packet[123..125], &[0x02, 0x01]);

        // Check DMX start code
        assert_eq!(packet[125], 0x00);
    }

    #[test]
    fn test_short_universe() {
        let data: Vec<u8> = (0..24).collect();
        let packet = build_sacn_packet(&header(7), &data);
        assert_eq!(packet.len(), 150);
        assert_eq!(&packet[16..18], &(0x7000u16 | 134).to_be_bytes());
        assert_eq!(&packet[38..40], &(0x7000u16 | 112).to_be_bytes());
        assert_eq!(&packet[115..117], &(0x7000u16 | 35).to_be_bytes());
        assert_eq!(&packet[123..125], &25u16.to_be_bytes());
        assert_eq!(&packet[113..115], &7u16.to_be_bytes());
        assert_eq!(&packet[126..], &data[..]);
    }

    #[test]
    fn test_header_fields() {
        let mut fields = header(300);
        fields.priority = 150;
        fields.sequence = 42;
        let packet = build_sacn_packet(&fields, &[1, 2, 3]);

        assert_eq!(&packet[22..38], &CID);
        assert_eq!(&packet[44..55], b"FlameBridge");
        assert_eq!(packet[55], 0);
        assert_eq!(packet[108], 150);
        assert_eq!(packet[111], 42);
        assert_eq!(&packet[113..115], &300u16.to_be_bytes());
    }

    #[test]
    fn test_long_source_name_truncated() {
        let name = "x".repeat(100);
        let mut fields = header(1);
        fields.source_name = &name;
        let packet = build_sacn_packet(&fields, &[]);
        assert!(packet[44..107].iter().all(|&b| b == b'x'));
        assert_eq!(packet[107], 0);
    }

    #[test]
    fn test_multicast_address() {
        assert_eq!(multicast_address(1), Ipv4Addr::new(239, 255, 0, 1));
        assert_eq!(multicast_address(0x1234), Ipv4Addr::new(239, 255, 0x12, 0x34));
    }

    #[test]
    fn test_multicast_destination() {
        let config = OutputConfig {
            mode: OutputMode::Multicast,
            ..OutputConfig::default()
        };
        let transport = SacnTransport::new(&config).unwrap();
        let buffer = UniverseBuffer {
            endpoint: 0,
            universe: 258,
            data: vec![],
        };
        assert_eq!(
            transport.destination(&buffer).unwrap(),
            "239.255.1.2:5568".parse::<SocketAddr>().unwrap()
        );
    }

    #[test]
    fn test_invalid_universe() {
        let mut transport = SacnTransport::new(&OutputConfig::default()).unwrap();
        let buffer = UniverseBuffer {
            endpoint: 0,
            universe: 0,
            data: vec![0; 3],
        };
        assert!(matches!(
            transport.send(&buffer),
            Err(ControlError::InvalidParameter(_))
        ));
    }
}
