//! Error types for configuration and layout validation
use std::path::PathBuf;
use thiserror::Error;

/// Static configuration errors
///
/// All of these are detected before the real-time loop starts; none of them
/// can occur while rendering.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be read or written
    #[error("Config file {path:?}: {source}")]
    Io {
        /// File that failed
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML for this schema
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// The configuration could not be rendered as TOML
    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A DMX channel index is outside 1-512
    #[error("DMX channel for {name} is {channel} (must be 1-512)")]
    ChannelOutOfRange {
        /// Control the channel feeds
        name: String,
        /// Offending channel index
        channel: u16,
    },

    /// Banks, gap or strip length are inconsistent
    #[error("Invalid layout: {0}")]
    InvalidLayout(String),

    /// A bank overlaps the unused gap
    #[error("Bank {bank} ({start}..{end}) crosses the gap {gap_start}..{gap_end}")]
    BankCrossesGap {
        /// Bank id
        bank: usize,
        /// Bank start pixel
        start: usize,
        /// Bank end pixel (exclusive)
        end: usize,
        /// Gap start pixel
        gap_start: usize,
        /// Gap end pixel (exclusive)
        gap_end: usize,
    },

    /// A bank is not owned by exactly one endpoint
    #[error("Bank {bank} is split across endpoints or not routed as a whole")]
    BankSplitAcrossEndpoints {
        /// Bank id
        bank: usize,
    },

    /// Two endpoints claim the same pixel
    #[error("Endpoints '{first}' and '{second}' share pixels")]
    OverlappingPixels {
        /// First endpoint name
        first: String,
        /// Second endpoint name
        second: String,
    },

    /// A non-gap pixel has no endpoint
    #[error("Pixel {pixel} is not routed to any endpoint")]
    UnroutedPixel {
        /// First unrouted pixel index
        pixel: usize,
    },

    /// Two endpoints would transmit on the same universe ids
    #[error("Universe ranges of endpoints '{first}' and '{second}' overlap")]
    OverlappingUniverses {
        /// First endpoint name
        first: String,
        /// Second endpoint name
        second: String,
    },

    /// An endpoint's universes leave the sACN range
    #[error("Endpoint '{endpoint}' needs universes {first}-{last} (must be 1-63999)")]
    UniverseOutOfRange {
        /// Endpoint name
        endpoint: String,
        /// First universe id
        first: u32,
        /// Last universe id
        last: u32,
    },

    /// A unicast endpoint has no destination address
    #[error("Endpoint '{0}' has no address (required in unicast mode)")]
    MissingAddress(String),

    /// A tunable is outside its documented range
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue {
        /// Dotted config path
        field: &'static str,
        /// What is wrong with it
        reason: String,
    },
}

/// Result type for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;
