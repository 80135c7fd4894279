//! Error types for the packet server

use std::path::PathBuf;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Packet server error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error (sockets, config files)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Daemon settings could not be parsed
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Concentrator configuration is not valid JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// None of the candidate configuration files exist
    #[error("no configuration file found (tried {})", display_paths(.0))]
    ConfigNotFound(Vec<PathBuf>),

    /// Configuration is structurally wrong
    #[error("Configuration error: {0}")]
    Config(String),

    /// An enabled radio has no usable center frequency
    #[error("radio {radio} is enabled but its center frequency is not set")]
    MissingCenterFrequency {
        /// RF chain index
        radio: usize,
    },

    /// A multi-SF channel references a radio that does not exist
    #[error("multi-SF channel {channel} references radio {radio}, which does not exist")]
    InvalidRadioIndex {
        /// Multi-SF channel index
        channel: usize,
        /// Radio index found in the configuration
        radio: usize,
    },

    /// More multi-SF channels were enabled on a radio than it has slots for
    #[error("radio {radio} has more than {capacity} enabled multi-SF channels")]
    TooManyChannels {
        /// RF chain index
        radio: usize,
        /// Slots available per radio
        capacity: usize,
    },

    /// Center + IF does not land on a representable frequency
    #[error("multi-SF channel {channel} resolves to an out-of-range frequency ({freq_hz} Hz)")]
    FrequencyOutOfRange {
        /// Multi-SF channel index
        channel: usize,
        /// Computed absolute frequency
        freq_hz: i64,
    },

    /// Device type named in the settings is not known
    #[error("Unknown device: {0}")]
    UnknownDevice(String),

    /// The concentrator driver rejected an operation
    #[error("Concentrator error: {0}")]
    Concentrator(String),

    /// Payload is shorter than the spotter layout
    #[error("payload too short: expected {expected} bytes, got {actual}")]
    PayloadTooShort {
        /// Bytes required by the layout
        expected: usize,
        /// Bytes present in the packet
        actual: usize,
    },

    /// Combined decisecond timestamp does not fit in 64 bits
    #[error("timestamp overflow: {seconds} s + {fraction} ds")]
    TimestampOverflow {
        /// Whole seconds from the payload
        seconds: u64,
        /// Decisecond fraction from the payload
        fraction: u8,
    },

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
