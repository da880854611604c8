//! Error types for the landing controller

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Controller error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Serial port error
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file could not be parsed
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// Configuration could not be serialized
    #[error("Configuration serialization error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    /// Required transport could not be opened
    #[error("Transport unavailable: {0}")]
    TransportUnavailable(String),

    /// Invalid frame or reply
    #[error("Invalid packet: {0}")]
    InvalidPacket(String),

    /// Checksum mismatch
    #[error("Checksum error: expected {expected:#04x}, got {actual:#04x}")]
    ChecksumError {
        /// Expected checksum value
        expected: u8,
        /// Actual checksum value
        actual: u8,
    },

    /// Invalid parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}
