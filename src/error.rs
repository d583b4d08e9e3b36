//! # Error Types
//!
//! Custom error types for the MSP client using `thiserror`.

use std::time::Duration;

use thiserror::Error;

/// Main error type for the MSP client
#[derive(Debug, Error)]
pub enum MspError {
    /// Open, write or read failure on the underlying byte stream
    #[error("stream unavailable: {0}")]
    StreamUnavailable(String),

    /// A frame was received but its checksum does not match its contents
    #[error("checksum mismatch: computed 0x{expected:02X}, received 0x{actual:02X}")]
    ChecksumMismatch { expected: u8, actual: u8 },

    /// No valid frame arrived within the exchange bound
    #[error("no response within {0:?}")]
    Timeout(Duration),

    /// Message code not present in the catalog
    #[error("unknown message code {0}")]
    UnknownCode(u8),

    /// Declared length or field layout inconsistent with the bytes available
    #[error("malformed sequence: {0}")]
    MalformedSequence(String),

    /// The flight controller answered with an error frame (`$M!`)
    #[error("flight controller rejected message code {0}")]
    Rejected(u8),

    /// Request could not be serialized
    #[error("encode error: {0}")]
    Encode(String),

    /// Code is known but does not produce a telemetry record
    #[error("message code {0} is not a telemetry query")]
    NotTelemetry(u8),

    /// A request/response round trip failed
    #[error("exchange for code {code} failed: {source}")]
    ExchangeFailed {
        code: u8,
        #[source]
        source: Box<MspError>,
    },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl MspError {
    /// Wraps an error as the failure of the exchange for `code`.
    pub fn exchange_failed(code: u8, source: MspError) -> Self {
        MspError::ExchangeFailed {
            code,
            source: Box::new(source),
        }
    }

    /// Returns the innermost error, looking through `ExchangeFailed`.
    pub fn root(&self) -> &MspError {
        match self {
            MspError::ExchangeFailed { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Result type alias for the MSP client
pub type Result<T> = std::result::Result<T, MspError>;
