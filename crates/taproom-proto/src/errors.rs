//! Error types for TAP frame parsing and payload codecs.
//!
//! Framing errors (`FrameTooShort`, `InvalidMagic`, `UnsupportedVersion`,
//! `PayloadTooLarge`, `FrameTruncated`) indicate a structurally invalid byte
//! stream and are fatal for the connection that produced them. JSON codec
//! errors apply to a single frame only.

use thiserror::Error;

/// Result alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors that can occur during frame parsing and payload encoding/decoding.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Buffer too short to contain a frame header
    #[error("frame too short: expected {expected} bytes, got {actual}")]
    FrameTooShort {
        /// Required number of bytes
        expected: usize,
        /// Bytes actually available
        actual: usize,
    },

    /// Magic number mismatch
    #[error("invalid magic number")]
    InvalidMagic,

    /// Unsupported protocol version
    #[error("unsupported protocol version: {0:#06x}")]
    UnsupportedVersion(u16),

    /// Payload size exceeds protocol maximum
    #[error("payload too large: {size} bytes exceeds maximum {max}")]
    PayloadTooLarge {
        /// Claimed or actual payload size
        size: usize,
        /// Protocol maximum
        max: usize,
    },

    /// Payload bytes truncated relative to the header claim
    #[error("frame truncated: header claims {expected} payload bytes, got {actual}")]
    FrameTruncated {
        /// Payload size claimed by the header
        expected: usize,
        /// Payload bytes actually available
        actual: usize,
    },

    /// Message type not recognized by this protocol version
    #[error("unknown message type: {0:#06x}")]
    UnknownMessageType(u16),

    /// JSON serialization failed
    #[error("JSON encode error: {0}")]
    JsonEncode(String),

    /// JSON deserialization failed
    #[error("JSON decode error: {0}")]
    JsonDecode(String),
}

impl ProtocolError {
    /// Returns true if this error indicates a structurally invalid byte
    /// stream.
    ///
    /// Framing errors are fatal for the connection; codec errors apply to a
    /// single frame and the connection can continue.
    pub fn is_framing(&self) -> bool {
        matches!(
            self,
            Self::FrameTooShort { .. }
                | Self::InvalidMagic
                | Self::UnsupportedVersion(_)
                | Self::PayloadTooLarge { .. }
                | Self::FrameTruncated { .. }
        )
    }
}
