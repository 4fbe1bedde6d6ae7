//! Frame header implementation with zero-copy parsing.
//!
//! The `FrameHeader` is a fixed 80-byte structure serialized as raw binary
//! (Big Endian). The dispatcher can route a frame on the message type and
//! session token alone, without touching the JSON payload.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::{
    MsgType,
    errors::{ProtocolError, Result},
};

/// Fixed 80-byte frame header (Big Endian network byte order)
///
/// All multi-byte integers are stored in Big Endian format to match network
/// byte order. Fields are stored as raw byte arrays to avoid alignment issues.
///
/// Layout on the wire:
///
/// | bytes  | field         |
/// |--------|---------------|
/// | 0-3    | magic ("TAP1")|
/// | 4-5    | version       |
/// | 6-7    | message type  |
/// | 8-11   | payload size  |
/// | 12-27  | message id    |
/// | 28-35  | timestamp     |
/// | 36-67  | session token |
/// | 68-79  | reserved      |
///
/// # Security
///
/// The `#[repr(C, packed)]` layout with zerocopy traits ensures this struct
/// can be safely cast from untrusted network bytes. All 80-byte patterns are
/// valid, preventing undefined behavior. The session token is carried but
/// never validated here; the dispatcher checks it against the session store.
#[repr(C, packed)]
#[derive(Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct FrameHeader {
    // Protocol identification (8 bytes: 0-7)
    magic: [u8; 4],                // 0x54415031 ("TAP1" in ASCII)
    version: [u8; 2],              // 0x0100
    pub(crate) msg_type: [u8; 2],  // u16 message type code

    // Payload metadata (4 bytes: 8-11)
    pub(crate) payload_size: [u8; 4], // u32 payload length

    // Correlation and timing (24 bytes: 12-35)
    message_id: [u8; 16], // random id, echoed in responses
    timestamp: [u8; 8],   // u64 Unix seconds

    // Authentication (32 bytes: 36-67)
    session_token: [u8; 32], // ASCII token, zero padded; all zeros pre-auth

    // Reserved for future use (12 bytes: 68-79)
    reserved: [u8; 12],
}

impl FrameHeader {
    /// Size of the serialized header (80 bytes)
    pub const SIZE: usize = 80;

    /// Magic number: "TAP1" in ASCII (0x54415031)
    pub const MAGIC: u32 = 0x5441_5031;

    /// Current protocol version
    pub const VERSION: u16 = 0x0100;

    /// Maximum payload size (1 MiB)
    pub const MAX_PAYLOAD_SIZE: u32 = 1024 * 1024;

    /// Length of the session token field in bytes.
    pub const TOKEN_LEN: usize = 32;

    /// Create a new header with the specified message type.
    ///
    /// All other fields start zeroed; callers set the message id, timestamp,
    /// and session token before sending.
    #[must_use]
    pub fn new(msg_type: MsgType) -> Self {
        Self {
            magic: Self::MAGIC.to_be_bytes(),
            version: Self::VERSION.to_be_bytes(),
            msg_type: msg_type.to_u16().to_be_bytes(),
            payload_size: [0; 4],
            message_id: [0; 16],
            timestamp: [0; 8],
            session_token: [0; 32],
            reserved: [0; 12],
        }
    }

    /// Parse header from network bytes (zero-copy, safe)
    ///
    /// This function casts raw bytes directly to a `FrameHeader` reference
    /// using compile-time layout verification from `zerocopy`. No data is
    /// copied.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::FrameTooShort` if buffer is too short (< 80 bytes)
    /// - `ProtocolError::InvalidMagic` if magic number is invalid
    /// - `ProtocolError::UnsupportedVersion` if protocol version is unsupported
    /// - `ProtocolError::PayloadTooLarge` if payload size exceeds maximum
    ///
    /// # Security
    ///
    /// Validation runs cheapest-first (size, magic, version, payload size) so
    /// garbage data fails fast. The session token is NOT checked here.
    pub fn from_bytes(bytes: &[u8]) -> Result<&Self> {
        let header = Self::ref_from_prefix(bytes)
            .map_err(|_| ProtocolError::FrameTooShort {
                expected: Self::SIZE,
                actual: bytes.len(),
            })?
            .0;

        if u32::from_be_bytes(header.magic) != Self::MAGIC {
            return Err(ProtocolError::InvalidMagic);
        }

        let version = u16::from_be_bytes(header.version);
        if version != Self::VERSION {
            return Err(ProtocolError::UnsupportedVersion(version));
        }

        let payload_size = u32::from_be_bytes(header.payload_size);
        if payload_size > Self::MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::PayloadTooLarge {
                size: payload_size as usize,
                max: Self::MAX_PAYLOAD_SIZE as usize,
            });
        }

        Ok(header)
    }

    /// Serialize header to bytes (zero-copy)
    #[must_use]
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let bytes = IntoBytes::as_bytes(self);
        let mut arr = [0u8; Self::SIZE];
        arr.copy_from_slice(bytes);
        arr
    }

    /// Protocol magic number (0x54415031 = "TAP1").
    #[must_use]
    pub fn magic(&self) -> u32 {
        u32::from_be_bytes(self.magic)
    }

    /// Protocol version (currently 0x0100).
    #[must_use]
    pub fn version(&self) -> u16 {
        u16::from_be_bytes(self.version)
    }

    /// Message type as raw u16.
    #[must_use]
    pub fn msg_type_raw(&self) -> u16 {
        u16::from_be_bytes(self.msg_type)
    }

    /// Message type as enum. `None` if unrecognized.
    #[must_use]
    pub fn msg_type(&self) -> Option<MsgType> {
        MsgType::from_u16(self.msg_type_raw())
    }

    /// Payload size in bytes (max 1 MiB).
    #[must_use]
    pub fn payload_size(&self) -> u32 {
        u32::from_be_bytes(self.payload_size)
    }

    /// Message id for request/response correlation.
    #[must_use]
    pub fn message_id(&self) -> u128 {
        u128::from_be_bytes(self.message_id)
    }

    /// Unix timestamp (seconds) when the frame was built.
    #[must_use]
    pub fn timestamp(&self) -> u64 {
        u64::from_be_bytes(self.timestamp)
    }

    /// Session token, trimmed of zero padding.
    ///
    /// Returns `None` if the field is all zeros (pre-auth frame) or contains
    /// non-ASCII bytes before the padding.
    #[must_use]
    pub fn session_token(&self) -> Option<&str> {
        let end = self
            .session_token
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(Self::TOKEN_LEN);
        if end == 0 {
            return None;
        }
        let token = &self.session_token[..end];
        if !token.is_ascii() {
            return None;
        }
        std::str::from_utf8(token).ok()
    }

    /// Update message type.
    pub fn set_msg_type(&mut self, msg_type: MsgType) {
        self.msg_type = msg_type.to_u16().to_be_bytes();
    }

    /// Set message id for response correlation.
    pub fn set_message_id(&mut self, message_id: u128) {
        self.message_id = message_id.to_be_bytes();
    }

    /// Set Unix timestamp (seconds).
    pub fn set_timestamp(&mut self, timestamp: u64) {
        self.timestamp = timestamp.to_be_bytes();
    }

    /// Set session token (ASCII, at most 32 bytes; longer tokens truncate).
    pub fn set_session_token(&mut self, token: &str) {
        self.session_token = [0; Self::TOKEN_LEN];
        let bytes = token.as_bytes();
        let len = bytes.len().min(Self::TOKEN_LEN);
        self.session_token[..len].copy_from_slice(&bytes[..len]);
    }

    /// Clear the session token field (pre-auth frames).
    pub fn clear_session_token(&mut self) {
        self.session_token = [0; Self::TOKEN_LEN];
    }

    /// Set payload size.
    pub fn set_payload_size(&mut self, size: u32) {
        self.payload_size = size.to_be_bytes();
    }
}

// Manual Debug implementation (can't derive due to packed repr)
impl std::fmt::Debug for FrameHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameHeader")
            .field("magic", &format!("{:#010x}", self.magic()))
            .field("version", &format!("{:#06x}", self.version()))
            .field("msg_type", &format!("{:#06x}", self.msg_type_raw()))
            .field("payload_size", &self.payload_size())
            .field("message_id", &format!("{:#034x}", self.message_id()))
            .field("timestamp", &self.timestamp())
            .field("session_token", &self.session_token())
            .finish_non_exhaustive()
    }
}

// Manual PartialEq implementation (can't derive due to packed repr)
impl PartialEq for FrameHeader {
    fn eq(&self, other: &Self) -> bool {
        self.to_bytes() == other.to_bytes()
    }
}

impl Eq for FrameHeader {}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn arbitrary_bytes<const N: usize>() -> impl Strategy<Value = [u8; N]> {
        prop::collection::vec(any::<u8>(), N).prop_map(|v| {
            let mut arr = [0u8; N];
            arr.copy_from_slice(&v);
            arr
        })
    }

    impl Arbitrary for FrameHeader {
        type Parameters = ();
        type Strategy = BoxedStrategy<Self>;

        fn arbitrary_with((): Self::Parameters) -> Self::Strategy {
            (
                arbitrary_bytes::<2>(),        // msg_type
                0u32..=Self::MAX_PAYLOAD_SIZE, // payload_size
                arbitrary_bytes::<16>(),       // message_id
                arbitrary_bytes::<8>(),        // timestamp
                arbitrary_bytes::<12>(),       // reserved
                "[a-f0-9]{0,32}",              // session_token (hex, padded)
            )
                .prop_map(
                    |(msg_type, payload_size, message_id, timestamp, reserved, token)| {
                        let mut session_token = [0u8; 32];
                        session_token[..token.len()].copy_from_slice(token.as_bytes());
                        Self {
                            magic: Self::MAGIC.to_be_bytes(),
                            version: Self::VERSION.to_be_bytes(),
                            msg_type,
                            payload_size: payload_size.to_be_bytes(),
                            message_id,
                            timestamp,
                            session_token,
                            reserved,
                        }
                    },
                )
                .boxed()
        }
    }

    #[test]
    fn header_size() {
        assert_eq!(std::mem::size_of::<FrameHeader>(), FrameHeader::SIZE);
        assert_eq!(FrameHeader::SIZE, 80);
    }

    proptest! {
        #[test]
        fn header_round_trip(header in any::<FrameHeader>()) {
            let bytes = header.to_bytes();
            let parsed = FrameHeader::from_bytes(&bytes).expect("should parse");
            prop_assert_eq!(&header, parsed);
        }

        #[test]
        fn header_accessors(header in any::<FrameHeader>()) {
            prop_assert_eq!(header.magic(), FrameHeader::MAGIC);
            prop_assert_eq!(header.version(), FrameHeader::VERSION);
            prop_assert!(header.payload_size() <= FrameHeader::MAX_PAYLOAD_SIZE);
        }
    }

    #[test]
    fn reject_short_buffer() {
        let short_buf = [0u8; 50];
        let result = FrameHeader::from_bytes(&short_buf);
        assert_eq!(result, Err(ProtocolError::FrameTooShort { expected: 80, actual: 50 }));
    }

    #[test]
    fn reject_invalid_magic() {
        let mut buf = [0u8; 80];
        buf[0..4].copy_from_slice(&[0xFF, 0xFF, 0xFF, 0xFF]);
        buf[4..6].copy_from_slice(&FrameHeader::VERSION.to_be_bytes());

        let result = FrameHeader::from_bytes(&buf);
        assert_eq!(result, Err(ProtocolError::InvalidMagic));
    }

    #[test]
    fn reject_invalid_version() {
        let mut buf = [0u8; 80];
        buf[0..4].copy_from_slice(&FrameHeader::MAGIC.to_be_bytes());
        buf[4..6].copy_from_slice(&0x0200u16.to_be_bytes());

        let result = FrameHeader::from_bytes(&buf);
        assert_eq!(result, Err(ProtocolError::UnsupportedVersion(0x0200)));
    }

    #[test]
    fn reject_oversized_payload() {
        let mut buf = [0u8; 80];
        buf[0..4].copy_from_slice(&FrameHeader::MAGIC.to_be_bytes());
        buf[4..6].copy_from_slice(&FrameHeader::VERSION.to_be_bytes());

        // payload_size lives at offset 8-11
        let oversized = FrameHeader::MAX_PAYLOAD_SIZE + 1;
        buf[8..12].copy_from_slice(&oversized.to_be_bytes());

        let result = FrameHeader::from_bytes(&buf);
        assert!(matches!(result, Err(ProtocolError::PayloadTooLarge { .. })));
    }

    #[test]
    fn session_token_padding() {
        let mut header = FrameHeader::new(MsgType::Heartbeat);
        assert_eq!(header.session_token(), None);

        header.set_session_token("a1b2c3");
        assert_eq!(header.session_token(), Some("a1b2c3"));

        header.clear_session_token();
        assert_eq!(header.session_token(), None);
    }

    #[test]
    fn session_token_full_width() {
        let token = "0123456789abcdef0123456789abcdef"; // exactly 32 chars
        let mut header = FrameHeader::new(MsgType::LoginReq);
        header.set_session_token(token);
        assert_eq!(header.session_token(), Some(token));
    }
}
