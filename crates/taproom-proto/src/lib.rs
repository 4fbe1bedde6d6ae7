//! TAP wire protocol.
//!
//! TAP (Test Application Protocol) is a binary-framed request/response
//! protocol for a timed multiple-choice test server. Every message is a fixed
//! 80-byte header ([`FrameHeader`], raw Big Endian binary) followed by a
//! UTF-8 JSON document typed by the header's message type.
//!
//! Headers are raw binary so the dispatcher can route and authenticate frames
//! without parsing JSON. Payloads are JSON for forward compatibility and easy
//! inspection on the wire.
//!
//! # Components
//!
//! - [`FrameHeader`]: fixed 80-byte header with zero-copy parsing
//! - [`Frame`]: header + raw payload bytes (transport layer)
//! - [`Payload`]: typed message bodies keyed by [`MsgType`]
//! - [`status`]: status codes carried in response payloads

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod errors;
mod frame;
mod header;
pub mod payloads;

pub use errors::ProtocolError;
pub use frame::Frame;
pub use header::FrameHeader;
pub use payloads::Payload;

/// Message type codes carried in the frame header.
///
/// Request/response pairs share a prefix; pushes (`TestConfig`,
/// `TestQuestions`, `TestResult`, `RoomStatus`) have no request counterpart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum MsgType {
    /// Account registration request
    RegisterReq = 0x0001,
    /// Account registration response
    RegisterRes = 0x0002,
    /// Login request
    LoginReq = 0x0003,
    /// Login response (carries the session token)
    LoginRes = 0x0004,
    /// Logout request
    LogoutReq = 0x0005,
    /// Logout response
    LogoutRes = 0x0006,

    /// Global test configuration push (legacy test flow)
    TestConfig = 0x0010,
    /// Start the global test (legacy test flow)
    TestStartReq = 0x0011,
    /// Global test start acknowledgement
    TestStartRes = 0x0012,
    /// Global test questions push
    TestQuestions = 0x0013,
    /// Global test answer submission
    TestSubmit = 0x0014,
    /// Global test result push
    TestResult = 0x0015,

    /// Teacher dashboard data request
    TeacherDataReq = 0x0020,
    /// Teacher dashboard data response
    TeacherDataRes = 0x0021,

    /// Create a test room
    CreateRoomReq = 0x0030,
    /// Room creation response (carries the join code)
    CreateRoomRes = 0x0031,
    /// Join a room by code
    JoinRoomReq = 0x0032,
    /// Join response
    JoinRoomRes = 0x0033,
    /// Start a waiting room
    StartRoomReq = 0x0034,
    /// Room start response
    StartRoomRes = 0x0035,
    /// End an active room
    EndRoomReq = 0x0036,
    /// Room end response
    EndRoomRes = 0x0037,
    /// List rooms owned by the requesting teacher
    GetRoomsReq = 0x0038,
    /// Teacher room listing response
    GetRoomsRes = 0x0039,
    /// Room status change push (start/end)
    RoomStatus = 0x003A,

    /// Add a question to a room
    AddQuestionReq = 0x0040,
    /// Question add response
    AddQuestionRes = 0x0041,
    /// List a room's questions (owner view)
    GetQuestionsReq = 0x0042,
    /// Question listing response
    GetQuestionsRes = 0x0043,
    /// Delete a question from a room
    DeleteQuestionReq = 0x0044,
    /// Question delete response
    DeleteQuestionRes = 0x0045,
    /// List rooms the requesting student has joined
    GetStudentRoomsReq = 0x0046,
    /// Student room listing response
    GetStudentRoomsRes = 0x0047,
    /// List rooms the requesting student could join
    GetAvailableRoomsReq = 0x0048,
    /// Available room listing response
    GetAvailableRoomsRes = 0x0049,

    /// Enter the test in an active room (returns questions + resume state)
    StartRoomTestReq = 0x004A,
    /// Room test entry response
    StartRoomTestRes = 0x004B,
    /// Submit answers for a room test
    SubmitRoomTestReq = 0x004C,
    /// Room test submission response (score)
    SubmitRoomTestRes = 0x004D,
    /// Auto-save in-progress answers
    AutoSaveReq = 0x004E,
    /// Auto-save acknowledgement
    AutoSaveRes = 0x004F,

    /// Connection keepalive (no reply)
    Heartbeat = 0x00FE,
    /// Error response
    Error = 0x00FF,
}

impl MsgType {
    /// Convert to the wire representation.
    #[must_use]
    pub const fn to_u16(self) -> u16 {
        self as u16
    }

    /// Parse from the wire representation. `None` if unrecognized.
    #[must_use]
    pub const fn from_u16(value: u16) -> Option<Self> {
        match value {
            0x0001 => Some(Self::RegisterReq),
            0x0002 => Some(Self::RegisterRes),
            0x0003 => Some(Self::LoginReq),
            0x0004 => Some(Self::LoginRes),
            0x0005 => Some(Self::LogoutReq),
            0x0006 => Some(Self::LogoutRes),
            0x0010 => Some(Self::TestConfig),
            0x0011 => Some(Self::TestStartReq),
            0x0012 => Some(Self::TestStartRes),
            0x0013 => Some(Self::TestQuestions),
            0x0014 => Some(Self::TestSubmit),
            0x0015 => Some(Self::TestResult),
            0x0020 => Some(Self::TeacherDataReq),
            0x0021 => Some(Self::TeacherDataRes),
            0x0030 => Some(Self::CreateRoomReq),
            0x0031 => Some(Self::CreateRoomRes),
            0x0032 => Some(Self::JoinRoomReq),
            0x0033 => Some(Self::JoinRoomRes),
            0x0034 => Some(Self::StartRoomReq),
            0x0035 => Some(Self::StartRoomRes),
            0x0036 => Some(Self::EndRoomReq),
            0x0037 => Some(Self::EndRoomRes),
            0x0038 => Some(Self::GetRoomsReq),
            0x0039 => Some(Self::GetRoomsRes),
            0x003A => Some(Self::RoomStatus),
            0x0040 => Some(Self::AddQuestionReq),
            0x0041 => Some(Self::AddQuestionRes),
            0x0042 => Some(Self::GetQuestionsReq),
            0x0043 => Some(Self::GetQuestionsRes),
            0x0044 => Some(Self::DeleteQuestionReq),
            0x0045 => Some(Self::DeleteQuestionRes),
            0x0046 => Some(Self::GetStudentRoomsReq),
            0x0047 => Some(Self::GetStudentRoomsRes),
            0x0048 => Some(Self::GetAvailableRoomsReq),
            0x0049 => Some(Self::GetAvailableRoomsRes),
            0x004A => Some(Self::StartRoomTestReq),
            0x004B => Some(Self::StartRoomTestRes),
            0x004C => Some(Self::SubmitRoomTestReq),
            0x004D => Some(Self::SubmitRoomTestRes),
            0x004E => Some(Self::AutoSaveReq),
            0x004F => Some(Self::AutoSaveRes),
            0x00FE => Some(Self::Heartbeat),
            0x00FF => Some(Self::Error),
            _ => None,
        }
    }
}

/// Status codes carried in response payload `code` fields.
///
/// Grouped by the thousands digit: 1xxx success, 2xxx malformed request,
/// 3xxx authentication, 4xxx authorization, 5xxx conflict, 6xxx server fault.
pub mod status {
    /// Operation succeeded.
    pub const SUCCESS: u16 = 1000;
    /// Request was structurally valid but semantically wrong.
    pub const BAD_REQUEST: u16 = 2000;
    /// Payload was not valid JSON for the message type.
    pub const INVALID_JSON: u16 = 2001;
    /// Missing or unknown session token.
    pub const UNAUTHORIZED: u16 = 3000;
    /// Username or password did not match.
    pub const INVALID_CREDENTIALS: u16 = 3001;
    /// Session token was valid once but has expired.
    pub const SESSION_EXPIRED: u16 = 3002;
    /// Authenticated but not allowed to perform the operation.
    pub const FORBIDDEN: u16 = 4000;
    /// Operation reserved for the other role.
    pub const WRONG_ROLE: u16 = 4001;
    /// Operation conflicts with current state.
    pub const CONFLICT: u16 = 5000;
    /// Username is already registered.
    pub const USERNAME_EXISTS: u16 = 5001;
    /// Internal server error.
    pub const INTERNAL: u16 = 6000;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn msg_type_round_trip() {
        for code in 0u16..=0x00FF {
            if let Some(mt) = MsgType::from_u16(code) {
                assert_eq!(mt.to_u16(), code);
            }
        }
    }

    #[test]
    fn unknown_msg_type_rejected() {
        assert_eq!(MsgType::from_u16(0x0007), None);
        assert_eq!(MsgType::from_u16(0x7777), None);
    }
}
