//! JSON-encoded protocol messages.
//!
//! Frame headers are raw binary for routing, but payloads are UTF-8 JSON for
//! type safety and forward compatibility. The `Payload` enum covers all
//! message types: authentication, room management, test taking, the legacy
//! global test flow, and control frames.
//!
//! # Invariants
//!
//! Each payload variant maps to exactly one message type (enforced by match
//! exhaustiveness). Round-trip encoding must produce equivalent values.

pub mod auth;
pub mod room;
pub mod test;

use bytes::BufMut;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{
    Frame, FrameHeader, MsgType, status,
    errors::{ProtocolError, Result},
};

/// All possible frame payloads
///
/// The payload type is determined by the message type in the frame header,
/// so only the inner struct content is serialized (no variant tag in JSON).
/// Variants without a body (`LogoutReq`, listing requests, `Heartbeat`)
/// encode to zero bytes; their decoder ignores any payload content.
///
/// # Security
///
/// - No Variant Tag: the frame header's message type already identifies the
///   payload type, so attackers cannot send mismatched type/payload pairs.
/// - Exhaustive Matching: all methods use exhaustive `match` statements;
///   adding a variant causes compile errors until every codec path handles
///   it.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    // Authentication
    /// Account registration request
    RegisterReq(auth::RegisterRequest),
    /// Account registration response
    RegisterRes(auth::RegisterResponse),
    /// Login request
    LoginReq(auth::LoginRequest),
    /// Login response
    LoginRes(auth::LoginResponse),
    /// Logout request (empty body)
    LogoutReq,
    /// Logout response
    LogoutRes(Ack),

    // Legacy global test flow
    /// Test configuration push
    TestConfig(test::TestConfigPush),
    /// Start the global test (empty body)
    TestStartReq,
    /// Global test start acknowledgement
    TestStartRes(Ack),
    /// Global test questions push
    TestQuestions(test::TestQuestionsPush),
    /// Global test answer submission
    TestSubmit(test::TestSubmitRequest),
    /// Global test result push
    TestResult(test::TestResultPush),

    // Teacher dashboard
    /// Dashboard data request (empty body)
    TeacherDataReq,
    /// Dashboard data response
    TeacherDataRes(test::TeacherDataResponse),

    // Rooms
    /// Create a room
    CreateRoomReq(room::CreateRoomRequest),
    /// Room creation response
    CreateRoomRes(room::CreateRoomResponse),
    /// Join a room by code
    JoinRoomReq(room::JoinRoomRequest),
    /// Join response
    JoinRoomRes(room::JoinRoomResponse),
    /// Start a waiting room
    StartRoomReq(room::RoomRef),
    /// Room start response
    StartRoomRes(Ack),
    /// End an active room
    EndRoomReq(room::RoomRef),
    /// Room end response
    EndRoomRes(Ack),
    /// Teacher room listing request (empty body)
    GetRoomsReq,
    /// Teacher room listing response
    GetRoomsRes(room::GetRoomsResponse),
    /// Room status change push
    RoomStatus(room::RoomStatusPush),

    // Questions
    /// Add a question
    AddQuestionReq(room::AddQuestionRequest),
    /// Question add response
    AddQuestionRes(room::AddQuestionResponse),
    /// List a room's questions
    GetQuestionsReq(room::RoomRef),
    /// Question listing response
    GetQuestionsRes(room::GetQuestionsResponse),
    /// Delete a question
    DeleteQuestionReq(room::DeleteQuestionRequest),
    /// Question delete response
    DeleteQuestionRes(Ack),
    /// Student joined-rooms listing request (empty body)
    GetStudentRoomsReq,
    /// Student joined-rooms listing response
    GetStudentRoomsRes(room::GetStudentRoomsResponse),
    /// Joinable-rooms listing request (empty body)
    GetAvailableRoomsReq,
    /// Joinable-rooms listing response
    GetAvailableRoomsRes(room::GetAvailableRoomsResponse),

    // Room testing
    /// Enter a room's test
    StartRoomTestReq(room::RoomRef),
    /// Room test entry response (questions + resume state)
    StartRoomTestRes(test::StartRoomTestResponse),
    /// Submit room test answers
    SubmitRoomTestReq(test::SubmitRoomTestRequest),
    /// Room test submission response
    SubmitRoomTestRes(test::SubmitRoomTestResponse),
    /// Auto-save in-progress answers
    AutoSaveReq(test::AutoSaveRequest),
    /// Auto-save acknowledgement
    AutoSaveRes(Ack),

    // Control
    /// Keepalive (empty body, no reply)
    Heartbeat,
    /// Error response
    Error(ErrorPayload),
}

/// Minimal acknowledgement body shared by simple responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    /// Status code (see [`crate::status`])
    pub code: u16,
    /// Human-readable outcome
    pub message: String,
}

impl Ack {
    /// Successful acknowledgement.
    pub fn ok(message: impl Into<String>) -> Self {
        Self { code: status::SUCCESS, message: message.into() }
    }
}

/// Error payload for error frames.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    /// Status code identifying the failure (see [`crate::status`])
    pub code: u16,
    /// Human-readable error message
    pub message: String,
}

impl ErrorPayload {
    /// Semantically invalid request.
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self { code: status::BAD_REQUEST, message: msg.into() }
    }

    /// Payload failed to parse for the claimed message type.
    pub fn invalid_json(msg: impl Into<String>) -> Self {
        Self { code: status::INVALID_JSON, message: msg.into() }
    }

    /// Missing or unknown session token.
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self { code: status::UNAUTHORIZED, message: msg.into() }
    }

    /// Username or password did not match.
    pub fn invalid_credentials() -> Self {
        Self {
            code: status::INVALID_CREDENTIALS,
            message: "invalid username or password".to_string(),
        }
    }

    /// Session token has expired.
    pub fn session_expired() -> Self {
        Self { code: status::SESSION_EXPIRED, message: "session expired".to_string() }
    }

    /// Authenticated but not allowed.
    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self { code: status::FORBIDDEN, message: msg.into() }
    }

    /// Operation reserved for the other role.
    pub fn wrong_role(required: auth::Role) -> Self {
        Self {
            code: status::WRONG_ROLE,
            message: format!("operation requires {required} role"),
        }
    }

    /// Operation conflicts with current state.
    pub fn conflict(msg: impl Into<String>) -> Self {
        Self { code: status::CONFLICT, message: msg.into() }
    }

    /// Username already registered.
    pub fn username_exists(username: &str) -> Self {
        Self {
            code: status::USERNAME_EXISTS,
            message: format!("username already exists: {username}"),
        }
    }

    /// Internal server error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self { code: status::INTERNAL, message: msg.into() }
    }
}

fn decode_json<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|e| ProtocolError::JsonDecode(e.to_string()))
}

impl Payload {
    /// Message type corresponding to this payload.
    #[must_use]
    pub const fn msg_type(&self) -> MsgType {
        match self {
            Self::RegisterReq(_) => MsgType::RegisterReq,
            Self::RegisterRes(_) => MsgType::RegisterRes,
            Self::LoginReq(_) => MsgType::LoginReq,
            Self::LoginRes(_) => MsgType::LoginRes,
            Self::LogoutReq => MsgType::LogoutReq,
            Self::LogoutRes(_) => MsgType::LogoutRes,
            Self::TestConfig(_) => MsgType::TestConfig,
            Self::TestStartReq => MsgType::TestStartReq,
            Self::TestStartRes(_) => MsgType::TestStartRes,
            Self::TestQuestions(_) => MsgType::TestQuestions,
            Self::TestSubmit(_) => MsgType::TestSubmit,
            Self::TestResult(_) => MsgType::TestResult,
            Self::TeacherDataReq => MsgType::TeacherDataReq,
            Self::TeacherDataRes(_) => MsgType::TeacherDataRes,
            Self::CreateRoomReq(_) => MsgType::CreateRoomReq,
            Self::CreateRoomRes(_) => MsgType::CreateRoomRes,
            Self::JoinRoomReq(_) => MsgType::JoinRoomReq,
            Self::JoinRoomRes(_) => MsgType::JoinRoomRes,
            Self::StartRoomReq(_) => MsgType::StartRoomReq,
            Self::StartRoomRes(_) => MsgType::StartRoomRes,
            Self::EndRoomReq(_) => MsgType::EndRoomReq,
            Self::EndRoomRes(_) => MsgType::EndRoomRes,
            Self::GetRoomsReq => MsgType::GetRoomsReq,
            Self::GetRoomsRes(_) => MsgType::GetRoomsRes,
            Self::RoomStatus(_) => MsgType::RoomStatus,
            Self::AddQuestionReq(_) => MsgType::AddQuestionReq,
            Self::AddQuestionRes(_) => MsgType::AddQuestionRes,
            Self::GetQuestionsReq(_) => MsgType::GetQuestionsReq,
            Self::GetQuestionsRes(_) => MsgType::GetQuestionsRes,
            Self::DeleteQuestionReq(_) => MsgType::DeleteQuestionReq,
            Self::DeleteQuestionRes(_) => MsgType::DeleteQuestionRes,
            Self::GetStudentRoomsReq => MsgType::GetStudentRoomsReq,
            Self::GetStudentRoomsRes(_) => MsgType::GetStudentRoomsRes,
            Self::GetAvailableRoomsReq => MsgType::GetAvailableRoomsReq,
            Self::GetAvailableRoomsRes(_) => MsgType::GetAvailableRoomsRes,
            Self::StartRoomTestReq(_) => MsgType::StartRoomTestReq,
            Self::StartRoomTestRes(_) => MsgType::StartRoomTestRes,
            Self::SubmitRoomTestReq(_) => MsgType::SubmitRoomTestReq,
            Self::SubmitRoomTestRes(_) => MsgType::SubmitRoomTestRes,
            Self::AutoSaveReq(_) => MsgType::AutoSaveReq,
            Self::AutoSaveRes(_) => MsgType::AutoSaveRes,
            Self::Heartbeat => MsgType::Heartbeat,
            Self::Error(_) => MsgType::Error,
        }
    }

    /// Encode payload to buffer
    ///
    /// Serializes only the inner struct, NOT the variant tag. The frame
    /// header's message type already identifies the payload type. Size
    /// validation happens later in [`Frame::encode`].
    ///
    /// # Errors
    ///
    /// - `ProtocolError::JsonEncode` if serialization fails
    pub fn encode(&self, dst: &mut impl BufMut) -> Result<()> {
        let mut writer = dst.writer();

        match self {
            Self::RegisterReq(inner) => serde_json::to_writer(&mut writer, inner),
            Self::RegisterRes(inner) => serde_json::to_writer(&mut writer, inner),
            Self::LoginReq(inner) => serde_json::to_writer(&mut writer, inner),
            Self::LoginRes(inner) => serde_json::to_writer(&mut writer, inner),
            Self::LogoutRes(inner) => serde_json::to_writer(&mut writer, inner),
            Self::TestConfig(inner) => serde_json::to_writer(&mut writer, inner),
            Self::TestStartRes(inner) => serde_json::to_writer(&mut writer, inner),
            Self::TestQuestions(inner) => serde_json::to_writer(&mut writer, inner),
            Self::TestSubmit(inner) => serde_json::to_writer(&mut writer, inner),
            Self::TestResult(inner) => serde_json::to_writer(&mut writer, inner),
            Self::TeacherDataRes(inner) => serde_json::to_writer(&mut writer, inner),
            Self::CreateRoomReq(inner) => serde_json::to_writer(&mut writer, inner),
            Self::CreateRoomRes(inner) => serde_json::to_writer(&mut writer, inner),
            Self::JoinRoomReq(inner) => serde_json::to_writer(&mut writer, inner),
            Self::JoinRoomRes(inner) => serde_json::to_writer(&mut writer, inner),
            Self::StartRoomReq(inner) => serde_json::to_writer(&mut writer, inner),
            Self::StartRoomRes(inner) => serde_json::to_writer(&mut writer, inner),
            Self::EndRoomReq(inner) => serde_json::to_writer(&mut writer, inner),
            Self::EndRoomRes(inner) => serde_json::to_writer(&mut writer, inner),
            Self::GetRoomsRes(inner) => serde_json::to_writer(&mut writer, inner),
            Self::RoomStatus(inner) => serde_json::to_writer(&mut writer, inner),
            Self::AddQuestionReq(inner) => serde_json::to_writer(&mut writer, inner),
            Self::AddQuestionRes(inner) => serde_json::to_writer(&mut writer, inner),
            Self::GetQuestionsReq(inner) => serde_json::to_writer(&mut writer, inner),
            Self::GetQuestionsRes(inner) => serde_json::to_writer(&mut writer, inner),
            Self::DeleteQuestionReq(inner) => serde_json::to_writer(&mut writer, inner),
            Self::DeleteQuestionRes(inner) => serde_json::to_writer(&mut writer, inner),
            Self::GetStudentRoomsRes(inner) => serde_json::to_writer(&mut writer, inner),
            Self::GetAvailableRoomsRes(inner) => serde_json::to_writer(&mut writer, inner),
            Self::StartRoomTestReq(inner) => serde_json::to_writer(&mut writer, inner),
            Self::StartRoomTestRes(inner) => serde_json::to_writer(&mut writer, inner),
            Self::SubmitRoomTestReq(inner) => serde_json::to_writer(&mut writer, inner),
            Self::SubmitRoomTestRes(inner) => serde_json::to_writer(&mut writer, inner),
            Self::AutoSaveReq(inner) => serde_json::to_writer(&mut writer, inner),
            Self::AutoSaveRes(inner) => serde_json::to_writer(&mut writer, inner),
            Self::Error(inner) => serde_json::to_writer(&mut writer, inner),

            // Zero-byte payloads
            Self::LogoutReq
            | Self::TestStartReq
            | Self::TeacherDataReq
            | Self::GetRoomsReq
            | Self::GetStudentRoomsReq
            | Self::GetAvailableRoomsReq
            | Self::Heartbeat => Ok(()),
        }
        .map_err(|e| ProtocolError::JsonEncode(e.to_string()))
    }

    /// Decode payload from bytes based on message type
    ///
    /// The size check happens BEFORE JSON parsing begins, so the parser never
    /// processes oversized inputs. Unknown message types are rejected rather
    /// than silently ignored. Body-less message types accept any bytes and
    /// discard them.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::PayloadTooLarge` if bytes exceed 1 MiB
    /// - `ProtocolError::JsonDecode` if JSON deserialization fails
    pub fn decode(msg_type: MsgType, bytes: &[u8]) -> Result<Self> {
        if bytes.len() > FrameHeader::MAX_PAYLOAD_SIZE as usize {
            return Err(ProtocolError::PayloadTooLarge {
                size: bytes.len(),
                max: FrameHeader::MAX_PAYLOAD_SIZE as usize,
            });
        }

        let payload = match msg_type {
            MsgType::RegisterReq => Self::RegisterReq(decode_json(bytes)?),
            MsgType::RegisterRes => Self::RegisterRes(decode_json(bytes)?),
            MsgType::LoginReq => Self::LoginReq(decode_json(bytes)?),
            MsgType::LoginRes => Self::LoginRes(decode_json(bytes)?),
            MsgType::LogoutReq => Self::LogoutReq,
            MsgType::LogoutRes => Self::LogoutRes(decode_json(bytes)?),
            MsgType::TestConfig => Self::TestConfig(decode_json(bytes)?),
            MsgType::TestStartReq => Self::TestStartReq,
            MsgType::TestStartRes => Self::TestStartRes(decode_json(bytes)?),
            MsgType::TestQuestions => Self::TestQuestions(decode_json(bytes)?),
            MsgType::TestSubmit => Self::TestSubmit(decode_json(bytes)?),
            MsgType::TestResult => Self::TestResult(decode_json(bytes)?),
            MsgType::TeacherDataReq => Self::TeacherDataReq,
            MsgType::TeacherDataRes => Self::TeacherDataRes(decode_json(bytes)?),
            MsgType::CreateRoomReq => Self::CreateRoomReq(decode_json(bytes)?),
            MsgType::CreateRoomRes => Self::CreateRoomRes(decode_json(bytes)?),
            MsgType::JoinRoomReq => Self::JoinRoomReq(decode_json(bytes)?),
            MsgType::JoinRoomRes => Self::JoinRoomRes(decode_json(bytes)?),
            MsgType::StartRoomReq => Self::StartRoomReq(decode_json(bytes)?),
            MsgType::StartRoomRes => Self::StartRoomRes(decode_json(bytes)?),
            MsgType::EndRoomReq => Self::EndRoomReq(decode_json(bytes)?),
            MsgType::EndRoomRes => Self::EndRoomRes(decode_json(bytes)?),
            MsgType::GetRoomsReq => Self::GetRoomsReq,
            MsgType::GetRoomsRes => Self::GetRoomsRes(decode_json(bytes)?),
            MsgType::RoomStatus => Self::RoomStatus(decode_json(bytes)?),
            MsgType::AddQuestionReq => Self::AddQuestionReq(decode_json(bytes)?),
            MsgType::AddQuestionRes => Self::AddQuestionRes(decode_json(bytes)?),
            MsgType::GetQuestionsReq => Self::GetQuestionsReq(decode_json(bytes)?),
            MsgType::GetQuestionsRes => Self::GetQuestionsRes(decode_json(bytes)?),
            MsgType::DeleteQuestionReq => Self::DeleteQuestionReq(decode_json(bytes)?),
            MsgType::DeleteQuestionRes => Self::DeleteQuestionRes(decode_json(bytes)?),
            MsgType::GetStudentRoomsReq => Self::GetStudentRoomsReq,
            MsgType::GetStudentRoomsRes => Self::GetStudentRoomsRes(decode_json(bytes)?),
            MsgType::GetAvailableRoomsReq => Self::GetAvailableRoomsReq,
            MsgType::GetAvailableRoomsRes => Self::GetAvailableRoomsRes(decode_json(bytes)?),
            MsgType::StartRoomTestReq => Self::StartRoomTestReq(decode_json(bytes)?),
            MsgType::StartRoomTestRes => Self::StartRoomTestRes(decode_json(bytes)?),
            MsgType::SubmitRoomTestReq => Self::SubmitRoomTestReq(decode_json(bytes)?),
            MsgType::SubmitRoomTestRes => Self::SubmitRoomTestRes(decode_json(bytes)?),
            MsgType::AutoSaveReq => Self::AutoSaveReq(decode_json(bytes)?),
            MsgType::AutoSaveRes => Self::AutoSaveRes(decode_json(bytes)?),
            MsgType::Heartbeat => Self::Heartbeat,
            MsgType::Error => Self::Error(decode_json(bytes)?),
        };

        Ok(payload)
    }

    /// Convert payload into a transport frame
    ///
    /// Encodes the payload to JSON bytes, sets the matching message type in
    /// the header, and creates a [`Frame`] with automatic `payload_size`
    /// calculation.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::JsonEncode` if serialization fails
    pub fn into_frame(self, mut header: FrameHeader) -> Result<Frame> {
        let mut buf = Vec::new();
        self.encode(&mut buf)?;
        header.msg_type = self.msg_type().to_u16().to_be_bytes();
        Ok(Frame::new(header, buf))
    }

    /// Parse payload from a raw transport frame
    ///
    /// # Errors
    ///
    /// - `ProtocolError::UnknownMessageType` if the header's message type is
    ///   not recognized
    /// - `ProtocolError::JsonDecode` if deserialization fails
    /// - `ProtocolError::PayloadTooLarge` if payload exceeds maximum size
    pub fn from_frame(frame: &Frame) -> Result<Self> {
        let msg_type = frame
            .header
            .msg_type()
            .ok_or(ProtocolError::UnknownMessageType(frame.header.msg_type_raw()))?;
        Self::decode(msg_type, &frame.payload)
    }
}
