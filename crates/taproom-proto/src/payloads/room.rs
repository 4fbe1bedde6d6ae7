//! Room management payload types.
//!
//! Room creation, joining, lifecycle control, listings, and question
//! management. Room mutations are teacher-only and checked against ownership
//! by the dispatcher; these types carry the data only.

use serde::{Deserialize, Serialize};

/// Room lifecycle state. Serialized as lowercase strings on the wire.
///
/// Transitions are strictly forward: `waiting -> active -> ended`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomState {
    /// Accepting joins and questions; test not started
    Waiting,
    /// Test in progress
    Active,
    /// Test over; terminal
    Ended,
}

impl RoomState {
    /// Wire/storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Active => "active",
            Self::Ended => "ended",
        }
    }
}

impl std::fmt::Display for RoomState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Participant progress within a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantState {
    /// Joined, has not entered the test
    Joined,
    /// Entered the test
    Testing,
    /// Final answers recorded; terminal
    Submitted,
}

impl ParticipantState {
    /// Wire/storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Joined => "joined",
            Self::Testing => "testing",
            Self::Submitted => "submitted",
        }
    }
}

/// Request body referencing a room by id.
///
/// Shared by `StartRoomReq`, `EndRoomReq`, `GetQuestionsReq`, and
/// `StartRoomTestReq`; the message type disambiguates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomRef {
    /// Target room id
    pub room_id: i64,
}

/// Room creation request (teacher only)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateRoomRequest {
    /// Display name (at least 3 characters)
    pub room_name: String,
    /// Questions per test run (1-50); also caps the question list
    pub num_questions: u32,
    /// Test duration in minutes (5-180)
    pub duration_minutes: u32,
}

/// Room creation response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateRoomResponse {
    /// Status code (see [`crate::status`])
    pub code: u16,
    /// Human-readable outcome
    pub message: String,
    /// New room id on success
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub room_id: Option<i64>,
    /// Six-character join code on success
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub room_code: Option<String>,
}

/// Join request (student only), by join code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinRoomRequest {
    /// Six-character room code
    pub room_code: String,
}

/// Join response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinRoomResponse {
    /// Status code (see [`crate::status`])
    pub code: u16,
    /// Human-readable outcome
    pub message: String,
    /// Joined room id on success
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub room_id: Option<i64>,
    /// Room display name on success
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub room_name: Option<String>,
    /// Current room state on success
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub room_status: Option<RoomState>,
    /// True when the student had already joined (idempotent re-join)
    #[serde(default)]
    pub already_joined: bool,
}

/// Room status change push, broadcast to connected participants when the
/// owner starts or ends the room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomStatusPush {
    /// Room that changed
    pub room_id: i64,
    /// New state
    pub status: RoomState,
    /// Human-readable note ("test started", "test ended")
    pub message: String,
}

/// Room summary in the owner's listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSummary {
    /// Room id
    pub room_id: i64,
    /// Display name
    pub room_name: String,
    /// Join code
    pub room_code: String,
    /// Lifecycle state
    pub status: RoomState,
    /// Questions per test run
    pub num_questions: u32,
    /// Test duration in minutes
    pub duration_minutes: u32,
    /// Questions currently in the room
    pub question_count: u32,
    /// Students who have joined
    pub participant_count: u32,
}

/// Teacher room listing response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetRoomsResponse {
    /// Status code (see [`crate::status`])
    pub code: u16,
    /// Human-readable outcome
    pub message: String,
    /// Rooms owned by the requesting teacher
    pub rooms: Vec<RoomSummary>,
}

/// Room entry in a student's joined-rooms listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentRoomEntry {
    /// Room id
    pub room_id: i64,
    /// Display name
    pub room_name: String,
    /// Join code
    pub room_code: String,
    /// Lifecycle state
    pub status: RoomState,
    /// This student's progress in the room
    pub participant_status: ParticipantState,
    /// Test duration in minutes
    pub duration_minutes: u32,
}

/// Student joined-rooms listing response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetStudentRoomsResponse {
    /// Status code (see [`crate::status`])
    pub code: u16,
    /// Human-readable outcome
    pub message: String,
    /// Rooms the requesting student has joined
    pub rooms: Vec<StudentRoomEntry>,
}

/// Room entry in the joinable-rooms listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailableRoomEntry {
    /// Room id
    pub room_id: i64,
    /// Display name
    pub room_name: String,
    /// Join code
    pub room_code: String,
    /// Lifecycle state (`waiting` or `active`)
    pub status: RoomState,
    /// Questions per test run
    pub num_questions: u32,
    /// Test duration in minutes
    pub duration_minutes: u32,
}

/// Joinable-rooms listing response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetAvailableRoomsResponse {
    /// Status code (see [`crate::status`])
    pub code: u16,
    /// Human-readable outcome
    pub message: String,
    /// Rooms the requesting student could join
    pub rooms: Vec<AvailableRoomEntry>,
}

/// Question add request (room owner only)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddQuestionRequest {
    /// Target room id
    pub room_id: i64,
    /// Question prompt
    pub question_text: String,
    /// Exactly four answer options
    pub options: [String; 4],
    /// Index of the correct option (0-3)
    pub correct_answer: u8,
}

/// Question add response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddQuestionResponse {
    /// Status code (see [`crate::status`])
    pub code: u16,
    /// Human-readable outcome
    pub message: String,
    /// New question id on success
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub question_id: Option<i64>,
}

/// Question as seen by the room owner (includes the correct answer)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionRecord {
    /// Question id
    pub question_id: i64,
    /// Question prompt
    pub question_text: String,
    /// Exactly four answer options
    pub options: [String; 4],
    /// Index of the correct option (0-3)
    pub correct_answer: u8,
    /// Position in the authoritative ordering
    pub order: u32,
}

/// Question listing response (owner view)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetQuestionsResponse {
    /// Status code (see [`crate::status`])
    pub code: u16,
    /// Human-readable outcome
    pub message: String,
    /// Questions in authoritative order
    pub questions: Vec<QuestionRecord>,
}

/// Question delete request (room owner only)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteQuestionRequest {
    /// Room the question belongs to
    pub room_id: i64,
    /// Question to delete
    pub question_id: i64,
}
