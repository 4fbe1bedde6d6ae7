//! Domain records for accounts, rooms, questions, and results.
//!
//! Wire enums (`Role`, `RoomState`, `ParticipantState`) are reused directly
//! from `taproom-proto` so storage and wire never disagree on vocabulary.

use taproom_proto::payloads::{
    auth::Role,
    room::{ParticipantState, QuestionRecord, RoomState},
    test::{AnswerEntry, QuestionView},
};

/// A registered account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    /// Unique id assigned by the repository
    pub id: i64,
    /// Unique username (3-20 alphanumeric characters)
    pub username: String,
    /// Argon2 PHC-format password hash. Never the plaintext.
    pub password_hash: String,
    /// Account role
    pub role: Role,
    /// Display name
    pub full_name: String,
    /// Optional contact email
    pub email: Option<String>,
    /// Unix seconds at registration
    pub created_at: u64,
}

/// A test room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Room {
    /// Unique id assigned by the repository
    pub id: i64,
    /// Display name
    pub room_name: String,
    /// Unique six-character join code
    pub room_code: String,
    /// Owning teacher's user id
    pub teacher_id: i64,
    /// Questions per test run; also caps the question list
    pub num_questions: u32,
    /// Test duration in minutes
    pub duration_minutes: u32,
    /// Lifecycle state
    pub status: RoomState,
    /// Unix seconds at creation
    pub created_at: u64,
    /// Unix seconds when the room was started
    pub start_time: Option<u64>,
    /// Unix seconds when the room was ended
    pub end_time: Option<u64>,
}

impl Room {
    /// Earliest Unix second at which the room may be ended.
    ///
    /// `None` while the room has not been started.
    #[must_use]
    pub fn earliest_end(&self) -> Option<u64> {
        self.start_time.map(|start| start + u64::from(self.duration_minutes) * 60)
    }
}

/// A question belonging to a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomQuestion {
    /// Unique id assigned by the repository
    pub id: i64,
    /// Room this question belongs to
    pub room_id: i64,
    /// Question prompt
    pub question_text: String,
    /// Exactly four answer options
    pub options: [String; 4],
    /// Index of the correct option (0-3)
    pub correct_answer: u8,
    /// Position in the authoritative ordering
    pub order: u32,
}

impl RoomQuestion {
    /// Owner view, including the correct answer.
    #[must_use]
    pub fn to_record(&self) -> QuestionRecord {
        QuestionRecord {
            question_id: self.id,
            question_text: self.question_text.clone(),
            options: self.options.clone(),
            correct_answer: self.correct_answer,
            order: self.order,
        }
    }

    /// Test-taker view, correct answer stripped.
    #[must_use]
    pub fn to_view(&self) -> QuestionView {
        QuestionView {
            question_id: self.id,
            question_text: self.question_text.clone(),
            options: self.options.clone(),
        }
    }
}

/// A student's membership in a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    /// Room joined
    pub room_id: i64,
    /// Student's user id
    pub student_id: i64,
    /// Unix seconds at join
    pub joined_at: u64,
    /// Progress within the room
    pub status: ParticipantState,
    /// Recorded result, once submitted
    pub test_result_id: Option<i64>,
}

/// A recorded test result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestResult {
    /// Unique id assigned by the repository
    pub id: i64,
    /// Student who took the test
    pub student_id: i64,
    /// Correct answers
    pub score: u32,
    /// Total questions
    pub total_questions: u32,
    /// Submitted answers, as received
    pub answers: Vec<AnswerEntry>,
    /// Unix seconds at submission
    pub test_date: u64,
    /// Seconds the client reported spending, if any
    pub duration_seconds: Option<u64>,
}

/// An auto-saved progress snapshot, one per (room, student) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressSnapshot {
    /// Room being tested in
    pub room_id: i64,
    /// Student taking the test
    pub student_id: i64,
    /// Answers at save time
    pub answers: Vec<AnswerEntry>,
    /// Unix seconds at save
    pub saved_at: u64,
    /// True when the snapshot accompanied a final submission
    pub is_final: bool,
}
