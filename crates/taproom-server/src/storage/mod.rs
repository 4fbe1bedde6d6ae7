//! Persistence abstraction for accounts, rooms, and results.
//!
//! Trait-based abstraction over the server's data. The trait is synchronous
//! (no async) to keep the dispatcher's critical sections short and plainly
//! ordered; implementations typically share internal state via `Arc`, so
//! clones access the same underlying data.

mod error;
mod memory;

pub use error::RepositoryError;
pub use memory::MemoryRepository;
use taproom_core::types::{Participant, ProgressSnapshot, Room, RoomQuestion, TestResult, User};
use taproom_proto::payloads::{
    auth::Role,
    room::{ParticipantState, RoomState},
    test::{AnswerEntry, Statistics},
};

/// New-account parameters for [`Repository::create_user`].
#[derive(Debug, Clone)]
pub struct NewUser {
    /// Unique username
    pub username: String,
    /// Argon2 PHC-format hash, never plaintext
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

/// New-room parameters for [`Repository::create_room`].
#[derive(Debug, Clone)]
pub struct NewRoom {
    /// Display name
    pub room_name: String,
    /// Unique six-character join code
    pub room_code: String,
    /// Owning teacher's user id
    pub teacher_id: i64,
    /// Questions per test run
    pub num_questions: u32,
    /// Test duration in minutes
    pub duration_minutes: u32,
    /// Unix seconds at creation
    pub created_at: u64,
}

/// New-result parameters for [`Repository::save_test_result`].
#[derive(Debug, Clone)]
pub struct NewTestResult {
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

/// Persistence collaborator for the dispatcher.
///
/// Must be `Clone` (handed to connection tasks), `Send + Sync`, and
/// synchronous. Each method is one atomic operation on the store; the
/// conditional [`Repository::update_room_status`] is the only compare-and-set
/// primitive room transitions are allowed to use.
pub trait Repository: Clone + Send + Sync + 'static {
    // -- users --

    /// Create a user. Fails with [`RepositoryError::UsernameTaken`] when the
    /// username already exists.
    fn create_user(&self, new: NewUser) -> Result<User, RepositoryError>;

    /// Look up a user by username.
    fn user_by_username(&self, username: &str) -> Result<Option<User>, RepositoryError>;

    /// Look up a user by id.
    fn user_by_id(&self, user_id: i64) -> Result<Option<User>, RepositoryError>;

    // -- rooms --

    /// Create a room. Fails with [`RepositoryError::RoomCodeTaken`] on a join
    /// code collision; callers regenerate and retry.
    fn create_room(&self, new: NewRoom) -> Result<Room, RepositoryError>;

    /// Look up a room by id.
    fn room_by_id(&self, room_id: i64) -> Result<Option<Room>, RepositoryError>;

    /// Look up a room by join code.
    fn room_by_code(&self, room_code: &str) -> Result<Option<Room>, RepositoryError>;

    /// All rooms owned by a teacher, newest first.
    fn rooms_by_teacher(&self, teacher_id: i64) -> Result<Vec<Room>, RepositoryError>;

    /// Rooms a student could join: `waiting` or `active`, not yet joined.
    fn available_rooms(&self, student_id: i64) -> Result<Vec<Room>, RepositoryError>;

    /// Conditionally move a room from `expected` to `new` state.
    ///
    /// Returns `false` without changing anything when the room's current
    /// state is not `expected`, so two concurrent starts cannot both pass.
    /// Entering `active` records `timestamp` as the start time; entering
    /// `ended` records it as the end time.
    fn update_room_status(
        &self,
        room_id: i64,
        expected: RoomState,
        new: RoomState,
        timestamp: u64,
    ) -> Result<bool, RepositoryError>;

    // -- questions --

    /// Add a question to a room at the given order position.
    fn add_question(
        &self,
        room_id: i64,
        question_text: String,
        options: [String; 4],
        correct_answer: u8,
        order: u32,
    ) -> Result<RoomQuestion, RepositoryError>;

    /// A room's questions in authoritative order (order, then id).
    fn questions_for_room(&self, room_id: i64) -> Result<Vec<RoomQuestion>, RepositoryError>;

    /// Look up a question by id.
    fn question_by_id(&self, question_id: i64) -> Result<Option<RoomQuestion>, RepositoryError>;

    /// Delete a question. Returns `false` when it does not exist in the room.
    fn delete_question(&self, room_id: i64, question_id: i64) -> Result<bool, RepositoryError>;

    /// Number of questions currently in a room.
    fn question_count(&self, room_id: i64) -> Result<u32, RepositoryError>;

    // -- participants --

    /// Record a student joining a room. Idempotent: re-joining returns the
    /// existing row with the flag set.
    fn upsert_participant(
        &self,
        room_id: i64,
        student_id: i64,
        joined_at: u64,
    ) -> Result<(Participant, bool), RepositoryError>;

    /// Look up a participant row.
    fn participant(
        &self,
        room_id: i64,
        student_id: i64,
    ) -> Result<Option<Participant>, RepositoryError>;

    /// Number of students who have joined a room.
    fn participant_count(&self, room_id: i64) -> Result<u32, RepositoryError>;

    /// Update a participant's progress state. Returns `false` when the row
    /// does not exist.
    fn update_participant_status(
        &self,
        room_id: i64,
        student_id: i64,
        status: ParticipantState,
    ) -> Result<bool, RepositoryError>;

    /// Rooms a student has joined, with their participant rows.
    fn rooms_for_student(
        &self,
        student_id: i64,
    ) -> Result<Vec<(Room, Participant)>, RepositoryError>;

    /// Attach a recorded result to a participant row.
    fn link_test_result(
        &self,
        room_id: i64,
        student_id: i64,
        result_id: i64,
    ) -> Result<bool, RepositoryError>;

    // -- results --

    /// Persist a test result.
    fn save_test_result(&self, new: NewTestResult) -> Result<TestResult, RepositoryError>;

    /// All results for a student, newest first.
    fn results_for_student(&self, student_id: i64) -> Result<Vec<TestResult>, RepositoryError>;

    /// All recorded results, newest first.
    fn all_results(&self) -> Result<Vec<TestResult>, RepositoryError>;

    /// Aggregate statistics for the teacher dashboard.
    fn statistics(&self) -> Result<Statistics, RepositoryError>;

    // -- auto-save progress --

    /// Replace-on-write upsert of a progress snapshot, keyed by
    /// `(room_id, student_id)`.
    fn upsert_progress(&self, snapshot: ProgressSnapshot) -> Result<(), RepositoryError>;

    /// Load the progress snapshot for a (room, student) pair.
    fn load_progress(
        &self,
        room_id: i64,
        student_id: i64,
    ) -> Result<Option<ProgressSnapshot>, RepositoryError>;
}
