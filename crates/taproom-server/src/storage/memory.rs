use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use taproom_core::{
    lifecycle,
    types::{Participant, ProgressSnapshot, Room, RoomQuestion, TestResult, User},
};
use taproom_proto::payloads::{
    auth::Role,
    room::{ParticipantState, RoomState},
    test::Statistics,
};

use super::{NewRoom, NewTestResult, NewUser, Repository, RepositoryError};

/// In-memory repository: the single data authority for one server instance.
///
/// All state lives behind one `Arc<Mutex<_>>` so clones share it and each
/// trait method is one atomic critical section. Uses `lock().expect()` which
/// panics if the mutex is poisoned (a thread panicked while holding the
/// lock); the server holds the lock only for short synchronous operations.
#[derive(Clone)]
pub struct MemoryRepository {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    users: HashMap<i64, User>,
    username_index: HashMap<String, i64>,

    rooms: HashMap<i64, Room>,
    room_code_index: HashMap<String, i64>,

    questions: HashMap<i64, RoomQuestion>,

    /// Keyed by (room_id, student_id)
    participants: HashMap<(i64, i64), Participant>,

    results: HashMap<i64, TestResult>,

    /// Auto-save snapshots keyed by (room_id, student_id)
    progress: HashMap<(i64, i64), ProgressSnapshot>,

    next_user_id: i64,
    next_room_id: i64,
    next_question_id: i64,
    next_result_id: i64,
}

impl MemoryRepository {
    /// Create an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self { inner: Arc::new(Mutex::new(Inner::default())) }
    }

    /// Number of registered users.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::expect_used)]
    #[must_use]
    pub fn user_count(&self) -> usize {
        self.inner.lock().expect("Mutex poisoned").users.len()
    }

    /// Number of rooms.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::expect_used)]
    #[must_use]
    pub fn room_count(&self) -> usize {
        self.inner.lock().expect("Mutex poisoned").rooms.len()
    }
}

impl Default for MemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl Inner {
    fn question_rows(&self, room_id: i64) -> Vec<RoomQuestion> {
        let mut rows: Vec<RoomQuestion> =
            self.questions.values().filter(|q| q.room_id == room_id).cloned().collect();
        rows.sort_by_key(|q| (q.order, q.id));
        rows
    }
}

impl Repository for MemoryRepository {
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::expect_used)]
    fn create_user(&self, new: NewUser) -> Result<User, RepositoryError> {
        let mut inner = self.inner.lock().expect("Mutex poisoned");

        if inner.username_index.contains_key(&new.username) {
            return Err(RepositoryError::UsernameTaken(new.username));
        }

        inner.next_user_id += 1;
        let user = User {
            id: inner.next_user_id,
            username: new.username,
            password_hash: new.password_hash,
            role: new.role,
            full_name: new.full_name,
            email: new.email,
            created_at: new.created_at,
        };

        inner.username_index.insert(user.username.clone(), user.id);
        inner.users.insert(user.id, user.clone());
        Ok(user)
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::expect_used)]
    fn user_by_username(&self, username: &str) -> Result<Option<User>, RepositoryError> {
        let inner = self.inner.lock().expect("Mutex poisoned");
        Ok(inner.username_index.get(username).and_then(|id| inner.users.get(id)).cloned())
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::expect_used)]
    fn user_by_id(&self, user_id: i64) -> Result<Option<User>, RepositoryError> {
        Ok(self.inner.lock().expect("Mutex poisoned").users.get(&user_id).cloned())
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::expect_used)]
    fn create_room(&self, new: NewRoom) -> Result<Room, RepositoryError> {
        let mut inner = self.inner.lock().expect("Mutex poisoned");

        if inner.room_code_index.contains_key(&new.room_code) {
            return Err(RepositoryError::RoomCodeTaken(new.room_code));
        }

        inner.next_room_id += 1;
        let room = Room {
            id: inner.next_room_id,
            room_name: new.room_name,
            room_code: new.room_code,
            teacher_id: new.teacher_id,
            num_questions: new.num_questions,
            duration_minutes: new.duration_minutes,
            status: RoomState::Waiting,
            created_at: new.created_at,
            start_time: None,
            end_time: None,
        };

        inner.room_code_index.insert(room.room_code.clone(), room.id);
        inner.rooms.insert(room.id, room.clone());
        Ok(room)
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::expect_used)]
    fn room_by_id(&self, room_id: i64) -> Result<Option<Room>, RepositoryError> {
        Ok(self.inner.lock().expect("Mutex poisoned").rooms.get(&room_id).cloned())
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::expect_used)]
    fn room_by_code(&self, room_code: &str) -> Result<Option<Room>, RepositoryError> {
        let inner = self.inner.lock().expect("Mutex poisoned");
        Ok(inner.room_code_index.get(room_code).and_then(|id| inner.rooms.get(id)).cloned())
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::expect_used)]
    fn rooms_by_teacher(&self, teacher_id: i64) -> Result<Vec<Room>, RepositoryError> {
        let inner = self.inner.lock().expect("Mutex poisoned");
        let mut rooms: Vec<Room> =
            inner.rooms.values().filter(|r| r.teacher_id == teacher_id).cloned().collect();
        rooms.sort_by_key(|r| std::cmp::Reverse((r.created_at, r.id)));
        Ok(rooms)
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::expect_used)]
    fn available_rooms(&self, student_id: i64) -> Result<Vec<Room>, RepositoryError> {
        let inner = self.inner.lock().expect("Mutex poisoned");
        let mut rooms: Vec<Room> = inner
            .rooms
            .values()
            .filter(|r| r.status != RoomState::Ended)
            .filter(|r| !inner.participants.contains_key(&(r.id, student_id)))
            .cloned()
            .collect();
        rooms.sort_by_key(|r| std::cmp::Reverse((r.created_at, r.id)));
        Ok(rooms)
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::expect_used)]
    fn update_room_status(
        &self,
        room_id: i64,
        expected: RoomState,
        new: RoomState,
        timestamp: u64,
    ) -> Result<bool, RepositoryError> {
        let mut inner = self.inner.lock().expect("Mutex poisoned");
        let room = inner
            .rooms
            .get_mut(&room_id)
            .ok_or(RepositoryError::NotFound { entity: "room", id: room_id })?;

        if room.status != expected {
            return Ok(false);
        }

        room.status = new;
        match new {
            RoomState::Active => room.start_time = Some(timestamp),
            RoomState::Ended => room.end_time = Some(timestamp),
            RoomState::Waiting => {},
        }
        Ok(true)
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::expect_used)]
    fn add_question(
        &self,
        room_id: i64,
        question_text: String,
        options: [String; 4],
        correct_answer: u8,
        order: u32,
    ) -> Result<RoomQuestion, RepositoryError> {
        let mut inner = self.inner.lock().expect("Mutex poisoned");

        if !inner.rooms.contains_key(&room_id) {
            return Err(RepositoryError::NotFound { entity: "room", id: room_id });
        }

        inner.next_question_id += 1;
        let question = RoomQuestion {
            id: inner.next_question_id,
            room_id,
            question_text,
            options,
            correct_answer,
            order,
        };
        inner.questions.insert(question.id, question.clone());
        Ok(question)
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::expect_used)]
    fn questions_for_room(&self, room_id: i64) -> Result<Vec<RoomQuestion>, RepositoryError> {
        Ok(self.inner.lock().expect("Mutex poisoned").question_rows(room_id))
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::expect_used)]
    fn question_by_id(&self, question_id: i64) -> Result<Option<RoomQuestion>, RepositoryError> {
        Ok(self.inner.lock().expect("Mutex poisoned").questions.get(&question_id).cloned())
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::expect_used)]
    fn delete_question(&self, room_id: i64, question_id: i64) -> Result<bool, RepositoryError> {
        let mut inner = self.inner.lock().expect("Mutex poisoned");
        match inner.questions.get(&question_id) {
            Some(q) if q.room_id == room_id => {
                inner.questions.remove(&question_id);
                Ok(true)
            },
            _ => Ok(false),
        }
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::expect_used)]
    fn question_count(&self, room_id: i64) -> Result<u32, RepositoryError> {
        let inner = self.inner.lock().expect("Mutex poisoned");
        let count = inner.questions.values().filter(|q| q.room_id == room_id).count();
        u32::try_from(count).map_err(|_| RepositoryError::Backend("question count overflow".into()))
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::expect_used)]
    fn upsert_participant(
        &self,
        room_id: i64,
        student_id: i64,
        joined_at: u64,
    ) -> Result<(Participant, bool), RepositoryError> {
        let mut inner = self.inner.lock().expect("Mutex poisoned");

        if let Some(existing) = inner.participants.get(&(room_id, student_id)) {
            return Ok((existing.clone(), true));
        }

        let participant = Participant {
            room_id,
            student_id,
            joined_at,
            status: ParticipantState::Joined,
            test_result_id: None,
        };
        inner.participants.insert((room_id, student_id), participant.clone());
        Ok((participant, false))
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::expect_used)]
    fn participant(
        &self,
        room_id: i64,
        student_id: i64,
    ) -> Result<Option<Participant>, RepositoryError> {
        Ok(self
            .inner
            .lock()
            .expect("Mutex poisoned")
            .participants
            .get(&(room_id, student_id))
            .cloned())
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::expect_used)]
    fn participant_count(&self, room_id: i64) -> Result<u32, RepositoryError> {
        let inner = self.inner.lock().expect("Mutex poisoned");
        let count = inner.participants.keys().filter(|(rid, _)| *rid == room_id).count();
        u32::try_from(count)
            .map_err(|_| RepositoryError::Backend("participant count overflow".into()))
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::expect_used)]
    fn update_participant_status(
        &self,
        room_id: i64,
        student_id: i64,
        status: ParticipantState,
    ) -> Result<bool, RepositoryError> {
        let mut inner = self.inner.lock().expect("Mutex poisoned");
        match inner.participants.get_mut(&(room_id, student_id)) {
            Some(participant) => {
                participant.status = status;
                Ok(true)
            },
            None => Ok(false),
        }
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::expect_used)]
    fn rooms_for_student(
        &self,
        student_id: i64,
    ) -> Result<Vec<(Room, Participant)>, RepositoryError> {
        let inner = self.inner.lock().expect("Mutex poisoned");
        let mut rows: Vec<(Room, Participant)> = inner
            .participants
            .values()
            .filter(|p| p.student_id == student_id)
            .filter_map(|p| inner.rooms.get(&p.room_id).map(|r| (r.clone(), p.clone())))
            .collect();
        rows.sort_by_key(|(_, p)| std::cmp::Reverse((p.joined_at, p.room_id)));
        Ok(rows)
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::expect_used)]
    fn link_test_result(
        &self,
        room_id: i64,
        student_id: i64,
        result_id: i64,
    ) -> Result<bool, RepositoryError> {
        let mut inner = self.inner.lock().expect("Mutex poisoned");
        match inner.participants.get_mut(&(room_id, student_id)) {
            Some(participant) => {
                participant.test_result_id = Some(result_id);
                Ok(true)
            },
            None => Ok(false),
        }
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::expect_used)]
    fn save_test_result(&self, new: NewTestResult) -> Result<TestResult, RepositoryError> {
        let mut inner = self.inner.lock().expect("Mutex poisoned");

        inner.next_result_id += 1;
        let result = TestResult {
            id: inner.next_result_id,
            student_id: new.student_id,
            score: new.score,
            total_questions: new.total_questions,
            answers: new.answers,
            test_date: new.test_date,
            duration_seconds: new.duration_seconds,
        };
        inner.results.insert(result.id, result.clone());
        Ok(result)
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::expect_used)]
    fn results_for_student(&self, student_id: i64) -> Result<Vec<TestResult>, RepositoryError> {
        let inner = self.inner.lock().expect("Mutex poisoned");
        let mut results: Vec<TestResult> =
            inner.results.values().filter(|r| r.student_id == student_id).cloned().collect();
        results.sort_by_key(|r| std::cmp::Reverse((r.test_date, r.id)));
        Ok(results)
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::expect_used)]
    fn all_results(&self) -> Result<Vec<TestResult>, RepositoryError> {
        let inner = self.inner.lock().expect("Mutex poisoned");
        let mut results: Vec<TestResult> = inner.results.values().cloned().collect();
        results.sort_by_key(|r| std::cmp::Reverse((r.test_date, r.id)));
        Ok(results)
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::expect_used)]
    fn statistics(&self) -> Result<Statistics, RepositoryError> {
        let inner = self.inner.lock().expect("Mutex poisoned");

        let total_students =
            inner.users.values().filter(|u| u.role == Role::Student).count() as u64;
        let total_teachers =
            inner.users.values().filter(|u| u.role == Role::Teacher).count() as u64;
        let total_attempts = inner.results.len() as u64;

        let average_score = if inner.results.is_empty() {
            0.0
        } else {
            let sum: f64 = inner
                .results
                .values()
                .map(|r| lifecycle::percentage(r.score, r.total_questions))
                .sum();
            (sum / inner.results.len() as f64 * 100.0).round() / 100.0
        };

        Ok(Statistics { total_students, total_teachers, total_attempts, average_score })
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::expect_used)]
    fn upsert_progress(&self, snapshot: ProgressSnapshot) -> Result<(), RepositoryError> {
        let mut inner = self.inner.lock().expect("Mutex poisoned");
        inner.progress.insert((snapshot.room_id, snapshot.student_id), snapshot);
        Ok(())
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::expect_used)]
    fn load_progress(
        &self,
        room_id: i64,
        student_id: i64,
    ) -> Result<Option<ProgressSnapshot>, RepositoryError> {
        Ok(self
            .inner
            .lock()
            .expect("Mutex poisoned")
            .progress
            .get(&(room_id, student_id))
            .cloned())
    }
}
