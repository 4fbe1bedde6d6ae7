//! Room lifecycle guards, scoring, and resume reconciliation.
//!
//! Everything here is pure: guards take the room (and clock value) and
//! return a [`DomainError`] refusal or `Ok`. State changes themselves happen
//! at the repository, so a guard passing never implies the transition
//! happened; callers pair guards with the repository's conditional update.

use taproom_proto::payloads::{
    room::{ParticipantState, RoomState},
    test::{AnswerEntry, ResumedAnswer},
};

use crate::{
    env::Environment,
    error::DomainError,
    types::{Participant, ProgressSnapshot, Room, RoomQuestion},
};

/// Minimum room name length in characters.
pub const ROOM_NAME_MIN: usize = 3;
/// Questions per room (inclusive bounds).
pub const NUM_QUESTIONS: std::ops::RangeInclusive<u32> = 1..=50;
/// Test duration in minutes (inclusive bounds).
pub const DURATION_MINUTES: std::ops::RangeInclusive<u32> = 5..=180;
/// Room join code length.
pub const ROOM_CODE_LEN: usize = 6;
/// Number of answer options per question.
pub const OPTION_COUNT: usize = 4;

/// Room code alphabet: uppercase letters and digits.
const ROOM_CODE_ALPHABET: &[u8; 36] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Validate room creation parameters.
pub fn validate_room_config(
    room_name: &str,
    num_questions: u32,
    duration_minutes: u32,
) -> Result<(), DomainError> {
    if room_name.chars().count() < ROOM_NAME_MIN {
        return Err(DomainError::Validation(
            "room name must be at least 3 characters".to_string(),
        ));
    }
    if !NUM_QUESTIONS.contains(&num_questions) {
        return Err(DomainError::Validation(
            "number of questions must be between 1 and 50".to_string(),
        ));
    }
    if !DURATION_MINUTES.contains(&duration_minutes) {
        return Err(DomainError::Validation(
            "duration must be between 5 and 180 minutes".to_string(),
        ));
    }
    Ok(())
}

/// Generate one candidate room code.
///
/// Uniqueness is not checked here; callers retry against the repository on
/// collision.
pub fn generate_room_code<E: Environment>(env: &E) -> String {
    let mut bytes = [0u8; ROOM_CODE_LEN];
    env.random_bytes(&mut bytes);
    bytes
        .iter()
        .map(|b| char::from(ROOM_CODE_ALPHABET[usize::from(*b) % ROOM_CODE_ALPHABET.len()]))
        .collect()
}

/// Validate a question before it is stored.
pub fn validate_question(
    question_text: &str,
    options: &[String; OPTION_COUNT],
    correct_answer: u8,
) -> Result<(), DomainError> {
    if question_text.trim().is_empty() {
        return Err(DomainError::Validation("question text must not be empty".to_string()));
    }
    if options.iter().any(|opt| opt.trim().is_empty()) {
        return Err(DomainError::Validation("all four options must be non-empty".to_string()));
    }
    if usize::from(correct_answer) >= OPTION_COUNT {
        return Err(DomainError::Validation(
            "correct answer index must be between 0 and 3".to_string(),
        ));
    }
    Ok(())
}

/// Can another question be added to this room?
pub fn add_question_guard(room: &Room, current_count: u32) -> Result<(), DomainError> {
    if room.status != RoomState::Waiting {
        return Err(DomainError::InvalidTransition {
            state: room.status,
            operation: "add question",
        });
    }
    if current_count >= room.num_questions {
        return Err(DomainError::QuestionLimitReached { limit: room.num_questions });
    }
    Ok(())
}

/// Can this room be started?
///
/// Refusal carries the exact shortfall so the owner knows how many
/// questions are missing.
pub fn start_guard(room: &Room, question_count: u32) -> Result<(), DomainError> {
    if room.status != RoomState::Waiting {
        return Err(DomainError::InvalidTransition { state: room.status, operation: "start" });
    }
    if question_count < room.num_questions {
        return Err(DomainError::NotEnoughQuestions {
            have: question_count,
            need: room.num_questions,
        });
    }
    Ok(())
}

/// Can this room be ended at `now`?
///
/// An active room may only end once its full duration has elapsed; the
/// refusal reports whole minutes remaining, rounded up.
pub fn end_guard(room: &Room, now: u64) -> Result<(), DomainError> {
    if room.status != RoomState::Active {
        return Err(DomainError::InvalidTransition { state: room.status, operation: "end" });
    }
    let Some(earliest) = room.earliest_end() else {
        // Active rooms always carry a start time; treat a missing one as a
        // storage-level inconsistency rather than guessing.
        return Err(DomainError::Internal("active room has no start time".to_string()));
    };
    if now < earliest {
        let remaining_minutes = (earliest - now).div_ceil(60);
        return Err(DomainError::TooEarlyToEnd { remaining_minutes });
    }
    Ok(())
}

/// Can a student join this room?
pub fn join_guard(room: &Room) -> Result<(), DomainError> {
    if room.status == RoomState::Ended {
        return Err(DomainError::InvalidTransition { state: room.status, operation: "join" });
    }
    Ok(())
}

/// Can this participant begin (or resume) the test?
pub fn enter_guard(room: &Room, participant: &Participant) -> Result<(), DomainError> {
    if room.status != RoomState::Active {
        return Err(DomainError::InvalidTransition {
            state: room.status,
            operation: "take the test",
        });
    }
    if participant.status == ParticipantState::Submitted {
        return Err(DomainError::AlreadySubmitted);
    }
    Ok(())
}

/// Can this participant submit final answers?
pub fn submit_guard(room: &Room, participant: &Participant) -> Result<(), DomainError> {
    if room.status != RoomState::Active {
        return Err(DomainError::InvalidTransition { state: room.status, operation: "submit" });
    }
    if participant.status == ParticipantState::Submitted {
        return Err(DomainError::AlreadySubmitted);
    }
    Ok(())
}

/// Count correct answers by matching submitted question ids against the
/// room's questions. Submitted ids that match no question are ignored;
/// duplicate entries for the same question count at most once.
#[must_use]
pub fn score(answers: &[AnswerEntry], questions: &[RoomQuestion]) -> u32 {
    let mut correct = 0u32;
    for question in questions {
        let matched = answers
            .iter()
            .find(|a| a.question_id == question.id)
            .is_some_and(|a| a.selected == question.correct_answer);
        if matched {
            correct += 1;
        }
    }
    correct
}

/// Percentage correct, rounded to two decimal places. Zero-question tests
/// score 0.0 rather than dividing by zero.
#[must_use]
pub fn percentage(score: u32, total: u32) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (f64::from(score) / f64::from(total) * 10_000.0).round() / 100.0
}

/// Reconcile a saved snapshot against the room's authoritative question
/// list.
///
/// Produces one entry per question, in authoritative order, selecting the
/// cached answer where one exists. Questions the snapshot never saw come
/// back unanswered, and stale snapshot entries for deleted questions are
/// dropped.
#[must_use]
pub fn reconcile_resume(
    snapshot: Option<&ProgressSnapshot>,
    questions: &[RoomQuestion],
) -> Vec<ResumedAnswer> {
    questions
        .iter()
        .map(|question| {
            let selected = snapshot.and_then(|snap| {
                snap.answers
                    .iter()
                    .find(|a| a.question_id == question.id)
                    .map(|a| a.selected)
            });
            ResumedAnswer { question_id: question.id, selected }
        })
        .collect()
}
