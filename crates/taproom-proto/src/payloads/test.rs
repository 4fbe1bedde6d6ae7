//! Test-taking payload types.
//!
//! Room test entry, answer submission, auto-save, the legacy global test
//! flow, and the teacher dashboard data. Questions sent to students never
//! carry the correct answer.

use serde::{Deserialize, Serialize};

/// Question as seen by a test taker (correct answer stripped)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionView {
    /// Question id, used to key answers
    pub question_id: i64,
    /// Question prompt
    pub question_text: String,
    /// Exactly four answer options
    pub options: [String; 4],
}

/// One answered question
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerEntry {
    /// Question being answered
    pub question_id: i64,
    /// Chosen option index (0-3)
    pub selected: u8,
}

/// One question slot in a resumed test, in authoritative question order.
///
/// `selected` is `None` for questions the cached snapshot did not cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumedAnswer {
    /// Question id
    pub question_id: i64,
    /// Previously saved option index, if any
    pub selected: Option<u8>,
}

/// Room test entry response. Carries the questions plus any answers
/// reconciled from an auto-save snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartRoomTestResponse {
    /// Status code (see [`crate::status`])
    pub code: u16,
    /// Human-readable outcome
    pub message: String,
    /// Test duration in minutes
    pub duration_minutes: u32,
    /// Questions in authoritative order, correct answers stripped
    pub questions: Vec<QuestionView>,
    /// Resume state, one entry per question in the same order
    pub answers: Vec<ResumedAnswer>,
}

/// Room test submission request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitRoomTestRequest {
    /// Room being tested in
    pub room_id: i64,
    /// Final answers; entries for unknown question ids are ignored
    pub answers: Vec<AnswerEntry>,
}

/// Room test submission response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitRoomTestResponse {
    /// Status code (see [`crate::status`])
    pub code: u16,
    /// Human-readable outcome
    pub message: String,
    /// Correct answers on success
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub score: Option<u32>,
    /// Total questions on success
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub total: Option<u32>,
    /// Percentage (two decimal places) on success
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub percentage: Option<f64>,
}

/// Auto-save request. Replaces any previous snapshot for this
/// (room, student) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoSaveRequest {
    /// Room being tested in
    pub room_id: i64,
    /// Answers so far
    pub answers: Vec<AnswerEntry>,
    /// True when this snapshot accompanies a final submission
    #[serde(default)]
    pub is_final: bool,
}

/// Global test configuration push (legacy test flow), sent to students
/// after login when a global question set is configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestConfigPush {
    /// Test duration in minutes
    pub duration_minutes: u32,
    /// Number of questions in the set
    pub num_questions: u32,
}

/// Global test questions push (legacy test flow)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestQuestionsPush {
    /// Questions, correct answers stripped
    pub questions: Vec<QuestionView>,
}

/// Global test answer submission (legacy test flow)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestSubmitRequest {
    /// Final answers
    pub answers: Vec<AnswerEntry>,
    /// Seconds the client spent, if it tracked them
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub duration_seconds: Option<u64>,
}

/// Global test result push (legacy test flow)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TestResultPush {
    /// Correct answers
    pub score: u32,
    /// Total questions
    pub total: u32,
    /// Percentage (two decimal places)
    pub percentage: f64,
}

/// Aggregate statistics for the teacher dashboard
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    /// Registered student accounts
    pub total_students: u64,
    /// Registered teacher accounts
    pub total_teachers: u64,
    /// Recorded test results
    pub total_attempts: u64,
    /// Mean percentage across all results (two decimal places)
    pub average_score: f64,
}

/// One recorded result in the teacher dashboard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    /// Student display name
    pub student_name: String,
    /// Correct answers
    pub score: u32,
    /// Total questions
    pub total_questions: u32,
    /// Percentage (two decimal places)
    pub percentage: f64,
    /// Unix seconds when the result was recorded
    pub test_date: u64,
}

/// Teacher dashboard data response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeacherDataResponse {
    /// Status code (see [`crate::status`])
    pub code: u16,
    /// Human-readable outcome
    pub message: String,
    /// Aggregate statistics
    pub stats: Statistics,
    /// All recorded results, newest first
    pub results: Vec<ResultRow>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resumed_answer_serializes_null_for_unanswered() {
        let entry = ResumedAnswer { question_id: 5, selected: None };
        let json = serde_json::to_string(&entry).unwrap();
        assert_eq!(json, r#"{"question_id":5,"selected":null}"#);
    }

    #[test]
    fn auto_save_is_final_defaults_false() {
        let json = r#"{"room_id":1,"answers":[{"question_id":1,"selected":2}]}"#;
        let req: AutoSaveRequest = serde_json::from_str(json).unwrap();
        assert!(!req.is_final);
        assert_eq!(req.answers.len(), 1);
    }

    #[test]
    fn submit_response_round_trip() {
        let res = SubmitRoomTestResponse {
            code: 1000,
            message: "submitted".to_string(),
            score: Some(1),
            total: Some(2),
            percentage: Some(50.0),
        };

        let json = serde_json::to_vec(&res).unwrap();
        let back: SubmitRoomTestResponse = serde_json::from_slice(&json).unwrap();
        assert_eq!(res, back);
    }
}
