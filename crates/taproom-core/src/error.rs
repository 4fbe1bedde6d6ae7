//! Error types for taproom domain logic.
//!
//! `DomainError` covers every refusal the dispatcher can hand back to a
//! client: validation failures, authentication problems, role and ownership
//! violations, and lifecycle guard rejections. Each variant maps to exactly
//! one wire status code via [`DomainError::status_code`].

use taproom_proto::{
    payloads::{auth::Role, room::RoomState},
    status,
};
use thiserror::Error;

/// Errors produced by domain logic (guards, validation, sessions).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Input failed validation (lengths, ranges, formats)
    #[error("{0}")]
    Validation(String),

    /// Username or password did not match.
    ///
    /// Deliberately does not say which, so login probing cannot distinguish
    /// unknown usernames from wrong passwords.
    #[error("invalid username or password")]
    InvalidCredentials,

    /// Username already registered
    #[error("username already exists: {0}")]
    UsernameTaken(String),

    /// Frame carried no session token, or the token is unknown
    #[error("missing or unknown session token")]
    Unauthorized,

    /// Session token was valid once but has expired
    #[error("session expired")]
    SessionExpired,

    /// Operation reserved for the other role
    #[error("operation requires {required} role")]
    WrongRole {
        /// Role the operation requires
        required: Role,
    },

    /// Authenticated but not allowed (e.g. not the room owner)
    #[error("{0}")]
    Forbidden(String),

    /// Room does not exist
    #[error("room not found")]
    RoomNotFound,

    /// Question does not exist in the given room
    #[error("question not found")]
    QuestionNotFound,

    /// Room already holds its configured number of questions
    #[error("question limit reached: room holds {limit} questions")]
    QuestionLimitReached {
        /// Configured question cap
        limit: u32,
    },

    /// Room cannot start with fewer questions than configured
    #[error("not enough questions: have {have}, need {need}")]
    NotEnoughQuestions {
        /// Questions currently in the room
        have: u32,
        /// Questions the room was configured for
        need: u32,
    },

    /// Operation not legal in the room's current state
    #[error("cannot {operation} while room is {state}")]
    InvalidTransition {
        /// Current room state
        state: RoomState,
        /// Operation that was attempted
        operation: &'static str,
    },

    /// Room cannot end before its duration has elapsed
    #[error("test still running: {remaining_minutes} minutes remaining")]
    TooEarlyToEnd {
        /// Whole minutes left, rounded up
        remaining_minutes: u64,
    },

    /// Student is not a participant of the room
    #[error("not a participant of this room")]
    NotParticipant,

    /// Participant already submitted final answers
    #[error("test already submitted")]
    AlreadySubmitted,

    /// Unexpected internal failure
    #[error("internal error: {0}")]
    Internal(String),
}

impl DomainError {
    /// Wire status code for this error (see [`taproom_proto::status`]).
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) => status::BAD_REQUEST,
            Self::InvalidCredentials => status::INVALID_CREDENTIALS,
            Self::UsernameTaken(_) => status::USERNAME_EXISTS,
            Self::Unauthorized => status::UNAUTHORIZED,
            Self::SessionExpired => status::SESSION_EXPIRED,
            Self::WrongRole { .. } => status::WRONG_ROLE,
            Self::Forbidden(_) => status::FORBIDDEN,
            Self::RoomNotFound | Self::QuestionNotFound => status::BAD_REQUEST,
            Self::QuestionLimitReached { .. }
            | Self::NotEnoughQuestions { .. }
            | Self::InvalidTransition { .. }
            | Self::TooEarlyToEnd { .. }
            | Self::AlreadySubmitted => status::CONFLICT,
            Self::NotParticipant => status::FORBIDDEN,
            Self::Internal(_) => status::INTERNAL,
        }
    }
}
