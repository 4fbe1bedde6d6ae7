//! Repository error type.

use thiserror::Error;

/// Errors from the persistence collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    /// Username unique constraint violated
    #[error("username already exists: {0}")]
    UsernameTaken(String),

    /// Room join code unique constraint violated. Callers regenerate the
    /// code and retry.
    #[error("room code already exists: {0}")]
    RoomCodeTaken(String),

    /// Referenced row does not exist
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of row ("user", "room", "question")
        entity: &'static str,
        /// Id that missed
        id: i64,
    },

    /// Backend failure (I/O, serialization)
    #[error("repository backend error: {0}")]
    Backend(String),
}
