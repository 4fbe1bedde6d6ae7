//! Server error types.
//!
//! Strongly-typed errors for the server runtime and driver plumbing. Domain
//! refusals (wrong role, bad state, validation) never surface here; those
//! become error response frames via `DomainError`. `ServerError` covers the
//! cases where the server itself cannot proceed.

use std::fmt;

use crate::storage::RepositoryError;

/// Errors that can occur during server operations.
#[derive(Debug)]
pub enum ServerError {
    /// Session not found in registry.
    ///
    /// Occurs when processing a frame for a connection that was already
    /// unregistered. May be transient if the peer disconnected mid-request.
    SessionNotFound(u64),

    /// Repository operation failed.
    ///
    /// Wraps backend failures from the persistence collaborator. Unique
    /// constraint violations are handled inline by the dispatcher and do not
    /// reach this variant.
    Repository(RepositoryError),

    /// Frame encoding/decoding error.
    ///
    /// Invalid frame format received from a client or failure to encode a
    /// response. Fatal for that connection.
    Protocol(String),

    /// I/O failure in the runtime (bind, accept, stream setup).
    Io(std::io::Error),

    /// Unexpected internal failure.
    Internal(String),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SessionNotFound(id) => write!(f, "session not found: {id}"),
            Self::Repository(err) => write!(f, "repository error: {err}"),
            Self::Protocol(msg) => write!(f, "protocol error: {msg}"),
            Self::Io(err) => write!(f, "io error: {err}"),
            Self::Internal(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

impl std::error::Error for ServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Repository(err) => Some(err),
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepositoryError> for ServerError {
    fn from(err: RepositoryError) -> Self {
        Self::Repository(err)
    }
}

impl From<std::io::Error> for ServerError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<taproom_proto::ProtocolError> for ServerError {
    fn from(err: taproom_proto::ProtocolError) -> Self {
        Self::Protocol(err.to_string())
    }
}
