//! Sans-IO domain logic for the taproom test server.
//!
//! Everything in this crate is deterministic and synchronous: sessions,
//! room lifecycle guards, scoring, resume reconciliation, and credential
//! handling all take their inputs (including the clock) as arguments.
//! System resources enter only through the [`Environment`] trait, which the
//! server crate implements for production and tests implement with scripted
//! values.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod credentials;
pub mod env;
pub mod error;
pub mod lifecycle;
pub mod session;
pub mod types;

pub use credentials::{Argon2Hasher, CredentialHasher};
pub use env::Environment;
pub use error::DomainError;
pub use session::{Session, SessionError, SessionStore};
pub use types::{Participant, ProgressSnapshot, Room, RoomQuestion, TestResult, User};
