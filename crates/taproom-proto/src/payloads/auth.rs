//! Authentication payload types.
//!
//! Registration, login, and logout message bodies. `RegisterReq` and
//! `LoginReq` are the only message types the server accepts without a session
//! token in the header.

use serde::{Deserialize, Serialize};

/// Account role. Serialized as lowercase strings on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Takes tests in rooms
    Student,
    /// Owns rooms and questions
    Teacher,
}

impl Role {
    /// Wire/storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Teacher => "teacher",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Account registration request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterRequest {
    /// Desired username (3-20 alphanumeric characters)
    pub username: String,
    /// Plaintext password (6-50 characters); hashed server-side
    pub password: String,
    /// Requested role
    pub role: Role,
    /// Display name (2-50 characters)
    pub full_name: String,
    /// Optional contact email
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub email: Option<String>,
}

/// Account registration response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterResponse {
    /// Status code (see [`crate::status`])
    pub code: u16,
    /// Human-readable outcome
    pub message: String,
    /// Newly created user id on success
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub user_id: Option<i64>,
}

/// Login request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginRequest {
    /// Account username
    pub username: String,
    /// Plaintext password
    pub password: String,
}

/// Login response. On success carries the session token the client must
/// place in every subsequent frame header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginResponse {
    /// Status code (see [`crate::status`])
    pub code: u16,
    /// Human-readable outcome
    pub message: String,
    /// Session token (32 ASCII characters) on success
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub token: Option<String>,
    /// Authenticated role on success
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub role: Option<Role>,
    /// Display name on success
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub full_name: Option<String>,
    /// User id on success
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub user_id: Option<i64>,
}
