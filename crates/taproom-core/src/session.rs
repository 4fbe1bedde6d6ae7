//! In-memory session store.
//!
//! Sessions are keyed by a 32-character hex token and expire lazily: an
//! expired session is deleted the first time something touches it, and
//! [`SessionStore::sweep_expired`] clears the rest on the periodic tick.
//!
//! The store is sans-IO: callers pass the current wall-clock time, so tests
//! drive expiry with a scripted clock.

use std::collections::HashMap;

use taproom_proto::payloads::auth::Role;

use crate::types::User;

/// Default session lifetime: 24 hours.
pub const DEFAULT_TTL_SECS: u64 = 24 * 60 * 60;

/// Number of random bytes behind a session token (rendered as 32 hex chars,
/// exactly filling the frame header's token field).
pub const TOKEN_BYTES: usize = 16;

/// Render random bytes as a session token.
#[must_use]
pub fn token_from_bytes(bytes: &[u8; TOKEN_BYTES]) -> String {
    hex::encode(bytes)
}

/// Why a token failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    /// Token was never issued or was destroyed
    Unknown,
    /// Token was issued but its expiry has passed
    Expired,
}

/// An authenticated session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Session token (32 hex characters)
    pub token: String,
    /// Authenticated user id
    pub user_id: i64,
    /// Authenticated username
    pub username: String,
    /// Authenticated role
    pub role: Role,
    /// Display name
    pub full_name: String,
    /// Unix seconds at creation
    pub created_at: u64,
    /// Unix seconds after which the token is invalid
    pub expires_at: u64,
    /// Unix seconds of the most recent validated use
    pub last_activity: u64,
}

/// Session store with lazy expiry.
///
/// Multiple concurrent sessions per user are permitted; logins on two
/// devices do not evict each other.
#[derive(Debug)]
pub struct SessionStore {
    sessions: HashMap<String, Session>,
    ttl_secs: u64,
}

impl SessionStore {
    /// Create a store with the given session lifetime.
    #[must_use]
    pub fn new(ttl_secs: u64) -> Self {
        Self { sessions: HashMap::new(), ttl_secs }
    }

    /// Create a session for a user. The caller supplies the token
    /// (generated from the environment's RNG).
    pub fn create(&mut self, user: &User, token: String, now: u64) -> Session {
        let session = Session {
            token: token.clone(),
            user_id: user.id,
            username: user.username.clone(),
            role: user.role,
            full_name: user.full_name.clone(),
            created_at: now,
            expires_at: now + self.ttl_secs,
            last_activity: now,
        };
        self.sessions.insert(token, session.clone());
        session
    }

    /// Validate a token, refreshing its last-activity time.
    ///
    /// Expired sessions are deleted on the spot and reported as
    /// [`SessionError::Expired`].
    pub fn validate(&mut self, token: &str, now: u64) -> Result<&Session, SessionError> {
        let expired = match self.sessions.get(token) {
            None => return Err(SessionError::Unknown),
            Some(session) => now > session.expires_at,
        };

        if expired {
            self.sessions.remove(token);
            return Err(SessionError::Expired);
        }

        // Entry was just checked; get_mut cannot miss.
        match self.sessions.get_mut(token) {
            Some(session) => {
                session.last_activity = now;
                Ok(session)
            },
            None => Err(SessionError::Unknown),
        }
    }

    /// Destroy a session. Idempotent; returns `false` for absent tokens.
    pub fn destroy(&mut self, token: &str) -> bool {
        self.sessions.remove(token).is_some()
    }

    /// Destroy every session belonging to a user. Returns the count removed.
    pub fn destroy_user_sessions(&mut self, user_id: i64) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, s| s.user_id != user_id);
        before - self.sessions.len()
    }

    /// Push a session's expiry to `now + hours`. Returns `false` for absent
    /// tokens.
    pub fn extend(&mut self, token: &str, hours: u64, now: u64) -> bool {
        match self.sessions.get_mut(token) {
            Some(session) => {
                session.expires_at = now + hours * 60 * 60;
                true
            },
            None => false,
        }
    }

    /// Remove all expired sessions. Returns the count removed.
    pub fn sweep_expired(&mut self, now: u64) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, s| now <= s.expires_at);
        before - self.sessions.len()
    }

    /// Number of live sessions (including any not yet lazily expired).
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// True when no sessions exist.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(DEFAULT_TTL_SECS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn student(id: i64) -> User {
        User {
            id,
            username: format!("student{id}"),
            password_hash: "$argon2$stub".to_string(),
            role: Role::Student,
            full_name: "Student".to_string(),
            email: None,
            created_at: 0,
        }
    }

    #[test]
    fn create_and_validate() {
        let mut store = SessionStore::default();
        let session = store.create(&student(1), "a".repeat(32), 1_000);

        assert_eq!(session.expires_at, 1_000 + DEFAULT_TTL_SECS);

        let validated = store.validate(&"a".repeat(32), 2_000).unwrap();
        assert_eq!(validated.user_id, 1);
        assert_eq!(validated.last_activity, 2_000);
    }

    #[test]
    fn unknown_token_rejected() {
        let mut store = SessionStore::default();
        assert_eq!(store.validate("nope", 0), Err(SessionError::Unknown));
    }

    #[test]
    fn expired_session_lazily_deleted() {
        let mut store = SessionStore::new(100);
        store.create(&student(1), "t".repeat(32), 1_000);

        // Within TTL
        assert!(store.validate(&"t".repeat(32), 1_100).is_ok());

        // Past TTL: reported expired and deleted
        assert_eq!(store.validate(&"t".repeat(32), 1_101), Err(SessionError::Expired));
        assert!(store.is_empty());

        // Second touch sees it as unknown, not expired
        assert_eq!(store.validate(&"t".repeat(32), 1_102), Err(SessionError::Unknown));
    }

    #[test]
    fn destroy_is_idempotent() {
        let mut store = SessionStore::default();
        store.create(&student(1), "x".repeat(32), 0);

        assert!(store.destroy(&"x".repeat(32)));
        assert!(!store.destroy(&"x".repeat(32)));
    }

    #[test]
    fn multiple_sessions_per_user() {
        let mut store = SessionStore::default();
        let user = student(1);
        store.create(&user, "a".repeat(32), 0);
        store.create(&user, "b".repeat(32), 0);

        assert_eq!(store.len(), 2);
        assert!(store.validate(&"a".repeat(32), 1).is_ok());
        assert!(store.validate(&"b".repeat(32), 1).is_ok());

        assert_eq!(store.destroy_user_sessions(1), 2);
        assert!(store.is_empty());
    }

    #[test]
    fn extend_pushes_expiry() {
        let mut store = SessionStore::new(100);
        store.create(&student(1), "e".repeat(32), 1_000);

        assert!(store.extend(&"e".repeat(32), 1, 1_000));

        // Would have expired at 1_100 without the extension
        assert!(store.validate(&"e".repeat(32), 2_000).is_ok());
        assert!(!store.extend("absent", 1, 0));
    }

    #[test]
    fn sweep_removes_only_expired() {
        let mut store = SessionStore::new(100);
        store.create(&student(1), "a".repeat(32), 0); // expires at 100
        store.create(&student(2), "b".repeat(32), 500); // expires at 600

        assert_eq!(store.sweep_expired(300), 1);
        assert_eq!(store.len(), 1);
        assert!(store.validate(&"b".repeat(32), 300).is_ok());
    }

    #[test]
    fn token_rendering_fills_header_field() {
        let token = token_from_bytes(&[0xAB; TOKEN_BYTES]);
        assert_eq!(token.len(), 32);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
