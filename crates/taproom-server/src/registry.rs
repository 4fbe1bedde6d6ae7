//! Connection registry for session and room subscription tracking.
//!
//! The registry maintains bidirectional mappings: room → sessions (for
//! status broadcasts) and session → rooms (for cleanup on disconnect), plus
//! a user → sessions reverse index. Unlike the session store, which tracks
//! login tokens, this tracks live connections.
//!
//! One user may hold several live connections (two devices, reconnect
//! races), so the reverse index maps to a set.

use std::collections::{HashMap, HashSet};

use taproom_proto::payloads::auth::Role;

/// Information about a registered connection.
#[derive(Debug, Clone, Default)]
pub struct SessionInfo {
    /// User id, set after login
    pub user_id: Option<i64>,
    /// Role, set after login
    pub role: Option<Role>,
    /// Unix seconds of the most recent frame from this connection
    pub last_activity: u64,
}

impl SessionInfo {
    /// Create a new unauthenticated session info.
    #[must_use]
    pub fn new(now: u64) -> Self {
        Self { user_id: None, role: None, last_activity: now }
    }

    /// Create an authenticated session info.
    #[must_use]
    pub fn authenticated(user_id: i64, role: Role, now: u64) -> Self {
        Self { user_id: Some(user_id), role: Some(role), last_activity: now }
    }
}

/// Registry for tracking connections and room subscriptions.
///
/// Maintains bidirectional mappings for efficient lookups:
/// - All sessions in a room (for `RoomStatus` broadcasts)
/// - All rooms a session is in (for cleanup on disconnect)
/// - All sessions for a user (multiple devices permitted)
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    /// Session id → connection info
    sessions: HashMap<u64, SessionInfo>,
    /// Room id → set of subscribed session ids
    room_subscriptions: HashMap<i64, HashSet<u64>>,
    /// Session id → set of subscribed room ids
    session_rooms: HashMap<u64, HashSet<i64>>,
    /// User id → set of session ids (reverse index)
    user_sessions: HashMap<i64, HashSet<u64>>,
}

impl ConnectionRegistry {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new connection. Returns `false` if the session id is
    /// already registered.
    pub fn register_session(&mut self, session_id: u64, info: SessionInfo) -> bool {
        if self.sessions.contains_key(&session_id) {
            return false;
        }

        if let Some(user_id) = info.user_id {
            self.user_sessions.entry(user_id).or_default().insert(session_id);
        }

        self.sessions.insert(session_id, info);
        self.session_rooms.insert(session_id, HashSet::new());
        true
    }

    /// Unregister a connection and remove all its room subscriptions.
    ///
    /// Returns the session info if it existed, along with the rooms it was
    /// subscribed to.
    pub fn unregister_session(&mut self, session_id: u64) -> Option<(SessionInfo, HashSet<i64>)> {
        let info = self.sessions.remove(&session_id)?;
        let rooms = self.session_rooms.remove(&session_id).unwrap_or_default();

        if let Some(user_id) = info.user_id {
            if let Some(set) = self.user_sessions.get_mut(&user_id) {
                set.remove(&session_id);
                if set.is_empty() {
                    self.user_sessions.remove(&user_id);
                }
            }
        }

        for room_id in &rooms {
            if let Some(subscribers) = self.room_subscriptions.get_mut(room_id) {
                subscribers.remove(&session_id);
                if subscribers.is_empty() {
                    self.room_subscriptions.remove(room_id);
                }
            }
        }

        Some((info, rooms))
    }

    /// Connection metadata. `None` if the session doesn't exist.
    #[must_use]
    pub fn session(&self, session_id: u64) -> Option<&SessionInfo> {
        self.sessions.get(&session_id)
    }

    /// Check if a session is registered.
    #[must_use]
    pub fn has_session(&self, session_id: u64) -> bool {
        self.sessions.contains_key(&session_id)
    }

    /// Record user identity for a connection after login, maintaining the
    /// reverse index. Returns `false` if the session doesn't exist.
    pub fn authenticate_session(&mut self, session_id: u64, user_id: i64, role: Role) -> bool {
        let Some(info) = self.sessions.get_mut(&session_id) else {
            return false;
        };

        if let Some(old_user_id) = info.user_id {
            if let Some(set) = self.user_sessions.get_mut(&old_user_id) {
                set.remove(&session_id);
                if set.is_empty() {
                    self.user_sessions.remove(&old_user_id);
                }
            }
        }

        info.user_id = Some(user_id);
        info.role = Some(role);
        self.user_sessions.entry(user_id).or_default().insert(session_id);
        true
    }

    /// Refresh a connection's last-activity time. Returns `false` if the
    /// session doesn't exist.
    pub fn touch(&mut self, session_id: u64, now: u64) -> bool {
        match self.sessions.get_mut(&session_id) {
            Some(info) => {
                info.last_activity = now;
                true
            },
            None => false,
        }
    }

    /// Subscribe a session to a room. Returns `false` if the session is not
    /// registered.
    pub fn subscribe(&mut self, session_id: u64, room_id: i64) -> bool {
        if !self.sessions.contains_key(&session_id) {
            return false;
        }

        self.room_subscriptions.entry(room_id).or_default().insert(session_id);
        self.session_rooms.entry(session_id).or_default().insert(room_id);
        true
    }

    /// Unsubscribe a session from a room. Returns `true` if the session was
    /// subscribed.
    pub fn unsubscribe(&mut self, session_id: u64, room_id: i64) -> bool {
        let removed_from_room =
            self.room_subscriptions.get_mut(&room_id).is_some_and(|s| s.remove(&session_id));

        let removed_from_session =
            self.session_rooms.get_mut(&session_id).is_some_and(|r| r.remove(&room_id));

        if self.room_subscriptions.get(&room_id).is_some_and(HashSet::is_empty) {
            self.room_subscriptions.remove(&room_id);
        }

        removed_from_room && removed_from_session
    }

    /// Check if a session is subscribed to a room.
    #[must_use]
    pub fn is_subscribed(&self, session_id: u64, room_id: i64) -> bool {
        self.room_subscriptions.get(&room_id).is_some_and(|s| s.contains(&session_id))
    }

    /// All sessions subscribed to a room.
    pub fn sessions_in_room(&self, room_id: i64) -> impl Iterator<Item = u64> + '_ {
        self.room_subscriptions.get(&room_id).into_iter().flat_map(|s| s.iter().copied())
    }

    /// All rooms a session is subscribed to.
    pub fn rooms_for_session(&self, session_id: u64) -> impl Iterator<Item = i64> + '_ {
        self.session_rooms.get(&session_id).into_iter().flat_map(|r| r.iter().copied())
    }

    /// All live sessions for a user.
    pub fn sessions_for_user(&self, user_id: i64) -> impl Iterator<Item = u64> + '_ {
        self.user_sessions.get(&user_id).into_iter().flat_map(|s| s.iter().copied())
    }

    /// Total number of registered connections.
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Number of sessions subscribed to a room.
    #[must_use]
    pub fn room_session_count(&self, room_id: i64) -> usize {
        self.room_subscriptions.get(&room_id).map_or(0, HashSet::len)
    }
}
