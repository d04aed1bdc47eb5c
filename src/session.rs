use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, SystemTime};
use uuid::Uuid;

use crate::role::Role;

/// Name of the cookie carrying the session id
pub const SESSION_COOKIE: &str = "session";

/// State of one browser session
///
/// A fresh session is logged out with an empty username. Only a
/// successful login or a logout changes it.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    /// Whether the login form has been passed
    pub logged_in: bool,

    /// Normalized username for main users, username digest for admins
    pub username: String,

    /// Admin users see every account and may upload
    pub is_admin: bool,

    /// Time after which the session reads as logged out
    pub expires_at: SystemTime,
}

impl Session {
    fn empty(lifetime: Duration) -> Self {
        Session {
            logged_in: false,
            username: String::new(),
            is_admin: false,
            expires_at: SystemTime::now() + lifetime,
        }
    }

    /// Role of a logged-in session, `None` when logged out
    pub fn role(&self) -> Option<Role> {
        if !self.logged_in {
            None
        } else if self.is_admin {
            Some(Role::Admin)
        } else {
            Some(Role::Main)
        }
    }
}

/// Fields to merge into a session; `None` leaves a field untouched
#[derive(Debug, Clone, Default)]
pub struct SessionUpdate {
    pub logged_in: Option<bool>,
    pub username: Option<String>,
    pub is_admin: Option<bool>,
}

/// All live sessions, keyed by session id
///
/// Owned by the application state and passed to handlers explicitly.
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Session>>,
    lifetime: Duration,
}

impl SessionStore {
    pub fn new(lifetime: Duration) -> Self {
        SessionStore {
            sessions: RwLock::new(HashMap::new()),
            lifetime,
        }
    }

    /// Create an empty session and return its id
    pub fn start(&self) -> String {
        let id = Uuid::new_v4().to_string();
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        sessions.insert(id.clone(), Session::empty(self.lifetime));
        id
    }

    /// Current state of a session
    ///
    /// Unknown and expired ids read as a fresh, logged-out session.
    pub fn get(&self, id: &str) -> Session {
        let sessions = self.sessions.read().unwrap_or_else(|e| e.into_inner());
        match sessions.get(id) {
            Some(session) if session.expires_at > SystemTime::now() => session.clone(),
            _ => Session::empty(self.lifetime),
        }
    }

    /// Merge `fields` into the session, creating it if needed
    pub fn update(&self, id: &str, fields: SessionUpdate) -> Session {
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        let now = SystemTime::now();
        let session = sessions
            .entry(id.to_string())
            .or_insert_with(|| Session::empty(self.lifetime));
        if session.expires_at <= now {
            *session = Session::empty(self.lifetime);
        }

        if let Some(logged_in) = fields.logged_in {
            session.logged_in = logged_in;
        }
        if let Some(username) = fields.username {
            session.username = username;
        }
        if let Some(is_admin) = fields.is_admin {
            session.is_admin = is_admin;
        }
        session.clone()
    }

    /// Drop a session; later reads see the initial values
    pub fn reset(&self, id: &str) {
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        sessions.remove(id);
    }

    /// Remove expired sessions
    pub fn purge_expired(&self) -> usize {
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        let now = SystemTime::now();
        let before = sessions.len();
        sessions.retain(|_, session| session.expires_at > now);
        before - sessions.len()
    }
}
