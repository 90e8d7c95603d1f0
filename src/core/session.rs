//! Authentication state of the current user.
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Agent,
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Admin => write!(f, "admin"),
            Role::Agent => write!(f, "agent"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(deserialize_with = "crate::core::model::deserialize_id")]
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    pub role: Role,
    #[serde(default, alias = "firstName")]
    pub first_name: Option<String>,
    #[serde(default, alias = "lastName")]
    pub last_name: Option<String>,
    #[serde(default = "default_active", alias = "isActive")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl User {
    pub fn display_name(&self) -> String {
        match (&self.first_name, &self.last_name) {
            (Some(first), Some(last)) => format!("{first} {last}"),
            (Some(first), None) => first.clone(),
            _ => self.username.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Anonymous,
    Authenticating { username: String },
    Authenticated(User),
}

/// Session owned by the running command and passed to whatever needs it.
/// State only changes through the transition methods below.
#[derive(Debug, Clone)]
pub struct Session {
    state: SessionState,
    last_username: Option<String>,
    last_error: Option<String>,
}

impl Default for Session {
    fn default() -> Self {
        Self::anonymous()
    }
}

impl Session {
    pub fn anonymous() -> Self {
        Session {
            state: SessionState::Anonymous,
            last_username: None,
            last_error: None,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn user(&self) -> Option<&User> {
        match &self.state {
            SessionState::Authenticated(user) => Some(user),
            _ => None,
        }
    }

    pub fn role(&self) -> Option<Role> {
        self.user().map(|u| u.role)
    }

    pub fn is_authenticated(&self) -> bool {
        self.user().is_some()
    }

    /// Username of the latest login attempt, kept after a failure.
    pub fn last_username(&self) -> Option<&str> {
        self.last_username.as_deref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn begin_login(&mut self, username: &str) {
        debug!(%username, "Session: authenticating");
        self.last_username = Some(username.to_string());
        self.last_error = None;
        self.state = SessionState::Authenticating {
            username: username.to_string(),
        };
    }

    /// Also used to resume a session from stored tokens.
    pub fn login_succeeded(&mut self, user: User) {
        debug!(username = %user.username, role = %user.role, "Session: authenticated");
        self.last_username = Some(user.username.clone());
        self.last_error = None;
        self.state = SessionState::Authenticated(user);
    }

    pub fn login_failed(&mut self, error: impl Into<String>) {
        let error = error.into();
        debug!(%error, "Session: login failed");
        self.last_error = Some(error);
        self.state = SessionState::Anonymous;
    }

    /// Access could not be renewed after a 401.
    pub fn token_expired(&mut self) {
        debug!("Session: token expired");
        self.last_error = Some("Session expired".to_string());
        self.state = SessionState::Anonymous;
    }

    pub fn logout(&mut self) {
        debug!("Session: logged out");
        self.last_error = None;
        self.state = SessionState::Anonymous;
    }
}
