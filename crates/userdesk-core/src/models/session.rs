use serde::{Deserialize, Serialize};

use super::User;

/// Lifecycle phase of the session.
///
/// `Initializing` only exists between process start and the end of the
/// startup verification pass. Login and logout move straight to `Ready`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    Initializing,
    Ready,
}

/// The authenticated identity. `user` and `credential` are either both
/// present or both absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user: Option<User>,
    pub credential: Option<String>,
    pub status: SessionStatus,
}

impl Session {
    /// The value every process starts with, before anything has been read.
    pub fn initializing() -> Self {
        Self {
            user: None,
            credential: None,
            status: SessionStatus::Initializing,
        }
    }

    /// Ready and unauthenticated
    pub fn signed_out() -> Self {
        Self {
            user: None,
            credential: None,
            status: SessionStatus::Ready,
        }
    }

    pub fn signed_in(user: User, credential: String) -> Self {
        Self {
            user: Some(user),
            credential: Some(credential),
            status: SessionStatus::Ready,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.status == SessionStatus::Ready
    }

    /// Settled and holding a full identity
    pub fn is_authenticated(&self) -> bool {
        self.is_ready() && self.user.is_some() && self.credential.is_some()
    }

    /// Get the bearer token if one is held
    pub fn token(&self) -> Option<&str> {
        self.credential.as_deref()
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::initializing()
    }
}
