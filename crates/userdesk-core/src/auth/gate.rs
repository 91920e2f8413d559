//! Access decision for protected views.
//!
//! | status       | user    | decision |
//! |--------------|---------|----------|
//! | Initializing | any     | Loading  |
//! | Ready        | absent  | Denied   |
//! | Ready        | present | Granted  |
//!
//! Nothing else is consulted. The gate does not retry or time out; if the
//! session never leaves `Initializing` the answer stays `Loading`.

use crate::models::{Session, SessionStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Loading,
    Denied,
    Granted,
}

/// Outcome of guarding a protected subtree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access<T> {
    Loading,
    Denied,
    Granted(T),
}

impl<T> Access<T> {
    pub fn decision(&self) -> Decision {
        match self {
            Access::Loading => Decision::Loading,
            Access::Denied => Decision::Denied,
            Access::Granted(_) => Decision::Granted,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Access<U> {
        match self {
            Access::Loading => Access::Loading,
            Access::Denied => Access::Denied,
            Access::Granted(children) => Access::Granted(f(children)),
        }
    }
}

pub fn decide(session: &Session) -> Decision {
    match (session.status, session.user.is_some()) {
        (SessionStatus::Initializing, _) => Decision::Loading,
        (SessionStatus::Ready, false) => Decision::Denied,
        (SessionStatus::Ready, true) => Decision::Granted,
    }
}

/// Build the protected content only when access is granted.
pub fn guard<T>(session: &Session, children: impl FnOnce() -> T) -> Access<T> {
    match decide(session) {
        Decision::Loading => Access::Loading,
        Decision::Denied => Access::Denied,
        Decision::Granted => Access::Granted(children()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Role, User};

    fn ann() -> User {
        User::new("1", "Ann", "a@x.com", Role::User)
    }

    #[test]
    fn test_initializing_is_loading_even_with_user() {
        let optimistic = Session {
            user: Some(ann()),
            credential: Some("tok".to_string()),
            status: SessionStatus::Initializing,
        };
        assert_eq!(decide(&optimistic), Decision::Loading);
        assert_eq!(decide(&Session::initializing()), Decision::Loading);
    }

    #[test]
    fn test_ready_without_user_is_denied() {
        assert_eq!(decide(&Session::signed_out()), Decision::Denied);
    }

    #[test]
    fn test_ready_with_user_is_granted() {
        let session = Session::signed_in(ann(), "tok".to_string());
        assert_eq!(guard(&session, || "users"), Access::Granted("users"));
    }

    #[test]
    fn test_children_not_built_unless_granted() {
        let mut built = false;
        let access = guard(&Session::initializing(), || built = true);
        assert_eq!(access.decision(), Decision::Loading);
        assert!(!built);

        let access = guard(&Session::signed_out(), || built = true);
        assert_eq!(access.decision(), Decision::Denied);
        assert!(!built);
    }

    #[test]
    fn test_access_map() {
        let session = Session::signed_in(ann(), "tok".to_string());
        let access = guard(&session, || 2).map(|n| n * 21);
        assert_eq!(access, Access::Granted(42));
        assert!(Access::<()>::Denied.map(|_| 1).decision() == Decision::Denied);
    }
}
