use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Access level of a user account.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    /// Parse the wire/form representation. Unknown values are rejected.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "user" => Some(Role::User),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "User"),
            Role::Admin => write!(f, "Admin"),
        }
    }
}

/// A user profile as returned by the API and persisted with the session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(alias = "_id")]
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub role: Role,
}

impl User {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        email: impl Into<String>,
        role: Role,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            email: email.into(),
            role,
        }
    }

    /// A profile with no identity is what an absent user looks like once typed.
    pub fn has_identity(&self) -> bool {
        !self.id.trim().is_empty() && !self.email.trim().is_empty()
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            &self.email
        } else {
            &self.name
        }
    }
}

/// Sort column for the user list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserSortColumn {
    Name,
    Email,
    Role,
}

impl UserSortColumn {
    pub fn next(&self) -> Self {
        match self {
            UserSortColumn::Name => UserSortColumn::Email,
            UserSortColumn::Email => UserSortColumn::Role,
            UserSortColumn::Role => UserSortColumn::Name,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            UserSortColumn::Name => "name",
            UserSortColumn::Email => "email",
            UserSortColumn::Role => "role",
        }
    }
}

// ===== API payloads =====

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

/// Body of a successful `/api/v1/user/login` exchange.
/// Both fields are optional on the wire; `SessionStore::login` rejects
/// a response that is missing either.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    #[serde(rename = "accessToken", default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub user: Option<User>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UsersResponse {
    #[serde(default)]
    pub users: Vec<User>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct UserEnvelope {
    pub user: User,
}

/// Editable subset of a profile (`PUT /api/v1/user/{id}`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserUpdate {
    pub name: String,
    pub email: String,
    pub role: Role,
}

impl From<&User> for UserUpdate {
    fn from(user: &User) -> Self {
        Self {
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
        }
    }
}

/// Values of the registration form. `role` stays a string so an
/// unexpected value can be reported by validation instead of parsing.
#[derive(Debug, Clone, Default)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub role: String,
    pub image: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_accepts_server_id_alias() {
        let json = r#"{"_id":"665f1c","name":"Ann","email":"a@x.com","role":"admin","image":"u.png"}"#;
        let user: User = serde_json::from_str(json).expect("Failed to parse user JSON");
        assert_eq!(user.id, "665f1c");
        assert_eq!(user.role, Role::Admin);
    }

    #[test]
    fn test_user_role_defaults_to_user() {
        let json = r#"{"id":"1","name":"Ann","email":"a@x.com"}"#;
        let user: User = serde_json::from_str(json).expect("Failed to parse user JSON");
        assert_eq!(user.role, Role::User);
    }

    #[test]
    fn test_user_serializes_with_plain_id() {
        let user = User::new("1", "Ann", "a@x.com", Role::User);
        let json = serde_json::to_string(&user).expect("Failed to serialize user");
        assert_eq!(json, r#"{"id":"1","name":"Ann","email":"a@x.com","role":"user"}"#);
    }

    #[test]
    fn test_role_parse() {
        assert_eq!(Role::parse("user"), Some(Role::User));
        assert_eq!(Role::parse(" admin "), Some(Role::Admin));
        assert_eq!(Role::parse("root"), None);
        assert_eq!(Role::parse(""), None);
    }

    #[test]
    fn test_has_identity() {
        assert!(User::new("1", "Ann", "a@x.com", Role::User).has_identity());
        assert!(!User::default().has_identity());
        assert!(!User::new("  ", "Ann", "a@x.com", Role::User).has_identity());
    }

    #[test]
    fn test_login_response_missing_fields() {
        let resp: LoginResponse = serde_json::from_str(r#"{"message":"ok"}"#)
            .expect("Failed to parse login response");
        assert!(resp.access_token.is_none());
        assert!(resp.user.is_none());
    }

    #[test]
    fn test_display_name_falls_back_to_email() {
        let user = User::new("1", "", "a@x.com", Role::User);
        assert_eq!(user.display_name(), "a@x.com");
    }
}
