//! Core library for userdesk.
//!
//! - `auth`: The session lifecycle (`SessionStore`) and the access gate
//! - `store`: Durable key-value backends the session is mirrored into
//! - `api`: Client for the `/api/v1/user` REST endpoints
//! - `validation`: Login, registration and edit form rules
//! - `config`: User configuration and backend selection

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod store;
pub mod utils;
pub mod validation;

pub use api::{ApiClient, ApiError};
pub use auth::{Access, Decision, InitOutcome, SessionError, SessionStore, Verifier};
pub use config::Config;
pub use models::{Role, Session, SessionStatus, User};
