//! Data models for the user directory.
//!
//! This module contains the data structures shared by the session store,
//! the API client and the terminal UI:
//!
//! - `User`, `Role`: The profile record owned by an authenticated session
//! - `Session`, `SessionStatus`: The authenticated identity and its lifecycle
//! - Request/response payloads for the `/api/v1/user` endpoints

pub mod session;
pub mod user;

pub use session::{Session, SessionStatus};
pub use user::{LoginRequest, LoginResponse, Registration, Role, User, UserSortColumn, UserUpdate, UsersResponse};
