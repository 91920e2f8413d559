//! REST API client module for the user directory service.
//!
//! This module provides the `ApiClient` for logging in and for listing,
//! registering, editing and deleting users.
//!
//! Requests carry the session's opaque bearer token. The client never
//! stores a token on its own; callers hand it the current credential.

pub mod client;
pub mod error;

pub use client::ApiClient;
pub use error::ApiError;
