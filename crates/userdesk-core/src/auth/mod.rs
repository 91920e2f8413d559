//! Authentication module for the client-side session lifecycle.
//!
//! This module provides:
//! - `SessionStore`: The single authoritative session, mirrored into a
//!   `DurableStore` and published to observers through a watch channel
//! - `gate`: The pure decision of what a protected view may show
//! - `Verifier`: The startup check applied to a persisted credential
//!
//! A process starts `Initializing`, restores any persisted identity
//! optimistically, verifies it once, and settles in `Ready`. Only `login`
//! and `logout` change the session after that.

pub mod gate;
pub mod session;
pub mod verify;

pub use gate::{decide, guard, Access, Decision};
pub use session::{InitOutcome, Recovery, SessionError, SessionStore};
pub use verify::{PresenceVerifier, RemoteVerifier, Verifier, VerifyError};
