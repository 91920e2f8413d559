//! Durable key-value persistence for the session.
//!
//! The session store mirrors two keys into durable storage so a signed-in
//! identity survives a restart:
//!
//! - `CREDENTIAL_KEY`: the opaque bearer token
//! - `USER_KEY`: the JSON-encoded user profile
//!
//! Backends:
//! - `FileStore`: a JSON file in the cache directory, rewritten atomically
//! - `KeyringStore`: one OS keychain entry per key
//! - `MemoryStore`: process-local, for tests and throwaway sessions

pub mod file;
pub mod keyring;
pub mod memory;

use thiserror::Error;

pub use self::file::FileStore;
pub use self::keyring::KeyringStore;
pub use self::memory::MemoryStore;

/// Key holding the bearer credential
pub const CREDENTIAL_KEY: &str = "token";

/// Key holding the serialized user profile
pub const USER_KEY: &str = "user";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Stored data is corrupt: {0}")]
    Corrupt(String),

    #[error("Keychain error: {0}")]
    Keychain(#[from] ::keyring::Error),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Client-local key-value storage that survives process restarts.
///
/// Every call completes its durable effect before returning. Removing a
/// key that is not present is not an error.
pub trait DurableStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    fn remove(&self, key: &str) -> Result<(), StoreError>;

    /// Short backend name for logs
    fn name(&self) -> &'static str;
}

impl<T: DurableStore + ?Sized> DurableStore for Box<T> {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        (**self).remove(key)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

impl<T: DurableStore + ?Sized> DurableStore for std::sync::Arc<T> {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        (**self).remove(key)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}
