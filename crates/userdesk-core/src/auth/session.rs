use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::models::{Session, SessionStatus, User};
use crate::store::{DurableStore, StoreError, CREDENTIAL_KEY, USER_KEY};

use super::verify::Verifier;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Invalid login arguments: {0}")]
    InvalidArgument(String),

    #[error("Failed to persist session: {0}")]
    PersistenceWrite(#[source] StoreError),
}

/// Why startup ended unauthenticated even though something was stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recovery {
    /// Unreadable or unparsable record, or only one of the two keys present
    PersistenceCorrupt(String),
    /// Credential present but refused by the verifier
    VerificationFailed(String),
}

/// How the startup pass ended. Informational only; `initialize` never fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitOutcome {
    /// A persisted identity was verified and is now the session
    Restored,
    /// Nothing was persisted
    SignedOut,
    /// Persisted state was discarded
    Recovered(Recovery),
    /// A login or logout finished first; the verification result was dropped
    Superseded,
    /// The store was closed before verification finished
    Abandoned,
}

/// What the durable store held at startup
enum Persisted {
    Pair { user: User, credential: String },
    Empty,
    Invalid(String),
}

/// Owner of the process-wide `Session`.
///
/// The in-memory value lives in a watch channel so any number of observers
/// can `subscribe` and re-render on change. Every transition writes the
/// durable store first and publishes second, under one lock, so observers
/// never see a state the store does not hold.
pub struct SessionStore {
    store: Box<dyn DurableStore>,
    tx: watch::Sender<Session>,
    transition: Mutex<()>,
    closed: AtomicBool,
}

impl SessionStore {
    pub fn new(store: Box<dyn DurableStore>) -> Self {
        let (tx, _rx) = watch::channel(Session::initializing());
        Self {
            store,
            tx,
            transition: Mutex::new(()),
            closed: AtomicBool::new(false),
        }
    }

    /// Snapshot of the current session
    pub fn current_session(&self) -> Session {
        self.tx.borrow().clone()
    }

    /// Receive every published change. The receiver starts at the current value.
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.tx.subscribe()
    }

    /// Restore the persisted identity and settle in `Ready`.
    ///
    /// A stored pair is published right away (still `Initializing`) so the
    /// UI can show a best guess, then checked once by `verifier`. The check
    /// is the only await point. Anything missing, unreadable or refused ends
    /// in a signed-out `Ready` with the durable copies erased.
    pub async fn initialize(&self, verifier: &dyn Verifier) -> InitOutcome {
        let (user, credential) = match self.begin_initialize() {
            Ok(Some(pair)) => pair,
            Ok(None) => return self.finish_signed_out(),
            Err(outcome) => return outcome,
        };

        debug!(user_id = %user.id, "Verifying persisted credential");
        let verdict = verifier.verify(&credential, &user).await;

        let _guard = self.transition.lock();
        if self.closed.load(Ordering::Acquire) {
            debug!("Session store closed during verification, dropping result");
            return InitOutcome::Abandoned;
        }
        if self.tx.borrow().is_ready() {
            debug!("Session settled by login/logout during verification, dropping result");
            return InitOutcome::Superseded;
        }

        match verdict {
            Ok(verified) => {
                let user = self.adopt_verified(user, verified);
                info!(user_id = %user.id, backend = self.store.name(), "Session restored");
                self.publish(Session::signed_in(user, credential));
                InitOutcome::Restored
            }
            Err(e) => {
                warn!(error = %e, "Persisted credential failed verification, signing out");
                self.clear_durable();
                self.publish(Session::signed_out());
                InitOutcome::Recovered(Recovery::VerificationFailed(e.to_string()))
            }
        }
    }

    /// Synchronous half of startup: read the store and publish the
    /// optimistic value. `Ok(None)` means there is nothing to verify.
    fn begin_initialize(&self) -> Result<Option<(User, String)>, InitOutcome> {
        let _guard = self.transition.lock();
        if self.closed.load(Ordering::Acquire) {
            return Err(InitOutcome::Abandoned);
        }
        if self.tx.borrow().is_ready() {
            return Err(InitOutcome::Superseded);
        }

        match self.read_persisted() {
            Persisted::Pair { user, credential } => {
                debug!(user_id = %user.id, "Restoring persisted session optimistically");
                self.publish(Session {
                    user: Some(user.clone()),
                    credential: Some(credential.clone()),
                    status: SessionStatus::Initializing,
                });
                Ok(Some((user, credential)))
            }
            Persisted::Empty => Ok(None),
            Persisted::Invalid(reason) => {
                warn!(%reason, "Discarding unusable persisted session");
                self.clear_durable();
                self.publish(Session::signed_out());
                Err(InitOutcome::Recovered(Recovery::PersistenceCorrupt(reason)))
            }
        }
    }

    fn finish_signed_out(&self) -> InitOutcome {
        let _guard = self.transition.lock();
        if self.closed.load(Ordering::Acquire) {
            return InitOutcome::Abandoned;
        }
        if self.tx.borrow().is_ready() {
            return InitOutcome::Superseded;
        }
        debug!("No persisted session");
        self.publish(Session::signed_out());
        InitOutcome::SignedOut
    }

    /// Keep the verifier's profile when it can be persisted, otherwise
    /// stay with the cached one so memory and storage still agree.
    fn adopt_verified(&self, cached: User, verified: User) -> User {
        if verified == cached {
            return cached;
        }
        let json = match serde_json::to_string(&verified) {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "Failed to serialize verified profile");
                return cached;
            }
        };
        match self.store.set(USER_KEY, &json) {
            Ok(()) => verified,
            Err(e) => {
                warn!(error = %e, "Failed to persist refreshed profile, keeping cached one");
                cached
            }
        }
    }

    /// Record a successful authentication exchange.
    ///
    /// Both values must come from the server's login response; this makes
    /// no network call. The durable write happens before the in-memory
    /// update. If it fails, only the keys that were actually written are
    /// put back, the session is left untouched and the error is returned.
    /// If putting them back fails too, storage is cleared and the session
    /// is published signed out so the two still agree.
    pub fn login(&self, user: User, credential: &str) -> Result<(), SessionError> {
        if credential.trim().is_empty() {
            return Err(SessionError::InvalidArgument(
                "credential must not be empty".to_string(),
            ));
        }
        if !user.has_identity() {
            return Err(SessionError::InvalidArgument(
                "user profile must carry an id and email".to_string(),
            ));
        }
        let user_json = serde_json::to_string(&user)
            .map_err(|e| SessionError::InvalidArgument(e.to_string()))?;

        let _guard = self.transition.lock();
        // Unreadable reads as absent; the rollback then removes the key
        let previous = self.store.get(CREDENTIAL_KEY).ok().flatten();

        if let Err(e) = self.store.set(CREDENTIAL_KEY, credential) {
            warn!(error = %e, backend = self.store.name(), "Credential write failed, nothing to undo");
            return Err(SessionError::PersistenceWrite(e));
        }
        if let Err(e) = self.store.set(USER_KEY, &user_json) {
            warn!(error = %e, backend = self.store.name(), "Profile write failed, rolling back credential");
            self.restore_credential(previous.as_deref());
            return Err(SessionError::PersistenceWrite(e));
        }

        info!(user_id = %user.id, role = %user.role, "Logged in");
        self.publish(Session::signed_in(user, credential.to_string()));
        Ok(())
    }

    /// Forget the identity in storage and in memory. Never fails; storage
    /// errors are logged.
    pub fn logout(&self) {
        let _guard = self.transition.lock();
        self.clear_durable();
        if self.tx.borrow().user.is_some() {
            info!("Logged out");
        }
        self.publish(Session::signed_out());
    }

    /// Tear down. A verification still in flight will not touch storage or
    /// publish once this returns.
    pub fn close(&self) {
        let _guard = self.transition.lock();
        self.closed.store(true, Ordering::Release);
        debug!("Session store closed");
    }

    fn read_persisted(&self) -> Persisted {
        let credential = match self.store.get(CREDENTIAL_KEY) {
            Ok(value) => value.filter(|c| !c.trim().is_empty()),
            Err(e) => return Persisted::Invalid(format!("credential unreadable: {}", e)),
        };
        let user_json = match self.store.get(USER_KEY) {
            Ok(value) => value,
            Err(e) => return Persisted::Invalid(format!("profile unreadable: {}", e)),
        };

        match (credential, user_json) {
            (None, None) => Persisted::Empty,
            (Some(credential), Some(json)) => match serde_json::from_str::<User>(&json) {
                Ok(user) if user.has_identity() => Persisted::Pair { user, credential },
                Ok(_) => Persisted::Invalid("profile has no identity".to_string()),
                Err(e) => Persisted::Invalid(format!("profile unparsable: {}", e)),
            },
            (Some(_), None) => Persisted::Invalid("credential without profile".to_string()),
            (None, Some(_)) => Persisted::Invalid("profile without credential".to_string()),
        }
    }

    fn clear_durable(&self) {
        if let Err(e) = self.store.remove(CREDENTIAL_KEY) {
            warn!(error = %e, "Failed to remove persisted credential");
        }
        if let Err(e) = self.store.remove(USER_KEY) {
            warn!(error = %e, "Failed to remove persisted profile");
        }
    }

    /// Put the credential key back to `previous` after the profile write
    /// failed. When that fails as well, fall back to signed out in both
    /// storage and memory.
    fn restore_credential(&self, previous: Option<&str>) {
        let restored = match previous {
            Some(credential) => self.store.set(CREDENTIAL_KEY, credential),
            None => self.store.remove(CREDENTIAL_KEY),
        };
        if let Err(e) = restored {
            warn!(error = %e, "Failed to roll back credential, signing out");
            self.clear_durable();
            self.publish(Session::signed_out());
        }
    }

    /// Publish `next`, notifying observers only on an actual change
    fn publish(&self, next: Session) {
        let changed = self.tx.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
        if changed {
            debug!(status = ?self.tx.borrow().status, "Session published");
        }
    }
}
