//! End-to-end session lifecycle against an on-disk store.
//!
//! A "reload" is a fresh `SessionStore` over the same cache directory.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Notify;

use userdesk_core::auth::{decide, guard, Access, Decision, PresenceVerifier, Recovery, VerifyError};
use userdesk_core::store::{DurableStore, FileStore, CREDENTIAL_KEY, USER_KEY};
use userdesk_core::{InitOutcome, Role, Session, SessionError, SessionStatus, SessionStore, User, Verifier};

fn ann() -> User {
    User::new("1", "Ann", "a@x.com", Role::User)
}

fn open(dir: &Path) -> SessionStore {
    SessionStore::new(Box::new(FileStore::new(dir.to_path_buf())))
}

async fn reload(dir: &Path) -> SessionStore {
    let store = open(dir);
    store.initialize(&PresenceVerifier).await;
    store
}

fn assert_consistent(session: &Session) {
    assert_eq!(session.user.is_some(), session.credential.is_some());
}

/// Holds verification until released, so tests can observe `Initializing`
struct GatedVerifier {
    release: Arc<Notify>,
    accept: bool,
}

#[async_trait]
impl Verifier for GatedVerifier {
    async fn verify(&self, _credential: &str, cached: &User) -> Result<User, VerifyError> {
        self.release.notified().await;
        if self.accept {
            Ok(cached.clone())
        } else {
            Err(VerifyError::Rejected("revoked".to_string()))
        }
    }
}

fn seed(dir: &Path, credential: Option<&str>, user: Option<&str>) {
    let store = FileStore::new(dir.to_path_buf());
    if let Some(c) = credential {
        store.set(CREDENTIAL_KEY, c).unwrap();
    }
    if let Some(u) = user {
        store.set(USER_KEY, u).unwrap();
    }
}

#[tokio::test]
async fn test_empty_store_ends_denied() {
    let dir = tempfile::tempdir().unwrap();
    let store = open(dir.path());

    let outcome = store.initialize(&PresenceVerifier).await;

    assert_eq!(outcome, InitOutcome::SignedOut);
    let session = store.current_session();
    assert_eq!(session, Session::signed_out());
    assert_eq!(decide(&session), Decision::Denied);
}

#[tokio::test]
async fn test_persisted_pair_is_restored_and_granted() {
    let dir = tempfile::tempdir().unwrap();
    seed(
        dir.path(),
        Some("tok123"),
        Some(r#"{"id":"1","name":"Ann","email":"a@x.com","role":"user"}"#),
    );

    let store = reload(dir.path()).await;

    let session = store.current_session();
    assert_eq!(session, Session::signed_in(ann(), "tok123".to_string()));
    assert_eq!(guard(&session, || "protected"), Access::Granted("protected"));
}

#[tokio::test]
async fn test_half_state_is_cleared() {
    let dir = tempfile::tempdir().unwrap();
    seed(
        dir.path(),
        None,
        Some(r#"{"id":"1","name":"Ann","email":"a@x.com","role":"user"}"#),
    );

    let store = open(dir.path());
    let outcome = store.initialize(&PresenceVerifier).await;

    assert!(matches!(outcome, InitOutcome::Recovered(Recovery::PersistenceCorrupt(_))));
    assert_eq!(store.current_session(), Session::signed_out());
    let files = FileStore::new(dir.path().to_path_buf());
    assert_eq!(files.get(USER_KEY).unwrap(), None);
    assert_eq!(files.get(CREDENTIAL_KEY).unwrap(), None);
}

#[tokio::test]
async fn test_corrupt_file_is_treated_as_absent() {
    let dir = tempfile::tempdir().unwrap();
    let files = FileStore::new(dir.path().to_path_buf());
    std::fs::write(files.path(), "{{{{").unwrap();

    let store = open(dir.path());
    let outcome = store.initialize(&PresenceVerifier).await;

    assert!(matches!(outcome, InitOutcome::Recovered(Recovery::PersistenceCorrupt(_))));
    assert_eq!(store.current_session(), Session::signed_out());
    assert!(!files.path().exists());
}

#[tokio::test]
async fn test_login_with_blank_profile_is_rejected_and_session_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let store = reload(dir.path()).await;
    let before = store.current_session();

    let result = store.login(User::default(), "tok");

    assert!(matches!(result, Err(SessionError::InvalidArgument(_))));
    assert_eq!(store.current_session(), before);
    assert_eq!(FileStore::new(dir.path().to_path_buf()).get(CREDENTIAL_KEY).unwrap(), None);
}

#[tokio::test]
async fn test_login_survives_reload() {
    let dir = tempfile::tempdir().unwrap();
    let store = reload(dir.path()).await;
    store.login(ann(), "tok123").unwrap();
    drop(store);

    let reloaded = reload(dir.path()).await;
    assert_eq!(
        reloaded.current_session(),
        Session::signed_in(ann(), "tok123".to_string())
    );
}

#[tokio::test]
async fn test_login_twice_matches_login_once() {
    let dir_once = tempfile::tempdir().unwrap();
    let dir_twice = tempfile::tempdir().unwrap();

    let once = reload(dir_once.path()).await;
    once.login(ann(), "tok123").unwrap();

    let twice = reload(dir_twice.path()).await;
    twice.login(ann(), "tok123").unwrap();
    twice.login(ann(), "tok123").unwrap();

    assert_eq!(once.current_session(), twice.current_session());
}

#[tokio::test]
async fn test_logout_survives_reload() {
    let dir = tempfile::tempdir().unwrap();
    let store = reload(dir.path()).await;
    store.login(ann(), "tok123").unwrap();
    store.logout();
    drop(store);

    let reloaded = reload(dir.path()).await;
    assert_eq!(reloaded.current_session(), Session::signed_out());
}

#[tokio::test]
async fn test_optimistic_user_is_visible_but_still_loading() {
    let dir = tempfile::tempdir().unwrap();
    seed(
        dir.path(),
        Some("tok123"),
        Some(r#"{"id":"1","name":"Ann","email":"a@x.com","role":"user"}"#),
    );
    let store = Arc::new(open(dir.path()));
    let mut rx = store.subscribe();
    let release = Arc::new(Notify::new());

    let task = {
        let store = Arc::clone(&store);
        let verifier = GatedVerifier { release: Arc::clone(&release), accept: true };
        tokio::spawn(async move { store.initialize(&verifier).await })
    };

    // First published change is the optimistic guess
    rx.changed().await.unwrap();
    let optimistic = rx.borrow_and_update().clone();
    assert_eq!(optimistic.status, SessionStatus::Initializing);
    assert_eq!(optimistic.user, Some(ann()));
    assert_consistent(&optimistic);
    assert_eq!(decide(&optimistic), Decision::Loading);

    release.notify_one();
    assert_eq!(task.await.unwrap(), InitOutcome::Restored);
    assert_eq!(decide(&store.current_session()), Decision::Granted);
}

#[tokio::test]
async fn test_revoked_credential_clears_after_optimistic_guess() {
    let dir = tempfile::tempdir().unwrap();
    seed(
        dir.path(),
        Some("tok123"),
        Some(r#"{"id":"1","name":"Ann","email":"a@x.com","role":"user"}"#),
    );
    let store = Arc::new(open(dir.path()));
    let release = Arc::new(Notify::new());
    let task = {
        let store = Arc::clone(&store);
        let verifier = GatedVerifier { release: Arc::clone(&release), accept: false };
        tokio::spawn(async move { store.initialize(&verifier).await })
    };

    release.notify_one();
    let outcome = task.await.unwrap();

    assert!(matches!(outcome, InitOutcome::Recovered(Recovery::VerificationFailed(_))));
    assert_eq!(store.current_session(), Session::signed_out());
    assert!(!FileStore::new(dir.path().to_path_buf()).path().exists());
}

#[tokio::test]
async fn test_logout_during_verification_wins() {
    let dir = tempfile::tempdir().unwrap();
    seed(
        dir.path(),
        Some("tok123"),
        Some(r#"{"id":"1","name":"Ann","email":"a@x.com","role":"user"}"#),
    );
    let store = Arc::new(open(dir.path()));
    let mut rx = store.subscribe();
    let release = Arc::new(Notify::new());
    let task = {
        let store = Arc::clone(&store);
        let verifier = GatedVerifier { release: Arc::clone(&release), accept: true };
        tokio::spawn(async move { store.initialize(&verifier).await })
    };

    // Wait for the optimistic publish, then log out before verification ends
    rx.changed().await.unwrap();
    store.logout();
    release.notify_one();

    assert_eq!(task.await.unwrap(), InitOutcome::Superseded);
    assert_eq!(store.current_session(), Session::signed_out());
}

#[tokio::test]
async fn test_every_published_state_is_consistent() {
    let dir = tempfile::tempdir().unwrap();
    let store = open(dir.path());
    let mut rx = store.subscribe();
    let mut seen = vec![rx.borrow().clone()];

    store.initialize(&PresenceVerifier).await;
    seen.push(rx.borrow_and_update().clone());
    store.login(ann(), "tok123").unwrap();
    seen.push(rx.borrow_and_update().clone());
    store.logout();
    seen.push(rx.borrow_and_update().clone());

    for session in &seen {
        assert_consistent(session);
    }
    assert_eq!(seen.last(), Some(&Session::signed_out()));
}
