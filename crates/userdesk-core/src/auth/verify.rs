use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::api::{ApiClient, ApiError};
use crate::models::User;

#[derive(Error, Debug)]
pub enum VerifyError {
    #[error("Credential rejected: {0}")]
    Rejected(String),

    #[error("Verification request failed: {0}")]
    Api(#[from] ApiError),
}

/// Confirms that a persisted credential may still be trusted.
///
/// On success the returned profile becomes the session's user; it may be
/// fresher than the cached one. Any error clears the session.
#[async_trait]
pub trait Verifier: Send + Sync {
    async fn verify(&self, credential: &str, cached: &User) -> Result<User, VerifyError>;
}

/// Local check only: a non-blank credential next to a well-formed profile
/// is accepted as is.
#[derive(Debug, Clone, Copy, Default)]
pub struct PresenceVerifier;

#[async_trait]
impl Verifier for PresenceVerifier {
    async fn verify(&self, credential: &str, cached: &User) -> Result<User, VerifyError> {
        if credential.trim().is_empty() {
            return Err(VerifyError::Rejected("credential is blank".to_string()));
        }
        if !cached.has_identity() {
            return Err(VerifyError::Rejected("cached profile has no identity".to_string()));
        }
        Ok(cached.clone())
    }
}

/// Round-trips the credential to the API. The server's profile replaces the
/// cached one as long as it belongs to the same user.
#[derive(Clone)]
pub struct RemoteVerifier {
    api: ApiClient,
}

impl RemoteVerifier {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

/// Accept the server's view of the profile if it is the cached user
fn check_profile(cached: &User, server: User) -> Result<User, VerifyError> {
    if !server.has_identity() {
        return Err(VerifyError::Rejected("server profile has no identity".to_string()));
    }
    if server.id != cached.id {
        debug!(cached = %cached.id, server = %server.id, "Server profile differs from cached id");
        return Err(VerifyError::Rejected("credential belongs to a different user".to_string()));
    }
    Ok(server)
}

#[async_trait]
impl Verifier for RemoteVerifier {
    async fn verify(&self, credential: &str, cached: &User) -> Result<User, VerifyError> {
        let user = self
            .api
            .with_token(credential.to_string())
            .current_user()
            .await?;
        check_profile(cached, user)
    }
}
