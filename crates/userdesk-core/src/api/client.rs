//! API client for the user directory REST service.
//!
//! This module provides the `ApiClient` struct for the login exchange and
//! the authenticated user CRUD endpoints under `/api/v1/user`.

use std::time::Duration;

use reqwest::{header, multipart, Client, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Deserialize};
use tracing::{debug, warn};

use crate::models::{LoginRequest, LoginResponse, Registration, User, UserUpdate, UsersResponse};
use crate::models::user::UserEnvelope;
use crate::validation::image_mime;

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// Default service location for local development
pub const DEFAULT_BASE_URL: &str = "http://localhost:4000";

/// HTTP request timeout in seconds.
/// 30s allows for slow API responses while failing fast enough for good UX.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

const LOGIN_PATH: &str = "/api/v1/user/login";
const ME_PATH: &str = "/api/v1/user/me";
const ALL_USERS_PATH: &str = "/api/v1/user/all";
const NEW_USER_PATH: &str = "/api/v1/user/new";
const USER_PATH: &str = "/api/v1/user";

/// `/me` answers either `{ "user": {...} }` or the bare profile
#[derive(Deserialize)]
#[serde(untagged)]
enum ProfileBody {
    Wrapped(UserEnvelope),
    Bare(User),
}

/// API client for the user service.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    /// Create a new ApiClient with the given token, sharing the connection pool.
    pub fn with_token(&self, token: String) -> Self {
        Self {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            token: Some(token),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        let builder = builder.header(header::ACCEPT, "application/json");
        match self.token {
            Some(ref token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: Response) -> Result<Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    /// Send a request built by `build`, backing off and retrying on 429.
    async fn send(&self, build: impl Fn() -> RequestBuilder) -> Result<Response, ApiError> {
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let response = self.authorized(build()).send().await?;
            if response.status() != reqwest::StatusCode::TOO_MANY_REQUESTS {
                return Self::check_response(response).await;
            }

            retries += 1;
            if retries > MAX_RATE_LIMIT_RETRIES {
                return Err(ApiError::RateLimited);
            }
            warn!(retry = retries, backoff_ms, "Rate limited, backing off");
            tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
            backoff_ms *= 2;
        }
    }

    async fn parse<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| ApiError::InvalidResponse(e.to_string()))
    }

    // ===== Authentication =====

    /// Exchange email + password for a bearer token and profile.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ApiError> {
        let url = self.endpoint(LOGIN_PATH);
        let body = LoginRequest { email, password };
        debug!(%url, "Sending login request");

        let response = self.send(|| self.client.post(&url).json(&body)).await?;
        Self::parse(response).await
    }

    /// Profile that belongs to the current token
    pub async fn current_user(&self) -> Result<User, ApiError> {
        let url = self.endpoint(ME_PATH);
        let response = self.send(|| self.client.get(&url)).await?;
        match Self::parse::<ProfileBody>(response).await? {
            ProfileBody::Wrapped(envelope) => Ok(envelope.user),
            ProfileBody::Bare(user) => Ok(user),
        }
    }

    // ===== Users =====

    pub async fn list_users(&self) -> Result<Vec<User>, ApiError> {
        let url = self.endpoint(ALL_USERS_PATH);
        let response = self.send(|| self.client.get(&url)).await?;
        let parsed: UsersResponse = Self::parse(response).await?;
        debug!(count = parsed.users.len(), "Fetched users");
        Ok(parsed.users)
    }

    /// Register a user with a profile image (multipart upload).
    /// The name is trimmed and the email lowercased before sending.
    pub async fn register_user(&self, form: &Registration) -> Result<(), ApiError> {
        let url = self.endpoint(NEW_USER_PATH);

        let mut upload = multipart::Form::new()
            .text("name", form.name.trim().to_string())
            .text("email", form.email.trim().to_lowercase())
            .text("password", form.password.clone())
            .text("role", form.role.trim().to_string());

        if let Some(ref path) = form.image {
            let bytes = std::fs::read(path).map_err(|e| {
                ApiError::InvalidRequest(format!("Failed to read {}: {}", path.display(), e))
            })?;
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "image".to_string());
            let mime = image_mime(path).unwrap_or_else(|| "application/octet-stream".to_string());
            let part = multipart::Part::bytes(bytes)
                .file_name(file_name)
                .mime_str(&mime)?;
            upload = upload.part("image", part);
        }

        // Multipart bodies are consumed on send, so no retry here
        let response = self
            .authorized(self.client.post(&url))
            .multipart(upload)
            .send()
            .await?;
        Self::check_response(response).await?;
        debug!(email = %form.email, "User registered");
        Ok(())
    }

    pub async fn update_user(&self, id: &str, update: &UserUpdate) -> Result<(), ApiError> {
        let url = self.endpoint(&format!("{}/{}", USER_PATH, id));
        self.send(|| self.client.put(&url).json(update)).await?;
        debug!(user_id = id, "User updated");
        Ok(())
    }

    pub async fn delete_user(&self, id: &str) -> Result<(), ApiError> {
        let url = self.endpoint(&format!("{}/{}", USER_PATH, id));
        self.send(|| self.client.delete(&url)).await?;
        debug!(user_id = id, "User deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    #[test]
    fn test_endpoint_joins_without_double_slash() {
        let api = ApiClient::new("http://localhost:4000/").unwrap();
        assert_eq!(api.endpoint(LOGIN_PATH), "http://localhost:4000/api/v1/user/login");
    }

    #[test]
    fn test_with_token_keeps_base_url() {
        let api = ApiClient::new("http://api.test").unwrap();
        assert!(!api.has_token());
        let authed = api.with_token("tok".to_string());
        assert!(authed.has_token());
        assert_eq!(authed.base_url(), "http://api.test");
    }

    #[test]
    fn test_parse_profile_body_shapes() {
        let wrapped: ProfileBody =
            serde_json::from_str(r#"{"user":{"_id":"7","name":"Ann","email":"a@x.com","role":"admin"}}"#)
                .expect("Failed to parse wrapped profile");
        let bare: ProfileBody =
            serde_json::from_str(r#"{"id":"7","name":"Ann","email":"a@x.com","role":"admin"}"#)
                .expect("Failed to parse bare profile");

        for body in [wrapped, bare] {
            let user = match body {
                ProfileBody::Wrapped(e) => e.user,
                ProfileBody::Bare(u) => u,
            };
            assert_eq!(user.id, "7");
            assert_eq!(user.role, Role::Admin);
        }
    }

    #[test]
    fn test_parse_users_response() {
        let json = r#"{"success":true,"users":[{"_id":"1","name":"Ann","email":"a@x.com","role":"user"},{"_id":"2","name":"Bob","email":"b@x.com","role":"admin"}]}"#;
        let resp: UsersResponse = serde_json::from_str(json).expect("Failed to parse users JSON");
        assert_eq!(resp.users.len(), 2);
        assert_eq!(resp.users[1].name, "Bob");
    }

    #[test]
    fn test_parse_login_response() {
        let json = r#"{"accessToken":"tok123","user":{"_id":"1","name":"Ann","email":"a@x.com","role":"user"}}"#;
        let resp: LoginResponse = serde_json::from_str(json).expect("Failed to parse login JSON");
        assert_eq!(resp.access_token.as_deref(), Some("tok123"));
        assert_eq!(resp.user.map(|u| u.id), Some("1".to_string()));
    }
}
