//! Application state management for userdesk.
//!
//! This module contains the core `App` struct that manages UI state, the
//! shared `SessionStore`, the fetched user list, and background task
//! coordination.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use userdesk_core::auth::{decide, Decision};
use userdesk_core::models::{Registration, UserSortColumn, UserUpdate};
use userdesk_core::utils::{cmp_ignore_case, contains_ignore_case};
use userdesk_core::validation::{self, field};
use userdesk_core::{ApiClient, ApiError, Config, Role, Session, SessionError, SessionStore, User};

use crate::form::Form;

// ============================================================================
// Constants
// ============================================================================

/// Buffer size for the background task message channel.
const CHANNEL_BUFFER_SIZE: usize = 32;

/// Number of items to scroll on page up/down.
pub const PAGE_SCROLL_SIZE: usize = 10;

/// Environment variable that pre-fills the login email
pub const EMAIL_ENV: &str = "USERDESK_EMAIL";

// ============================================================================
// UI State Types
// ============================================================================

/// Overall application state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Normal,
    Searching,
    LoggingIn,
    Registering,
    Editing,
    ConfirmingDelete,
    ConfirmingLogout,
    ShowingHelp,
    ConfirmingQuit,
    Quitting,
}

// ============================================================================
// Background Task Results
// ============================================================================

/// Results sent back from spawned API calls.
enum TaskResult {
    /// User list fetched
    Users(Vec<User>),
    /// Registration accepted by the server
    Registered(String),
    /// Profile update accepted (id, new values)
    Updated(String, UserUpdate),
    /// User removed (id)
    Deleted(String),
    /// A call failed; `action` names it for the status bar
    Failed { action: Action, error: ApiError },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Refresh,
    Register,
    Update,
    Delete,
}

impl Action {
    fn label(&self) -> &'static str {
        match self {
            Action::Refresh => "Refresh",
            Action::Register => "Registration",
            Action::Update => "Update",
            Action::Delete => "Delete",
        }
    }
}

// ============================================================================
// Main Application Struct
// ============================================================================

pub struct App {
    // Core services
    pub config: Config,
    pub session: Arc<SessionStore>,
    session_rx: watch::Receiver<Session>,
    /// Last session value observed from the store
    pub session_view: Session,
    pub api: ApiClient,

    // UI State
    pub state: AppState,
    pub search_query: String,
    pub sort_column: UserSortColumn,
    pub sort_ascending: bool,

    // Forms
    pub login_form: Form,
    pub register_form: Form,
    pub edit_form: Form,
    editing_id: Option<String>,

    // Data
    pub users: Vec<User>,
    pub users_fetched_at: Option<DateTime<Utc>>,
    pub selection: usize,
    pub loading_users: bool,

    // Background task channel
    task_rx: mpsc::Receiver<TaskResult>,
    task_tx: mpsc::Sender<TaskResult>,

    // Status message
    pub status_message: Option<String>,
}

impl App {
    /// Create the application and start the session's startup pass in the
    /// background. The first frames render while it is still running.
    pub fn new(config: Config, cache_dir: PathBuf) -> Result<Self> {
        debug!(api = %config.api_base_url, storage = ?config.storage, "App::new() starting");

        let api = ApiClient::new(&config.api_base_url)?;
        let session = Arc::new(SessionStore::new(config.durable_store(cache_dir)));
        let session_rx = session.subscribe();
        let session_view = session.current_session();

        let verifier = config.verifier(&api);
        let store = Arc::clone(&session);
        tokio::spawn(async move {
            let outcome = store.initialize(verifier.as_ref()).await;
            debug!(?outcome, "Session startup finished");
        });

        let (task_tx, task_rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);

        let mut login_form = Form::login();
        let email = std::env::var(EMAIL_ENV)
            .ok()
            .or_else(|| config.last_email.clone())
            .unwrap_or_default();
        if !email.is_empty() {
            login_form.set_value(field::EMAIL, email);
            login_form.focus_field(field::PASSWORD);
        }

        Ok(Self {
            config,
            session,
            session_rx,
            session_view,
            api,

            state: AppState::Normal,
            search_query: String::new(),
            sort_column: UserSortColumn::Name,
            sort_ascending: true,

            login_form,
            register_form: Form::registration(),
            edit_form: Form::edit(),
            editing_id: None,

            users: Vec::new(),
            users_fetched_at: None,
            selection: 0,
            loading_users: false,

            task_rx,
            task_tx,

            status_message: None,
        })
    }

    // =========================================================================
    // Session
    // =========================================================================

    pub fn access(&self) -> Decision {
        decide(&self.session_view)
    }

    pub fn current_user(&self) -> Option<&User> {
        self.session_view.user()
    }

    /// Pick up session changes published by the store and react to the
    /// access decision changing.
    pub fn sync_session(&mut self) {
        if !self.session_rx.has_changed().unwrap_or(false) {
            return;
        }
        let before = self.access();
        self.session_view = self.session_rx.borrow_and_update().clone();
        let after = self.access();
        if before == after {
            return;
        }
        debug!(?before, ?after, "Access changed");

        match after {
            Decision::Granted => {
                if matches!(self.state, AppState::LoggingIn) {
                    self.state = AppState::Normal;
                }
                self.refresh_users();
            }
            Decision::Denied => {
                self.users.clear();
                self.users_fetched_at = None;
                self.selection = 0;
                if !matches!(self.state, AppState::ConfirmingQuit | AppState::Quitting) {
                    self.start_login();
                }
            }
            Decision::Loading => {}
        }
    }

    /// Start the login process (show login overlay)
    pub fn start_login(&mut self) {
        self.state = AppState::LoggingIn;
        self.login_form.general_error = None;
        self.login_form.focus = if self.login_form.value(field::EMAIL).is_empty() {
            0
        } else {
            1
        };
    }

    /// Validate the login form, run the login exchange and hand the result
    /// to the session store.
    pub async fn attempt_login(&mut self) -> Result<()> {
        let email = self.login_form.value(field::EMAIL).trim().to_string();
        let password = self.login_form.value(field::PASSWORD).to_string();

        let errors = validation::validate_login(&email, &password);
        self.login_form.set_errors(&errors);
        if !errors.is_empty() {
            self.login_form.focus_first_error();
            return Err(anyhow::anyhow!("Login form has errors"));
        }

        self.login_form.submitting = true;
        let result = self.api.login(&email, &password).await;
        self.login_form.submitting = false;

        let response = match result {
            Ok(response) => response,
            Err(ApiError::Validation(errors)) => {
                self.login_form.set_errors(&errors);
                self.login_form.focus_first_error();
                return Err(anyhow::anyhow!("Login rejected by server validation"));
            }
            Err(e) => {
                error!(error = %e, "Login failed");
                self.login_form.general_error = Some(e.user_message());
                self.login_form.clear_secrets();
                return Err(e.into());
            }
        };

        let (Some(user), Some(token)) = (response.user, response.access_token) else {
            error!("Login response missing token or user");
            self.login_form.general_error =
                Some("Login failed: incomplete response from server".to_string());
            return Err(anyhow::anyhow!("Incomplete login response"));
        };

        match self.session.login(user, &token) {
            Ok(()) => {}
            Err(SessionError::InvalidArgument(detail)) => {
                error!(%detail, "Server returned an unusable session");
                self.login_form.general_error =
                    Some("Login failed: incomplete response from server".to_string());
                return Err(anyhow::anyhow!(detail));
            }
            Err(e @ SessionError::PersistenceWrite(_)) => {
                self.login_form.general_error = Some("Could not save your session".to_string());
                return Err(e.into());
            }
        }

        self.config.last_email = Some(email);
        if let Err(e) = self.config.save() {
            warn!(error = %e, "Failed to save config");
        }

        self.login_form.reset();
        if let Some(ref email) = self.config.last_email {
            self.login_form.set_value(field::EMAIL, email.clone());
        }
        self.state = AppState::Normal;
        info!("Login successful");
        Ok(())
    }

    /// Run the on-leave check for the field that is losing focus
    pub fn validate_login_field(&mut self, name: &'static str) {
        let error = validation::validate_login_field(
            name,
            self.login_form.value(field::EMAIL).trim(),
            self.login_form.value(field::PASSWORD),
        );
        if error.is_some() {
            self.login_form.set_error(name, error);
        }
    }

    pub fn logout(&mut self) {
        self.session.logout();
        self.status_message = Some("Logged out".to_string());
    }

    /// Bearer-token client for the current session
    fn authed_api(&self) -> Option<ApiClient> {
        self.session_view
            .token()
            .map(|token| self.api.with_token(token.to_string()))
    }

    // =========================================================================
    // User list
    // =========================================================================

    pub fn refresh_users(&mut self) {
        let Some(api) = self.authed_api() else {
            return;
        };
        if self.loading_users {
            return;
        }
        self.loading_users = true;
        self.status_message = Some("Loading users...".to_string());

        let tx = self.task_tx.clone();
        tokio::spawn(async move {
            let result = match api.list_users().await {
                Ok(users) => TaskResult::Users(users),
                Err(error) => TaskResult::Failed { action: Action::Refresh, error },
            };
            Self::send_result(&tx, result).await;
        });
    }

    pub fn start_register(&mut self) {
        self.register_form.reset();
        self.state = AppState::Registering;
    }

    pub fn submit_registration(&mut self) {
        let form = &self.register_form;
        let registration = Registration {
            name: form.value(field::NAME).to_string(),
            email: form.value(field::EMAIL).to_string(),
            password: form.value(field::PASSWORD).to_string(),
            confirm_password: form.value(field::CONFIRM_PASSWORD).to_string(),
            role: form.value(field::ROLE).to_string(),
            image: Some(form.value(field::IMAGE).trim())
                .filter(|p| !p.is_empty())
                .map(PathBuf::from),
        };

        let errors = validation::validate_registration(&registration);
        self.register_form.set_errors(&errors);
        if self.register_form.has_errors() {
            self.register_form.focus_first_error();
            return;
        }
        let Some(api) = self.authed_api() else {
            return;
        };

        self.register_form.submitting = true;
        let tx = self.task_tx.clone();
        tokio::spawn(async move {
            let result = match api.register_user(&registration).await {
                Ok(()) => TaskResult::Registered(registration.email.trim().to_lowercase()),
                Err(error) => TaskResult::Failed { action: Action::Register, error },
            };
            Self::send_result(&tx, result).await;
        });
    }

    pub fn start_edit(&mut self) {
        let Some(user) = self.selected_user().cloned() else {
            return;
        };
        self.edit_form.reset();
        self.edit_form.set_value(field::NAME, user.name.clone());
        self.edit_form.set_value(field::EMAIL, user.email.clone());
        self.edit_form.set_value(field::ROLE, user.role.as_str());
        self.editing_id = Some(user.id);
        self.state = AppState::Editing;
    }

    pub fn submit_edit(&mut self) {
        let Some(id) = self.editing_id.clone() else {
            return;
        };
        let update = UserUpdate {
            name: self.edit_form.value(field::NAME).trim().to_string(),
            email: self.edit_form.value(field::EMAIL).trim().to_string(),
            role: Role::parse(self.edit_form.value(field::ROLE)).unwrap_or_default(),
        };

        let errors = validation::validate_user_update(&update);
        self.edit_form.set_errors(&errors);
        if self.edit_form.has_errors() {
            self.edit_form.focus_first_error();
            return;
        }
        let Some(api) = self.authed_api() else {
            return;
        };

        self.edit_form.submitting = true;
        let tx = self.task_tx.clone();
        tokio::spawn(async move {
            let result = match api.update_user(&id, &update).await {
                Ok(()) => TaskResult::Updated(id, update),
                Err(error) => TaskResult::Failed { action: Action::Update, error },
            };
            Self::send_result(&tx, result).await;
        });
    }

    pub fn start_delete(&mut self) {
        if self.selected_user().is_some() {
            self.state = AppState::ConfirmingDelete;
        }
    }

    pub fn confirm_delete(&mut self) {
        self.state = AppState::Normal;
        let Some(id) = self.selected_user().map(|u| u.id.clone()) else {
            return;
        };
        let Some(api) = self.authed_api() else {
            return;
        };
        self.status_message = Some("Deleting...".to_string());

        let tx = self.task_tx.clone();
        tokio::spawn(async move {
            let result = match api.delete_user(&id).await {
                Ok(()) => TaskResult::Deleted(id),
                Err(error) => TaskResult::Failed { action: Action::Delete, error },
            };
            Self::send_result(&tx, result).await;
        });
    }

    // =========================================================================
    // Background Tasks
    // =========================================================================

    async fn send_result(tx: &mpsc::Sender<TaskResult>, result: TaskResult) {
        if let Err(e) = tx.send(result).await {
            warn!(error = %e, "Failed to deliver background result");
        }
    }

    /// Drain finished background work and session changes
    pub fn check_background_tasks(&mut self) {
        self.sync_session();
        while let Ok(result) = self.task_rx.try_recv() {
            self.process_task_result(result);
        }
    }

    fn process_task_result(&mut self, result: TaskResult) {
        match result {
            TaskResult::Users(users) => {
                self.loading_users = false;
                // Ignore lists that arrive after the session ended
                if self.access() != Decision::Granted {
                    return;
                }
                self.users = users;
                self.users_fetched_at = Some(Utc::now());
                self.clamp_selection();
                self.status_message = None;
            }
            TaskResult::Registered(email) => {
                self.register_form.reset();
                if self.state == AppState::Registering {
                    self.state = AppState::Normal;
                }
                self.status_message = Some(format!("Registered {}", email));
                self.refresh_users();
            }
            TaskResult::Updated(id, update) => {
                self.edit_form.submitting = false;
                if let Some(user) = self.users.iter_mut().find(|u| u.id == id) {
                    user.name = update.name;
                    user.email = update.email;
                    user.role = update.role;
                }
                self.editing_id = None;
                if self.state == AppState::Editing {
                    self.state = AppState::Normal;
                }
                self.status_message = Some("User updated".to_string());
            }
            TaskResult::Deleted(id) => {
                self.users.retain(|u| u.id != id);
                self.clamp_selection();
                self.status_message = Some("User deleted".to_string());
            }
            TaskResult::Failed { action, error } => self.handle_failure(action, error),
        }
    }

    fn handle_failure(&mut self, action: Action, error: ApiError) {
        error!(action = action.label(), error = %error, "Background request failed");
        if action == Action::Refresh {
            self.loading_users = false;
        }

        if error.is_unauthorized() {
            // The token was refused; the session is no longer usable
            self.session.logout();
            self.status_message = Some("Session expired, please log in again".to_string());
            return;
        }

        match (action, error) {
            (Action::Register, ApiError::Validation(errors)) => {
                self.register_form.submitting = false;
                self.register_form.set_errors(&errors);
                self.register_form.focus_first_error();
            }
            (Action::Register, error) => {
                self.register_form.submitting = false;
                self.register_form.general_error = Some(error.user_message());
            }
            (Action::Update, ApiError::Validation(errors)) => {
                self.edit_form.submitting = false;
                self.edit_form.set_errors(&errors);
                self.edit_form.focus_first_error();
            }
            (Action::Update, error) => {
                self.edit_form.submitting = false;
                self.edit_form.general_error = Some(error.user_message());
            }
            (action, error) => {
                self.status_message = Some(format!("{} failed: {}", action.label(), error.user_message()));
            }
        }
    }

    // =========================================================================
    // Selection, Sorting, Search
    // =========================================================================

    fn user_matches_search(user: &User, query: &str) -> bool {
        query.is_empty()
            || contains_ignore_case(&user.name, query)
            || contains_ignore_case(&user.email, query)
    }

    /// Users in display order, filtered by the search query
    pub fn visible_users(&self) -> Vec<&User> {
        let mut users: Vec<&User> = self
            .users
            .iter()
            .filter(|u| Self::user_matches_search(u, &self.search_query))
            .collect();

        users.sort_by(|a, b| {
            let ord = match self.sort_column {
                UserSortColumn::Name => cmp_ignore_case(&a.name, &b.name),
                UserSortColumn::Email => cmp_ignore_case(&a.email, &b.email),
                UserSortColumn::Role => a
                    .role
                    .as_str()
                    .cmp(b.role.as_str())
                    .then_with(|| cmp_ignore_case(&a.name, &b.name)),
            };
            if self.sort_ascending {
                ord
            } else {
                ord.reverse()
            }
        });
        users
    }

    pub fn selected_user(&self) -> Option<&User> {
        self.visible_users().get(self.selection).copied()
    }

    pub fn select_next(&mut self, step: usize) {
        let max = self.visible_users().len().saturating_sub(1);
        self.selection = (self.selection + step).min(max);
    }

    pub fn select_prev(&mut self, step: usize) {
        self.selection = self.selection.saturating_sub(step);
    }

    pub fn select_last(&mut self) {
        self.selection = self.visible_users().len().saturating_sub(1);
    }

    fn clamp_selection(&mut self) {
        let len = self.visible_users().len();
        if self.selection >= len {
            self.selection = len.saturating_sub(1);
        }
    }

    /// Same column flips direction; a new column sorts ascending
    pub fn toggle_sort(&mut self, column: UserSortColumn) {
        if self.sort_column == column {
            self.sort_ascending = !self.sort_ascending;
        } else {
            self.sort_column = column;
            self.sort_ascending = true;
        }
        self.selection = 0;
    }

    pub fn set_search(&mut self, query: String) {
        self.search_query = query;
        self.selection = 0;
    }

    /// Stop any pending session work before the process exits
    pub fn shutdown(&self) {
        self.session.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users() -> Vec<User> {
        vec![
            User::new("1", "carol", "c@x.com", Role::User),
            User::new("2", "Ann", "z@x.com", Role::Admin),
            User::new("3", "bob", "b@x.com", Role::User),
        ]
    }

    fn app_with_users() -> (tempfile::TempDir, App) {
        let dir = tempfile::tempdir().unwrap();
        let mut app = App::new(Config::default(), dir.path().to_path_buf()).unwrap();
        app.users = users();
        (dir, app)
    }

    #[tokio::test]
    async fn test_visible_users_sorted_by_name_ignoring_case() {
        let (_dir, app) = app_with_users();
        let names: Vec<&str> = app.visible_users().iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, vec!["Ann", "bob", "carol"]);
    }

    #[tokio::test]
    async fn test_toggle_sort_flips_direction() {
        let (_dir, mut app) = app_with_users();
        app.toggle_sort(UserSortColumn::Name);
        let names: Vec<&str> = app.visible_users().iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, vec!["carol", "bob", "Ann"]);

        app.toggle_sort(UserSortColumn::Email);
        assert!(app.sort_ascending);
        assert_eq!(app.visible_users()[0].email, "b@x.com");
    }

    #[tokio::test]
    async fn test_search_filters_name_and_email() {
        let (_dir, mut app) = app_with_users();
        app.set_search("Z@X".to_string());
        let visible = app.visible_users();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].name, "Ann");
    }

    #[tokio::test]
    async fn test_selection_is_clamped() {
        let (_dir, mut app) = app_with_users();
        app.select_next(PAGE_SCROLL_SIZE);
        assert_eq!(app.selection, 2);
        app.select_prev(PAGE_SCROLL_SIZE);
        assert_eq!(app.selection, 0);
    }

    #[tokio::test]
    async fn test_starts_loading() {
        let (_dir, app) = app_with_users();
        // The startup pass has not been observed yet
        assert_eq!(app.access(), Decision::Loading);
        app.shutdown();
    }
}
