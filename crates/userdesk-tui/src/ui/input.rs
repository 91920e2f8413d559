//! Keyboard input handling for the TUI.
//!
//! This module handles all keyboard events and translates them into
//! application state changes.

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent};

use userdesk_core::auth::Decision;

use crate::app::{App, AppState, PAGE_SCROLL_SIZE};
use crate::form::Form;

/// What a key did to a form overlay
enum FormAction {
    None,
    Submit,
    Cancel,
    /// Focus moved off the named field
    Left(&'static str),
}

/// Shared navigation and editing keys for every form overlay
fn handle_form_key(form: &mut Form, key: KeyEvent) -> FormAction {
    if form.submitting {
        return FormAction::None;
    }
    match key.code {
        KeyCode::Esc => return FormAction::Cancel,
        KeyCode::Down | KeyCode::Tab => {
            let left = form.focused_name();
            form.next();
            if let Some(name) = left {
                return FormAction::Left(name);
            }
        }
        KeyCode::Up | KeyCode::BackTab => {
            let left = form.focused_name();
            form.prev();
            if let Some(name) = left {
                return FormAction::Left(name);
            }
        }
        KeyCode::Left | KeyCode::Right => form.cycle_choice(),
        KeyCode::Enter => {
            if form.on_button() {
                return FormAction::Submit;
            }
            let left = form.focused_name();
            form.next();
            if let Some(name) = left {
                return FormAction::Left(name);
            }
        }
        KeyCode::Backspace => form.backspace(),
        KeyCode::Char(c) => form.push_char(c),
        _ => {}
    }
    FormAction::None
}

/// Handle keyboard input. Returns true if the app should quit.
pub async fn handle_input(app: &mut App, key: KeyEvent) -> Result<bool> {
    match app.state {
        AppState::LoggingIn => return handle_login_input(app, key).await,
        AppState::Registering => {
            match handle_form_key(&mut app.register_form, key) {
                FormAction::Submit => app.submit_registration(),
                FormAction::Cancel => app.state = AppState::Normal,
                FormAction::None | FormAction::Left(_) => {}
            }
            return Ok(false);
        }
        AppState::Editing => {
            match handle_form_key(&mut app.edit_form, key) {
                FormAction::Submit => app.submit_edit(),
                FormAction::Cancel => app.state = AppState::Normal,
                FormAction::None | FormAction::Left(_) => {}
            }
            return Ok(false);
        }
        AppState::ShowingHelp => {
            if matches!(key.code, KeyCode::Esc | KeyCode::Char('?') | KeyCode::Char('q')) {
                app.state = AppState::Normal;
            }
            return Ok(false);
        }
        AppState::ConfirmingQuit => {
            match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
                    app.state = AppState::Quitting;
                    return Ok(true);
                }
                KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                    app.state = AppState::Normal;
                }
                _ => {}
            }
            return Ok(false);
        }
        AppState::ConfirmingLogout => {
            match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
                    app.state = AppState::Normal;
                    app.logout();
                }
                KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                    app.state = AppState::Normal;
                }
                _ => {}
            }
            return Ok(false);
        }
        AppState::ConfirmingDelete => {
            match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => app.confirm_delete(),
                KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                    app.state = AppState::Normal;
                }
                _ => {}
            }
            return Ok(false);
        }
        AppState::Searching => return Ok(handle_search_input(app, key)),
        AppState::Quitting => return Ok(true),
        AppState::Normal => {}
    }

    // Any key clears a stale status message
    if app.status_message.is_some() && !app.loading_users {
        app.status_message = None;
    }

    // Global keys
    match key.code {
        KeyCode::Char('q') => {
            app.state = AppState::ConfirmingQuit;
            return Ok(false);
        }
        KeyCode::Char('?') => {
            app.state = AppState::ShowingHelp;
            return Ok(false);
        }
        _ => {}
    }

    match app.access() {
        Decision::Granted => handle_user_list_input(app, key),
        Decision::Denied => {
            if matches!(key.code, KeyCode::Enter | KeyCode::Char('l')) {
                app.start_login();
            }
        }
        // Nothing to act on until the session settles
        Decision::Loading => {}
    }
    Ok(false)
}

fn handle_user_list_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Up | KeyCode::Char('k') => app.select_prev(1),
        KeyCode::Down | KeyCode::Char('j') => app.select_next(1),
        KeyCode::PageUp => app.select_prev(PAGE_SCROLL_SIZE),
        KeyCode::PageDown => app.select_next(PAGE_SCROLL_SIZE),
        KeyCode::Home => app.selection = 0,
        KeyCode::End => app.select_last(),
        KeyCode::Char('/') => app.state = AppState::Searching,
        KeyCode::Char('s') => app.toggle_sort(app.sort_column.next()),
        KeyCode::Char('o') => app.toggle_sort(app.sort_column),
        KeyCode::Char('r') => app.refresh_users(),
        KeyCode::Char('n') => app.start_register(),
        KeyCode::Char('e') | KeyCode::Enter => app.start_edit(),
        KeyCode::Char('d') | KeyCode::Delete => app.start_delete(),
        KeyCode::Char('L') => app.state = AppState::ConfirmingLogout,
        _ => {}
    }
}

fn handle_search_input(app: &mut App, key: KeyEvent) -> bool {
    match key.code {
        KeyCode::Esc => {
            app.state = AppState::Normal;
            app.set_search(String::new());
        }
        KeyCode::Enter => {
            // Keep search query active
            app.state = AppState::Normal;
        }
        KeyCode::Backspace => {
            let mut query = app.search_query.clone();
            query.pop();
            app.set_search(query);
        }
        KeyCode::Char(c) => {
            let query = format!("{}{}", app.search_query, c);
            app.set_search(query);
        }
        _ => {}
    }
    false
}

async fn handle_login_input(app: &mut App, key: KeyEvent) -> Result<bool> {
    match handle_form_key(&mut app.login_form, key) {
        FormAction::Submit => {
            // On failure the form carries the error; on success the state is Normal
            let _ = app.attempt_login().await;
        }
        FormAction::Left(name) => app.validate_login_field(name),
        FormAction::Cancel => {
            // Dismiss the overlay; the denied placeholder stays until login
            app.state = AppState::Normal;
        }
        FormAction::None => {}
    }
    Ok(false)
}
