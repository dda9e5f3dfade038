//! Controller errors, auth outcome mapping and the global keyboard policy.

use app_state::{AppState, AuthStatus};
use client_core::AuthError;
use shared::domain::UnknownDialogKind;
use thiserror::Error;

/// Faults that stop the controller. Remote failures are reported, not raised.
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error(transparent)]
    UnknownDialog(#[from] UnknownDialogKind),
    #[error("platform bridge failed: {0:#}")]
    Platform(anyhow::Error),
}

/// Session state after a token validation attempt.
pub fn auth_status_for(result: &Result<(), AuthError>) -> AuthStatus {
    match result {
        Ok(()) => AuthStatus::Authorized,
        Err(AuthError::MissingCredentials) => AuthStatus::Unauthorized,
        Err(err) if err.is_invalid_credentials() => AuthStatus::InvalidCredentials,
        Err(err) => AuthStatus::LoginError(err.to_string()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shortcut {
    OpenTagList,
    FocusSearch,
}

/// Ctrl (or Cmd) + T opens the tag list while it is closed; + F focuses search.
pub fn shortcut_for(key: &str, ctrl_key: bool, meta_key: bool, state: &AppState) -> Option<Shortcut> {
    if !(ctrl_key || meta_key) {
        return None;
    }
    match key.to_ascii_lowercase().as_str() {
        "t" if !state.show_navigation => Some(Shortcut::OpenTagList),
        "f" => Some(Shortcut::FocusSearch),
        _ => None,
    }
}
