use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("invalid api url '{url}': {reason}")]
    InvalidApiUrl { url: String, reason: String },
    #[error("transport failure: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("unauthorized ({status}): {message}")]
    Unauthorized { status: u16, message: String },
    #[error("not found: {0}")]
    NotFound(String),
    #[error("remote store returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("failed to decode remote store response: {0}")]
    Decode(#[source] reqwest::Error),
}

impl GatewayError {
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, GatewayError::Unauthorized { .. })
    }
}

pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("no stored credentials")]
    MissingCredentials,
    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),
    #[error("token validation failed ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("token validation transport failure: {0}")]
    Transport(#[source] reqwest::Error),
}

impl AuthError {
    /// Missing or refused credentials, as opposed to a generic login failure.
    pub fn is_invalid_credentials(&self) -> bool {
        matches!(
            self,
            AuthError::MissingCredentials | AuthError::InvalidCredentials(_)
        )
    }
}
