use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use shared::error::ApiError;
use tracing::{debug, warn};

use crate::{
    error::{AuthError, GatewayError, GatewayResult},
    AuthProvider, CredentialHeaders, AUTH_HEADERS_KEY,
};

/// Token-header authentication against a devise_token_auth style endpoint.
pub struct DeviseTokenAuth {
    http: Client,
    api_url: String,
    headers: Option<CredentialHeaders>,
}

impl DeviseTokenAuth {
    pub fn new(
        api_url: impl Into<String>,
        headers: Option<CredentialHeaders>,
        timeout: Duration,
    ) -> GatewayResult<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(GatewayError::Transport)?;
        Ok(Self {
            http,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            headers: headers.filter(|headers| !headers.is_empty()),
        })
    }
}

#[async_trait]
impl AuthProvider for DeviseTokenAuth {
    fn retrieve_data(&self, key: &str) -> Option<CredentialHeaders> {
        if key == AUTH_HEADERS_KEY {
            self.headers.clone()
        } else {
            None
        }
    }

    async fn validate_token(&self) -> Result<(), AuthError> {
        let headers = self.headers.as_ref().ok_or(AuthError::MissingCredentials)?;

        let mut builder = self
            .http
            .get(format!("{}/auth/validate_token", self.api_url));
        for (name, value) in headers.iter() {
            builder = builder.header(name, value);
        }

        let response = builder.send().await.map_err(AuthError::Transport)?;
        let status = response.status();
        if status.is_success() {
            debug!("auth: token validated");
            return Ok(());
        }

        let message = ApiError::message_from(&response.text().await.unwrap_or_default());
        warn!(status = status.as_u16(), "auth: token validation refused");
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(AuthError::InvalidCredentials(message))
            }
            _ => Err(AuthError::Rejected {
                status: status.as_u16(),
                message,
            }),
        }
    }
}

#[cfg(test)]
#[path = "tests/auth_tests.rs"]
mod tests;
