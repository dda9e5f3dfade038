use serde::Deserialize;

/// Error body returned by the notes API. Resource endpoints send
/// `{"message": ...}`, the auth endpoints `{"errors": [...]}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ApiError {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub errors: Vec<String>,
}

impl ApiError {
    /// Human-readable message carried by `body`, or the raw body when it is
    /// not a recognised error document.
    pub fn message_from(body: &str) -> String {
        serde_json::from_str::<ApiError>(body)
            .ok()
            .and_then(ApiError::summary)
            .unwrap_or_else(|| body.to_string())
    }

    fn summary(self) -> Option<String> {
        match self.message {
            Some(message) => Some(message),
            None if !self.errors.is_empty() => Some(self.errors.join(" ")),
            None => None,
        }
    }
}
