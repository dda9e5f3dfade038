use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context;
use client_core::CredentialHeaders;
use serde::Deserialize;

pub const DEFAULT_CONFIG_FILE: &str = "notedeck.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub api_url: String,
    pub request_timeout_ms: u64,
    pub auth_poll_interval_ms: u64,
    /// `None` polls until shutdown.
    pub auth_poll_max_attempts: Option<u32>,
    pub tag_rename_debounce_ms: u64,
    /// Zero disables the periodic reload.
    pub sync_interval_secs: u64,
    pub access_token: Option<String>,
    pub client: Option<String>,
    pub uid: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: "http://127.0.0.1:3000".into(),
            request_timeout_ms: 15_000,
            auth_poll_interval_ms: 350,
            auth_poll_max_attempts: None,
            tag_rename_debounce_ms: 3_000,
            sync_interval_secs: 30,
            access_token: None,
            client: None,
            uid: None,
        }
    }
}

impl Settings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn auth_poll_interval(&self) -> Duration {
        Duration::from_millis(self.auth_poll_interval_ms)
    }

    pub fn tag_rename_debounce(&self) -> Duration {
        Duration::from_millis(self.tag_rename_debounce_ms)
    }

    pub fn sync_interval(&self) -> Option<Duration> {
        (self.sync_interval_secs > 0).then(|| Duration::from_secs(self.sync_interval_secs))
    }

    /// Stored token headers, when an access token was configured.
    pub fn credentials(&self) -> Option<CredentialHeaders> {
        let token = self.access_token.as_deref().filter(|t| !t.is_empty())?;
        Some(CredentialHeaders::from_tokens(
            token,
            self.client.clone().unwrap_or_default(),
            self.uid.clone().unwrap_or_default(),
        ))
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    api_url: Option<String>,
    request_timeout_ms: Option<u64>,
    auth_poll_interval_ms: Option<u64>,
    auth_poll_max_attempts: Option<u32>,
    tag_rename_debounce_ms: Option<u64>,
    sync_interval_secs: Option<u64>,
    access_token: Option<String>,
    client: Option<String>,
    uid: Option<String>,
}

/// Defaults, then the TOML file, then environment overrides.
pub fn load_settings(config_path: Option<&Path>) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    let (path, required) = match config_path {
        Some(path) => (path.to_path_buf(), true),
        None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
    };
    match fs::read_to_string(&path) {
        Ok(raw) => {
            let file_cfg: FileSettings = toml::from_str(&raw)
                .with_context(|| format!("failed to parse config file '{}'", path.display()))?;
            apply_file(&mut settings, file_cfg);
        }
        Err(err) if required => {
            return Err(err)
                .with_context(|| format!("failed to read config file '{}'", path.display()));
        }
        Err(_) => {}
    }

    apply_env(&mut settings, |key| std::env::var(key).ok());
    Ok(settings)
}

fn apply_file(settings: &mut Settings, file_cfg: FileSettings) {
    if let Some(v) = file_cfg.api_url {
        settings.api_url = v;
    }
    if let Some(v) = file_cfg.request_timeout_ms {
        settings.request_timeout_ms = v;
    }
    if let Some(v) = file_cfg.auth_poll_interval_ms {
        settings.auth_poll_interval_ms = v;
    }
    if file_cfg.auth_poll_max_attempts.is_some() {
        settings.auth_poll_max_attempts = file_cfg.auth_poll_max_attempts;
    }
    if let Some(v) = file_cfg.tag_rename_debounce_ms {
        settings.tag_rename_debounce_ms = v;
    }
    if let Some(v) = file_cfg.sync_interval_secs {
        settings.sync_interval_secs = v;
    }
    if file_cfg.access_token.is_some() {
        settings.access_token = file_cfg.access_token;
    }
    if file_cfg.client.is_some() {
        settings.client = file_cfg.client;
    }
    if file_cfg.uid.is_some() {
        settings.uid = file_cfg.uid;
    }
}

fn apply_env(settings: &mut Settings, var: impl Fn(&str) -> Option<String>) {
    if let Some(v) = var("NOTEDECK_API_URL") {
        settings.api_url = v;
    }
    if let Some(v) = var("APP__API_URL") {
        settings.api_url = v;
    }

    if let Some(v) = var("APP__REQUEST_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
        settings.request_timeout_ms = v;
    }
    if let Some(v) = var("APP__AUTH_POLL_INTERVAL_MS").and_then(|v| v.parse().ok()) {
        settings.auth_poll_interval_ms = v;
    }
    if let Some(v) = var("APP__AUTH_POLL_MAX_ATTEMPTS").and_then(|v| v.parse().ok()) {
        settings.auth_poll_max_attempts = Some(v);
    }
    if let Some(v) = var("APP__TAG_RENAME_DEBOUNCE_MS").and_then(|v| v.parse().ok()) {
        settings.tag_rename_debounce_ms = v;
    }
    if let Some(v) = var("APP__SYNC_INTERVAL_SECS").and_then(|v| v.parse().ok()) {
        settings.sync_interval_secs = v;
    }

    if let Some(v) = var("NOTEDECK_ACCESS_TOKEN") {
        settings.access_token = Some(v);
    }
    if let Some(v) = var("NOTEDECK_CLIENT") {
        settings.client = Some(v);
    }
    if let Some(v) = var("NOTEDECK_UID") {
        settings.uid = Some(v);
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
