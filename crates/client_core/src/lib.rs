use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shared::{
    domain::{Note, NoteId, SystemTag, Tag, TagId},
    settings::SortType,
};

pub mod auth;
pub mod error;
pub mod http_store;
pub mod memory_store;

pub use auth::DeviseTokenAuth;
pub use error::{AuthError, GatewayError, GatewayResult};
pub use http_store::HttpRemoteStore;
pub use memory_store::{InMemoryRemoteStore, RemoteCall};

/// Key under which the auth collaborator keeps the request credential headers.
pub const AUTH_HEADERS_KEY: &str = "authHeaders";

/// Token headers attached to every remote store request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CredentialHeaders(BTreeMap<String, String>);

impl CredentialHeaders {
    pub fn from_tokens(
        access_token: impl Into<String>,
        client: impl Into<String>,
        uid: impl Into<String>,
    ) -> Self {
        let mut headers = BTreeMap::new();
        headers.insert("access-token".to_string(), access_token.into());
        headers.insert("client".to_string(), client.into());
        headers.insert("uid".to_string(), uid.into());
        headers.insert("token-type".to_string(), "Bearer".to_string());
        Self(headers)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.values().all(|value| value.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortKey {
    Known(SortType),
    /// Passed to the store verbatim.
    Raw(String),
}

/// Ordering requested from "list notes".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteOrder {
    pub key: SortKey,
    pub reversed: bool,
}

impl NoteOrder {
    pub fn new(sort_type: SortType, reversed: bool) -> Self {
        Self {
            key: SortKey::Known(sort_type),
            reversed,
        }
    }

    pub fn raw(expression: impl Into<String>) -> Self {
        Self {
            key: SortKey::Raw(expression.into()),
            reversed: false,
        }
    }

    pub fn expression(&self) -> String {
        let (column, descending) = match &self.key {
            SortKey::Known(SortType::ModificationDate) => ("modification_date", true),
            SortKey::Known(SortType::CreationDate) => ("creation_date", true),
            SortKey::Known(SortType::Alphabetical) => ("content", false),
            SortKey::Raw(expression) => return expression.clone(),
        };
        let descending = descending != self.reversed;
        format!("{column} {}", if descending { "DESC" } else { "ASC" })
    }
}

/// Partial note write. Unset fields are left untouched by the store.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NoteUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_tags: Option<BTreeSet<SystemTag>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modification_date: Option<f64>,
}

impl NoteUpdate {
    pub fn content(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::default()
        }
    }

    pub fn tags(tags: Vec<String>) -> Self {
        Self {
            tags: Some(tags),
            ..Self::default()
        }
    }

    pub fn system_tags(system_tags: BTreeSet<SystemTag>) -> Self {
        Self {
            system_tags: Some(system_tags),
            ..Self::default()
        }
    }
}

/// Request/response wrapper around the notes, tags, trash and empty-trash
/// resources. Implementations own no application state.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn init(&self, credentials: Option<CredentialHeaders>);
    async fn list_notes(&self, order: Option<&NoteOrder>) -> GatewayResult<Vec<Note>>;
    async fn create_note(&self, content: &str) -> GatewayResult<Note>;
    async fn get_note(&self, note_id: &NoteId) -> GatewayResult<Note>;
    async fn update_note(&self, note_id: &NoteId, update: &NoteUpdate) -> GatewayResult<Note>;
    async fn set_note_trashed(&self, note_id: &NoteId, trashed: bool) -> GatewayResult<Note>;
    async fn delete_note(&self, note_id: &NoteId) -> GatewayResult<()>;
    async fn list_tags(&self) -> GatewayResult<Vec<Tag>>;
    async fn update_tag(&self, tag: &Tag) -> GatewayResult<Tag>;
    async fn delete_tag(&self, tag_id: &TagId) -> GatewayResult<()>;
    async fn empty_trash(&self) -> GatewayResult<()>;
}

/// Authentication collaborator: owns token storage and validation.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    fn retrieve_data(&self, key: &str) -> Option<CredentialHeaders>;
    async fn validate_token(&self) -> Result<(), AuthError>;
}
