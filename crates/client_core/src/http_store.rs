use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use shared::{
    domain::{Note, NoteId, Tag, TagId},
    error::ApiError,
};
use tokio::sync::RwLock;
use tracing::debug;
use url::Url;

use crate::{
    error::{GatewayError, GatewayResult},
    CredentialHeaders, NoteOrder, NoteUpdate, RemoteStore,
};

#[derive(Serialize)]
struct NoteEnvelope<'a, T: Serialize> {
    note: &'a T,
}

#[derive(Serialize)]
struct NewNoteBody<'a> {
    content: &'a str,
}

#[derive(Serialize)]
struct TrashedBody {
    deleted: bool,
}

#[derive(Serialize)]
struct TagEnvelope<'a> {
    tag: TagBody<'a>,
}

#[derive(Serialize)]
struct TagBody<'a> {
    name: &'a str,
    index: i64,
}

/// JSON-over-HTTP remote store.
pub struct HttpRemoteStore {
    http: Client,
    api_url: String,
    credentials: RwLock<Option<CredentialHeaders>>,
}

impl HttpRemoteStore {
    pub fn new(api_url: &str, timeout: Duration) -> GatewayResult<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(GatewayError::Transport)?;
        Self::with_client(http, api_url)
    }

    pub fn with_client(http: Client, api_url: &str) -> GatewayResult<Self> {
        Ok(Self {
            http,
            api_url: normalize_api_url(api_url)?,
            credentials: RwLock::new(None),
        })
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    async fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let mut builder = self.http.request(method, format!("{}{path}", self.api_url));
        if let Some(credentials) = self.credentials.read().await.as_ref() {
            for (name, value) in credentials.iter() {
                builder = builder.header(name, value);
            }
        }
        builder
    }

    async fn fetch<T: DeserializeOwned>(&self, builder: RequestBuilder) -> GatewayResult<T> {
        let response = builder.send().await.map_err(GatewayError::Transport)?;
        let response = check_status(response).await?;
        response.json::<T>().await.map_err(GatewayError::Decode)
    }

    async fn execute(&self, builder: RequestBuilder) -> GatewayResult<()> {
        let response = builder.send().await.map_err(GatewayError::Transport)?;
        check_status(response).await?;
        Ok(())
    }
}

fn normalize_api_url(raw: &str) -> GatewayResult<String> {
    let parsed = Url::parse(raw.trim()).map_err(|err| GatewayError::InvalidApiUrl {
        url: raw.to_string(),
        reason: err.to_string(),
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(GatewayError::InvalidApiUrl {
            url: raw.to_string(),
            reason: "api url must start with http:// or https://".to_string(),
        });
    }
    Ok(parsed.as_str().trim_end_matches('/').to_string())
}

async fn check_status(response: Response) -> GatewayResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = ApiError::message_from(&body);

    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => GatewayError::Unauthorized {
            status: status.as_u16(),
            message,
        },
        StatusCode::NOT_FOUND => GatewayError::NotFound(message),
        _ => GatewayError::Status {
            status: status.as_u16(),
            message,
        },
    })
}

#[async_trait]
impl RemoteStore for HttpRemoteStore {
    async fn init(&self, credentials: Option<CredentialHeaders>) {
        *self.credentials.write().await = credentials;
    }

    async fn list_notes(&self, order: Option<&NoteOrder>) -> GatewayResult<Vec<Note>> {
        let mut builder = self.request(Method::GET, "/notes.json").await;
        if let Some(order) = order {
            builder = builder.query(&[("order", order.expression())]);
        }
        let notes: Vec<Note> = self.fetch(builder).await?;
        debug!(count = notes.len(), "remote: listed notes");
        Ok(notes)
    }

    async fn create_note(&self, content: &str) -> GatewayResult<Note> {
        let builder = self
            .request(Method::POST, "/notes.json")
            .await
            .json(&NoteEnvelope {
                note: &NewNoteBody { content },
            });
        self.fetch(builder).await
    }

    async fn get_note(&self, note_id: &NoteId) -> GatewayResult<Note> {
        let builder = self
            .request(Method::GET, &format!("/notes/{note_id}.json"))
            .await;
        self.fetch(builder).await
    }

    async fn update_note(&self, note_id: &NoteId, update: &NoteUpdate) -> GatewayResult<Note> {
        let builder = self
            .request(Method::PATCH, &format!("/notes/{note_id}.json"))
            .await
            .json(&NoteEnvelope { note: update });
        self.fetch(builder).await
    }

    async fn set_note_trashed(&self, note_id: &NoteId, trashed: bool) -> GatewayResult<Note> {
        let builder = self
            .request(Method::PATCH, &format!("/notes/{note_id}.json"))
            .await
            .json(&NoteEnvelope {
                note: &TrashedBody { deleted: trashed },
            });
        self.fetch(builder).await
    }

    async fn delete_note(&self, note_id: &NoteId) -> GatewayResult<()> {
        let builder = self
            .request(Method::DELETE, &format!("/notes/{note_id}.json"))
            .await;
        self.execute(builder).await
    }

    async fn list_tags(&self) -> GatewayResult<Vec<Tag>> {
        let builder = self.request(Method::GET, "/tags.json").await;
        let tags: Vec<Tag> = self.fetch(builder).await?;
        debug!(count = tags.len(), "remote: listed tags");
        Ok(tags)
    }

    async fn update_tag(&self, tag: &Tag) -> GatewayResult<Tag> {
        let builder = self
            .request(Method::PATCH, &format!("/tags/{}.json", tag.id))
            .await
            .json(&TagEnvelope {
                tag: TagBody {
                    name: &tag.name,
                    index: tag.index,
                },
            });
        self.fetch(builder).await
    }

    async fn delete_tag(&self, tag_id: &TagId) -> GatewayResult<()> {
        let builder = self
            .request(Method::DELETE, &format!("/tags/{tag_id}.json"))
            .await;
        self.execute(builder).await
    }

    async fn empty_trash(&self) -> GatewayResult<()> {
        let builder = self.request(Method::DELETE, "/trash.json").await;
        self.execute(builder).await
    }
}

#[cfg(test)]
#[path = "tests/http_store_tests.rs"]
mod tests;
