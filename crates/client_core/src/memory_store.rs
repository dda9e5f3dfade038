use std::{
    collections::HashSet,
    time::{SystemTime, UNIX_EPOCH},
};

use async_trait::async_trait;
use shared::domain::{is_email_tag, Note, NoteId, Tag, TagId};
use tokio::sync::Mutex;

use crate::{
    error::{GatewayError, GatewayResult},
    CredentialHeaders, NoteOrder, NoteUpdate, RemoteStore,
};

/// One recorded gateway call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
    ListNotes { order: Option<String> },
    CreateNote,
    GetNote(NoteId),
    UpdateNote(NoteId),
    SetNoteTrashed(NoteId, bool),
    DeleteNote(NoteId),
    ListTags,
    UpdateTag(TagId),
    DeleteTag(TagId),
    EmptyTrash,
}

impl RemoteCall {
    pub fn operation(&self) -> &'static str {
        match self {
            RemoteCall::ListNotes { .. } => "list_notes",
            RemoteCall::CreateNote => "create_note",
            RemoteCall::GetNote(_) => "get_note",
            RemoteCall::UpdateNote(_) => "update_note",
            RemoteCall::SetNoteTrashed(..) => "set_note_trashed",
            RemoteCall::DeleteNote(_) => "delete_note",
            RemoteCall::ListTags => "list_tags",
            RemoteCall::UpdateTag(_) => "update_tag",
            RemoteCall::DeleteTag(_) => "delete_tag",
            RemoteCall::EmptyTrash => "empty_trash",
        }
    }
}

#[derive(Default)]
struct MemoryState {
    notes: Vec<Note>,
    tags: Vec<Tag>,
    next_note_id: u64,
    credentials: Option<CredentialHeaders>,
    calls: Vec<RemoteCall>,
    failing: HashSet<&'static str>,
}

/// Process-local store with the same contract as the HTTP store. Backs the
/// offline mode and records every call for inspection.
#[derive(Default)]
pub struct InMemoryRemoteStore {
    inner: Mutex<MemoryState>,
}

fn now_epoch_seconds() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs_f64())
        .unwrap_or_default()
}

impl MemoryState {
    fn begin(&mut self, call: RemoteCall) -> GatewayResult<()> {
        let operation = call.operation();
        self.calls.push(call);
        if self.failing.contains(operation) {
            return Err(GatewayError::Status {
                status: 503,
                message: format!("{operation} unavailable"),
            });
        }
        Ok(())
    }

    fn note_mut(&mut self, note_id: &NoteId) -> GatewayResult<&mut Note> {
        self.notes
            .iter_mut()
            .find(|note| &note.id == note_id)
            .ok_or_else(|| GatewayError::NotFound(format!("note {note_id}")))
    }

    fn promote_tags(&mut self, names: &[String]) {
        for name in names {
            if is_email_tag(name) || self.tags.iter().any(|tag| &tag.name == name) {
                continue;
            }
            let index = self.tags.len() as i64;
            self.tags.push(Tag::named(name.clone(), index));
        }
    }
}

impl InMemoryRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_data(notes: Vec<Note>, tags: Vec<Tag>) -> Self {
        Self {
            inner: Mutex::new(MemoryState {
                notes,
                tags,
                ..MemoryState::default()
            }),
        }
    }

    pub async fn calls(&self) -> Vec<RemoteCall> {
        self.inner.lock().await.calls.clone()
    }

    pub async fn clear_calls(&self) {
        self.inner.lock().await.calls.clear();
    }

    /// Makes every later call to `operation` fail with a 503.
    pub async fn fail_operation(&self, operation: &'static str) {
        self.inner.lock().await.failing.insert(operation);
    }

    pub async fn restore_operation(&self, operation: &'static str) {
        self.inner.lock().await.failing.remove(operation);
    }

    pub async fn notes(&self) -> Vec<Note> {
        self.inner.lock().await.notes.clone()
    }

    pub async fn tags(&self) -> Vec<Tag> {
        self.inner.lock().await.tags.clone()
    }

    pub async fn credentials(&self) -> Option<CredentialHeaders> {
        self.inner.lock().await.credentials.clone()
    }
}

#[async_trait]
impl RemoteStore for InMemoryRemoteStore {
    async fn init(&self, credentials: Option<CredentialHeaders>) {
        self.inner.lock().await.credentials = credentials;
    }

    async fn list_notes(&self, order: Option<&NoteOrder>) -> GatewayResult<Vec<Note>> {
        let mut guard = self.inner.lock().await;
        guard.begin(RemoteCall::ListNotes {
            order: order.map(NoteOrder::expression),
        })?;
        Ok(guard.notes.clone())
    }

    async fn create_note(&self, content: &str) -> GatewayResult<Note> {
        let mut guard = self.inner.lock().await;
        guard.begin(RemoteCall::CreateNote)?;
        guard.next_note_id += 1;
        let now = now_epoch_seconds();
        let mut note = Note::new(NoteId::new(format!("note-{}", guard.next_note_id)), content);
        note.modification_date = now;
        note.creation_date = Some(now);
        guard.notes.push(note.clone());
        Ok(note)
    }

    async fn get_note(&self, note_id: &NoteId) -> GatewayResult<Note> {
        let mut guard = self.inner.lock().await;
        guard.begin(RemoteCall::GetNote(note_id.clone()))?;
        guard.note_mut(note_id).map(|note| note.clone())
    }

    async fn update_note(&self, note_id: &NoteId, update: &NoteUpdate) -> GatewayResult<Note> {
        let mut guard = self.inner.lock().await;
        guard.begin(RemoteCall::UpdateNote(note_id.clone()))?;
        let note = guard.note_mut(note_id)?;
        if let Some(content) = &update.content {
            note.content = content.clone();
        }
        if let Some(tags) = &update.tags {
            note.tags = tags.clone();
        }
        if let Some(system_tags) = &update.system_tags {
            note.system_tags = system_tags.clone();
        }
        note.modification_date = update.modification_date.unwrap_or_else(now_epoch_seconds);
        let updated = note.clone();
        if let Some(tags) = &update.tags {
            guard.promote_tags(tags);
        }
        Ok(updated)
    }

    async fn set_note_trashed(&self, note_id: &NoteId, trashed: bool) -> GatewayResult<Note> {
        let mut guard = self.inner.lock().await;
        guard.begin(RemoteCall::SetNoteTrashed(note_id.clone(), trashed))?;
        let note = guard.note_mut(note_id)?;
        note.deleted = trashed;
        Ok(note.clone())
    }

    async fn delete_note(&self, note_id: &NoteId) -> GatewayResult<()> {
        let mut guard = self.inner.lock().await;
        guard.begin(RemoteCall::DeleteNote(note_id.clone()))?;
        guard.note_mut(note_id)?;
        guard.notes.retain(|note| &note.id != note_id);
        Ok(())
    }

    async fn list_tags(&self) -> GatewayResult<Vec<Tag>> {
        let mut guard = self.inner.lock().await;
        guard.begin(RemoteCall::ListTags)?;
        Ok(guard.tags.clone())
    }

    async fn update_tag(&self, tag: &Tag) -> GatewayResult<Tag> {
        let mut guard = self.inner.lock().await;
        guard.begin(RemoteCall::UpdateTag(tag.id.clone()))?;
        let stored = guard
            .tags
            .iter_mut()
            .find(|stored| stored.id == tag.id)
            .ok_or_else(|| GatewayError::NotFound(format!("tag {}", tag.id)))?;
        stored.name = tag.name.clone();
        stored.index = tag.index;
        Ok(stored.clone())
    }

    async fn delete_tag(&self, tag_id: &TagId) -> GatewayResult<()> {
        let mut guard = self.inner.lock().await;
        guard.begin(RemoteCall::DeleteTag(tag_id.clone()))?;
        guard.tags.retain(|tag| &tag.id != tag_id);
        Ok(())
    }

    async fn empty_trash(&self) -> GatewayResult<()> {
        let mut guard = self.inner.lock().await;
        guard.begin(RemoteCall::EmptyTrash)?;
        guard.notes.retain(|note| !note.deleted);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn failing_operations_are_recorded_and_rejected() {
        let store = InMemoryRemoteStore::new();
        store.fail_operation("list_tags").await;

        let err = store.list_tags().await.expect_err("must fail");
        assert!(matches!(err, GatewayError::Status { status: 503, .. }));
        assert_eq!(store.calls().await, vec![RemoteCall::ListTags]);

        store.restore_operation("list_tags").await;
        assert!(store.list_tags().await.expect("tags").is_empty());
    }

    #[tokio::test]
    async fn tag_updates_on_notes_promote_new_tag_names() {
        let store = InMemoryRemoteStore::new();
        let note = store.create_note("hello").await.expect("create");
        store
            .update_note(
                &note.id,
                &NoteUpdate::tags(vec![
                    "work".into(),
                    "bob@example.com".into(),
                    "a@b@c.com".into(),
                ]),
            )
            .await
            .expect("update");

        let names: Vec<String> = store.tags().await.into_iter().map(|tag| tag.name).collect();
        assert_eq!(names, vec!["work", "a@b@c.com"]);
    }

    #[tokio::test]
    async fn empty_trash_drops_only_deleted_notes() {
        let store = InMemoryRemoteStore::new();
        let keep = store.create_note("keep").await.expect("create");
        let drop = store.create_note("drop").await.expect("create");
        store.set_note_trashed(&drop.id, true).await.expect("trash");

        store.empty_trash().await.expect("empty");
        let remaining = store.notes().await;
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, keep.id);
    }
}
