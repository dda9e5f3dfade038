//! Asynchronous command procedures: remote round trips followed by dispatches
//! into the store. Every mutation ends in an authoritative reload.

use std::{collections::BTreeSet, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use client_core::{GatewayError, NoteOrder, NoteUpdate, RemoteStore};
use futures::FutureExt;
use shared::{
    domain::{is_email_tag, EditorMode, NoteId, SystemTag, Tag, TagId},
    settings::{Settings, SortType, DEFAULT_FONT_SIZE},
};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::{
    selection::{compute_previous_index, without_tags},
    state::AuthStatus,
    store::Store,
    transitions::Action,
    write_queue::{Coalesce, FlushFn, WriteQueue},
};

pub const DEFAULT_TAG_RENAME_WINDOW: Duration = Duration::from_secs(3);

/// Failures the UI path must hear about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    CommandFailed { command: String, message: String },
    BackgroundWriteFailed { entity: String, message: String },
}

/// A queued tag rename: the name to write, the names it replaces and the
/// notes that carried them when the rename was issued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagRename {
    pub name: String,
    pub replaced: BTreeSet<String>,
    pub note_ids: BTreeSet<NoteId>,
}

impl TagRename {
    /// `tags` with every replaced name swapped for the new one, keeping the
    /// first occurrence of each name.
    pub fn apply(&self, tags: &[String]) -> Vec<String> {
        let mut renamed: Vec<String> = Vec::with_capacity(tags.len());
        for tag in tags {
            let tag = if self.replaced.contains(tag) {
                &self.name
            } else {
                tag
            };
            if !renamed.contains(tag) {
                renamed.push(tag.clone());
            }
        }
        renamed
    }

    fn touches(&self, tags: &[String]) -> bool {
        tags.iter().any(|tag| self.replaced.contains(tag))
    }
}

impl Coalesce for TagRename {
    fn coalesce(&mut self, newer: Self) {
        let superseded = std::mem::replace(&mut self.name, newer.name);
        self.replaced.insert(superseded);
        self.replaced.extend(newer.replaced);
        self.replaced.remove(&self.name);
        self.note_ids.extend(newer.note_ids);
    }
}

fn now_epoch_seconds() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}

/// Everything a command needs: the container, the gateway and the rename
/// queue. Cloning shares all of them.
#[derive(Clone)]
pub struct CommandContext {
    store: Arc<Store>,
    remote: Arc<dyn RemoteStore>,
    tag_writes: Arc<WriteQueue<TagId, TagRename>>,
    events: broadcast::Sender<SyncEvent>,
}

impl CommandContext {
    pub fn new(store: Arc<Store>, remote: Arc<dyn RemoteStore>, rename_window: Duration) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            store,
            remote,
            tag_writes: Arc::new(WriteQueue::new(rename_window)),
            events,
        }
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn remote(&self) -> &Arc<dyn RemoteStore> {
        &self.remote
    }

    pub fn tag_writes(&self) -> &WriteQueue<TagId, TagRename> {
        &self.tag_writes
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    /// Logs a failed command, surfaces it to subscribers and moves the
    /// session to `InvalidCredentials` when the store rejected the token.
    pub fn report_failure(&self, command: &str, err: &anyhow::Error) {
        warn!(command, error = %format!("{err:#}"), "command failed");
        let auth_failure = err
            .chain()
            .filter_map(|cause| cause.downcast_ref::<GatewayError>())
            .any(GatewayError::is_auth_failure);
        if auth_failure {
            self.store
                .dispatch(Action::AuthStatusChanged(AuthStatus::InvalidCredentials));
        }
        let _ = self.events.send(SyncEvent::CommandFailed {
            command: command.to_string(),
            message: format!("{err:#}"),
        });
    }

    pub fn note_order(&self) -> NoteOrder {
        let state = self.store.get_state();
        NoteOrder::new(state.settings.sort_type, state.settings.sort_reversed)
    }

    pub async fn load_notes(&self) -> Result<()> {
        load_notes(&self.store, self.remote.as_ref(), &self.note_order()).await?;
        self.reapply_pending_renames();
        Ok(())
    }

    pub async fn load_tags(&self) -> Result<()> {
        load_tags(&self.store, self.remote.as_ref()).await?;
        self.reapply_pending_renames();
        Ok(())
    }

    /// Reloaded lists still carry the old names of renames that have not
    /// been written yet.
    fn reapply_pending_renames(&self) {
        for (tag_id, rename) in self.tag_writes.snapshot() {
            self.store.dispatch(Action::TagRenamed {
                tag_id,
                name: rename.name.clone(),
            });
            let state = self.store.get_state();
            for note_id in &rename.note_ids {
                let Some(note) = state.find_note(note_id) else {
                    continue;
                };
                if rename.touches(&note.tags) {
                    self.store.dispatch(Action::NoteTagsReplaced {
                        note_id: note_id.clone(),
                        tags: rename.apply(&note.tags),
                    });
                }
            }
        }
    }

    /// Creates a note and opens it. An empty `content` issued while a search
    /// is active seeds the note with the search's free text and clears it.
    pub async fn new_note(&self, content: &str) -> Result<NoteId> {
        let filter = self.store.get_state().filter.clone();
        let content = if content.is_empty() && !filter.is_empty() {
            self.store.dispatch(Action::Search {
                filter: String::new(),
            });
            without_tags(&filter)
        } else {
            content.to_string()
        };

        let note = self
            .remote
            .create_note(&content)
            .await
            .context("failed to create note")?;
        info!(note_id = %note.id, "created note");
        self.load_notes().await?;
        self.store.dispatch(Action::SetEditorMode(EditorMode::Edit));
        self.store.dispatch(Action::SelectNote(note.id.clone()));
        Ok(note.id)
    }

    pub async fn update_note_content(&self, note_id: &NoteId, content: &str) -> Result<()> {
        self.store.dispatch(Action::NoteContentEdited {
            note_id: note_id.clone(),
            content: content.to_string(),
            modification_date: now_epoch_seconds(),
        });
        self.remote
            .update_note(note_id, &NoteUpdate::content(content))
            .await
            .with_context(|| format!("failed to update note {note_id}"))?;
        self.note_updated(note_id).await
    }

    /// Reloads the list after a remote write and reopens the note.
    pub async fn note_updated(&self, note_id: &NoteId) -> Result<()> {
        self.load_notes().await?;
        self.store.dispatch(Action::SelectNote(note_id.clone()));
        Ok(())
    }

    /// Replaces a note's tags and promotes unseen tag names to placeholder
    /// tags until the next tag reload.
    pub async fn update_note_tags(&self, note_id: &NoteId, tags: Vec<String>) -> Result<()> {
        self.remote
            .update_note(note_id, &NoteUpdate::tags(tags.clone()))
            .await
            .with_context(|| format!("failed to update tags of note {note_id}"))?;
        self.store.dispatch(Action::NoteTagsReplaced {
            note_id: note_id.clone(),
            tags: tags.clone(),
        });
        for name in tags {
            if !is_email_tag(&name) {
                self.store.dispatch(Action::TagAdded { name });
            }
        }
        self.load_tags().await
    }

    pub async fn trash_note(&self, note_id: &NoteId) -> Result<()> {
        let previous_index = self.previous_index_of(note_id);
        self.remote
            .set_note_trashed(note_id, true)
            .await
            .with_context(|| format!("failed to trash note {note_id}"))?;
        self.reload_and_close(previous_index).await
    }

    pub async fn restore_note(&self, note_id: &NoteId) -> Result<()> {
        let previous_index = self.previous_index_of(note_id);
        self.remote
            .set_note_trashed(note_id, false)
            .await
            .with_context(|| format!("failed to restore note {note_id}"))?;
        self.reload_and_close(previous_index).await
    }

    pub async fn delete_note_forever(&self, note_id: &NoteId) -> Result<()> {
        let previous_index = self.previous_index_of(note_id);
        self.remote
            .delete_note(note_id)
            .await
            .with_context(|| format!("failed to delete note {note_id}"))?;
        self.reload_and_close(previous_index).await
    }

    /// Sets a system tag. Returns `false` without a remote write when the
    /// note already has the requested value.
    pub async fn set_system_tag(
        &self,
        note_id: &NoteId,
        tag: SystemTag,
        enabled: bool,
    ) -> Result<bool> {
        let state = self.store.get_state();
        let Some(note) = state.find_note(note_id) else {
            warn!(note_id = %note_id, "cannot set system tag on unknown note");
            return Ok(false);
        };
        let mut system_tags: BTreeSet<SystemTag> = note.system_tags.clone();
        let changed = if enabled {
            system_tags.insert(tag)
        } else {
            system_tags.remove(&tag)
        };
        if !changed {
            return Ok(false);
        }

        self.remote
            .update_note(note_id, &NoteUpdate::system_tags(system_tags))
            .await
            .with_context(|| format!("failed to update system tags of note {note_id}"))?;
        self.store.dispatch(Action::SystemTagSet {
            note_id: note_id.clone(),
            tag,
            enabled,
        });
        self.note_updated(note_id).await?;
        Ok(true)
    }

    pub async fn note_revisions(&self, note_id: &NoteId) -> Result<()> {
        let note = self
            .remote
            .get_note(note_id)
            .await
            .with_context(|| format!("failed to fetch revisions of note {note_id}"))?;
        self.store
            .dispatch(Action::NoteRevisionsLoaded(note.revisions.unwrap_or_default()));
        Ok(())
    }

    pub async fn empty_trash(&self) -> Result<()> {
        self.remote
            .empty_trash()
            .await
            .context("failed to empty trash")?;
        self.store.dispatch(Action::close_note());
        let remaining = self
            .store
            .get_state()
            .notes
            .iter()
            .filter(|note| !note.deleted)
            .cloned()
            .collect();
        self.store.dispatch(Action::NotesLoaded(remaining));
        self.load_notes().await
    }

    /// Renames a tag locally right away and queues the remote writes. Returns
    /// `false` for an unknown tag, an unchanged name or a name another tag
    /// already uses.
    pub fn rename_tag(&self, tag_id: &TagId, name: &str) -> bool {
        let state = self.store.get_state();
        let Some(tag) = state.find_tag(tag_id) else {
            warn!(tag_id = %tag_id, "cannot rename unknown tag");
            return false;
        };
        if tag.name == name {
            return false;
        }
        if state.tags.iter().any(|other| other.id != *tag_id && other.name == name) {
            warn!(tag_id = %tag_id, new_name = name, "tag name already taken, rename ignored");
            return false;
        }
        let rename = TagRename {
            name: name.to_string(),
            replaced: BTreeSet::from([tag.name.clone()]),
            note_ids: state
                .notes
                .iter()
                .filter(|note| note.has_tag(&tag.name))
                .map(|note| note.id.clone())
                .collect(),
        };

        self.store.dispatch(Action::TagRenamed {
            tag_id: tag_id.clone(),
            name: name.to_string(),
        });
        debug!(tag_id = %tag_id, notes = rename.note_ids.len(), "queued tag rename");
        self.tag_writes
            .schedule(tag_id.clone(), rename, self.tag_flush());
        true
    }

    pub async fn flush_pending_writes(&self) {
        self.tag_writes.flush_all().await;
    }

    pub async fn trash_tag(&self, tag_id: &TagId) -> Result<()> {
        let state = self.store.get_state();
        let Some(tag) = state.find_tag(tag_id).cloned() else {
            warn!(tag_id = %tag_id, "cannot trash unknown tag");
            return Ok(());
        };
        self.tag_writes.cancel(tag_id);

        for note in state.notes.iter().filter(|note| note.has_tag(&tag.name)) {
            let tags: Vec<String> = note
                .tags
                .iter()
                .filter(|name| **name != tag.name)
                .cloned()
                .collect();
            self.remote
                .update_note(&note.id, &NoteUpdate::tags(tags))
                .await
                .with_context(|| format!("failed to untag note {}", note.id))?;
        }
        self.store.dispatch(Action::TagRemovedFromNotes {
            name: tag.name.clone(),
        });
        self.remote
            .delete_tag(tag_id)
            .await
            .with_context(|| format!("failed to delete tag {tag_id}"))?;
        self.load_tags().await
    }

    pub async fn reorder_tags(&self, tag_ids: &[TagId]) -> Result<()> {
        let state = self.store.get_state();
        for (index, tag_id) in tag_ids.iter().enumerate() {
            let Some(tag) = state.find_tag(tag_id) else {
                warn!(tag_id = %tag_id, "skipping unknown tag in reorder");
                continue;
            };
            let tag = Tag {
                index: index as i64,
                ..tag.clone()
            };
            self.remote
                .update_tag(&tag)
                .await
                .with_context(|| format!("failed to reorder tag {tag_id}"))?;
        }
        self.load_tags().await
    }

    /// Applies a settings edit. Returns whether anything changed.
    pub fn update_settings(&self, edit: impl FnOnce(&Settings) -> Settings) -> bool {
        let next = edit(&self.store.get_state().settings);
        self.store.dispatch(Action::SettingsChanged(next))
    }

    pub async fn set_sort_type(&self, sort_type: SortType) -> Result<()> {
        if self.update_settings(|settings| Settings {
            sort_type,
            ..settings.clone()
        }) {
            self.load_notes().await?;
        }
        Ok(())
    }

    pub async fn toggle_sort_order(&self) -> Result<()> {
        self.update_settings(|settings| Settings {
            sort_reversed: !settings.sort_reversed,
            ..settings.clone()
        });
        self.load_notes().await
    }

    pub fn increase_font_size(&self) -> bool {
        self.update_settings(|settings| settings.with_font_size(settings.font_size + 1))
    }

    pub fn decrease_font_size(&self) -> bool {
        self.update_settings(|settings| settings.with_font_size(settings.font_size.saturating_sub(1)))
    }

    pub fn reset_font_size(&self) -> bool {
        self.update_settings(|settings| settings.with_font_size(DEFAULT_FONT_SIZE))
    }

    fn previous_index_of(&self, note_id: &NoteId) -> i64 {
        let state = self.store.get_state();
        compute_previous_index(note_id, state.visible_notes())
    }

    async fn reload_and_close(&self, previous_index: i64) -> Result<()> {
        self.load_notes().await?;
        self.store.dispatch(Action::CloseNote { previous_index });
        Ok(())
    }

    fn tag_flush(&self) -> FlushFn<TagId, TagRename> {
        let store = Arc::clone(&self.store);
        let remote = Arc::clone(&self.remote);
        let events = self.events.clone();
        Arc::new(move |tag_id, rename| {
            let store = Arc::clone(&store);
            let remote = Arc::clone(&remote);
            let events = events.clone();
            async move {
                if let Err(err) = flush_tag_rename(&store, remote.as_ref(), &tag_id, &rename).await {
                    warn!(tag_id = %tag_id, error = %format!("{err:#}"), "tag rename flush failed");
                    let _ = events.send(SyncEvent::BackgroundWriteFailed {
                        entity: format!("tag {tag_id}"),
                        message: format!("{err:#}"),
                    });
                }
            }
            .boxed()
        })
    }
}

async fn load_notes(store: &Store, remote: &dyn RemoteStore, order: &NoteOrder) -> Result<()> {
    let notes = remote
        .list_notes(Some(order))
        .await
        .context("failed to load notes")?;
    debug!(count = notes.len(), "loaded notes");
    store.dispatch(Action::NotesLoaded(notes));
    Ok(())
}

async fn load_tags(store: &Store, remote: &dyn RemoteStore) -> Result<()> {
    let tags = remote.list_tags().await.context("failed to load tags")?;
    debug!(count = tags.len(), "loaded tags");
    store.dispatch(Action::TagsLoaded(tags));
    Ok(())
}

/// Writes a queued rename from the values captured when it was issued. The
/// store only supplies the tag's other fields and the notes' current tags,
/// which may still hold the replaced names after a reload.
async fn flush_tag_rename(
    store: &Store,
    remote: &dyn RemoteStore,
    tag_id: &TagId,
    rename: &TagRename,
) -> Result<()> {
    let Some(tag) = store.get_state().find_tag(tag_id).cloned() else {
        warn!(tag_id = %tag_id, "renamed tag disappeared before flush");
        return Ok(());
    };
    let tag = Tag {
        name: rename.name.clone(),
        ..tag
    };
    remote
        .update_tag(&tag)
        .await
        .with_context(|| format!("failed to write tag {tag_id}"))?;
    load_tags(store, remote).await?;

    let state = store.get_state();
    for note_id in &rename.note_ids {
        let Some(note) = state.find_note(note_id) else {
            continue;
        };
        let tags = rename.apply(&note.tags);
        remote
            .update_note(note_id, &NoteUpdate::tags(tags.clone()))
            .await
            .with_context(|| format!("failed to touch note {note_id}"))?;
        store.dispatch(Action::NoteTagsReplaced {
            note_id: note_id.clone(),
            tags,
        });
    }
    info!(tag_id = %tag_id, notes = rename.note_ids.len(), "flushed tag rename");
    Ok(())
}

#[cfg(test)]
#[path = "tests/commands_tests.rs"]
mod tests;
