//! Pure state transitions. `reduce` never mutates its input: it returns the
//! next state, or `None` when the action leaves the state untouched.

use serde_json::Value;
use shared::{
    domain::{is_email_tag, EditorMode, Note, NoteId, NoteRevision, SystemTag, Tag, TagId},
    settings::Settings,
};
use tracing::warn;

use crate::{
    selection::partition_pinned,
    state::{AppState, AuthStatus, Dialog, DialogRequest, ListView},
};

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    AuthChanged,
    AuthStatusChanged(AuthStatus),
    ToggleNavigation,
    SelectAllNotes,
    SelectTrash,
    SelectTag(Tag),
    SetEditorMode(EditorMode),
    ShowDialog {
        request: DialogRequest,
        params: Value,
    },
    CloseDialog {
        key: u64,
    },
    EditTags,
    Search {
        filter: String,
    },
    NotesLoaded(Vec<Note>),
    SelectNote(NoteId),
    NoteLoaded(Note),
    CloseNote {
        previous_index: i64,
    },
    NoteContentEdited {
        note_id: NoteId,
        content: String,
        modification_date: f64,
    },
    NoteTagsReplaced {
        note_id: NoteId,
        tags: Vec<String>,
    },
    SystemTagSet {
        note_id: NoteId,
        tag: SystemTag,
        enabled: bool,
    },
    TagRenamed {
        tag_id: TagId,
        name: String,
    },
    TagRemovedFromNotes {
        name: String,
    },
    TagAdded {
        name: String,
    },
    TagsLoaded(Vec<Tag>),
    NoteRevisionsLoaded(Vec<NoteRevision>),
    ToggleNoteInfo,
    SetShouldPrint(bool),
    SetSearchFocus(bool),
    SettingsChanged(Settings),
}

impl Action {
    pub fn close_note() -> Self {
        Action::CloseNote { previous_index: -1 }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Action::AuthChanged => "auth_changed",
            Action::AuthStatusChanged(_) => "auth_status_changed",
            Action::ToggleNavigation => "toggle_navigation",
            Action::SelectAllNotes => "select_all_notes",
            Action::SelectTrash => "select_trash",
            Action::SelectTag(_) => "select_tag",
            Action::SetEditorMode(_) => "set_editor_mode",
            Action::ShowDialog { .. } => "show_dialog",
            Action::CloseDialog { .. } => "close_dialog",
            Action::EditTags => "edit_tags",
            Action::Search { .. } => "search",
            Action::NotesLoaded(_) => "notes_loaded",
            Action::SelectNote(_) => "select_note",
            Action::NoteLoaded(_) => "note_loaded",
            Action::CloseNote { .. } => "close_note",
            Action::NoteContentEdited { .. } => "note_content_edited",
            Action::NoteTagsReplaced { .. } => "note_tags_replaced",
            Action::SystemTagSet { .. } => "system_tag_set",
            Action::TagRenamed { .. } => "tag_renamed",
            Action::TagRemovedFromNotes { .. } => "tag_removed_from_notes",
            Action::TagAdded { .. } => "tag_added",
            Action::TagsLoaded(_) => "tags_loaded",
            Action::NoteRevisionsLoaded(_) => "note_revisions_loaded",
            Action::ToggleNoteInfo => "toggle_note_info",
            Action::SetShouldPrint(_) => "set_should_print",
            Action::SetSearchFocus(_) => "set_search_focus",
            Action::SettingsChanged(_) => "settings_changed",
        }
    }
}

pub fn reduce(state: &AppState, action: Action) -> Option<AppState> {
    let mut next = state.clone();
    match action {
        Action::AuthChanged => {
            next.notes.clear();
            next.tags.clear();
            next.dialogs.clear();
        }
        Action::AuthStatusChanged(status) => {
            if state.auth == status {
                return None;
            }
            next.auth = status;
        }
        Action::ToggleNavigation => {
            if state.show_navigation {
                next.show_navigation = false;
                next.editing_tags = false;
            } else {
                next.show_navigation = true;
                next.show_note_info = false;
            }
        }
        Action::SelectAllNotes => enter_view(&mut next, ListView::AllNotes),
        Action::SelectTrash => enter_view(&mut next, ListView::Trash),
        Action::SelectTag(tag) => enter_view(&mut next, ListView::Tag(tag)),
        Action::SetEditorMode(mode) => {
            if state.editor_mode == mode {
                return None;
            }
            next.editor_mode = mode;
        }
        Action::ShowDialog { request, params } => {
            if request.single && state.dialogs.iter().any(|d| d.kind == request.kind) {
                return None;
            }
            next.dialogs.push(Dialog {
                kind: request.kind,
                params,
                key: state.next_dialog_key,
                single: request.single,
                modal: request.modal,
            });
            next.next_dialog_key = state.next_dialog_key + 1;
        }
        Action::CloseDialog { key } => {
            let index = state.dialogs.iter().position(|d| d.key == key)?;
            next.dialogs.remove(index);
        }
        Action::EditTags => next.editing_tags = !state.editing_tags,
        Action::Search { filter } => {
            if state.filter == filter {
                return None;
            }
            next.filter = filter;
        }
        Action::NotesLoaded(notes) => next.notes = partition_pinned(notes),
        Action::SelectNote(note_id) => {
            next.show_navigation = false;
            next.editing_tags = false;
            next.note = state.find_note(&note_id).cloned();
            next.selected_note_id = Some(note_id);
            next.revisions = None;
        }
        Action::NoteLoaded(note) => {
            next.selected_note_id = Some(note.id.clone());
            next.note = Some(note);
            next.revisions = None;
        }
        Action::CloseNote { previous_index } => {
            next.note = None;
            next.selected_note_id = None;
            next.previous_index = previous_index.max(-1);
        }
        Action::NoteContentEdited {
            note_id,
            content,
            modification_date,
        } => {
            edit_note(&mut next, &note_id, |note| {
                note.content = content.clone();
                note.modification_date = modification_date;
            })?;
        }
        Action::NoteTagsReplaced { note_id, tags } => {
            edit_note(&mut next, &note_id, |note| note.tags = tags.clone())?;
        }
        Action::SystemTagSet {
            note_id,
            tag,
            enabled,
        } => {
            edit_note(&mut next, &note_id, |note| {
                note.set_system_tag(tag, enabled);
            })?;
            if tag == SystemTag::Pinned {
                next.notes = partition_pinned(next.notes);
            }
        }
        Action::TagRenamed { tag_id, name } => {
            if state.tags.iter().any(|tag| tag.id != tag_id && tag.name == name) {
                warn!(tag_id = %tag_id, new_name = %name, "rename collides with another tag");
                return None;
            }
            let tag = next.tags.iter_mut().find(|tag| tag.id == tag_id)?;
            if tag.name == name {
                return None;
            }
            let old_name = std::mem::replace(&mut tag.name, name.clone());
            if let ListView::Tag(active) = &mut next.list_view {
                if active.id == tag_id {
                    active.name = name.clone();
                }
            }
            for note in next.notes.iter_mut().chain(next.note.as_mut()) {
                rename_note_tag(note, &old_name, &name);
            }
        }
        Action::TagRemovedFromNotes { name } => {
            for note in next.notes.iter_mut().chain(next.note.as_mut()) {
                note.tags.retain(|tag| tag != &name);
            }
            next.tags.retain(|tag| tag.name != name);
        }
        Action::TagAdded { name } => {
            if is_email_tag(&name) || state.tags.iter().any(|tag| tag.name == name) {
                return None;
            }
            let index = state.tags.len() as i64;
            next.tags.push(Tag::named(name, index));
        }
        Action::TagsLoaded(mut tags) => {
            tags.sort_by_key(|tag| tag.index);
            next.tags = tags;
        }
        Action::NoteRevisionsLoaded(revisions) => next.revisions = Some(revisions),
        Action::ToggleNoteInfo => {
            if state.show_note_info {
                next.show_note_info = false;
            } else {
                next.show_note_info = true;
                next.show_navigation = false;
                next.editing_tags = false;
            }
        }
        Action::SetShouldPrint(should_print) => {
            if state.should_print == should_print {
                return None;
            }
            next.should_print = should_print;
        }
        Action::SetSearchFocus(search_focus) => {
            if state.search_focus == search_focus {
                return None;
            }
            next.search_focus = search_focus;
        }
        Action::SettingsChanged(settings) => {
            if state.settings == settings {
                return None;
            }
            next.settings = settings;
        }
    }
    Some(next)
}

fn enter_view(next: &mut AppState, view: ListView) {
    next.show_navigation = false;
    next.editing_tags = false;
    next.list_view = view;
    next.note = None;
    next.selected_note_id = None;
    next.previous_index = -1;
}

/// Applies `edit` to the listed note and to the open snapshot of it.
/// Returns `None` when the note is unknown.
fn edit_note(next: &mut AppState, note_id: &NoteId, edit: impl Fn(&mut Note)) -> Option<()> {
    let Some(note) = next.notes.iter_mut().find(|note| &note.id == note_id) else {
        warn!(note_id = %note_id, "state: cannot find note to update");
        return None;
    };
    edit(note);
    if let Some(open) = next.note.as_mut().filter(|open| &open.id == note_id) {
        edit(open);
    }
    Some(())
}

fn rename_note_tag(note: &mut Note, old_name: &str, new_name: &str) {
    let Some(index) = note.tags.iter().position(|tag| tag == old_name) else {
        return;
    };
    if note.has_tag(new_name) {
        note.tags.remove(index);
    } else {
        note.tags[index] = new_name.to_string();
    }
    note.tags.retain(|tag| tag != old_name);
}

#[cfg(test)]
#[path = "tests/transitions_tests.rs"]
mod tests;
