use serde_json::Value;
use shared::{
    domain::{DialogKind, EditorMode, Note, NoteId, NoteRevision, Tag, TagId},
    settings::Settings,
};

use crate::selection::filter_visible_notes;

pub const ALL_NOTES_TITLE: &str = "All Notes";
pub const TRASH_TITLE: &str = "Trash";

/// The note list's view mode. Exactly one is active at a time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ListView {
    #[default]
    AllNotes,
    Trash,
    Tag(Tag),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AuthStatus {
    #[default]
    Pending,
    Authorized,
    Unauthorized,
    InvalidCredentials,
    LoginError(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DialogRequest {
    pub kind: DialogKind,
    pub single: bool,
    pub modal: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Dialog {
    pub kind: DialogKind,
    pub params: Value,
    pub key: u64,
    pub single: bool,
    pub modal: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppState {
    pub auth: AuthStatus,
    pub editor_mode: EditorMode,
    pub filter: String,
    pub list_view: ListView,
    pub selected_note_id: Option<NoteId>,
    /// Snapshot of the open note.
    pub note: Option<Note>,
    pub previous_index: i64,
    /// Pinned notes first, each partition in reload order.
    pub notes: Vec<Note>,
    pub tags: Vec<Tag>,
    pub revisions: Option<Vec<NoteRevision>>,
    pub show_navigation: bool,
    pub show_note_info: bool,
    pub editing_tags: bool,
    pub dialogs: Vec<Dialog>,
    pub next_dialog_key: u64,
    pub should_print: bool,
    pub search_focus: bool,
    pub settings: Settings,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            auth: AuthStatus::default(),
            editor_mode: EditorMode::default(),
            filter: String::new(),
            list_view: ListView::default(),
            selected_note_id: None,
            note: None,
            previous_index: -1,
            notes: Vec::new(),
            tags: Vec::new(),
            revisions: None,
            show_navigation: false,
            show_note_info: false,
            editing_tags: false,
            dialogs: Vec::new(),
            next_dialog_key: 0,
            should_print: false,
            search_focus: false,
            settings: Settings::default(),
        }
    }
}

impl AppState {
    pub fn with_settings(settings: Settings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    pub fn is_authorized(&self) -> bool {
        self.auth == AuthStatus::Authorized
    }

    pub fn show_trash(&self) -> bool {
        matches!(self.list_view, ListView::Trash)
    }

    pub fn active_tag(&self) -> Option<&Tag> {
        match &self.list_view {
            ListView::Tag(tag) => Some(tag),
            _ => None,
        }
    }

    pub fn list_title(&self) -> &str {
        match &self.list_view {
            ListView::AllNotes => ALL_NOTES_TITLE,
            ListView::Trash => TRASH_TITLE,
            ListView::Tag(tag) => &tag.name,
        }
    }

    pub fn find_note(&self, note_id: &NoteId) -> Option<&Note> {
        self.notes.iter().find(|note| &note.id == note_id)
    }

    pub fn find_tag(&self, tag_id: &TagId) -> Option<&Tag> {
        self.tags.iter().find(|tag| &tag.id == tag_id)
    }

    pub fn visible_notes(&self) -> Vec<&Note> {
        filter_visible_notes(self)
    }

    /// The note the editor shows: the open note, or the visible note at the
    /// remembered index after a close.
    pub fn displayed_note(&self) -> Option<&Note> {
        if let Some(note) = &self.note {
            return Some(note);
        }
        let index = self.previous_index.max(0) as usize;
        self.visible_notes().get(index).copied()
    }
}
