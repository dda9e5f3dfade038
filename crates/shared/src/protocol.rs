use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{
    domain::{EditorMode, NoteId, TagId},
    settings::{NoteDisplay, SortType},
};

/// Dialog request as sent by the shell. `dialog_type` stays a string on the
/// wire so an unknown kind can be reported instead of silently dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogSpec {
    #[serde(rename = "type")]
    pub dialog_type: String,
    #[serde(default)]
    pub single: bool,
    #[serde(default)]
    pub modal: bool,
}

fn default_true() -> bool {
    true
}

/// Inbound command from the platform shell or the UI, `{ "action": ..., ...payload }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum AppCommand {
    NewNote {
        #[serde(default)]
        content: String,
    },
    ExportZipArchive {
        filename: PathBuf,
    },
    SelectNote {
        note_id: NoteId,
    },
    CloseNote,
    UpdateContent {
        note_id: NoteId,
        content: String,
    },
    UpdateNoteTags {
        note_id: NoteId,
        tags: Vec<String>,
    },
    TrashNote {
        note_id: NoteId,
    },
    RestoreNote {
        note_id: NoteId,
    },
    DeleteNoteForever {
        note_id: NoteId,
    },
    PinNote {
        note_id: NoteId,
        pin: bool,
    },
    MarkdownNote {
        note_id: NoteId,
        markdown: bool,
    },
    PublishNote {
        note_id: NoteId,
        publish: bool,
    },
    NoteRevisions {
        note_id: NoteId,
    },
    EmptyTrash,
    RenameTag {
        tag_id: TagId,
        name: String,
    },
    TrashTag {
        tag_id: TagId,
    },
    ReorderTags {
        tag_ids: Vec<TagId>,
    },
    SelectAllNotes,
    SelectTrash,
    SelectTag {
        tag_id: TagId,
    },
    Search {
        filter: String,
    },
    ToggleNavigation,
    ToggleNoteInfo,
    EditTags,
    SetEditorMode {
        mode: EditorMode,
    },
    ShowDialog {
        dialog: DialogSpec,
        #[serde(default)]
        params: serde_json::Value,
    },
    CloseDialog {
        key: u64,
    },
    SetShouldPrintNote {
        #[serde(default = "default_true")]
        should_print: bool,
    },
    SetSearchFocus {
        #[serde(default = "default_true")]
        search_focus: bool,
    },
    SetSortType {
        sort_type: SortType,
    },
    ToggleSortOrder,
    ActivateTheme {
        theme: String,
    },
    IncreaseFontSize,
    DecreaseFontSize,
    ResetFontSize,
    SetNoteDisplay {
        note_display: NoteDisplay,
    },
    SetMarkdown {
        enabled: bool,
    },
    SetAccountName {
        #[serde(default)]
        account_name: Option<String>,
    },
    /// Raw key press forwarded by the shell for the global shortcuts.
    KeyDown {
        key: String,
        #[serde(default)]
        ctrl_key: bool,
        #[serde(default)]
        meta_key: bool,
    },
    /// Credentials were accepted outside the controller's own check.
    SetAuthorized,
    ResetAuth,
    /// Re-reads the stored credentials and validates them again.
    ValidateSession,
    #[serde(other)]
    Unknown,
}

impl AppCommand {
    pub fn name(&self) -> &'static str {
        match self {
            AppCommand::NewNote { .. } => "new_note",
            AppCommand::ExportZipArchive { .. } => "export_zip_archive",
            AppCommand::SelectNote { .. } => "select_note",
            AppCommand::CloseNote => "close_note",
            AppCommand::UpdateContent { .. } => "update_content",
            AppCommand::UpdateNoteTags { .. } => "update_note_tags",
            AppCommand::TrashNote { .. } => "trash_note",
            AppCommand::RestoreNote { .. } => "restore_note",
            AppCommand::DeleteNoteForever { .. } => "delete_note_forever",
            AppCommand::PinNote { .. } => "pin_note",
            AppCommand::MarkdownNote { .. } => "markdown_note",
            AppCommand::PublishNote { .. } => "publish_note",
            AppCommand::NoteRevisions { .. } => "note_revisions",
            AppCommand::EmptyTrash => "empty_trash",
            AppCommand::RenameTag { .. } => "rename_tag",
            AppCommand::TrashTag { .. } => "trash_tag",
            AppCommand::ReorderTags { .. } => "reorder_tags",
            AppCommand::SelectAllNotes => "select_all_notes",
            AppCommand::SelectTrash => "select_trash",
            AppCommand::SelectTag { .. } => "select_tag",
            AppCommand::Search { .. } => "search",
            AppCommand::ToggleNavigation => "toggle_navigation",
            AppCommand::ToggleNoteInfo => "toggle_note_info",
            AppCommand::EditTags => "edit_tags",
            AppCommand::SetEditorMode { .. } => "set_editor_mode",
            AppCommand::ShowDialog { .. } => "show_dialog",
            AppCommand::CloseDialog { .. } => "close_dialog",
            AppCommand::SetShouldPrintNote { .. } => "set_should_print_note",
            AppCommand::SetSearchFocus { .. } => "set_search_focus",
            AppCommand::SetSortType { .. } => "set_sort_type",
            AppCommand::ToggleSortOrder => "toggle_sort_order",
            AppCommand::ActivateTheme { .. } => "activate_theme",
            AppCommand::IncreaseFontSize => "increase_font_size",
            AppCommand::DecreaseFontSize => "decrease_font_size",
            AppCommand::ResetFontSize => "reset_font_size",
            AppCommand::SetNoteDisplay { .. } => "set_note_display",
            AppCommand::SetMarkdown { .. } => "set_markdown",
            AppCommand::SetAccountName { .. } => "set_account_name",
            AppCommand::KeyDown { .. } => "key_down",
            AppCommand::SetAuthorized => "set_authorized",
            AppCommand::ResetAuth => "reset_auth",
            AppCommand::ValidateSession => "validate_session",
            AppCommand::Unknown => "unknown",
        }
    }
}
