use serde::{Deserialize, Serialize};

pub const DEFAULT_FONT_SIZE: u32 = 16;
pub const MIN_FONT_SIZE: u32 = 10;
pub const MAX_FONT_SIZE: u32 = 30;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortType {
    #[default]
    ModificationDate,
    CreationDate,
    Alphabetical,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NoteDisplay {
    #[default]
    Comfy,
    Condensed,
    Expanded,
}

/// UI preferences mirrored to the platform shell whenever they change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub theme: String,
    pub font_size: u32,
    pub note_display: NoteDisplay,
    pub sort_type: SortType,
    pub sort_reversed: bool,
    pub markdown_enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_name: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            theme: "light".into(),
            font_size: DEFAULT_FONT_SIZE,
            note_display: NoteDisplay::default(),
            sort_type: SortType::default(),
            sort_reversed: false,
            markdown_enabled: false,
            account_name: None,
        }
    }
}

impl Settings {
    pub fn with_font_size(&self, font_size: u32) -> Self {
        Self {
            font_size: font_size.clamp(MIN_FONT_SIZE, MAX_FONT_SIZE),
            ..self.clone()
        }
    }
}
