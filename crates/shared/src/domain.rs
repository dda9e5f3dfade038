use std::{collections::BTreeSet, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(raw: impl Into<String>) -> Self {
                Self(raw.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

id_newtype!(NoteId);
id_newtype!(TagId);

impl TagId {
    /// Tag ids are the lower-cased tag name, percent-escaped.
    pub fn from_name(name: &str) -> Self {
        Self(urlencoding::encode(&name.to_lowercase()).into_owned())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemTag {
    Pinned,
    Markdown,
    Published,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteRevision {
    pub version: u64,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub modification_date: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: NoteId,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub system_tags: BTreeSet<SystemTag>,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub modification_date: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_date: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revisions: Option<Vec<NoteRevision>>,
}

impl Note {
    pub fn new(id: NoteId, content: impl Into<String>) -> Self {
        Self {
            id,
            content: content.into(),
            tags: Vec::new(),
            system_tags: BTreeSet::new(),
            deleted: false,
            modification_date: 0.0,
            creation_date: None,
            revisions: None,
        }
    }

    pub fn is_pinned(&self) -> bool {
        self.system_tags.contains(&SystemTag::Pinned)
    }

    pub fn has_system_tag(&self, tag: SystemTag) -> bool {
        self.system_tags.contains(&tag)
    }

    /// Sets or clears a system tag. Returns `false` when the note already
    /// had the requested value.
    pub fn set_system_tag(&mut self, tag: SystemTag, enabled: bool) -> bool {
        if enabled {
            self.system_tags.insert(tag)
        } else {
            self.system_tags.remove(&tag)
        }
    }

    pub fn has_tag(&self, name: &str) -> bool {
        self.tags.iter().any(|tag| tag == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: TagId,
    pub name: String,
    #[serde(default)]
    pub index: i64,
}

impl Tag {
    pub fn named(name: impl Into<String>, index: i64) -> Self {
        let name = name.into();
        Self {
            id: TagId::from_name(&name),
            name,
            index,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditorMode {
    #[default]
    Edit,
    Preview,
}

/// Closed set of overlays the UI knows how to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DialogKind {
    About,
    Import,
    Keybindings,
    Settings,
    Share,
}

impl DialogKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DialogKind::About => "About",
            DialogKind::Import => "Import",
            DialogKind::Keybindings => "Keybindings",
            DialogKind::Settings => "Settings",
            DialogKind::Share => "Share",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown dialog type: {0}")]
pub struct UnknownDialogKind(pub String);

impl FromStr for DialogKind {
    type Err = UnknownDialogKind;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "About" => Ok(DialogKind::About),
            "Import" => Ok(DialogKind::Import),
            "Keybindings" => Ok(DialogKind::Keybindings),
            "Settings" => Ok(DialogKind::Settings),
            "Share" => Ok(DialogKind::Share),
            other => Err(UnknownDialogKind(other.to_string())),
        }
    }
}

/// E-mail-shaped tags are sharing markers and never become list tags.
pub fn is_email_tag(name: &str) -> bool {
    let Some((local, domain)) = name.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !name.contains(char::is_whitespace)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_id_is_lowercased_and_percent_escaped() {
        assert_eq!(TagId::from_name("Work Stuff").as_str(), "work%20stuff");
        assert_eq!(TagId::from_name("C++").as_str(), "c%2B%2B");
    }

    #[test]
    fn note_decodes_with_missing_optional_fields() {
        let note: Note = serde_json::from_str(
            r#"{"id":"n1","content":"hello\nworld","system_tags":["pinned"]}"#,
        )
        .expect("decode");
        assert!(note.is_pinned());
        assert!(!note.deleted);
        assert!(note.tags.is_empty());
        assert_eq!(note.content, "hello\nworld");
    }

    #[test]
    fn email_tags_are_recognized() {
        assert!(is_email_tag("bob@example.com"));
        assert!(!is_email_tag("work"));
        assert!(!is_email_tag("@example.com"));
        assert!(!is_email_tag("bob@localhost"));
        assert!(!is_email_tag("bob@.com"));
        assert!(!is_email_tag("bob@example."));
        assert!(!is_email_tag("a@b@c.com"));
        assert!(!is_email_tag("bob smith@example.com"));
    }

    #[test]
    fn set_system_tag_reports_changes_only() {
        let mut note = Note::new(NoteId::new("n1"), "");
        assert!(note.set_system_tag(SystemTag::Markdown, true));
        assert!(!note.set_system_tag(SystemTag::Markdown, true));
        assert!(note.set_system_tag(SystemTag::Markdown, false));
        assert!(!note.has_system_tag(SystemTag::Markdown));
    }

    #[test]
    fn unknown_dialog_kind_is_rejected() {
        assert_eq!("Share".parse::<DialogKind>(), Ok(DialogKind::Share));
        assert_eq!(
            "Bogus".parse::<DialogKind>(),
            Err(UnknownDialogKind("Bogus".to_string()))
        );
    }
}
