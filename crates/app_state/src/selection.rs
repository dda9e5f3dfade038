//! Pure list policies: visible-note filtering, pinned partitioning and the
//! selection fallback after a note leaves the visible list.

use shared::domain::{Note, NoteId};

use crate::state::AppState;

const TAG_TERM_PREFIX: &str = "tag:";

/// Stable partition: pinned notes first, both groups keep their input order.
pub fn partition_pinned(notes: Vec<Note>) -> Vec<Note> {
    let (mut pinned, rest): (Vec<Note>, Vec<Note>) =
        notes.into_iter().partition(Note::is_pinned);
    pinned.extend(rest);
    pinned
}

/// Index to restore focus to once `note_id` disappears from `visible`: the
/// item right above it, or the top item.
pub fn compute_previous_index<'a>(
    note_id: &NoteId,
    visible: impl IntoIterator<Item = &'a Note>,
) -> i64 {
    let position = visible
        .into_iter()
        .position(|note| &note.id == note_id)
        .map(|index| index as i64)
        .unwrap_or(-1);
    (position - 1).max(0)
}

pub fn filter_visible_notes(state: &AppState) -> Vec<&Note> {
    let show_trash = state.show_trash();
    let tag_name = state.active_tag().map(|tag| tag.name.as_str());
    let query = SearchQuery::parse(&state.filter);

    state
        .notes
        .iter()
        .filter(|note| note.deleted == show_trash)
        .filter(|note| tag_name.map_or(true, |name| note.has_tag(name)))
        .filter(|note| query.matches(note))
        .collect()
}

/// Removes `tag:` terms, leaving the free text of a search.
pub fn without_tags(query: &str) -> String {
    query
        .split_whitespace()
        .filter(|term| tag_term(term).is_none())
        .collect::<Vec<_>>()
        .join(" ")
}

fn tag_term(term: &str) -> Option<&str> {
    let prefix = term.get(..TAG_TERM_PREFIX.len())?;
    let name = term.get(TAG_TERM_PREFIX.len()..)?;
    (prefix.eq_ignore_ascii_case(TAG_TERM_PREFIX) && !name.is_empty()).then_some(name)
}

struct SearchQuery {
    tags: Vec<String>,
    words: Vec<String>,
}

impl SearchQuery {
    fn parse(filter: &str) -> Self {
        let mut tags = Vec::new();
        let mut words = Vec::new();
        for term in filter.split_whitespace() {
            match tag_term(term) {
                Some(name) => tags.push(name.to_lowercase()),
                None => words.push(term.to_lowercase()),
            }
        }
        Self { tags, words }
    }

    fn matches(&self, note: &Note) -> bool {
        let note_tags: Vec<String> = note.tags.iter().map(|tag| tag.to_lowercase()).collect();
        if !self
            .tags
            .iter()
            .all(|wanted| note_tags.iter().any(|tag| tag == wanted))
        {
            return false;
        }

        let content = note.content.to_lowercase();
        self.words.iter().all(|word| {
            content.contains(word.as_str()) || note_tags.iter().any(|tag| tag.contains(word.as_str()))
        })
    }
}

#[cfg(test)]
#[path = "tests/selection_tests.rs"]
mod tests;
