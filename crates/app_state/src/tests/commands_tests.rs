use super::*;
use client_core::{InMemoryRemoteStore, RemoteCall};
use shared::domain::Note;

use crate::state::{AppState, ListView};

struct Harness {
    remote: Arc<InMemoryRemoteStore>,
    ctx: CommandContext,
}

impl Harness {
    fn new(notes: Vec<Note>, tags: Vec<Tag>) -> Self {
        Self::with_window(notes, tags, Duration::from_millis(30))
    }

    fn with_window(notes: Vec<Note>, tags: Vec<Tag>, window: Duration) -> Self {
        let remote = Arc::new(InMemoryRemoteStore::with_data(notes, tags));
        let store = Arc::new(Store::new(AppState::default()));
        let ctx = CommandContext::new(store, remote.clone(), window);
        Self { remote, ctx }
    }

    fn state(&self) -> Arc<AppState> {
        self.ctx.store().get_state()
    }

    async fn loaded(self) -> Self {
        self.ctx.load_notes().await.expect("load notes");
        self.ctx.load_tags().await.expect("load tags");
        self.remote.clear_calls().await;
        self
    }
}

fn note(id: &str, tags: &[&str]) -> Note {
    let mut note = Note::new(NoteId::new(id), format!("note {id}"));
    note.tags = tags.iter().map(|tag| tag.to_string()).collect();
    note
}

fn pinned(id: &str) -> Note {
    let mut note = note(id, &[]);
    note.set_system_tag(SystemTag::Pinned, true);
    note
}

fn visible_ids(state: &AppState) -> Vec<String> {
    state
        .visible_notes()
        .iter()
        .map(|note| note.id.to_string())
        .collect()
}

#[tokio::test]
async fn trashing_the_middle_note_restores_focus_above_it() {
    let h = Harness::new(vec![note("B", &[]), pinned("A"), note("C", &[])], vec![])
        .loaded()
        .await;
    assert_eq!(visible_ids(&h.state()), vec!["A", "B", "C"]);

    h.ctx.store().dispatch(Action::SelectNote(NoteId::new("B")));
    h.ctx.trash_note(&NoteId::new("B")).await.expect("trash");

    let state = h.state();
    assert_eq!(state.previous_index, 0);
    assert!(state.selected_note_id.is_none());
    assert!(state.note.is_none());
    assert_eq!(visible_ids(&state), vec!["A", "C"]);
    assert_eq!(
        h.remote.calls().await[0],
        RemoteCall::SetNoteTrashed(NoteId::new("B"), true)
    );
}

#[tokio::test]
async fn trash_then_restore_keeps_tags() {
    let h = Harness::new(vec![note("a", &["work", "home"]), note("b", &[])], vec![])
        .loaded()
        .await;
    let id = NoteId::new("a");

    h.ctx.trash_note(&id).await.expect("trash");
    assert!(h.state().find_note(&id).expect("listed").deleted);

    h.ctx.store().dispatch(Action::SelectTrash);
    h.ctx.restore_note(&id).await.expect("restore");
    h.ctx.store().dispatch(Action::SelectAllNotes);

    let state = h.state();
    let restored = state.find_note(&id).expect("listed");
    assert!(!restored.deleted);
    assert_eq!(restored.tags, vec!["work", "home"]);
    assert!(visible_ids(&state).contains(&"a".to_string()));
}

#[tokio::test]
async fn rename_moves_every_reference_and_leaves_one_tag() {
    let work = Tag::named("work", 0);
    let h = Harness::with_window(
        vec![note("a", &["work"]), note("b", &["work", "home"]), note("c", &["home"])],
        vec![work.clone(), Tag::named("home", 1)],
        Duration::from_secs(60),
    )
    .loaded()
    .await;

    assert!(h.ctx.rename_tag(&work.id, "job"));
    let state = h.state();
    for id in ["a", "b"] {
        let tags = &state.find_note(&NoteId::new(id)).expect("note").tags;
        assert_eq!(tags.iter().filter(|t| *t == "job").count(), 1);
        assert!(!tags.iter().any(|t| t == "work"));
    }
    assert_eq!(
        h.ctx.tag_writes().pending(&work.id),
        Some(TagRename {
            name: "job".into(),
            replaced: BTreeSet::from(["work".to_string()]),
            note_ids: BTreeSet::from([NoteId::new("a"), NoteId::new("b")]),
        })
    );
    assert!(h.remote.calls().await.is_empty());

    h.ctx.flush_pending_writes().await;
    h.ctx.load_tags().await.expect("reload");

    let names: Vec<String> = h.state().tags.iter().map(|t| t.name.clone()).collect();
    assert_eq!(names.iter().filter(|n| *n == "job").count(), 1);
    assert!(!names.contains(&"work".to_string()));

    let stored = h.remote.notes().await;
    let touched = stored.iter().filter(|n| n.has_tag("job")).count();
    assert_eq!(touched, 2);

    let calls = h.remote.calls().await;
    assert_eq!(calls[0], RemoteCall::UpdateTag(work.id.clone()));
    assert!(calls.contains(&RemoteCall::UpdateNote(NoteId::new("a"))));
    assert!(calls.contains(&RemoteCall::UpdateNote(NoteId::new("b"))));
    assert!(!calls.contains(&RemoteCall::UpdateNote(NoteId::new("c"))));
}

#[tokio::test]
async fn rename_to_the_current_name_does_nothing() {
    let work = Tag::named("work", 0);
    let h = Harness::new(vec![note("a", &["work"])], vec![work.clone()])
        .loaded()
        .await;
    let before = h.state();

    assert!(!h.ctx.rename_tag(&work.id, "work"));
    assert!(Arc::ptr_eq(&before, &h.state()));
    assert!(h.ctx.tag_writes().is_empty());

    tokio::time::sleep(Duration::from_millis(80)).await;
    assert!(h.remote.calls().await.is_empty());
}

#[tokio::test]
async fn rapid_renames_coalesce_into_one_timed_flush() {
    let work = Tag::named("work", 0);
    let h = Harness::with_window(
        vec![note("a", &["work"])],
        vec![work.clone()],
        Duration::from_millis(40),
    )
    .loaded()
    .await;

    h.ctx.rename_tag(&work.id, "jo");
    h.ctx.rename_tag(&work.id, "job");
    assert_eq!(h.ctx.tag_writes().pending_keys(), vec![work.id.clone()]);

    tokio::time::sleep(Duration::from_millis(250)).await;
    let calls = h.remote.calls().await;
    let tag_writes = calls
        .iter()
        .filter(|call| matches!(call, RemoteCall::UpdateTag(_)))
        .count();
    assert_eq!(tag_writes, 1);
    assert_eq!(h.remote.tags().await[0].name, "job");
}

#[tokio::test]
async fn reload_inside_the_window_does_not_lose_the_rename() {
    let work = Tag::named("work", 0);
    let h = Harness::new(
        vec![note("a", &["work"]), note("b", &["work"])],
        vec![work.clone()],
    )
    .loaded()
    .await;

    assert!(h.ctx.rename_tag(&work.id, "job"));
    h.ctx.load_notes().await.expect("reload notes");
    h.ctx.load_tags().await.expect("reload tags");

    let state = h.state();
    assert_eq!(state.find_tag(&work.id).expect("tag").name, "job");
    assert_eq!(state.find_note(&NoteId::new("a")).expect("note").tags, vec!["job"]);

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(h.ctx.tag_writes().is_empty());

    let remote_tags: Vec<String> = h.remote.tags().await.into_iter().map(|t| t.name).collect();
    assert_eq!(remote_tags, vec!["job"]);
    for stored in h.remote.notes().await {
        assert_eq!(stored.tags, vec!["job"]);
    }
    let local: Vec<String> = h.state().tags.iter().map(|t| t.name.clone()).collect();
    assert_eq!(local, vec!["job"]);
}

#[tokio::test]
async fn chained_renames_replace_every_earlier_name() {
    let work = Tag::named("work", 0);
    let h = Harness::with_window(
        vec![note("a", &["work", "home"])],
        vec![work.clone(), Tag::named("home", 1)],
        Duration::from_secs(60),
    )
    .loaded()
    .await;

    h.ctx.rename_tag(&work.id, "job");
    h.ctx.load_tags().await.expect("reload");
    h.ctx.rename_tag(&work.id, "gig");
    let pending = h.ctx.tag_writes().pending(&work.id).expect("pending");
    assert_eq!(pending.name, "gig");
    assert_eq!(
        pending.replaced,
        BTreeSet::from(["work".to_string(), "job".to_string()])
    );
    assert_eq!(pending.apply(&["job".into(), "home".into(), "work".into()]), vec!["gig", "home"]);

    h.ctx.flush_pending_writes().await;
    let stored = h.remote.notes().await;
    assert_eq!(stored[0].tags, vec!["gig", "home"]);
    assert_eq!(h.remote.tags().await[0].name, "gig");
}

#[tokio::test]
async fn rename_onto_an_existing_name_is_refused() {
    let work = Tag::named("work", 0);
    let h = Harness::new(
        vec![note("a", &["work"]), note("b", &["home"])],
        vec![work.clone(), Tag::named("home", 1)],
    )
    .loaded()
    .await;
    let before = h.state();

    assert!(!h.ctx.rename_tag(&work.id, "home"));
    assert!(Arc::ptr_eq(&before, &h.state()));
    assert!(h.ctx.tag_writes().is_empty());
}

#[tokio::test]
async fn failed_flush_is_broadcast() {
    let work = Tag::named("work", 0);
    let h = Harness::new(vec![note("a", &["work"])], vec![work.clone()])
        .loaded()
        .await;
    let mut events = h.ctx.subscribe_events();
    h.remote.fail_operation("update_tag").await;

    h.ctx.rename_tag(&work.id, "job");
    let event = tokio::time::timeout(Duration::from_secs(2), events.recv())
        .await
        .expect("event in time")
        .expect("event");
    assert!(matches!(event, SyncEvent::BackgroundWriteFailed { .. }));
}

#[tokio::test]
async fn failed_command_leaves_state_and_reports() {
    let h = Harness::new(vec![note("a", &[])], vec![]).loaded().await;
    let mut events = h.ctx.subscribe_events();
    h.remote.fail_operation("set_note_trashed").await;
    let before = h.state();

    let err = h.ctx.trash_note(&NoteId::new("a")).await.expect_err("must fail");
    h.ctx.report_failure("trash_note", &err);

    assert!(Arc::ptr_eq(&before, &h.state()));
    match events.try_recv().expect("event") {
        SyncEvent::CommandFailed { command, message } => {
            assert_eq!(command, "trash_note");
            assert!(message.contains("failed to trash note a"));
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[tokio::test]
async fn unauthorized_failures_flip_auth_status() {
    let h = Harness::new(vec![], vec![]);
    let err = anyhow::Error::new(GatewayError::Unauthorized {
        status: 401,
        message: "expired".into(),
    })
    .context("failed to load notes");

    h.ctx.report_failure("load_notes", &err);
    assert_eq!(h.state().auth, AuthStatus::InvalidCredentials);
}

#[tokio::test]
async fn new_note_from_search_uses_free_text_and_opens_it() {
    let h = Harness::new(vec![], vec![]).loaded().await;
    h.ctx.store().dispatch(Action::Search {
        filter: "tag:work groceries".into(),
    });

    let id = h.ctx.new_note("").await.expect("create");
    let state = h.state();
    assert_eq!(state.filter, "");
    assert_eq!(state.selected_note_id.as_ref(), Some(&id));
    assert_eq!(state.note.as_ref().map(|n| n.content.as_str()), Some("groceries"));
}

#[tokio::test]
async fn content_updates_are_optimistic_then_reloaded() {
    let h = Harness::new(vec![note("a", &[])], vec![]).loaded().await;
    let id = NoteId::new("a");
    h.ctx.store().dispatch(Action::SelectNote(id.clone()));

    h.ctx.update_note_content(&id, "fresh").await.expect("update");
    assert_eq!(h.remote.notes().await[0].content, "fresh");
    assert_eq!(h.state().note.as_ref().map(|n| n.content.as_str()), Some("fresh"));
}

#[tokio::test]
async fn new_tags_on_notes_become_tags_after_reload() {
    let h = Harness::new(vec![note("a", &[])], vec![]).loaded().await;
    h.ctx
        .update_note_tags(&NoteId::new("a"), vec!["ideas".into(), "bob@example.com".into()])
        .await
        .expect("tags");

    let state = h.state();
    let names: Vec<&str> = state.tags.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["ideas"]);
    assert_eq!(state.notes[0].tags, vec!["ideas", "bob@example.com"]);
}

#[tokio::test]
async fn pinning_only_writes_on_change() {
    let h = Harness::new(vec![note("a", &[]), note("b", &[])], vec![]).loaded().await;
    let id = NoteId::new("b");

    assert!(h.ctx.set_system_tag(&id, SystemTag::Pinned, true).await.expect("pin"));
    assert_eq!(h.state().notes[0].id, id);
    h.remote.clear_calls().await;

    assert!(!h.ctx.set_system_tag(&id, SystemTag::Pinned, true).await.expect("again"));
    assert!(h.remote.calls().await.is_empty());
}

#[tokio::test]
async fn empty_trash_drops_deleted_notes_everywhere() {
    let mut gone = note("gone", &[]);
    gone.deleted = true;
    let h = Harness::new(vec![note("keep", &[]), gone], vec![]).loaded().await;
    h.ctx.store().dispatch(Action::SelectTrash);
    h.ctx.store().dispatch(Action::SelectNote(NoteId::new("gone")));

    h.ctx.empty_trash().await.expect("empty");
    let state = h.state();
    assert!(state.note.is_none());
    assert_eq!(state.notes.len(), 1);
    assert_eq!(h.remote.calls().await[0], RemoteCall::EmptyTrash);
    assert_eq!(state.list_view, ListView::Trash);
}

#[tokio::test]
async fn trash_tag_untags_notes_and_deletes_it() {
    let work = Tag::named("work", 0);
    let h = Harness::new(
        vec![note("a", &["work", "home"])],
        vec![work.clone(), Tag::named("home", 1)],
    )
    .loaded()
    .await;

    h.ctx.trash_tag(&work.id).await.expect("trash tag");
    let state = h.state();
    assert_eq!(state.notes[0].tags, vec!["home"]);
    assert_eq!(state.tags.len(), 1);
    assert!(h.remote.calls().await.contains(&RemoteCall::DeleteTag(work.id)));
}

#[tokio::test]
async fn reorder_assigns_positions() {
    let a = Tag::named("a", 0);
    let b = Tag::named("b", 1);
    let h = Harness::new(vec![], vec![a.clone(), b.clone()]).loaded().await;

    h.ctx.reorder_tags(&[b.id.clone(), a.id.clone()]).await.expect("reorder");
    let names: Vec<String> = h.state().tags.iter().map(|t| t.name.clone()).collect();
    assert_eq!(names, vec!["b", "a"]);
}

#[tokio::test]
async fn sort_changes_reload_with_the_new_order() {
    let h = Harness::new(vec![], vec![]).loaded().await;
    h.ctx.set_sort_type(SortType::Alphabetical).await.expect("sort");
    h.ctx.toggle_sort_order().await.expect("toggle");

    let calls = h.remote.calls().await;
    assert_eq!(
        calls,
        vec![
            RemoteCall::ListNotes {
                order: Some("content ASC".into())
            },
            RemoteCall::ListNotes {
                order: Some("content DESC".into())
            },
        ]
    );
}

#[test]
fn font_size_commands_stay_in_bounds() {
    let h = Harness::new(vec![], vec![]);
    for _ in 0..40 {
        h.ctx.increase_font_size();
    }
    assert_eq!(h.state().settings.font_size, shared::settings::MAX_FONT_SIZE);
    assert!(!h.ctx.increase_font_size());
    assert!(h.ctx.reset_font_size());
    assert_eq!(h.state().settings.font_size, DEFAULT_FONT_SIZE);
}

#[tokio::test]
async fn revisions_are_loaded_from_the_single_note() {
    let mut a = note("a", &[]);
    a.revisions = Some(vec![shared::domain::NoteRevision {
        version: 1,
        content: "draft".into(),
        tags: vec![],
        modification_date: 1.0,
    }]);
    let h = Harness::new(vec![a], vec![]).loaded().await;

    h.ctx.note_revisions(&NoteId::new("a")).await.expect("revisions");
    assert_eq!(h.state().revisions.as_ref().map(Vec::len), Some(1));
}
