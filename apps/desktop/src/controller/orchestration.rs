//! Session orchestration: auth bootstrap, recurring tasks and routing of
//! platform commands onto the store and the command procedures.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use anyhow::Context;
use app_state::{Action, AppState, AuthStatus, CommandContext, DialogRequest, SyncEvent};
use client_core::{AuthProvider, AUTH_HEADERS_KEY};
use futures::future::{BoxFuture, FutureExt};
use shared::{
    domain::{DialogKind, SystemTag},
    protocol::AppCommand,
    settings::Settings,
};
use tokio::{
    sync::{broadcast, broadcast::error::RecvError, watch},
    task::{JoinHandle, JoinSet},
    time::MissedTickBehavior,
};
use tracing::{debug, info, warn};

use super::events::{auth_status_for, shortcut_for, ControllerError, Shortcut};
use crate::{
    config,
    export::{export_zip_archive, resolve_archive_path},
    platform::{PlatformBridge, ShellNotice},
};

type RemoteWork = BoxFuture<'static, anyhow::Result<()>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerOptions {
    pub auth_poll_interval: Duration,
    pub auth_poll_max_attempts: Option<u32>,
    pub sync_interval: Option<Duration>,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self::from(&config::Settings::default())
    }
}

impl From<&config::Settings> for ControllerOptions {
    fn from(settings: &config::Settings) -> Self {
        Self {
            auth_poll_interval: settings.auth_poll_interval(),
            auth_poll_max_attempts: settings.auth_poll_max_attempts,
            sync_interval: settings.sync_interval(),
        }
    }
}

pub struct Controller {
    ctx: CommandContext,
    auth: Arc<dyn AuthProvider>,
    platform: Arc<dyn PlatformBridge>,
    options: ControllerOptions,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Controller {
    pub fn new(
        ctx: CommandContext,
        auth: Arc<dyn AuthProvider>,
        platform: Arc<dyn PlatformBridge>,
        options: ControllerOptions,
    ) -> Self {
        Self {
            ctx,
            auth,
            platform,
            options,
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn context(&self) -> &CommandContext {
        &self.ctx
    }

    pub fn state(&self) -> Arc<AppState> {
        self.ctx.store().get_state()
    }

    /// Validates the stored session and starts the session's background
    /// tasks. Notes and tags load once the session is authorized.
    pub async fn start(&self) {
        self.validate_session().await;

        let mut tasks = Vec::new();
        tasks.push(tokio::spawn(poll_authorization(
            self.ctx.clone(),
            Arc::clone(&self.auth),
            self.options.auth_poll_interval,
            self.options.auth_poll_max_attempts,
        )));
        if let Some(period) = self.options.sync_interval {
            tasks.push(tokio::spawn(periodic_reload(self.ctx.clone(), period)));
        }
        tasks.push(tokio::spawn(forward_settings(
            self.ctx.store().subscribe(),
            Arc::clone(&self.platform),
        )));
        tasks.push(tokio::spawn(forward_failures(
            self.ctx.subscribe_events(),
            Arc::clone(&self.platform),
        )));

        self.lock_tasks().extend(tasks);
    }

    /// Hands the stored credentials to the gateway and validates them.
    pub async fn validate_session(&self) -> AuthStatus {
        validate_session(&self.ctx, self.auth.as_ref()).await
    }

    /// Reads commands until the shell closes the stream. Remote work runs
    /// concurrently; dispatch-only commands apply in arrival order.
    pub async fn run(&self) -> Result<(), ControllerError> {
        let mut in_flight = JoinSet::new();
        loop {
            while in_flight.try_join_next().is_some() {}

            let command = match self.platform.next_command().await {
                Ok(Some(command)) => command,
                Ok(None) => break,
                Err(err) => return Err(ControllerError::Platform(err)),
            };
            let name = command.name();
            if let Some(work) = self.route(command)? {
                let ctx = self.ctx.clone();
                in_flight.spawn(async move {
                    if let Err(err) = work.await {
                        ctx.report_failure(name, &err);
                    }
                });
            }
        }

        info!(pending = in_flight.len(), "command stream closed");
        while in_flight.join_next().await.is_some() {}
        Ok(())
    }

    /// Handles one command to completion.
    pub async fn handle(&self, command: AppCommand) -> Result<(), ControllerError> {
        let name = command.name();
        if let Some(work) = self.route(command)? {
            if let Err(err) = work.await {
                self.ctx.report_failure(name, &err);
            }
        }
        Ok(())
    }

    /// Stops every recurring task after writing out queued tag renames.
    pub async fn shutdown(&self) {
        self.ctx.flush_pending_writes().await;
        let tasks = std::mem::take(&mut *self.lock_tasks());
        for task in &tasks {
            task.abort();
        }
        debug!(tasks = tasks.len(), "controller stopped");
    }

    pub fn running_tasks(&self) -> usize {
        self.lock_tasks()
            .iter()
            .filter(|task| !task.is_finished())
            .count()
    }

    fn lock_tasks(&self) -> std::sync::MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.tasks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn dispatch(&self, action: Action) -> Result<Option<RemoteWork>, ControllerError> {
        self.ctx.store().dispatch(action);
        Ok(None)
    }

    fn remote<F>(&self, work: impl FnOnce(CommandContext) -> F) -> Result<Option<RemoteWork>, ControllerError>
    where
        F: std::future::Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Ok(Some(work(self.ctx.clone()).boxed()))
    }

    fn update_settings(
        &self,
        edit: impl FnOnce(&Settings) -> Settings,
    ) -> Result<Option<RemoteWork>, ControllerError> {
        self.ctx.update_settings(edit);
        Ok(None)
    }

    /// Applies the synchronous part of `command` and returns its remote
    /// work, if any. Only an unknown dialog kind is fatal.
    fn route(&self, command: AppCommand) -> Result<Option<RemoteWork>, ControllerError> {
        debug!(command = command.name(), "controller: routing command");
        match command {
            AppCommand::NewNote { content } => self.remote(|ctx| async move {
                ctx.new_note(&content).await.map(drop)
            }),
            AppCommand::ExportZipArchive { filename } => {
                let notes = self.state().notes.clone();
                let platform = Arc::clone(&self.platform);
                self.remote(|_| async move {
                    let path = export_zip_archive(resolve_archive_path(&filename), notes).await?;
                    platform
                        .notify(ShellNotice::ExportFinished { path })
                        .await
                        .context("failed to report export")
                })
            }
            AppCommand::SelectNote { note_id } => self.dispatch(Action::SelectNote(note_id)),
            AppCommand::CloseNote => self.dispatch(Action::close_note()),
            AppCommand::UpdateContent { note_id, content } => self.remote(|ctx| async move {
                ctx.update_note_content(&note_id, &content).await
            }),
            AppCommand::UpdateNoteTags { note_id, tags } => self.remote(|ctx| async move {
                ctx.update_note_tags(&note_id, tags).await
            }),
            AppCommand::TrashNote { note_id } => {
                self.remote(|ctx| async move { ctx.trash_note(&note_id).await })
            }
            AppCommand::RestoreNote { note_id } => {
                self.remote(|ctx| async move { ctx.restore_note(&note_id).await })
            }
            AppCommand::DeleteNoteForever { note_id } => {
                self.remote(|ctx| async move { ctx.delete_note_forever(&note_id).await })
            }
            AppCommand::PinNote { note_id, pin } => self.remote(|ctx| async move {
                ctx.set_system_tag(&note_id, SystemTag::Pinned, pin).await.map(drop)
            }),
            AppCommand::MarkdownNote { note_id, markdown } => self.remote(|ctx| async move {
                ctx.set_system_tag(&note_id, SystemTag::Markdown, markdown)
                    .await
                    .map(drop)
            }),
            AppCommand::PublishNote { note_id, publish } => self.remote(|ctx| async move {
                ctx.set_system_tag(&note_id, SystemTag::Published, publish)
                    .await
                    .map(drop)
            }),
            AppCommand::NoteRevisions { note_id } => {
                self.remote(|ctx| async move { ctx.note_revisions(&note_id).await })
            }
            AppCommand::EmptyTrash => self.remote(|ctx| async move { ctx.empty_trash().await }),
            AppCommand::RenameTag { tag_id, name } => {
                self.ctx.rename_tag(&tag_id, &name);
                Ok(None)
            }
            AppCommand::TrashTag { tag_id } => {
                self.remote(|ctx| async move { ctx.trash_tag(&tag_id).await })
            }
            AppCommand::ReorderTags { tag_ids } => {
                self.remote(|ctx| async move { ctx.reorder_tags(&tag_ids).await })
            }
            AppCommand::SelectAllNotes => self.dispatch(Action::SelectAllNotes),
            AppCommand::SelectTrash => self.dispatch(Action::SelectTrash),
            AppCommand::SelectTag { tag_id } => match self.state().find_tag(&tag_id) {
                Some(tag) => self.dispatch(Action::SelectTag(tag.clone())),
                None => {
                    warn!(tag_id = %tag_id, "cannot select unknown tag");
                    Ok(None)
                }
            },
            AppCommand::Search { filter } => self.dispatch(Action::Search { filter }),
            AppCommand::ToggleNavigation => self.dispatch(Action::ToggleNavigation),
            AppCommand::ToggleNoteInfo => self.dispatch(Action::ToggleNoteInfo),
            AppCommand::EditTags => self.dispatch(Action::EditTags),
            AppCommand::SetEditorMode { mode } => self.dispatch(Action::SetEditorMode(mode)),
            AppCommand::ShowDialog { dialog, params } => {
                let kind: DialogKind = dialog.dialog_type.parse()?;
                self.dispatch(Action::ShowDialog {
                    request: DialogRequest {
                        kind,
                        single: dialog.single,
                        modal: dialog.modal,
                    },
                    params,
                })
            }
            AppCommand::CloseDialog { key } => self.dispatch(Action::CloseDialog { key }),
            AppCommand::SetShouldPrintNote { should_print } => {
                self.dispatch(Action::SetShouldPrint(should_print))
            }
            AppCommand::SetSearchFocus { search_focus } => {
                self.dispatch(Action::SetSearchFocus(search_focus))
            }
            AppCommand::SetSortType { sort_type } => {
                self.remote(move |ctx| async move { ctx.set_sort_type(sort_type).await })
            }
            AppCommand::ToggleSortOrder => {
                self.remote(|ctx| async move { ctx.toggle_sort_order().await })
            }
            AppCommand::ActivateTheme { theme } => self.update_settings(|settings| Settings {
                theme,
                ..settings.clone()
            }),
            AppCommand::IncreaseFontSize => {
                self.ctx.increase_font_size();
                Ok(None)
            }
            AppCommand::DecreaseFontSize => {
                self.ctx.decrease_font_size();
                Ok(None)
            }
            AppCommand::ResetFontSize => {
                self.ctx.reset_font_size();
                Ok(None)
            }
            AppCommand::SetNoteDisplay { note_display } => {
                self.update_settings(|settings| Settings {
                    note_display,
                    ..settings.clone()
                })
            }
            AppCommand::SetMarkdown { enabled } => self.update_settings(|settings| Settings {
                markdown_enabled: enabled,
                ..settings.clone()
            }),
            AppCommand::SetAccountName { account_name } => {
                self.update_settings(|settings| Settings {
                    account_name,
                    ..settings.clone()
                })
            }
            AppCommand::KeyDown {
                key,
                ctrl_key,
                meta_key,
            } => match shortcut_for(&key, ctrl_key, meta_key, &self.state()) {
                Some(Shortcut::OpenTagList) => self.dispatch(Action::ToggleNavigation),
                Some(Shortcut::FocusSearch) => self.dispatch(Action::SetSearchFocus(true)),
                None => Ok(None),
            },
            AppCommand::SetAuthorized => {
                self.dispatch(Action::AuthStatusChanged(AuthStatus::Authorized))
            }
            AppCommand::ResetAuth => {
                self.dispatch(Action::AuthStatusChanged(AuthStatus::Unauthorized))
            }
            AppCommand::ValidateSession => {
                let auth = Arc::clone(&self.auth);
                self.remote(|ctx| async move {
                    validate_session(&ctx, auth.as_ref()).await;
                    Ok(())
                })
            }
            AppCommand::Unknown => {
                debug!("ignoring unknown command");
                Ok(None)
            }
        }
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        for task in self.lock_tasks().iter() {
            task.abort();
        }
    }
}

async fn validate_session(ctx: &CommandContext, auth: &dyn AuthProvider) -> AuthStatus {
    ctx.remote().init(auth.retrieve_data(AUTH_HEADERS_KEY)).await;

    let result = auth.validate_token().await;
    if let Err(err) = &result {
        warn!(error = %err, "token validation failed");
    }
    let status = auth_status_for(&result);
    ctx.store()
        .dispatch(Action::AuthStatusChanged(status.clone()));
    status
}

/// Waits for the session to become authorized, loads the lists once, then
/// waits for it to end and starts over. Credentials are re-read on every
/// authorization since they may have arrived after start-up.
async fn poll_authorization(
    ctx: CommandContext,
    auth: Arc<dyn AuthProvider>,
    interval: Duration,
    max_attempts: Option<u32>,
) {
    loop {
        let mut attempts: u32 = 0;
        while !ctx.store().get_state().is_authorized() {
            attempts += 1;
            if max_attempts.is_some_and(|max| attempts > max) {
                warn!(attempts = attempts - 1, "gave up waiting for authorization");
                return;
            }
            tokio::time::sleep(interval).await;
        }

        info!(attempts, "session authorized, loading notes and tags");
        ctx.remote().init(auth.retrieve_data(AUTH_HEADERS_KEY)).await;
        if let Err(err) = ctx.load_notes().await {
            ctx.report_failure("load_notes", &err);
        }
        if let Err(err) = ctx.load_tags().await {
            ctx.report_failure("load_tags", &err);
        }

        let mut updates = ctx.store().subscribe();
        while updates.borrow_and_update().is_authorized() {
            if updates.changed().await.is_err() {
                return;
            }
        }
        info!("session ended, dropping account data");
        ctx.store().dispatch(Action::AuthChanged);
    }
}

async fn periodic_reload(ctx: CommandContext, period: Duration) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;
    loop {
        ticker.tick().await;
        if !ctx.store().get_state().is_authorized() {
            continue;
        }
        debug!("periodic reload");
        if let Err(err) = ctx.load_notes().await {
            ctx.report_failure("load_notes", &err);
        }
        if let Err(err) = ctx.load_tags().await {
            ctx.report_failure("load_tags", &err);
        }
    }
}

async fn forward_settings(
    mut updates: watch::Receiver<Arc<AppState>>,
    platform: Arc<dyn PlatformBridge>,
) {
    let mut last = updates.borrow_and_update().settings.clone();
    while updates.changed().await.is_ok() {
        let settings = updates.borrow_and_update().settings.clone();
        if settings == last {
            continue;
        }
        if let Err(err) = platform.settings_updated(&settings).await {
            warn!(error = %format!("{err:#}"), "failed to push settings to the shell");
        }
        last = settings;
    }
}

async fn forward_failures(
    mut events: broadcast::Receiver<SyncEvent>,
    platform: Arc<dyn PlatformBridge>,
) {
    loop {
        let notice = match events.recv().await {
            Ok(SyncEvent::CommandFailed { command, message }) => {
                ShellNotice::CommandFailed { command, message }
            }
            Ok(SyncEvent::BackgroundWriteFailed { entity, message }) => {
                ShellNotice::BackgroundWriteFailed { entity, message }
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "dropped failure notices");
                continue;
            }
            Err(RecvError::Closed) => return,
        };
        if let Err(err) = platform.notify(notice).await {
            warn!(error = %format!("{err:#}"), "failed to report failure to the shell");
        }
    }
}

#[cfg(test)]
#[path = "../tests/orchestration_tests.rs"]
mod tests;
