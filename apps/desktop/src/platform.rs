//! Boundary to the platform shell: commands in, notifications out.

use std::path::PathBuf;

use anyhow::Context;
use async_trait::async_trait;
use serde::Serialize;
use shared::{protocol::AppCommand, settings::Settings};
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Lines},
    sync::Mutex,
};
use tracing::warn;

/// Notification sent to the shell.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ShellNotice {
    SettingsUpdated { settings: Settings },
    CommandFailed { command: String, message: String },
    BackgroundWriteFailed { entity: String, message: String },
    ExportFinished { path: PathBuf },
}

#[async_trait]
pub trait PlatformBridge: Send + Sync {
    /// Next inbound command, `None` once the shell went away.
    async fn next_command(&self) -> anyhow::Result<Option<AppCommand>>;
    async fn notify(&self, notice: ShellNotice) -> anyhow::Result<()>;

    async fn settings_updated(&self, settings: &Settings) -> anyhow::Result<()> {
        self.notify(ShellNotice::SettingsUpdated {
            settings: settings.clone(),
        })
        .await
    }
}

/// One JSON document per line in both directions.
pub struct NdjsonBridge<R, W> {
    input: Mutex<Lines<R>>,
    output: Mutex<W>,
}

impl NdjsonBridge<BufReader<tokio::io::Stdin>, tokio::io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
    }
}

impl<R, W> NdjsonBridge<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(input: R, output: W) -> Self {
        Self {
            input: Mutex::new(input.lines()),
            output: Mutex::new(output),
        }
    }

    pub async fn into_output(self) -> W {
        self.output.into_inner()
    }
}

#[async_trait]
impl<R, W> PlatformBridge for NdjsonBridge<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn next_command(&self) -> anyhow::Result<Option<AppCommand>> {
        let mut lines = self.input.lock().await;
        while let Some(line) = lines
            .next_line()
            .await
            .context("failed to read command stream")?
        {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<AppCommand>(line) {
                Ok(command) => return Ok(Some(command)),
                Err(err) => warn!(error = %err, "platform: dropping malformed command"),
            }
        }
        Ok(None)
    }

    async fn notify(&self, notice: ShellNotice) -> anyhow::Result<()> {
        let mut line = serde_json::to_vec(&notice).context("failed to encode notice")?;
        line.push(b'\n');
        let mut output = self.output.lock().await;
        output
            .write_all(&line)
            .await
            .context("failed to write notice")?;
        output.flush().await.context("failed to flush notice")
    }
}

#[cfg(test)]
#[path = "tests/platform_tests.rs"]
mod tests;
