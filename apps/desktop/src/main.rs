mod config;
mod controller;
mod export;
mod platform;

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use app_state::{AppState, CommandContext, Store};
use async_trait::async_trait;
use clap::Parser;
use client_core::{
    AuthError, AuthProvider, CredentialHeaders, DeviseTokenAuth, HttpRemoteStore,
    InMemoryRemoteStore, RemoteStore, AUTH_HEADERS_KEY,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::{
    controller::{Controller, ControllerOptions},
    platform::NdjsonBridge,
};

#[derive(Parser, Debug)]
#[command(name = "notedeck", about = "Note sync controller speaking NDJSON on stdio")]
struct Args {
    /// Config file, defaults to ./notedeck.toml when present.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    api_url: Option<String>,
    /// Keep notes in memory instead of talking to a server.
    #[arg(long)]
    offline: bool,
}

/// Auth collaborator for offline sessions: always valid.
struct OfflineAuth;

#[async_trait]
impl AuthProvider for OfflineAuth {
    fn retrieve_data(&self, key: &str) -> Option<CredentialHeaders> {
        (key == AUTH_HEADERS_KEY).then(CredentialHeaders::default)
    }

    async fn validate_token(&self) -> Result<(), AuthError> {
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let mut settings = config::load_settings(args.config.as_deref())?;
    if let Some(api_url) = args.api_url {
        settings.api_url = api_url;
    }

    let (remote, auth): (Arc<dyn RemoteStore>, Arc<dyn AuthProvider>) = if args.offline {
        info!("starting offline session");
        (Arc::new(InMemoryRemoteStore::new()), Arc::new(OfflineAuth))
    } else {
        info!(api_url = %settings.api_url, "starting session");
        let remote = HttpRemoteStore::new(&settings.api_url, settings.request_timeout())
            .context("failed to build remote store client")?;
        let auth = DeviseTokenAuth::new(
            remote.api_url(),
            settings.credentials(),
            settings.request_timeout(),
        )
        .context("failed to build auth client")?;
        (Arc::new(remote), Arc::new(auth))
    };

    let store = Arc::new(Store::new(AppState::default()));
    let ctx = CommandContext::new(store, remote, settings.tag_rename_debounce());
    let controller = Controller::new(
        ctx,
        auth,
        Arc::new(NdjsonBridge::stdio()),
        ControllerOptions::from(&settings),
    );

    controller.start().await;
    let outcome = tokio::select! {
        outcome = controller.run() => outcome,
        _ = tokio::signal::ctrl_c() => {
            info!("interrupted");
            Ok(())
        }
    };
    controller.shutdown().await;
    outcome.context("controller stopped")
}
