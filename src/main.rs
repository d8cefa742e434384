use std::sync::Arc;

use anyhow::{Context, Result};
use meshsync_core::ServiceConfig;
use meshsync_services::{
    InboundEvent, LogChannel, Pipeline, SettingsManager, SqliteSettingsStore, SyncOrchestrator,
};
use meshsync_weather::location::locator_from_config;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<()> {
    meshsync_core::init()?;

    let config_path = ServiceConfig::config_path();
    if !config_path.exists() {
        match ServiceConfig::save_default(&config_path) {
            Ok(()) => tracing::info!("Wrote default config to {}", config_path.display()),
            Err(e) => tracing::warn!("Could not write default config: {:#}", e),
        }
    }
    let (config, _) = ServiceConfig::load_validated(&config_path)?;

    let store = SqliteSettingsStore::open(&config.settings_db)
        .with_context(|| format!("Failed to open settings at {}", config.settings_db.display()))?;
    let settings = SettingsManager::load(Box::new(store));

    let pipeline = Pipeline::new(&config, locator_from_config(&config))
        .context("Failed to build HTTP client")?;
    let channel = Arc::new(LogChannel::new(config.max_message_bytes));
    let orchestrator = SyncOrchestrator::new(pipeline, settings, channel, config.refresh_interval());

    tracing::info!("meshsync started");

    let (tx, rx) = mpsc::channel(32);
    let shutdown = CancellationToken::new();

    tx.send(InboundEvent::Ready)
        .await
        .context("Event channel closed before start")?;
    tokio::spawn(read_events(tx));

    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                shutdown.cancel();
            }
        });
    }

    orchestrator.run(rx, shutdown).await;

    tracing::info!("meshsync stopped");
    Ok(())
}

/// Forward JSON-line events from stdin until EOF.
async fn read_events(tx: mpsc::Sender<InboundEvent>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        match lines.next_line().await {
            Ok(Some(line)) if line.trim().is_empty() => continue,
            Ok(Some(line)) => match serde_json::from_str::<InboundEvent>(&line) {
                Ok(event) => {
                    if tx.send(event).await.is_err() {
                        break;
                    }
                }
                Err(e) => tracing::warn!("Ignoring malformed event {:?}: {}", line, e),
            },
            Ok(None) => break,
            Err(e) => {
                tracing::warn!("Failed to read stdin: {}", e);
                break;
            }
        }
    }
}
