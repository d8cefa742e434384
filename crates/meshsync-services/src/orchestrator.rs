//! Sync orchestrator: maps inbound events to pipeline runs or re-sends.
//!
//! Full runs are spawned as tokio tasks. Every run takes a fresh id; when a
//! run finishes after a newer one was started, its result is dropped so a
//! stale run never overwrites newer output.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use meshsync_core::Configuration;
use meshsync_weather::WeatherState;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::device::{build_message, transmit, DeviceChannel};
use crate::events::InboundEvent;
use crate::pipeline::{Pipeline, PipelineResult};
use crate::settings::{parse_form_response, SettingsManager, SettingsOutcome};

/// What handling an event led to.
#[derive(Debug)]
pub enum EventOutcome {
    /// A full run was started; the handle yields `None` if it was superseded.
    Refreshing(JoinHandle<Option<PipelineResult>>),
    /// The last weather state was re-sent with the current settings.
    Resent,
    Ignored,
}

pub struct SyncOrchestrator {
    pipeline: Arc<Pipeline>,
    settings: Arc<Mutex<SettingsManager>>,
    channel: Arc<dyn DeviceChannel>,
    last_state: Arc<Mutex<WeatherState>>,
    latest_run: Arc<AtomicU64>,
    refresh_interval: Option<Duration>,
}

impl SyncOrchestrator {
    pub fn new(
        pipeline: Pipeline,
        settings: SettingsManager,
        channel: Arc<dyn DeviceChannel>,
        refresh_interval: Option<Duration>,
    ) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            settings: Arc::new(Mutex::new(settings)),
            channel,
            last_state: Arc::new(Mutex::new(WeatherState::loading())),
            latest_run: Arc::new(AtomicU64::new(0)),
            refresh_interval,
        }
    }

    /// Current user configuration.
    pub fn config(&self) -> Configuration {
        self.settings.lock().snapshot()
    }

    /// Last weather state delivered by a full run.
    pub fn last_state(&self) -> WeatherState {
        self.last_state.lock().clone()
    }

    /// Spawn a full pipeline run against the current configuration.
    pub fn start_run(&self) -> JoinHandle<Option<PipelineResult>> {
        let run_id = self.latest_run.fetch_add(1, Ordering::SeqCst) + 1;
        let config = self.settings.lock().snapshot();

        let pipeline = Arc::clone(&self.pipeline);
        let settings = Arc::clone(&self.settings);
        let channel = Arc::clone(&self.channel);
        let last_state = Arc::clone(&self.last_state);
        let latest_run = Arc::clone(&self.latest_run);

        tracing::info!("Starting weather run {}", run_id);

        tokio::spawn(async move {
            let state = pipeline.run(&config).await;

            if latest_run.load(Ordering::SeqCst) != run_id {
                tracing::debug!("Discarding result of superseded run {}", run_id);
                return None;
            }

            *last_state.lock() = state.clone();

            // Display settings may have changed while the run was in flight.
            let message = build_message(&settings.lock().snapshot(), &state);
            transmit(channel.as_ref(), &message).await;

            Some(PipelineResult { run_id, state })
        })
    }

    /// Re-send the last weather state with the current display settings.
    pub async fn resend(&self) -> bool {
        let message = {
            let config = self.settings.lock().snapshot();
            let state = self.last_state.lock().clone();
            build_message(&config, &state)
        };
        transmit(self.channel.as_ref(), &message).await
    }

    pub async fn handle_event(&self, event: InboundEvent) -> EventOutcome {
        match event {
            InboundEvent::Ready => {
                tracing::info!("Watch ready");
                EventOutcome::Refreshing(self.start_run())
            }
            InboundEvent::Tick => EventOutcome::Refreshing(self.start_run()),
            InboundEvent::AppMessage { payload } => {
                if let Some(location) = payload.location.as_deref() {
                    self.settings.lock().set_location_transient(location);
                    EventOutcome::Refreshing(self.start_run())
                } else if payload.requests_weather() {
                    tracing::info!("Weather requested by watch");
                    EventOutcome::Refreshing(self.start_run())
                } else {
                    tracing::debug!("App message without recognized keys");
                    EventOutcome::Ignored
                }
            }
            InboundEvent::SettingsClosed { response } => {
                let Some(raw) = response.filter(|r| !r.trim().is_empty()) else {
                    tracing::debug!("Settings closed without a response");
                    return EventOutcome::Ignored;
                };
                self.apply_settings(&raw).await
            }
        }
    }

    async fn apply_settings(&self, raw: &str) -> EventOutcome {
        let values = match parse_form_response(raw) {
            Ok(values) => values,
            Err(e) => {
                tracing::warn!("Ignoring settings response: {}", e);
                return EventOutcome::Ignored;
            }
        };

        let applied = self.settings.lock().apply_form(&values);
        if let Some(e) = &applied.save_error {
            tracing::warn!("Settings applied but not saved: {}", e);
        }

        match applied.outcome {
            SettingsOutcome::Refresh => EventOutcome::Refreshing(self.start_run()),
            SettingsOutcome::Resend => {
                self.resend().await;
                EventOutcome::Resent
            }
            SettingsOutcome::Unchanged => EventOutcome::Ignored,
        }
    }

    /// Drive the event loop until `shutdown` fires.
    ///
    /// When the event channel closes the refresh timer keeps running; without
    /// a timer the loop waits for the last run and returns.
    pub async fn run(&self, mut events: mpsc::Receiver<InboundEvent>, shutdown: CancellationToken) {
        let mut ticker = self.refresh_interval.map(|period| {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            interval
        });
        let mut events_open = true;
        let mut pending: Option<JoinHandle<Option<PipelineResult>>> = None;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("Shutting down orchestrator");
                    break;
                }
                event = events.recv(), if events_open => match event {
                    Some(event) => {
                        if let EventOutcome::Refreshing(handle) = self.handle_event(event).await {
                            pending = Some(handle);
                        }
                    }
                    None => {
                        tracing::debug!("Event channel closed");
                        events_open = false;
                        if ticker.is_none() {
                            if let Some(handle) = pending.take() {
                                let _ = handle.await;
                            }
                            break;
                        }
                    }
                },
                _ = next_tick(&mut ticker) => {
                    tracing::debug!("Refresh timer fired");
                    pending = Some(self.start_run());
                }
            }
        }
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}
