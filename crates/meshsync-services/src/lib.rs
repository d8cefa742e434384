//! Weather sync services: settings persistence, the per-run pipeline, device
//! messages and the event-driven orchestrator.

pub mod device;
pub mod events;
pub mod orchestrator;
pub mod pipeline;
pub mod settings;
pub mod settings_store;

pub use device::{build_message, DeviceChannel, DeviceMessage, LogChannel, MemoryChannel, MessageValue};
pub use events::{AppMessagePayload, InboundEvent};
pub use orchestrator::{EventOutcome, SyncOrchestrator};
pub use pipeline::{Pipeline, PipelineResult};
pub use settings::{parse_form_response, AppliedForm, FormValues, SettingsManager, SettingsOutcome};
pub use settings_store::{SettingsStore, SqliteSettingsStore};
