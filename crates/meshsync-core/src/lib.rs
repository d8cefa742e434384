pub mod config;
pub mod error;
pub mod preferences;

pub use config::{ServiceConfig, ValidationResult};
pub use error::{
    DeviceError, NetworkError, ReqwestErrorExt, RusqliteErrorExt, SettingsError, StorageError,
};
pub use preferences::{ColorTheme, Configuration, StepGoal, TemperatureUnit};

use anyhow::Result;

/// Initialize logging. `RUST_LOG` overrides the default `info` filter.
pub fn init() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {}", e))?;

    tracing::info!("meshsync core initialized");
    Ok(())
}
