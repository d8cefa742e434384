//! One weather sync run: resolve location, fetch conditions, normalize
//! every failure into a displayable [`WeatherState`].

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Local, Utc};
use meshsync_core::{Configuration, ServiceConfig};
use meshsync_weather::types::sentinel;
use meshsync_weather::{
    locate, DeviceLocator, Geocoder, LocatorOptions, ResolveError, ResolvedLocation,
    WeatherProvider, WeatherState,
};
use reqwest::Client;
use tracing::instrument;

/// Outcome of a full run, tagged with the run that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineResult {
    pub run_id: u64,
    pub state: WeatherState,
}

pub struct Pipeline {
    geocoder: Geocoder,
    provider: WeatherProvider,
    locator: Box<dyn DeviceLocator>,
    locator_options: LocatorOptions,
}

impl Pipeline {
    /// Build a pipeline sharing one HTTP client across all endpoints.
    pub fn new(config: &ServiceConfig, locator: Box<dyn DeviceLocator>) -> Result<Self, reqwest::Error> {
        let client = Arc::new(Client::builder().user_agent(&config.user_agent).build()?);

        Ok(Self {
            geocoder: Geocoder::with_client(Arc::clone(&client), config),
            provider: WeatherProvider::with_client(client, config),
            locator,
            locator_options: LocatorOptions::from_config(config),
        })
    }

    /// Turn the configured location into coordinates and a display name.
    ///
    /// A non-empty location is geocoded by name. An empty one asks the device
    /// for a fix and reverse geocodes it; a failed reverse lookup still
    /// succeeds with the generic "GPS Loc" name.
    pub async fn resolve_location(&self, config: &Configuration) -> Result<ResolvedLocation, ResolveError> {
        if !config.uses_gps() {
            tracing::info!("Using static location: {}", config.location.trim());
            return Ok(self.geocoder.search(&config.location).await?);
        }

        tracing::info!("Using GPS location");
        let coordinates = locate(self.locator.as_ref(), &self.locator_options).await?;

        let display_name = match self.geocoder.reverse(&coordinates).await {
            Ok(name) => name,
            Err(e) => {
                tracing::warn!("Reverse geocoding failed: {}", e);
                sentinel::GPS_LOC.to_string()
            }
        };

        Ok(ResolvedLocation {
            coordinates,
            display_name,
        })
    }

    /// Full run evaluated at `now` (the device's local time).
    #[instrument(skip(self, config), fields(location = %config.location), level = "info")]
    pub async fn run_at(&self, config: &Configuration, now: DateTime<FixedOffset>) -> WeatherState {
        let resolved = match self.resolve_location(config).await {
            Ok(resolved) => resolved,
            Err(e) => {
                tracing::warn!("Location resolution failed: {}", e);
                return WeatherState::location_failed(e.sentinel());
            }
        };

        let state = match self
            .provider
            .fetch_current(
                &resolved.coordinates,
                config.temperature_unit,
                now.date_naive(),
                now.with_timezone(&Utc),
            )
            .await
        {
            Ok(current) => WeatherState::resolved(&resolved.display_name, current),
            Err(e) => {
                tracing::warn!("Weather fetch failed: {}", e);
                WeatherState::weather_failed(&resolved.display_name, e.sentinel())
            }
        };

        tracing::info!(
            "Run finished: temperature={}, location={}, condition={}",
            state.temperature,
            state.location,
            state.condition
        );
        state
    }

    pub async fn run(&self, config: &Configuration) -> WeatherState {
        self.run_at(config, Local::now().fixed_offset()).await
    }
}
