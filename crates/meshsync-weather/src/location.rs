//! Device-native geolocation.
//!
//! The host platform supplies a [`DeviceLocator`]. `NoLocator` models a host
//! without any location capability; `FixedLocator` reports a configured
//! position (or a canned failure).

use std::time::Duration;

use async_trait::async_trait;
use meshsync_core::ServiceConfig;

use crate::types::{Coordinates, LocationError};

/// Options forwarded to the platform location request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocatorOptions {
    pub high_accuracy: bool,
    pub timeout: Duration,
    /// Accept a cached fix up to this age
    pub max_age: Duration,
}

impl LocatorOptions {
    pub fn from_config(config: &ServiceConfig) -> Self {
        Self {
            high_accuracy: false,
            timeout: config.location_timeout(),
            max_age: Duration::from_secs(config.location_max_age_secs),
        }
    }
}

impl Default for LocatorOptions {
    fn default() -> Self {
        Self::from_config(&ServiceConfig::default())
    }
}

#[async_trait]
pub trait DeviceLocator: Send + Sync {
    /// False when the host has no location capability at all.
    fn is_available(&self) -> bool;

    async fn current_location(&self, options: &LocatorOptions) -> Result<Coordinates, LocationError>;
}

/// Ask the locator for a fix, bounded by `options.timeout`.
pub async fn locate(
    locator: &dyn DeviceLocator,
    options: &LocatorOptions,
) -> Result<Coordinates, LocationError> {
    if !locator.is_available() {
        return Err(LocationError::ServiceUnavailable);
    }

    match tokio::time::timeout(options.timeout, locator.current_location(options)).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!("Device location timed out after {:?}", options.timeout);
            Err(LocationError::Timeout)
        }
    }
}

/// Host without geolocation.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLocator;

#[async_trait]
impl DeviceLocator for NoLocator {
    fn is_available(&self) -> bool {
        false
    }

    async fn current_location(&self, _options: &LocatorOptions) -> Result<Coordinates, LocationError> {
        Err(LocationError::ServiceUnavailable)
    }
}

/// Reports a fixed position, or always fails with the given error.
#[derive(Debug, Clone)]
pub struct FixedLocator {
    result: Result<Coordinates, LocationError>,
}

impl FixedLocator {
    pub fn new(coordinates: Coordinates) -> Self {
        Self {
            result: Ok(coordinates),
        }
    }

    pub fn failing(error: LocationError) -> Self {
        Self { result: Err(error) }
    }
}

#[async_trait]
impl DeviceLocator for FixedLocator {
    fn is_available(&self) -> bool {
        true
    }

    async fn current_location(&self, _options: &LocatorOptions) -> Result<Coordinates, LocationError> {
        self.result.clone()
    }
}

/// Pick the locator implied by the service config.
pub fn locator_from_config(config: &ServiceConfig) -> Box<dyn DeviceLocator> {
    match (config.fixed_latitude, config.fixed_longitude) {
        (Some(lat), Some(lon)) => Box::new(FixedLocator::new(Coordinates::new(lat, lon))),
        _ => Box::new(NoLocator),
    }
}
