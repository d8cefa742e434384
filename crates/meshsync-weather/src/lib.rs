//! Location resolution and weather acquisition for meshsync.
//!
//! Geocoding and current conditions come from Open-Meteo, reverse geocoding
//! from Nominatim, and device positions from a host-supplied locator.

pub mod types;
pub mod geocode;
pub mod location;
pub mod provider;

pub use types::*;
pub use geocode::Geocoder;
pub use location::{locate, DeviceLocator, FixedLocator, LocatorOptions, NoLocator};
pub use provider::WeatherProvider;
