//! Current conditions from the Open-Meteo forecast API.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Utc};
use meshsync_core::{ReqwestErrorExt, ServiceConfig, TemperatureUnit};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::instrument;

use crate::types::{Coordinates, CurrentConditions, WeatherFetchError};

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    utc_offset_seconds: Option<i32>,
    current_weather: Option<CurrentWeatherBlock>,
    /// Kept loose: a bad `daily` block only costs the day/night flag.
    daily: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct CurrentWeatherBlock {
    temperature: Option<f64>,
    weathercode: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct WeatherProvider {
    client: Arc<Client>,
    forecast_url: String,
    timeout: Duration,
}

impl WeatherProvider {
    pub fn new(config: &ServiceConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder().user_agent(&config.user_agent).build()?;

        Ok(Self::with_client(Arc::new(client), config))
    }

    pub fn with_client(client: Arc<Client>, config: &ServiceConfig) -> Self {
        Self {
            client,
            forecast_url: config.forecast_url.clone(),
            timeout: config.weather_timeout(),
        }
    }

    /// Fetch current temperature and condition, plus today's sunrise/sunset
    /// (`today` is the device's local date) to decide day or night at `now`.
    #[instrument(skip(self), level = "info")]
    pub async fn fetch_current(
        &self,
        coordinates: &Coordinates,
        unit: TemperatureUnit,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<CurrentConditions, WeatherFetchError> {
        let date = today.format("%Y-%m-%d").to_string();

        let response = self
            .client
            .get(&self.forecast_url)
            .query(&[
                ("latitude", coordinates.latitude.to_string()),
                ("longitude", coordinates.longitude.to_string()),
                ("current_weather", "true".to_string()),
                ("temperature_unit", unit.as_str().to_string()),
                ("windspeed_unit", "kmh".to_string()),
                ("daily", "sunrise,sunset".to_string()),
                ("timezone", "auto".to_string()),
                ("start_date", date.clone()),
                ("end_date", date),
            ])
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| WeatherFetchError::Transport(e.into_network_error()))?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!("Weather request failed with status: {}", status);
            return Err(WeatherFetchError::Status(status.as_u16()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| WeatherFetchError::Transport(e.into_network_error()))?;
        tracing::debug!("Weather response: {}", body);

        parse_forecast(&body, now)
    }
}

fn parse_forecast(body: &str, now: DateTime<Utc>) -> Result<CurrentConditions, WeatherFetchError> {
    let parsed: ForecastResponse =
        serde_json::from_str(body).map_err(|e| WeatherFetchError::Parse(e.to_string()))?;

    let current = parsed
        .current_weather
        .ok_or(WeatherFetchError::MissingCurrent)?;
    let temperature = current
        .temperature
        .ok_or(WeatherFetchError::MissingCurrent)?;

    let condition = current.weathercode.map(|c| c as i32).unwrap_or(0);
    let is_day = derive_is_day(parsed.daily.as_ref(), parsed.utc_offset_seconds, now);

    Ok(CurrentConditions {
        temperature: round_half_up(temperature).to_string(),
        condition,
        is_day,
    })
}

/// Round to the nearest integer, halves toward positive infinity (-2.5 -> -2).
pub fn round_half_up(value: f64) -> i64 {
    (value + 0.5).floor() as i64
}

/// `sunrise <= now < sunset`, evaluated in the API's local time frame.
/// Missing or malformed data counts as daytime.
pub fn derive_is_day(daily: Option<&Value>, utc_offset_seconds: Option<i32>, now: DateTime<Utc>) -> bool {
    compare_with_sun(daily, utc_offset_seconds, now).unwrap_or_else(|| {
        tracing::debug!("Sunrise/sunset unavailable, assuming daytime");
        true
    })
}

fn compare_with_sun(daily: Option<&Value>, utc_offset_seconds: Option<i32>, now: DateTime<Utc>) -> Option<bool> {
    let daily = daily?;
    let sunrise = parse_api_time(daily.get("sunrise")?.get(0)?.as_str()?)?;
    let sunset = parse_api_time(daily.get("sunset")?.get(0)?.as_str()?)?;
    let offset = FixedOffset::east_opt(utc_offset_seconds?)?;

    let local_now = now.with_timezone(&offset).naive_local();
    Some(local_now >= sunrise && local_now < sunset)
}

fn parse_api_time(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S"))
        .ok()
}
