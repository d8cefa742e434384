//! Settings manager: loads user preferences at startup and applies
//! settings-form results.

use std::collections::BTreeMap;
use std::str::FromStr;

use meshsync_core::preferences::{
    is_passthrough_key, KEY_COLOR_THEME, KEY_LOCATION, KEY_STEP_GOAL, KEY_TEMPERATURE_UNIT,
    PASSTHROUGH_KEYS,
};
use meshsync_core::{ColorTheme, Configuration, SettingsError, StepGoal, TemperatureUnit};
use serde_json::Value;

use crate::settings_store::SettingsStore;

/// Flat key -> raw value map produced by the settings form.
pub type FormValues = BTreeMap<String, String>;

/// What the caller has to do after settings changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsOutcome {
    /// Weather inputs changed (location or unit): run the full pipeline.
    Refresh,
    /// Only display settings changed: re-send the last weather state.
    Resend,
    /// No recognized key was present.
    Unchanged,
}

/// Result of applying a settings form.
#[derive(Debug)]
pub struct AppliedForm {
    pub outcome: SettingsOutcome,
    /// First store write that failed, if any. In-memory values are applied regardless.
    pub save_error: Option<SettingsError>,
}

pub struct SettingsManager {
    store: Box<dyn SettingsStore>,
    config: Configuration,
}

impl SettingsManager {
    /// Read every known key, falling back to defaults for missing or unreadable values.
    pub fn load(store: Box<dyn SettingsStore>) -> Self {
        let defaults = Configuration::default();
        let mut config = defaults.clone();

        if let Some(location) = read_value(store.as_ref(), KEY_LOCATION) {
            config.location = location;
        }
        config.color_theme = read_parsed(store.as_ref(), KEY_COLOR_THEME, defaults.color_theme);
        config.step_goal = read_parsed(store.as_ref(), KEY_STEP_GOAL, defaults.step_goal);
        config.temperature_unit =
            read_parsed(store.as_ref(), KEY_TEMPERATURE_UNIT, defaults.temperature_unit);

        for key in PASSTHROUGH_KEYS {
            if let Some(value) = read_value(store.as_ref(), key) {
                config.passthrough.insert(key.to_string(), value);
            }
        }

        tracing::info!(
            "Loaded settings: location={:?}, theme={}, step_goal={}, unit={}",
            config.location,
            config.color_theme,
            config.step_goal,
            config.temperature_unit
        );

        Self { store, config }
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    /// Owned copy for a pipeline run.
    pub fn snapshot(&self) -> Configuration {
        self.config.clone()
    }

    /// Location pushed by the watch itself. Kept in memory only.
    pub fn set_location_transient(&mut self, location: &str) {
        tracing::info!("Location configuration updated to: {:?}", location);
        self.config.location = location.trim().to_string();
    }

    /// Apply the recognized keys of a settings-form result.
    ///
    /// Each value takes effect in memory and is written to the store. A failed
    /// write does not stop the remaining keys: the change stays live for this
    /// session and the first failure is reported in [`AppliedForm::save_error`].
    /// Values that fail validation are skipped with a warning.
    pub fn apply_form(&mut self, values: &FormValues) -> AppliedForm {
        let mut refresh = false;
        let mut resend = false;
        let mut save_error = None;

        if let Some(location) = values.get(KEY_LOCATION) {
            let location = location.trim().to_string();
            self.persist(KEY_LOCATION, &location, &mut save_error);
            tracing::info!("Location set to: {:?}", location);
            self.config.location = location;
            refresh = true;
        }

        if let Some(unit) = self.parse_field::<TemperatureUnit>(values, KEY_TEMPERATURE_UNIT) {
            self.persist(KEY_TEMPERATURE_UNIT, unit.as_str(), &mut save_error);
            self.config.temperature_unit = unit;
            refresh = true;
        }

        if let Some(theme) = self.parse_field::<ColorTheme>(values, KEY_COLOR_THEME) {
            self.persist(KEY_COLOR_THEME, theme.as_str(), &mut save_error);
            tracing::info!("Color theme set to: {}", theme);
            self.config.color_theme = theme;
            resend = true;
        }

        if let Some(goal) = self.parse_field::<StepGoal>(values, KEY_STEP_GOAL) {
            self.persist(KEY_STEP_GOAL, &goal.to_string(), &mut save_error);
            self.config.step_goal = goal;
            resend = true;
        }

        for (key, value) in values.iter().filter(|(k, _)| is_passthrough_key(k)) {
            self.persist(key, value, &mut save_error);
            self.config.passthrough.insert(key.clone(), value.clone());
            resend = true;
        }

        for key in values.keys().filter(|k| !is_known_key(k)) {
            tracing::debug!("Ignoring unrecognized settings key: {}", key);
        }

        let outcome = if refresh {
            SettingsOutcome::Refresh
        } else if resend {
            SettingsOutcome::Resend
        } else {
            SettingsOutcome::Unchanged
        };

        AppliedForm { outcome, save_error }
    }

    fn persist(&self, key: &str, value: &str, first_error: &mut Option<SettingsError>) {
        if let Err(e) = self.store.set(key, value) {
            tracing::warn!("Failed to save {}: {}", key, e);
            first_error.get_or_insert(SettingsError::Storage(e));
        }
    }

    fn parse_field<T>(&self, values: &FormValues, key: &str) -> Option<T>
    where
        T: FromStr<Err = SettingsError>,
    {
        let raw = values.get(key)?;
        match raw.parse::<T>() {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!("Skipping setting: {}", e);
                None
            }
        }
    }
}

fn is_known_key(key: &str) -> bool {
    matches!(
        key,
        KEY_LOCATION | KEY_COLOR_THEME | KEY_STEP_GOAL | KEY_TEMPERATURE_UNIT
    ) || is_passthrough_key(key)
}

fn read_value(store: &dyn SettingsStore, key: &str) -> Option<String> {
    match store.get(key) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!("Failed to read {} from settings store: {}", key, e);
            None
        }
    }
}

fn read_parsed<T>(store: &dyn SettingsStore, key: &str, default: T) -> T
where
    T: FromStr<Err = SettingsError>,
{
    let Some(raw) = read_value(store, key) else {
        return default;
    };
    raw.parse().unwrap_or_else(|e| {
        tracing::warn!("Stored {} is unreadable ({}), using default", key, e);
        default
    })
}

/// Decode the settings form's close payload: a URL-encoded JSON object.
///
/// Values may be plain strings, numbers or booleans, or wrapped as
/// `{"value": ...}`. Nulls and arrays are dropped. An empty payload yields an
/// empty map.
///
/// # Errors
/// Returns `SettingsError::InvalidPayload` when the payload is not a JSON object.
pub fn parse_form_response(raw: &str) -> Result<FormValues, SettingsError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(FormValues::new());
    }

    let value = match urlencoding::decode(trimmed) {
        Ok(decoded) => serde_json::from_str::<Value>(&decoded)
            .or_else(|_| serde_json::from_str::<Value>(trimmed)),
        Err(_) => serde_json::from_str::<Value>(trimmed),
    }
    .map_err(|e| SettingsError::InvalidPayload(e.to_string()))?;

    let Value::Object(map) = value else {
        return Err(SettingsError::InvalidPayload(
            "expected a JSON object".to_string(),
        ));
    };

    Ok(map
        .into_iter()
        .filter_map(|(key, value)| flatten_value(value).map(|v| (key, v)))
        .collect())
}

fn flatten_value(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Object(mut obj) => obj.remove("value").and_then(flatten_value),
        Value::Null | Value::Array(_) => None,
    }
}
