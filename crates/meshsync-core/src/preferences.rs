//! User preferences synchronized to the watch.
//!
//! A [`Configuration`] is an immutable snapshot: every pipeline run receives
//! its own clone, so a settings change mid-run never leaks into that run.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::SettingsError;

/// Persistent/form key for the location string (empty means "use GPS").
pub const KEY_LOCATION: &str = "WEATHER_LOCATION_CONFIG";
pub const KEY_COLOR_THEME: &str = "COLOR_THEME";
pub const KEY_STEP_GOAL: &str = "STEP_GOAL";
pub const KEY_TEMPERATURE_UNIT: &str = "TEMPERATURE_UNIT";

/// Keys forwarded to the watch as-is (layout slots and the animation toggle).
pub const PASSTHROUGH_KEYS: [&str; 5] = [
    "LAYOUT_UPPER_LEFT",
    "LAYOUT_UPPER_RIGHT",
    "LAYOUT_LOWER_LEFT",
    "LAYOUT_LOWER_RIGHT",
    "ENABLE_ANIMATION",
];

pub const DEFAULT_LOCATION: &str = "Vienna";

/// Watch face color theme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ColorTheme {
    #[default]
    Dark,
    Light,
    Dynamic,
    Quiet,
}

impl ColorTheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dark => "dark",
            Self::Light => "light",
            Self::Dynamic => "dynamic",
            Self::Quiet => "quiet",
        }
    }

    /// Integer sent to the watch. Dark/light keep the legacy 0/1 encoding.
    pub fn wire_code(&self) -> i32 {
        match self {
            Self::Dark => 0,
            Self::Light => 1,
            Self::Dynamic => 2,
            Self::Quiet => 3,
        }
    }
}

impl FromStr for ColorTheme {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dark" | "0" => Ok(Self::Dark),
            "light" | "1" => Ok(Self::Light),
            "dynamic" | "2" => Ok(Self::Dynamic),
            "quiet" | "3" => Ok(Self::Quiet),
            _ => Err(SettingsError::invalid(KEY_COLOR_THEME, s)),
        }
    }
}

impl fmt::Display for ColorTheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Temperature unit preference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureUnit {
    #[default]
    Celsius,
    Fahrenheit,
}

impl TemperatureUnit {
    /// Value of the Open-Meteo `temperature_unit` query parameter; also the persisted form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Celsius => "celsius",
            Self::Fahrenheit => "fahrenheit",
        }
    }

    pub fn wire_code(&self) -> i32 {
        match self {
            Self::Celsius => 0,
            Self::Fahrenheit => 1,
        }
    }
}

impl FromStr for TemperatureUnit {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "celsius" | "c" | "0" => Ok(Self::Celsius),
            "fahrenheit" | "f" | "1" => Ok(Self::Fahrenheit),
            _ => Err(SettingsError::invalid(KEY_TEMPERATURE_UNIT, s)),
        }
    }
}

impl fmt::Display for TemperatureUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Daily step goal, always within [`StepGoal::MIN`, `StepGoal::MAX`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct StepGoal(u32);

impl StepGoal {
    pub const MIN: u32 = 100;
    pub const MAX: u32 = 100_000;
    pub const DEFAULT: u32 = 10_000;

    /// Clamp any integer into the valid range.
    pub fn clamped(value: i64) -> Self {
        let clamped = value.clamp(i64::from(Self::MIN), i64::from(Self::MAX));
        Self(clamped as u32)
    }

    pub fn get(&self) -> u32 {
        self.0
    }
}

impl Default for StepGoal {
    fn default() -> Self {
        Self(Self::DEFAULT)
    }
}

impl TryFrom<u32> for StepGoal {
    type Error = SettingsError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Self(value))
        } else {
            Err(SettingsError::invalid(KEY_STEP_GOAL, value.to_string()))
        }
    }
}

impl From<StepGoal> for u32 {
    fn from(goal: StepGoal) -> Self {
        goal.0
    }
}

/// Parses integers leniently ("10000", " 2500 ", "12000.0") and clamps them
/// into range. Anything non-numeric is rejected.
impl FromStr for StepGoal {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(v) = trimmed.parse::<i64>() {
            return Ok(Self::clamped(v));
        }
        match trimmed.parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(Self::clamped(v.round() as i64)),
            _ => Err(SettingsError::invalid(KEY_STEP_GOAL, s)),
        }
    }
}

impl fmt::Display for StepGoal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// User configuration snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    /// Free-text place name; empty or whitespace means "use device GPS"
    pub location: String,
    pub color_theme: ColorTheme,
    pub step_goal: StepGoal,
    pub temperature_unit: TemperatureUnit,
    /// Raw values for [`PASSTHROUGH_KEYS`], forwarded unvalidated
    #[serde(default)]
    pub passthrough: BTreeMap<String, String>,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            location: DEFAULT_LOCATION.to_string(),
            color_theme: ColorTheme::default(),
            step_goal: StepGoal::default(),
            temperature_unit: TemperatureUnit::default(),
            passthrough: BTreeMap::new(),
        }
    }
}

impl Configuration {
    /// True when the location should come from the device instead of a place name.
    pub fn uses_gps(&self) -> bool {
        self.location.trim().is_empty()
    }
}

pub fn is_passthrough_key(key: &str) -> bool {
    PASSTHROUGH_KEYS.contains(&key)
}
