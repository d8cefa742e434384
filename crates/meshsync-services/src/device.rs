//! Watch-bound messages: pure construction from configuration and weather
//! state, plus the channel they are sent over.

use std::collections::BTreeMap;

use async_trait::async_trait;
use meshsync_core::{Configuration, DeviceError};
use meshsync_weather::WeatherState;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

pub const KEY_TEMPERATURE: &str = "TEMPERATURE";
pub const KEY_LOCATION: &str = "LOCATION";
pub const KEY_CONDITION: &str = "CONDITION";
pub const KEY_COLOR_THEME: &str = "COLOR_THEME";
pub const KEY_STEP_GOAL: &str = "STEP_GOAL";
pub const KEY_TEMPERATURE_UNIT: &str = "TEMPERATURE_UNIT";
pub const KEY_IS_DAY: &str = "IS_DAY";

/// Default inbox size of the watch app.
pub const DEFAULT_MAX_MESSAGE_BYTES: usize = 256;

/// Per-tuple overhead of the device dictionary encoding (key id, type, length).
const TUPLE_HEADER_BYTES: usize = 7;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageValue {
    Int(i32),
    Text(String),
}

impl MessageValue {
    /// Integers for numeric strings and booleans, text otherwise.
    pub fn from_raw(raw: &str) -> Self {
        let trimmed = raw.trim();
        match trimmed {
            "true" => MessageValue::Int(1),
            "false" => MessageValue::Int(0),
            _ => trimmed
                .parse::<i32>()
                .map(MessageValue::Int)
                .unwrap_or_else(|_| MessageValue::Text(raw.to_string())),
        }
    }

    fn encoded_len(&self) -> usize {
        match self {
            MessageValue::Int(_) => 4,
            // null-terminated
            MessageValue::Text(s) => s.len() + 1,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            MessageValue::Int(v) => Some(*v),
            MessageValue::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            MessageValue::Text(s) => Some(s),
            MessageValue::Int(_) => None,
        }
    }
}

impl From<i32> for MessageValue {
    fn from(value: i32) -> Self {
        MessageValue::Int(value)
    }
}

impl From<&str> for MessageValue {
    fn from(value: &str) -> Self {
        MessageValue::Text(value.to_string())
    }
}

/// Flat key/value dictionary delivered to the watch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceMessage(BTreeMap<String, MessageValue>);

impl DeviceMessage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<MessageValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&MessageValue> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Approximate size on the wire: one count byte plus a header and payload per tuple.
    pub fn encoded_len(&self) -> usize {
        1 + self
            .0
            .values()
            .map(|v| TUPLE_HEADER_BYTES + v.encoded_len())
            .sum::<usize>()
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Build the full message for the watch. Pure: no I/O, no clock.
pub fn build_message(config: &Configuration, state: &WeatherState) -> DeviceMessage {
    let mut message = DeviceMessage::new();

    message.insert(KEY_TEMPERATURE, state.temperature.as_str());
    message.insert(KEY_LOCATION, state.location.as_str());
    message.insert(KEY_CONDITION, state.condition);
    message.insert(KEY_IS_DAY, i32::from(state.is_day));

    message.insert(KEY_COLOR_THEME, config.color_theme.wire_code());
    message.insert(KEY_STEP_GOAL, config.step_goal.get() as i32);
    message.insert(KEY_TEMPERATURE_UNIT, config.temperature_unit.wire_code());

    for (key, raw) in &config.passthrough {
        message.insert(key.as_str(), MessageValue::from_raw(raw));
    }

    message
}

/// Outbound link to the watch.
#[async_trait]
pub trait DeviceChannel: Send + Sync {
    async fn send(&self, message: &DeviceMessage) -> Result<(), DeviceError>;
}

fn check_size(message: &DeviceMessage, limit: usize) -> Result<(), DeviceError> {
    let size = message.encoded_len();
    if size > limit {
        return Err(DeviceError::MessageTooLarge { size, limit });
    }
    Ok(())
}

/// Writes each message as a JSON line to stdout.
#[derive(Debug, Clone)]
pub struct LogChannel {
    max_bytes: usize,
}

impl LogChannel {
    pub fn new(max_bytes: usize) -> Self {
        Self { max_bytes }
    }
}

impl Default for LogChannel {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_MESSAGE_BYTES)
    }
}

#[async_trait]
impl DeviceChannel for LogChannel {
    async fn send(&self, message: &DeviceMessage) -> Result<(), DeviceError> {
        check_size(message, self.max_bytes)?;
        let line = message.to_json();
        tracing::debug!(message = %line, "Writing device message");
        println!("{}", line);
        Ok(())
    }
}

/// Records delivered messages; can be switched to a disconnected state.
#[derive(Debug)]
pub struct MemoryChannel {
    max_bytes: usize,
    sent: Mutex<Vec<DeviceMessage>>,
    connected: Mutex<bool>,
}

impl MemoryChannel {
    pub fn new(max_bytes: usize) -> Self {
        Self {
            max_bytes,
            sent: Mutex::new(Vec::new()),
            connected: Mutex::new(true),
        }
    }

    pub fn set_connected(&self, connected: bool) {
        *self.connected.lock() = connected;
    }

    pub fn sent(&self) -> Vec<DeviceMessage> {
        self.sent.lock().clone()
    }

    pub fn last(&self) -> Option<DeviceMessage> {
        self.sent.lock().last().cloned()
    }
}

impl Default for MemoryChannel {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_MESSAGE_BYTES)
    }
}

#[async_trait]
impl DeviceChannel for MemoryChannel {
    async fn send(&self, message: &DeviceMessage) -> Result<(), DeviceError> {
        if !*self.connected.lock() {
            return Err(DeviceError::Disconnected);
        }
        check_size(message, self.max_bytes)?;
        self.sent.lock().push(message.clone());
        Ok(())
    }
}

/// Send and log the outcome. Failures are not retried.
pub async fn transmit(channel: &dyn DeviceChannel, message: &DeviceMessage) -> bool {
    match channel.send(message).await {
        Ok(()) => {
            tracing::info!("Message sent to watch ({} bytes)", message.encoded_len());
            true
        }
        Err(e) => {
            tracing::warn!("Failed to send message to watch: {}", e);
            false
        }
    }
}
