//! Inbound triggers from the watch and the host.

use serde::Deserialize;
use serde_json::Value;

/// Event delivered to the orchestrator.
///
/// The binary reads these as JSON lines, e.g. `{"event":"ready"}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum InboundEvent {
    /// The watch app connected.
    Ready,
    /// Periodic refresh timer fired.
    Tick,
    AppMessage {
        #[serde(default)]
        payload: AppMessagePayload,
    },
    /// The settings form closed, optionally returning a URL-encoded payload.
    SettingsClosed {
        #[serde(default)]
        response: Option<String>,
    },
}

/// Keys the watch may send in an app message. Anything else is ignored.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AppMessagePayload {
    #[serde(rename = "WEATHER_REQUEST", default)]
    pub weather_request: Option<Value>,

    #[serde(rename = "WEATHER_LOCATION_CONFIG", default)]
    pub location: Option<String>,
}

impl AppMessagePayload {
    /// Whether the watch asked for fresh weather.
    pub fn requests_weather(&self) -> bool {
        match &self.weather_request {
            None | Some(Value::Null) => false,
            Some(Value::Bool(b)) => *b,
            Some(Value::Number(n)) => n.as_f64().is_some_and(|v| v != 0.0),
            Some(Value::String(s)) => !s.is_empty() && s != "0" && s != "false",
            Some(Value::Array(_)) | Some(Value::Object(_)) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> InboundEvent {
        serde_json::from_str(line).unwrap()
    }

    #[test]
    fn test_parse_simple_events() {
        assert_eq!(parse(r#"{"event":"ready"}"#), InboundEvent::Ready);
        assert_eq!(parse(r#"{"event":"tick"}"#), InboundEvent::Tick);
        assert_eq!(
            parse(r#"{"event":"settings_closed"}"#),
            InboundEvent::SettingsClosed { response: None }
        );
    }

    #[test]
    fn test_parse_app_message() {
        let event = parse(r#"{"event":"app_message","payload":{"WEATHER_LOCATION_CONFIG":"Paris","OTHER":5}}"#);
        let InboundEvent::AppMessage { payload } = event else {
            panic!("expected app message");
        };
        assert_eq!(payload.location.as_deref(), Some("Paris"));
        assert!(!payload.requests_weather());
    }

    #[test]
    fn test_weather_request_truthiness() {
        let payload = |v: Value| AppMessagePayload {
            weather_request: Some(v),
            location: None,
        };
        assert!(payload(Value::from(1)).requests_weather());
        assert!(payload(Value::from(true)).requests_weather());
        assert!(payload(Value::from("yes")).requests_weather());
        assert!(!payload(Value::from(0)).requests_weather());
        assert!(!payload(Value::from(false)).requests_weather());
        assert!(!payload(Value::from("")).requests_weather());
        assert!(!AppMessagePayload::default().requests_weather());
    }

    #[test]
    fn test_unknown_event_is_rejected() {
        assert!(serde_json::from_str::<InboundEvent>(r#"{"event":"explode"}"#).is_err());
    }
}
