//! Centralized error types for meshsync.
//!
//! Pipeline failures (geocoding, weather) never surface here: they are turned
//! into display sentinels inside the weather crate. These types cover the
//! plumbing around the pipeline: storage, settings payloads and the device
//! channel.

use thiserror::Error;

/// Network-related errors (HTTP, connectivity).
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Server error: {status} - {message}")]
    ServerError { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl NetworkError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, NetworkError::Timeout)
    }
}

/// Settings storage errors (SQLite key/value store).
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage open failed: {0}")]
    OpenFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Data corruption detected: {0}")]
    Corruption(String),
}

/// Errors from reading user settings (store values or settings-form payloads).
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },

    #[error("Invalid settings payload: {0}")]
    InvalidPayload(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl SettingsError {
    pub fn invalid(key: impl Into<String>, value: impl Into<String>) -> Self {
        SettingsError::InvalidValue {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Device message channel errors. Logged only; never retried.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("Message of {size} bytes exceeds inbox size {limit}")]
    MessageTooLarge { size: usize, limit: usize },

    #[error("Device not connected")]
    Disconnected,
}

/// Extension trait for converting reqwest errors to our error types.
pub trait ReqwestErrorExt {
    fn into_network_error(self) -> NetworkError;
}

impl ReqwestErrorExt for reqwest::Error {
    fn into_network_error(self) -> NetworkError {
        if self.is_timeout() {
            NetworkError::Timeout
        } else if self.is_decode() {
            NetworkError::InvalidResponse(self.to_string())
        } else if let Some(status) = self.status() {
            NetworkError::ServerError {
                status: status.as_u16(),
                message: self.to_string(),
            }
        } else {
            NetworkError::ConnectionFailed(self.to_string())
        }
    }
}

/// Extension trait for converting rusqlite errors to our error types.
pub trait RusqliteErrorExt {
    fn into_storage_error(self) -> StorageError;
}

impl RusqliteErrorExt for rusqlite::Error {
    fn into_storage_error(self) -> StorageError {
        match &self {
            rusqlite::Error::SqliteFailure(_, Some(msg)) if msg.contains("corrupt") => {
                StorageError::Corruption(self.to_string())
            }
            rusqlite::Error::SqliteFailure(err, _)
                if err.code == rusqlite::ErrorCode::CannotOpen =>
            {
                StorageError::OpenFailed(self.to_string())
            }
            _ => StorageError::QueryFailed(self.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_error_wraps_storage() {
        let err: SettingsError = StorageError::QueryFailed("locked".into()).into();
        assert!(matches!(err, SettingsError::Storage(StorageError::QueryFailed(_))));
        assert_eq!(err.to_string(), "Query failed: locked");
    }

    #[test]
    fn test_message_too_large_display() {
        let err = DeviceError::MessageTooLarge { size: 300, limit: 256 };
        assert_eq!(err.to_string(), "Message of 300 bytes exceeds inbox size 256");
    }

    #[test]
    fn test_only_timeout_is_timeout() {
        let server = NetworkError::ServerError { status: 503, message: String::new() };
        assert!(!server.is_timeout());
        assert!(NetworkError::Timeout.is_timeout());
    }
}
