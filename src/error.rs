// src/error.rs

//! Unified error handling for the watcher.

use std::fmt;

use thiserror::Error;

/// Result type alias for watcher operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// CSS selector parsing failed
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Page could not be retrieved (network, timeout, non-2xx)
    #[error("Fetch error for {url}: {message}")]
    Fetch { url: String, message: String },

    /// Page markup did not have the expected structure
    #[error("Extract error at '{selector}': {message}")]
    Extract { selector: String, message: String },

    /// Webhook delivery failed
    #[error("Notify error for {source_name}: {message}")]
    Notify {
        source_name: String,
        message: String,
    },

    /// Snapshot could not be read or decoded
    #[error("Storage read error at {location}: {message}")]
    StorageRead { location: String, message: String },

    /// Snapshot could not be persisted
    #[error("Storage write error at {location}: {message}")]
    StorageWrite { location: String, message: String },
}

impl AppError {
    /// Create a selector parsing error.
    pub fn selector(selector: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Selector {
            selector: selector.into(),
            message: message.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a fetch error for a page URL.
    pub fn fetch(url: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Fetch {
            url: url.into(),
            message: message.to_string(),
        }
    }

    /// Create an extraction error for the selector whose matches were unusable.
    pub fn extract(selector: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Extract {
            selector: selector.into(),
            message: message.to_string(),
        }
    }

    /// Create a notification error for a source.
    pub fn notify(source_name: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Notify {
            source_name: source_name.into(),
            message: message.to_string(),
        }
    }

    pub fn storage_read(location: impl fmt::Display, message: impl fmt::Display) -> Self {
        Self::StorageRead {
            location: location.to_string(),
            message: message.to_string(),
        }
    }

    pub fn storage_write(location: impl fmt::Display, message: impl fmt::Display) -> Self {
        Self::StorageWrite {
            location: location.to_string(),
            message: message.to_string(),
        }
    }
}
