//! Error types and handling for the `tenki` application

use serde::Serialize;
use thiserror::Error;

/// Why a forecast could not be fetched from the remote service.
///
/// Stored in the per-region fetch state, so it is cheap to clone and
/// serializes with a `kind` tag for the JSON API.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FetchError {
    /// The request never produced a response (DNS, connect, timeout, ...)
    #[error("network error: {message}")]
    Network { message: String },

    /// The service answered with a non-success HTTP status
    #[error("unexpected HTTP status {status}")]
    Status { status: u16 },

    /// The body was not a valid forecast document
    #[error("malformed forecast payload: {message}")]
    Parse { message: String },

    /// Too many uncatalogued codes are loading to admit another one
    #[error("forecast cache is full, try again shortly")]
    CacheFull,
}

impl FetchError {
    pub fn network<S: Into<String>>(message: S) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    pub fn parse<S: Into<String>>(message: S) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    /// Short label used in logs and templates
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Network { .. } => "network",
            FetchError::Status { .. } => "status",
            FetchError::Parse { .. } => "parse",
            FetchError::CacheFull => "cache_full",
        }
    }
}

/// Main error type for the `tenki` application
#[derive(Error, Debug)]
pub enum TenkiError {
    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Input validation errors
    #[error("Invalid input: {message}")]
    Validation { message: String },

    /// Remote forecast errors
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Template rendering errors
    #[error("Render error: {message}")]
    Render { message: String },

    /// I/O operation errors
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl TenkiError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a new render error
    pub fn render<S: Into<String>>(message: S) -> Self {
        Self::Render {
            message: message.into(),
        }
    }

    /// Get a user-friendly error message
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            TenkiError::Config { .. } => {
                "Configuration error. Please check your config file.".to_string()
            }
            TenkiError::Validation { message } => {
                format!("Invalid input: {message}")
            }
            TenkiError::Fetch(FetchError::Status { status: 404 }) => {
                "No forecast is published for this region code.".to_string()
            }
            TenkiError::Fetch(_) => {
                "Unable to reach the forecast service. Please try again later.".to_string()
            }
            TenkiError::Render { .. } => "The page could not be rendered.".to_string(),
            TenkiError::Io { .. } => {
                "File operation failed. Please check file permissions.".to_string()
            }
        }
    }
}

impl From<minijinja::Error> for TenkiError {
    fn from(err: minijinja::Error) -> Self {
        TenkiError::render(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let config_err = TenkiError::config("bad port");
        assert!(matches!(config_err, TenkiError::Config { .. }));

        let validation_err = TenkiError::validation("not a region code");
        assert!(matches!(validation_err, TenkiError::Validation { .. }));

        let fetch_err: TenkiError = FetchError::Status { status: 503 }.into();
        assert!(matches!(fetch_err, TenkiError::Fetch(FetchError::Status { status: 503 })));
    }

    #[test]
    fn test_user_messages() {
        let config_err = TenkiError::config("test");
        assert!(config_err.user_message().contains("Configuration error"));

        let validation_err = TenkiError::validation("abc");
        assert!(validation_err.user_message().contains("abc"));

        let missing: TenkiError = FetchError::Status { status: 404 }.into();
        assert!(missing.user_message().contains("No forecast"));

        let offline: TenkiError = FetchError::network("connection refused").into();
        assert!(offline.user_message().contains("Unable to reach"));
    }

    #[test]
    fn test_fetch_error_serializes_with_kind_tag() {
        let json = serde_json::to_value(FetchError::Status { status: 500 }).unwrap();
        assert_eq!(json, serde_json::json!({ "kind": "status", "status": 500 }));

        let json = serde_json::to_value(FetchError::parse("eof")).unwrap();
        assert_eq!(json["kind"], "parse");
        assert_eq!(json["message"], "eof");

        let json = serde_json::to_value(FetchError::CacheFull).unwrap();
        assert_eq!(json, serde_json::json!({ "kind": "cache_full" }));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let tenki_err: TenkiError = io_err.into();
        assert!(matches!(tenki_err, TenkiError::Io { .. }));
    }
}
