//! Error types and handling for Wende
//!
//! This module defines the error types used throughout the application,
//! providing consistent error handling and reporting.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Result type alias for Wende operations
pub type Result<T> = std::result::Result<T, WendeError>;

/// Main error type for Wende
#[derive(Debug, Error)]
pub enum WendeError {
    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Upstream API unreachable, malformed or incomplete
    #[error("Fetch error ({source_name}): {message}")]
    Fetch {
        source_name: String,
        message: String,
    },

    /// No data points in the requested range
    #[error("No data between {start} and {end}")]
    EmptyWindow {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    /// `now` precedes the last finalized timestamp
    #[error("Clock skew: now {now} precedes last finalized timestamp {last_finalized}")]
    ClockSkew {
        now: DateTime<Utc>,
        last_finalized: DateTime<Utc>,
    },

    /// HTTP/Web server errors
    #[error("Web server error: {message}")]
    Web { message: String },

    /// Serialization/deserialization errors
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// File I/O errors
    #[error("I/O error: {message}")]
    Io { message: String },

    /// Network-related errors
    #[error("Network error: {message}")]
    Network { message: String },

    /// Validation errors
    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    /// Timeout errors
    #[error("Timeout error: {message}")]
    Timeout { message: String },

    /// Generic errors with context
    #[error("Error: {message}")]
    Generic { message: String },
}

impl WendeError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        WendeError::Config {
            message: message.into(),
        }
    }

    /// Create a new fetch error attributed to an upstream source
    pub fn fetch<S: Into<String>, M: Into<String>>(source_name: S, message: M) -> Self {
        WendeError::Fetch {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    /// Create a new empty-window error
    pub fn empty_window(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        WendeError::EmptyWindow { start, end }
    }

    /// Create a new clock-skew error
    pub fn clock_skew(now: DateTime<Utc>, last_finalized: DateTime<Utc>) -> Self {
        WendeError::ClockSkew {
            now,
            last_finalized,
        }
    }

    /// Create a new web error
    pub fn web<S: Into<String>>(message: S) -> Self {
        WendeError::Web {
            message: message.into(),
        }
    }

    /// Create a new serialization error
    pub fn serialization<S: Into<String>>(message: S) -> Self {
        WendeError::Serialization {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(field: S, message: S) -> Self {
        WendeError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a new I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        WendeError::Io {
            message: message.into(),
        }
    }

    /// Create a new network error
    pub fn network<S: Into<String>>(message: S) -> Self {
        WendeError::Network {
            message: message.into(),
        }
    }

    /// Create a new timeout error
    pub fn timeout<S: Into<String>>(message: S) -> Self {
        WendeError::Timeout {
            message: message.into(),
        }
    }

    /// Create a new generic error
    pub fn generic<S: Into<String>>(message: S) -> Self {
        WendeError::Generic {
            message: message.into(),
        }
    }

    /// Whether this error only signals that a range held no data
    pub fn is_empty_window(&self) -> bool {
        matches!(self, WendeError::EmptyWindow { .. })
    }

    /// Whether the error came from talking to an upstream API
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            WendeError::Fetch { .. }
                | WendeError::Network { .. }
                | WendeError::Timeout { .. }
                | WendeError::Serialization { .. }
        )
    }
}

impl From<std::io::Error> for WendeError {
    fn from(err: std::io::Error) -> Self {
        WendeError::io(err.to_string())
    }
}

impl From<serde_yaml::Error> for WendeError {
    fn from(err: serde_yaml::Error) -> Self {
        WendeError::serialization(err.to_string())
    }
}

impl From<serde_json::Error> for WendeError {
    fn from(err: serde_json::Error) -> Self {
        WendeError::serialization(err.to_string())
    }
}

impl From<quick_xml::DeError> for WendeError {
    fn from(err: quick_xml::DeError) -> Self {
        WendeError::serialization(err.to_string())
    }
}

impl From<reqwest::Error> for WendeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            WendeError::timeout(err.to_string())
        } else {
            WendeError::network(err.to_string())
        }
    }
}

impl From<chrono::ParseError> for WendeError {
    fn from(err: chrono::ParseError) -> Self {
        WendeError::validation("datetime", err.to_string().as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = WendeError::config("test config error");
        assert!(matches!(err, WendeError::Config { .. }));

        let err = WendeError::fetch("entsoe", "boom");
        assert!(matches!(err, WendeError::Fetch { .. }));
        assert!(err.is_upstream());

        let err = WendeError::validation("field", "test validation error");
        assert!(matches!(err, WendeError::Validation { .. }));
        assert!(!err.is_upstream());
    }

    #[test]
    fn test_error_display() {
        let err = WendeError::config("test error");
        let error_string = format!("{}", err);
        assert_eq!(error_string, "Configuration error: test error");

        let err = WendeError::validation("test_field", "invalid value");
        let error_string = format!("{}", err);
        assert_eq!(error_string, "Validation error: test_field - invalid value");

        let err = WendeError::fetch("smard", "status 503");
        assert_eq!(format!("{}", err), "Fetch error (smard): status 503");
    }

    #[test]
    fn empty_window_is_flagged() {
        let t = Utc::now();
        assert!(WendeError::empty_window(t, t).is_empty_window());
        assert!(!WendeError::timeout("slow").is_empty_window());
    }
}
