//! Core error types for dayslot-core.
//!
//! This module defines the error hierarchy using thiserror. The
//! reconcile and rollover passes never surface these to their callers;
//! they degrade and report through their summaries instead. Everything
//! at the library boundary (config, database, user input) returns them.

use std::path::PathBuf;
use thiserror::Error;

use crate::item::LinkKind;

/// Core error type for dayslot-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// External calendar/reminder provider errors
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Calendar arithmetic errors
    #[error("Time error: {0}")]
    Time(#[from] TimeMathError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors with context
    #[error("{0}")]
    Custom(String),
}

/// Database-specific errors.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Database is locked
    #[error("Database is locked")]
    Locked,
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Could not resolve the data directory
    #[error("Cannot resolve data directory: {0}")]
    DataDir(String),

    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown dot-path key
    #[error("unknown config key: {0}")]
    UnknownKey(String),
}

/// Errors reported by an external calendar/reminder source.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// The user has not granted access to the source.
    #[error("Access to {source_name} was not granted")]
    PermissionDenied { source_name: String },

    /// The source could not be reached or read.
    #[error("{source_name} is unavailable: {message}")]
    Unavailable {
        source_name: String,
        message: String,
    },

    /// A write-back target no longer exists.
    #[error("No entity '{external_id}' in {source_name}")]
    NotFound {
        source_name: String,
        external_id: String,
    },

    /// The entity cannot be expressed by this source (e.g. no anchor).
    #[error("Rejected by {source_name}: {message}")]
    Rejected {
        source_name: String,
        message: String,
    },

    /// IO errors from file-backed sources
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed source document
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ProviderError {
    /// Whether this error means the user must grant access first.
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, ProviderError::PermissionDenied { .. })
    }
}

/// Validation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A time-of-day outside 00:00..=23:59
    #[error("Invalid time of day '{0}': expected HH:MM within 00:00-23:59")]
    InvalidTimeOfDay(String),

    /// Another item already holds this link.
    #[error("{kind} link '{external_id}' is already held by item {holder}")]
    DuplicateLink {
        kind: LinkKind,
        external_id: String,
        holder: String,
    },

    /// No item with this id.
    #[error("Item not found: {0}")]
    ItemNotFound(String),

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

/// Calendar arithmetic that has no answer (out-of-range dates).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimeMathError {
    /// Adding days left chrono's supported date range.
    #[error("date {date} shifted by {days} day(s) is out of range")]
    DateOutOfRange { date: chrono::NaiveDate, days: i64 },

    /// A time-of-day could not be applied to a date.
    #[error("cannot place {hour:02}:{minute:02} on {date}")]
    InvalidTime {
        date: chrono::NaiveDate,
        hour: u32,
        minute: u32,
    },
}

// Helper implementations for converting from other error types

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(err, _msg) => {
                if err.code == rusqlite::ErrorCode::DatabaseLocked {
                    DatabaseError::Locked
                } else {
                    DatabaseError::QueryFailed(err.to_string())
                }
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::Database(err.into())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_link_message_names_holder() {
        let err = ValidationError::DuplicateLink {
            kind: LinkKind::Reminder,
            external_id: "rem-1".into(),
            holder: "item-9".into(),
        };
        assert_eq!(
            err.to_string(),
            "reminder link 'rem-1' is already held by item item-9"
        );
    }

    #[test]
    fn permission_denied_is_detected() {
        let err = ProviderError::PermissionDenied {
            source_name: "calendar".into(),
        };
        assert!(err.is_permission_denied());
        let err = ProviderError::Unavailable {
            source_name: "calendar".into(),
            message: "offline".into(),
        };
        assert!(!err.is_permission_denied());
    }

    #[test]
    fn locked_sqlite_maps_to_locked() {
        let err = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error {
                code: rusqlite::ErrorCode::DatabaseLocked,
                extended_code: 5,
            },
            None,
        );
        assert!(matches!(DatabaseError::from(err), DatabaseError::Locked));
    }
}
