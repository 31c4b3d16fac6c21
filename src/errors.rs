//! Unified error types for the harvest core.
//!
//! `Validation` and `Authorization` carry a human-readable message that the
//! presentation layer may surface directly; `External` failures never roll
//! back a committed state change.

use thiserror::Error;

/// Crate-wide error type
#[derive(Debug, Error)]
pub enum Error {
    /// An invariant was violated on a write (bad field value, capacity
    /// exceeded, equipment double-booking, ...)
    #[error("Validation error: {message}")]
    Validation {
        /// Human-readable, user-visible message
        message: String,
    },

    /// The principal lacks the role required for the operation
    #[error("Authorization error: {message}")]
    Authorization {
        /// Human-readable, user-visible message
        message: String,
    },

    /// A referenced entity does not exist
    #[error("{entity} {id} not found")]
    NotFound {
        /// Entity family name ("harvest", "property", ...)
        entity: &'static str,
        /// Primary key that failed to resolve
        id: i64,
    },

    /// Concurrent modification detected; the caller may retry once
    #[error("Conflict: {message}")]
    Conflict {
        /// Human-readable message
        message: String,
    },

    /// A notification or file-output failure; advisory only
    #[error("External error: {message}")]
    External {
        /// Human-readable message
        message: String,
    },

    /// Configuration error (missing or malformed environment variable)
    #[error("Configuration error: {message}")]
    Config {
        /// Human-readable message
        message: String,
    },

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// I/O error (email-list export, PDF paths)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Shorthand for a [`Error::Validation`] with a formatted message.
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation {
            message: message.into(),
        }
    }

    /// Shorthand for a [`Error::Authorization`] with a formatted message.
    pub fn authorization(message: impl Into<String>) -> Self {
        Error::Authorization {
            message: message.into(),
        }
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
