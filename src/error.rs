//! Error types for onenote-sync
//!
//! This module defines all error types used throughout the crate, using
//! `thiserror` for ergonomic error handling.
//!
//! Only hard failures (transport, protocol, storage, filesystem) travel as
//! errors.  Soft provider failures such as an `error` member in a JSON body
//! are reported through `Ok(false)`, `Ok(None)` or an empty list by the
//! component that observed them.

use thiserror::Error;

/// Main error type for onenote-sync operations
#[derive(Error, Debug)]
pub enum OneNoteError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// A caller passed an argument the operation cannot work with
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The OAuth token endpoint answered with a non-200 status
    #[error("Token endpoint returned {status}: {body}")]
    TokenEndpoint {
        /// HTTP status code returned by the token endpoint
        status: u16,
        /// Raw response body, for diagnostics
        body: String,
    },

    /// The resource API answered with a failure status and no error payload
    #[error("API request failed with {status}: {body}")]
    Api {
        /// HTTP status code returned by the resource API
        status: u16,
        /// Raw response body, for diagnostics
        body: String,
    },

    /// Authentication errors (no usable session)
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Page archiving errors
    #[error("Archive error: {0}")]
    Archive(String),

    /// Token or mapping persistence errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP transport errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Keyring/credential storage errors
    #[error("Keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    /// Zip writer errors
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

/// Result type alias for onenote-sync operations
///
/// Uses `anyhow::Error` so callers can attach context while the underlying
/// [`OneNoteError`] stays reachable via `downcast_ref`.
pub type Result<T> = anyhow::Result<T>;
