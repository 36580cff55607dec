//! Error types for gateway connections.
//!
//! Ordinary network outcomes never surface as errors: failed transactions,
//! refused upgrades and cancellations are encoded in the returned
//! [`Response`](crate::protocol::Response) or `Option<WebSocket>`. The
//! variants below cover configuration, input validation and the few
//! explicitly fallible helpers.
//!
//! # Usage
//!
//! ```ignore
//! use gateway_connections::{Connections, Result};
//!
//! fn build(client: Arc<dyn HttpClient>, engines: MyEngineFactory) -> Result<Connections> {
//!     Connections::builder().client(client).engine_factory(engines).build()
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`] |
//! | Input | [`Error::InvalidUri`], [`Error::UnsupportedScheme`] |
//! | Connection | [`Error::ConnectionClosed`], [`Error::WorkerSpawn`] |
//! | External | [`Error::Json`] |

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned by the builder when a required collaborator is missing.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // Input Errors
    // ========================================================================
    /// Target URI could not be parsed.
    #[error("Invalid URI \"{uri}\": {source}")]
    InvalidUri {
        /// The URI as given by the caller.
        uri: String,
        /// Parser failure.
        #[source]
        source: url::ParseError,
    },

    /// Target URI has a scheme the operation cannot use.
    #[error("Unsupported scheme \"{scheme}\" in {uri}")]
    UnsupportedScheme {
        /// The offending scheme.
        scheme: String,
        /// The URI as given by the caller.
        uri: String,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// The WebSocket was closed before or during the operation.
    #[error("Connection closed")]
    ConnectionClosed,

    /// The worker thread for a connection attempt could not be started.
    #[error("Failed to spawn connection worker: {0}")]
    WorkerSpawn(#[source] IoError),

    // ========================================================================
    // External Errors
    // ========================================================================
    /// JSON deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates an invalid URI error.
    #[inline]
    pub fn invalid_uri(uri: impl Into<String>, source: url::ParseError) -> Self {
        Self::InvalidUri {
            uri: uri.into(),
            source,
        }
    }

    /// Creates an unsupported scheme error.
    #[inline]
    pub fn unsupported_scheme(scheme: impl Into<String>, uri: impl Into<String>) -> Self {
        Self::UnsupportedScheme {
            scheme: scheme.into(),
            uri: uri.into(),
        }
    }

    /// Creates a worker spawn error.
    #[inline]
    pub fn worker_spawn(err: IoError) -> Self {
        Self::WorkerSpawn(err)
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this error was caused by caller input.
    ///
    /// Input errors are terminal: retrying the same request cannot succeed.
    #[inline]
    #[must_use]
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidUri { .. } | Self::UnsupportedScheme { .. }
        )
    }

    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::ConnectionClosed | Self::WorkerSpawn(_)
        )
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::ErrorKind;

    #[test]
    fn test_config_error_display() {
        let err = Error::config("missing HTTP client");
        assert_eq!(err.to_string(), "Configuration error: missing HTTP client");
    }

    #[test]
    fn test_invalid_uri_display() {
        let source = url::Url::parse("not a uri").unwrap_err();
        let err = Error::invalid_uri("not a uri", source);
        assert!(err.to_string().starts_with("Invalid URI \"not a uri\""));
        assert!(err.is_input_error());
        assert!(!err.is_connection_error());
    }

    #[test]
    fn test_unsupported_scheme() {
        let err = Error::unsupported_scheme("ftp", "ftp://example.test/");
        assert_eq!(
            err.to_string(),
            "Unsupported scheme \"ftp\" in ftp://example.test/"
        );
        assert!(err.is_input_error());
    }

    #[test]
    fn test_is_connection_error() {
        let spawn_err = Error::worker_spawn(IoError::new(ErrorKind::Other, "no threads"));
        assert!(spawn_err.is_connection_error());
        assert!(Error::ConnectionClosed.is_connection_error());
        assert!(!Error::config("x").is_connection_error());
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<String>("invalid").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Json(_)));
    }
}
