//! Builder pattern for registry configuration.
//!
//! Provides a fluent API for configuring and creating [`Connections`]
//! instances.
//!
//! # Example
//!
//! ```ignore
//! use gateway_connections::Connections;
//!
//! let connections = Connections::builder()
//!     .client(client)
//!     .engine_factory(engines)
//!     .user_agent("ExampleBot (https://example.test, 1.0)")
//!     .build()?;
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use crate::diagnostics::{DiagnosticsSender, thresholds};
use crate::error::{Error, Result};
use crate::transport::{HttpClient, WebSocketEngineFactory};

use super::core::Connections;
use super::options::ConnectionsOptions;

// ============================================================================
// Constants
// ============================================================================

/// Name of the registry's own diagnostics sender.
const DIAGNOSTICS_NAME: &str = "Connections";

// ============================================================================
// ConnectionsBuilder
// ============================================================================

/// Builder for configuring a [`Connections`] instance.
///
/// Use [`Connections::builder()`] to create a new builder.
#[derive(Default, Clone)]
pub struct ConnectionsBuilder {
    /// HTTP client used for every request.
    client: Option<Arc<dyn HttpClient>>,
    /// Creates one WebSocket engine per connection attempt.
    engines: Option<Arc<dyn WebSocketEngineFactory>>,
    /// Sender the registry's diagnostics are forwarded into.
    parent: Option<DiagnosticsSender>,
    /// Request options.
    options: ConnectionsOptions,
}

impl fmt::Debug for ConnectionsBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionsBuilder")
            .field("client", &self.client.is_some())
            .field("engine_factory", &self.engines.is_some())
            .field("diagnostics", &self.parent.as_ref().map(DiagnosticsSender::name))
            .field("options", &self.options)
            .finish()
    }
}

// ============================================================================
// ConnectionsBuilder Implementation
// ============================================================================

impl ConnectionsBuilder {
    /// Creates a new builder with no configuration.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the HTTP client.
    #[inline]
    #[must_use]
    pub fn client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.client = Some(client);
        self
    }

    /// Sets the WebSocket engine factory.
    #[inline]
    #[must_use]
    pub fn engine_factory(mut self, engines: Arc<dyn WebSocketEngineFactory>) -> Self {
        self.engines = Some(engines);
        self
    }

    /// Forwards the registry's diagnostics into `parent`.
    ///
    /// Messages at or above [`thresholds::CONNECTIONS_INTERFACE`] are
    /// republished under `"{parent}/Connections"`.
    #[inline]
    #[must_use]
    pub fn diagnostics(mut self, parent: DiagnosticsSender) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Replaces all request options.
    #[inline]
    #[must_use]
    pub fn options(mut self, options: ConnectionsOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the default `User-Agent`.
    #[inline]
    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.options = self.options.with_user_agent(user_agent);
        self
    }

    /// Limits the number of resource requests in flight.
    #[inline]
    #[must_use]
    pub fn max_pending_requests(mut self, limit: usize) -> Self {
        self.options = self.options.with_max_pending_requests(limit);
        self
    }

    /// Builds the registry with validation.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the client or engine factory is not set
    /// - [`Error::Config`] if the options are invalid
    pub fn build(self) -> Result<Connections> {
        let client = self.client.ok_or_else(|| {
            Error::config(
                "HTTP client is required. Use .client() to set it.\n\
                 Example: Connections::builder().client(Arc::new(MyClient::new()))",
            )
        })?;
        let engines = self.engines.ok_or_else(|| {
            Error::config(
                "WebSocket engine factory is required. Use .engine_factory() to set it.\n\
                 Example: Connections::builder().engine_factory(Arc::new(MyEngines))",
            )
        })?;
        self.options.validate().map_err(Error::config)?;

        let diagnostics = DiagnosticsSender::new(DIAGNOSTICS_NAME);
        if let Some(parent) = &self.parent {
            diagnostics
                .subscribe(parent.chain(), thresholds::CONNECTIONS_INTERFACE)
                .detach();
        }

        Ok(Connections::new(client, engines, self.options, diagnostics))
    }
}

// ============================================================================
// Tests
// ============================================================================
