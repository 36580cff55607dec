//! Gateway Connections - cancellable transactions over a callback-driven transport.
//!
//! This library sits between an application and a host-supplied HTTP
//! client and WebSocket engine. It turns single-shot, callback-driven
//! transactions into futures the application can await, cancel or
//! abandon, and adapts a WebSocket's push-style delivery so that a text
//! handler registered late still sees every message.
//!
//! # Architecture
//!
//! - **Transaction registry**: [`Connections`] tracks in-flight resource
//!   requests by id. Completion and cancellation race to remove the entry;
//!   the winner alone resolves the future.
//! - **Connection attempts**: each WebSocket request runs one upgrade on a
//!   named worker thread that waits for either completion or abort.
//! - **Message adapter**: [`WebSocket`] buffers text until a handler is
//!   registered, then hands the backlog over in arrival order.
//!
//! Network failures are not errors here. They are reported through
//! diagnostics and encoded in the result: a [`Response`] status, or
//! `None` for a WebSocket that did not connect.
//!
//! # Quick Start
//!
//! ```ignore
//! use gateway_connections::{Connections, ResourceRequest, Result, WebSocketRequest};
//!
//! async fn run(client: Arc<dyn HttpClient>, engines: Arc<dyn WebSocketEngineFactory>) -> Result<()> {
//!     let connections = Connections::builder()
//!         .client(client)
//!         .engine_factory(engines)
//!         .user_agent("ExampleBot (https://example.test, 1.0)")
//!         .build()?;
//!
//!     let gateway = connections
//!         .queue_resource_request(ResourceRequest::get("https://example.test/api/gateway"))
//!         .response
//!         .await;
//!     let url: serde_json::Value = gateway.json()?;
//!
//!     let attempt = connections.queue_websocket_request(WebSocketRequest::new(
//!         url["url"].as_str().unwrap_or_default(),
//!     ));
//!     if let Some(web_socket) = attempt.web_socket.await {
//!         web_socket.register_text_handler(|message| println!("{message}"));
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`connections`] | Registry, builder, options, handles, connection attempts |
//! | [`websocket`] | Buffered WebSocket adapter |
//! | [`diagnostics`] | Level-filtered diagnostics publishing |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`protocol`] | Request and response types |
//! | [`transport`] | Collaborator traits the host implements |

// ============================================================================
// Modules
// ============================================================================

/// Transaction registry and connection attempts.
///
/// Use [`Connections::builder()`] to create a configured registry.
pub mod connections;

/// Level-filtered diagnostics publishing.
pub mod diagnostics;

/// Error types and result aliases.
///
/// Fallible configuration and helper operations return [`Result<T>`]
/// which uses [`Error`].
pub mod error;

/// Type-safe identifiers for transactions and attempts.
pub mod identifiers;

/// Request and response types.
pub mod protocol;

/// Transport collaborator traits.
///
/// The host implements these to plug in its HTTP client and WebSocket engine.
pub mod transport;

/// Buffered WebSocket adapter.
pub mod websocket;

// ============================================================================
// Re-exports
// ============================================================================

// Registry types
pub use connections::{
    AbortHandle, CancelHandle, Connections, ConnectionsBuilder, ConnectionsOptions,
    ResourceRequestTransaction, ResponseFuture, WebSocketFuture, WebSocketRequestTransaction,
};

// Diagnostics types
pub use diagnostics::{DiagnosticDelegate, DiagnosticsSender, DiagnosticsSubscription};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{AttemptId, TransactionId};

// Protocol types
pub use protocol::{Header, ResourceRequest, Response, WebSocketRequest};

// WebSocket types
pub use websocket::WebSocket;
