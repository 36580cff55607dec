//! Request orchestration.
//!
//! This module provides the main entry point of the crate.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Connections`] | Transaction registry issuing resource and WebSocket requests |
//! | [`ConnectionsBuilder`] | Fluent configuration builder |
//! | [`ConnectionsOptions`] | Request options |
//! | [`ResourceRequestTransaction`] | Pending resource request with cancel handle |
//! | [`WebSocketRequestTransaction`] | Pending connection attempt with abort handle |
//!
//! # Example
//!
//! ```ignore
//! use gateway_connections::{Connections, ResourceRequest, WebSocketRequest};
//!
//! let connections = Connections::builder()
//!     .client(client)
//!     .engine_factory(engines)
//!     .build()?;
//!
//! let gateway = connections
//!     .queue_resource_request(ResourceRequest::get("https://example.test/api/gateway"))
//!     .response
//!     .await;
//!
//! let attempt = connections.queue_websocket_request(WebSocketRequest::new(url));
//! let web_socket = attempt.web_socket.await;
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// WebSocket connection attempts on worker threads.
pub mod attempt;

/// Fluent builder pattern for registry configuration.
pub mod builder;

/// Transaction registry.
pub mod core;

/// Futures and cancellation handles for queued requests.
pub mod handle;

/// Registry options.
pub mod options;

// ============================================================================
// Re-exports
// ============================================================================

pub use attempt::{AbortHandle, AttemptContext, ConnectionAttempt, connect_websocket};
pub use builder::ConnectionsBuilder;
pub use core::Connections;
pub use handle::{
    CancelHandle, ResourceRequestTransaction, ResponseFuture, ResultFuture, WebSocketFuture,
    WebSocketRequestTransaction,
};
pub use options::ConnectionsOptions;
