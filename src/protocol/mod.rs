//! Request and response types.
//!
//! | Type | Direction | Purpose |
//! |------|-----------|---------|
//! | [`ResourceRequest`] | Application → Connections | Plain HTTP request |
//! | [`WebSocketRequest`] | Application → Connections | WebSocket open request |
//! | [`HttpRequest`] | Connections → Transport | Parsed request with resolved port |
//! | [`HttpResponse`] | Transport → Connections | Raw response of a transaction |
//! | [`Response`] | Connections → Application | Result of a resource request |

// ============================================================================
// Submodules
// ============================================================================

/// Request types and URI helpers.
pub mod request;

/// Response types and status codes.
pub mod response;

// ============================================================================
// Re-exports
// ============================================================================

pub use request::{
    DEFAULT_PLAIN_PORT, DEFAULT_SECURE_PORT, Header, HttpRequest, ResourceRequest,
    WebSocketRequest, is_secure_scheme, parse_target, resolve_port,
};
pub use response::{
    HttpResponse, Response, STATUS_BAD_REQUEST, STATUS_CLIENT_CLOSED_REQUEST,
    STATUS_SERVICE_UNAVAILABLE, STATUS_SWITCHING_PROTOCOLS,
};
