//! WebSocket protocol engine contract.
//!
//! The engine owns framing, handshake validation and ping/pong. The
//! crate drives it through the opening handshake and then receives its
//! inbound notifications through [`WebSocketDelegates`].

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use crate::protocol::{HttpRequest, HttpResponse};

use super::RawConnection;

// ============================================================================
// WebSocketDelegates
// ============================================================================

/// Notification channels of an engaged WebSocket.
///
/// An engine invokes these serially for one connection, never two at once.
pub struct WebSocketDelegates {
    /// Ping frame payload.
    pub on_ping: Box<dyn Fn(Vec<u8>) + Send + Sync>,
    /// Pong frame payload.
    pub on_pong: Box<dyn Fn(Vec<u8>) + Send + Sync>,
    /// Complete text message.
    pub on_text: Box<dyn Fn(String) + Send + Sync>,
    /// Complete binary message.
    pub on_binary: Box<dyn Fn(Vec<u8>) + Send + Sync>,
    /// Close frame code and reason.
    pub on_close: Box<dyn Fn(u16, String) + Send + Sync>,
}

// ============================================================================
// Traits
// ============================================================================

/// Client side of the WebSocket protocol.
pub trait WebSocketEngine: Send + Sync {
    /// Adds the opening-handshake headers to `request`.
    fn start_open_as_client(&self, request: &mut HttpRequest);

    /// Validates the server's handshake response and takes over `connection`.
    ///
    /// Returns `true` if the WebSocket engaged.
    fn finish_open_as_client(
        &self,
        connection: Arc<dyn RawConnection>,
        response: &HttpResponse,
    ) -> bool;

    /// Registers the notification channels.
    fn set_delegates(&self, delegates: WebSocketDelegates);

    /// Sends a text message.
    fn send_text(&self, message: String);

    /// Sends a binary message.
    fn send_binary(&self, message: Vec<u8>);

    /// Starts the closing handshake.
    fn close(&self, code: u16, reason: String);
}

/// Creates a fresh engine for every connection attempt.
pub trait WebSocketEngineFactory: Send + Sync {
    /// Returns a new, unopened engine.
    fn create(&self) -> Arc<dyn WebSocketEngine>;
}

impl<F> WebSocketEngineFactory for F
where
    F: Fn() -> Arc<dyn WebSocketEngine> + Send + Sync,
{
    fn create(&self) -> Arc<dyn WebSocketEngine> {
        self()
    }
}
