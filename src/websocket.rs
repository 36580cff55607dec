//! Application-facing WebSocket.
//!
//! [`WebSocket`] wraps an engaged [`WebSocketEngine`] and decouples
//! handler registration from message arrival: text messages that arrive
//! before a text handler exists are buffered and handed to the first
//! handler registered, in arrival order, from within the registration
//! call.
//!
//! Binary and close notifications are forwarded to their handlers when
//! present and dropped otherwise. Ping and pong are only logged.
//!
//! # Example
//!
//! ```ignore
//! let web_socket = transaction.web_socket.await.expect("connected");
//!
//! web_socket.register_text_handler(|message| {
//!     println!("gateway says {message}");
//! });
//! web_socket.register_close_handler(|code, reason| {
//!     println!("closed {code}: {reason}");
//! });
//! web_socket.send_text(r#"{"op":1,"d":null}"#);
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::mem;
use std::sync::{Arc, Weak};

use parking_lot::ReentrantMutex;
use tracing::trace;

use crate::diagnostics::{DiagnosticDelegate, DiagnosticsSender, DiagnosticsSubscription};
use crate::error::{Error, Result};
use crate::transport::{WebSocketDelegates, WebSocketEngine};

// ============================================================================
// Constants
// ============================================================================

/// Close code for a normal closure.
pub const CLOSE_NORMAL: u16 = 1000;

/// Diagnostics level for received-message traces.
const RECEIVED_MESSAGE_LEVEL: usize = 3;

// ============================================================================
// Types
// ============================================================================

/// Receives text messages.
pub type TextHandler = Arc<dyn Fn(String) + Send + Sync>;

/// Receives binary messages.
pub type BinaryHandler = Arc<dyn Fn(Vec<u8>) + Send + Sync>;

/// Receives the close code and reason.
pub type CloseHandler = Arc<dyn Fn(u16, String) + Send + Sync>;

/// Mutable adapter state, guarded by the adapter's re-entrant lock.
#[derive(Default)]
struct AdapterState {
    text_handler: Option<TextHandler>,
    binary_handler: Option<BinaryHandler>,
    close_handler: Option<CloseHandler>,
    /// Text received while no handler could take it.
    pending_text: VecDeque<String>,
    /// Set while a registration call is handing `pending_text` over.
    draining: bool,
    /// The peer's close notification arrived.
    closed: bool,
    /// We started the closing handshake.
    close_sent: bool,
}

impl AdapterState {
    fn is_closed(&self) -> bool {
        self.closed || self.close_sent
    }
}

/// Shared state of a [`WebSocket`].
struct WebSocketInner {
    engine: Arc<dyn WebSocketEngine>,
    state: ReentrantMutex<RefCell<AdapterState>>,
    diagnostics: DiagnosticsSender,
}

// ============================================================================
// WebSocket
// ============================================================================

/// An open WebSocket with buffered text delivery.
///
/// Cheap to clone; clones share the connection and handlers.
///
/// # Thread Safety
///
/// All operations take one re-entrant lock scoped to the adapter, so a
/// handler may call back into the adapter. Handlers themselves run with
/// the lock released.
#[derive(Clone)]
pub struct WebSocket {
    inner: Arc<WebSocketInner>,
}

impl fmt::Debug for WebSocket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebSocket")
            .field("closed", &self.is_closed())
            .field("buffered_text", &self.buffered_text_count())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// WebSocket - Constructor
// ============================================================================

impl WebSocket {
    /// Wraps `engine` and registers the adapter as its delegate.
    ///
    /// The engine's delegates hold only a weak reference, so dropping every
    /// `WebSocket` handle silences them.
    pub(crate) fn new(engine: Arc<dyn WebSocketEngine>) -> Self {
        let inner = Arc::new(WebSocketInner {
            engine,
            state: ReentrantMutex::new(RefCell::new(AdapterState::default())),
            diagnostics: DiagnosticsSender::new("WebSocketAdapter"),
        });

        let weak = Arc::downgrade(&inner);
        inner.engine.set_delegates(WebSocketDelegates {
            on_ping: Box::new(with_inner(&weak, |inner, data: Vec<u8>| inner.on_ping(&data))),
            on_pong: Box::new(with_inner(&weak, |inner, data: Vec<u8>| inner.on_pong(&data))),
            on_text: Box::new(with_inner(&weak, |inner, message: String| inner.on_text(message))),
            on_binary: Box::new(with_inner(&weak, |inner, data: Vec<u8>| inner.on_binary(data))),
            on_close: Box::new({
                let weak = weak.clone();
                move |code, reason| {
                    if let Some(inner) = weak.upgrade() {
                        inner.on_close(code, reason);
                    }
                }
            }),
        });

        Self { inner }
    }
}

/// Adapts a one-argument notification to act on the live adapter, if any.
fn with_inner<T, F>(weak: &Weak<WebSocketInner>, f: F) -> impl Fn(T) + Send + Sync + 'static
where
    T: 'static,
    F: Fn(&WebSocketInner, T) + Send + Sync + 'static,
{
    let weak = weak.clone();
    move |value| {
        if let Some(inner) = weak.upgrade() {
            f(&inner, value);
        }
    }
}

// ============================================================================
// WebSocket - Sending
// ============================================================================

impl WebSocket {
    /// Sends a text message. Does nothing once the socket is closed.
    pub fn send_text(&self, message: impl Into<String>) {
        if self.try_send_text(message).is_err() {
            trace!("Text message dropped after close");
        }
    }

    /// Sends a text message, reporting whether the socket was still open.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] after either side closed.
    pub fn try_send_text(&self, message: impl Into<String>) -> Result<()> {
        self.ensure_open()?;
        self.inner.engine.send_text(message.into());
        Ok(())
    }

    /// Sends a binary message. Does nothing once the socket is closed.
    pub fn send_binary(&self, message: impl Into<Vec<u8>>) {
        if self.try_send_binary(message).is_err() {
            trace!("Binary message dropped after close");
        }
    }

    /// Sends a binary message, reporting whether the socket was still open.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] after either side closed.
    pub fn try_send_binary(&self, message: impl Into<Vec<u8>>) -> Result<()> {
        self.ensure_open()?;
        self.inner.engine.send_binary(message.into());
        Ok(())
    }

    /// Starts the closing handshake. Later calls do nothing.
    pub fn close(&self, code: u16, reason: impl Into<String>) {
        {
            let guard = self.inner.state.lock();
            let mut state = guard.borrow_mut();
            if state.is_closed() {
                return;
            }
            state.close_sent = true;
        }
        self.inner.engine.close(code, reason.into());
    }

    /// Closes with [`CLOSE_NORMAL`] and an empty reason.
    #[inline]
    pub fn close_normal(&self) {
        self.close(CLOSE_NORMAL, "");
    }

    /// Returns `true` once either side has closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.state.lock().borrow().is_closed()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(Error::ConnectionClosed);
        }
        Ok(())
    }
}

// ============================================================================
// WebSocket - Handlers
// ============================================================================

impl WebSocket {
    /// Registers the text handler, replacing any previous one.
    ///
    /// Text that arrived before any handler existed is delivered to
    /// `handler` before this call returns, in arrival order. Messages that
    /// arrive while that hand-over is running queue behind it, so the
    /// handler observes one uninterrupted arrival-ordered sequence.
    pub fn register_text_handler<F>(&self, handler: F)
    where
        F: Fn(String) + Send + Sync + 'static,
    {
        {
            let guard = self.inner.state.lock();
            let mut state = guard.borrow_mut();
            state.text_handler = Some(Arc::new(handler));
            if state.draining || state.pending_text.is_empty() {
                return;
            }
            state.draining = true;
        }
        self.inner.drain_pending_text();
    }

    /// Registers the binary handler, replacing any previous one.
    ///
    /// Binary messages are not buffered.
    pub fn register_binary_handler<F>(&self, handler: F)
    where
        F: Fn(Vec<u8>) + Send + Sync + 'static,
    {
        let guard = self.inner.state.lock();
        guard.borrow_mut().binary_handler = Some(Arc::new(handler));
    }

    /// Registers the close handler, replacing any previous one.
    pub fn register_close_handler<F>(&self, handler: F)
    where
        F: Fn(u16, String) + Send + Sync + 'static,
    {
        let guard = self.inner.state.lock();
        guard.borrow_mut().close_handler = Some(Arc::new(handler));
    }

    /// Returns the number of text messages waiting for a handler.
    #[must_use]
    pub fn buffered_text_count(&self) -> usize {
        self.inner.state.lock().borrow().pending_text.len()
    }

    /// Subscribes to this adapter's diagnostics.
    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn subscribe_to_diagnostics(
        &self,
        delegate: DiagnosticDelegate,
        min_level: usize,
    ) -> DiagnosticsSubscription {
        self.inner.diagnostics.subscribe(delegate, min_level)
    }
}

// ============================================================================
// WebSocketInner - Inbound
// ============================================================================

impl WebSocketInner {
    /// Hands buffered text to the current handler until the buffer stays empty.
    ///
    /// The lock is released while the handler runs; text arriving in the
    /// meantime is appended to the buffer and picked up by the next round.
    fn drain_pending_text(&self) {
        loop {
            let (handler, batch) = {
                let guard = self.state.lock();
                let mut state = guard.borrow_mut();
                if state.pending_text.is_empty() {
                    state.draining = false;
                    return;
                }
                let Some(handler) = state.text_handler.clone() else {
                    state.draining = false;
                    return;
                };
                (handler, mem::take(&mut state.pending_text))
            };

            trace!(count = batch.len(), "Delivering buffered text messages");
            for message in batch {
                handler(message);
            }
        }
    }

    fn on_text(&self, message: String) {
        self.diagnostics.send(
            RECEIVED_MESSAGE_LEVEL,
            format!("Received Text Message: {message}"),
        );

        let handler = {
            let guard = self.state.lock();
            let mut state = guard.borrow_mut();
            match state.text_handler.clone() {
                Some(handler) if !state.draining => handler,
                _ => {
                    state.pending_text.push_back(message);
                    return;
                }
            }
        };
        handler(message);
    }

    fn on_binary(&self, data: Vec<u8>) {
        let handler = self.state.lock().borrow().binary_handler.clone();
        match handler {
            Some(handler) => handler(data),
            None => trace!(len = data.len(), "Binary message dropped; no handler"),
        }
    }

    fn on_ping(&self, data: &[u8]) {
        self.diagnostics
            .send(0, format!("Received ping ({} bytes)", data.len()));
    }

    fn on_pong(&self, data: &[u8]) {
        self.diagnostics
            .send(0, format!("Received pong ({} bytes)", data.len()));
    }

    fn on_close(&self, code: u16, reason: String) {
        let handler = {
            let guard = self.state.lock();
            let mut state = guard.borrow_mut();
            state.closed = true;
            state.close_handler.clone()
        };
        self.diagnostics
            .send(2, format!("Connection closed ({code}): {reason}"));
        if let Some(handler) = handler {
            handler(code, reason);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
