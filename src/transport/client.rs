//! HTTP client contract.
//!
//! The client issues requests and reports each one as a
//! [`ClientTransaction`] that reaches a terminal [`TransactionState`]
//! asynchronously, on the client's own threads.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use crate::protocol::{HttpRequest, HttpResponse};

// ============================================================================
// Types
// ============================================================================

/// Called exactly once when a transaction reaches a terminal state.
pub type CompletionDelegate = Box<dyn FnOnce() + Send>;

/// Called when the server answers an upgrade request.
///
/// Receives the response, the connection the response arrived on, and
/// any bytes that followed the response on that connection. Runs before
/// the transaction's [`CompletionDelegate`].
pub type UpgradeDelegate =
    Box<dyn FnOnce(&HttpResponse, Arc<dyn RawConnection>, Vec<u8>) + Send>;

// ============================================================================
// TransactionState
// ============================================================================

/// State of a transport transaction.
///
/// Everything except [`InProgress`](Self::InProgress) is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionState {
    /// No terminal state reached yet.
    InProgress,
    /// A full response was received.
    Completed,
    /// No connection to the server could be made.
    UnableToConnect,
    /// The server broke the connection before a full response.
    Broken,
    /// No response arrived in time.
    Timeout,
    /// A state value this crate does not recognize.
    Unknown(i32),
}

impl TransactionState {
    /// Returns `true` for terminal states.
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::InProgress)
    }
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InProgress => f.write_str("in progress"),
            Self::Completed => f.write_str("completed"),
            Self::UnableToConnect => f.write_str("unable to connect"),
            Self::Broken => f.write_str("broken"),
            Self::Timeout => f.write_str("timeout"),
            Self::Unknown(raw) => write!(f, "unknown ({raw})"),
        }
    }
}

// ============================================================================
// Traits
// ============================================================================

/// One request in flight inside the [`HttpClient`].
pub trait ClientTransaction: Send + Sync {
    /// Returns the current state.
    fn state(&self) -> TransactionState;

    /// Returns the response received so far.
    ///
    /// Only meaningful once the state is terminal.
    fn response(&self) -> HttpResponse;

    /// Sets the delegate to call when the transaction reaches a terminal state.
    ///
    /// If the transaction is already terminal the delegate is called
    /// immediately, possibly on the calling thread. A transport that
    /// discards a transaction without completing it drops the delegate
    /// uncalled.
    fn set_completion_delegate(&self, delegate: CompletionDelegate);
}

/// Issues HTTP requests.
pub trait HttpClient: Send + Sync {
    /// Begins a request.
    ///
    /// Passing an `upgrade` delegate asks the client to keep the
    /// connection open and hand it over once the response arrives.
    fn request(
        &self,
        request: HttpRequest,
        upgrade: Option<UpgradeDelegate>,
    ) -> Arc<dyn ClientTransaction>;
}

/// A raw byte connection handed over after an upgrade.
pub trait RawConnection: Send + Sync {
    /// Returns a human-readable identifier of the peer.
    fn peer_id(&self) -> String;

    /// Queues bytes for sending.
    fn send_data(&self, data: Vec<u8>);

    /// Closes the connection, gracefully if `clean` is set.
    fn break_connection(&self, clean: bool);
}

// ============================================================================
// Tests
// ============================================================================
