//! Handles returned for queued requests.
//!
//! Every queued request hands back a future for its result together with
//! a way to give up on it. The futures are backed by oneshot channels and
//! never fail: if the producing side disappears they resolve to a fixed
//! fallback value instead.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Weak;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::identifiers::{AttemptId, TransactionId};
use crate::protocol::Response;
use crate::websocket::WebSocket;

use super::attempt::AbortHandle;
use super::core::ConnectionsInner;

// ============================================================================
// ResultFuture
// ============================================================================

/// Future resolving to the value sent on a oneshot channel.
///
/// Resolves to `fallback()` if the sender is dropped without sending.
pub struct ResultFuture<T> {
    rx: oneshot::Receiver<T>,
    fallback: fn() -> T,
}

/// Result of a resource request. Falls back to [`Response::cancelled`].
pub type ResponseFuture = ResultFuture<Response>;

/// Result of a WebSocket connection attempt. Falls back to `None`.
pub type WebSocketFuture = ResultFuture<Option<WebSocket>>;

impl<T> ResultFuture<T> {
    pub(crate) fn new(rx: oneshot::Receiver<T>, fallback: fn() -> T) -> Self {
        Self { rx, fallback }
    }

    /// Blocks the current thread until the result is available.
    ///
    /// # Panics
    ///
    /// Panics if called from within an asynchronous execution context.
    /// Use `.await` there instead.
    pub fn wait(self) -> T {
        let fallback = self.fallback;
        self.rx.blocking_recv().unwrap_or_else(|_| fallback())
    }
}

impl ResponseFuture {
    /// Creates a future that is already resolved.
    pub(crate) fn ready(response: Response) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(response);
        Self::new(rx, Response::cancelled)
    }
}

impl<T> Future for ResultFuture<T> {
    type Output = T;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<T> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(value)) => Poll::Ready(value),
            Poll::Ready(Err(_)) => Poll::Ready((self.fallback)()),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<T> fmt::Debug for ResultFuture<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultFuture").finish_non_exhaustive()
    }
}

// ============================================================================
// CancelHandle
// ============================================================================

/// Cancels one resource request.
///
/// Holds only a weak reference to the registry, so it never keeps the
/// registry alive and does nothing once the registry is gone.
#[derive(Clone)]
pub struct CancelHandle {
    id: TransactionId,
    registry: Weak<ConnectionsInner>,
}

impl CancelHandle {
    pub(crate) fn new(id: TransactionId, registry: Weak<ConnectionsInner>) -> Self {
        Self { id, registry }
    }

    /// A handle that cancels nothing, for requests that never entered the table.
    pub(crate) fn detached(id: TransactionId) -> Self {
        Self {
            id,
            registry: Weak::new(),
        }
    }

    /// Returns the id of the request this handle cancels.
    #[inline]
    #[must_use]
    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// Cancels the request.
    ///
    /// If the request is still in flight its future resolves with status
    /// 499. Otherwise, including after completion or a previous cancel,
    /// this does nothing. Safe to call from any thread.
    pub fn cancel(&self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.cancel(self.id);
        }
    }
}

impl fmt::Debug for CancelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelHandle")
            .field("id", &self.id)
            .field("registry_alive", &(self.registry.strong_count() > 0))
            .finish()
    }
}

// ============================================================================
// ResourceRequestTransaction
// ============================================================================

/// A queued resource request.
///
/// The fields are public so the future and the handle can be split apart:
///
/// ```ignore
/// let ResourceRequestTransaction { response, handle, .. } =
///     connections.queue_resource_request(request);
/// tokio::spawn(async move { sleep(deadline).await; handle.cancel() });
/// let response = response.await;
/// ```
#[derive(Debug)]
pub struct ResourceRequestTransaction {
    /// Registry-assigned id.
    pub id: TransactionId,
    /// Resolves once the request completes or is cancelled.
    pub response: ResponseFuture,
    /// Cancels the request.
    pub handle: CancelHandle,
}

impl ResourceRequestTransaction {
    /// Cancels the request. See [`CancelHandle::cancel`].
    #[inline]
    pub fn cancel(&self) {
        self.handle.cancel();
    }
}

// ============================================================================
// WebSocketRequestTransaction
// ============================================================================

/// A queued WebSocket connection attempt.
#[derive(Debug)]
pub struct WebSocketRequestTransaction {
    /// Id of the attempt.
    pub id: AttemptId,
    /// Resolves to the connected WebSocket, or `None` if the attempt
    /// failed or was aborted.
    pub web_socket: WebSocketFuture,
    /// Aborts the attempt.
    pub abort: AbortHandle,
}

impl WebSocketRequestTransaction {
    /// Aborts the attempt. See [`AbortHandle::abort`].
    #[inline]
    pub fn cancel(&self) {
        self.abort.abort();
    }
}

// ============================================================================
// Tests
// ============================================================================
