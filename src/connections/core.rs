//! Transaction registry.
//!
//! [`Connections`] turns the transport's callback-driven transactions into
//! cancellable futures. Every in-flight resource request has one entry in
//! a table keyed by [`TransactionId`]; the entry owns the sender half of
//! the request's result channel. Completion and cancellation both resolve
//! a request by removing its entry, so whichever path removes it first is
//! the only one that can send a result.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::sync::oneshot;
use tracing::{debug, trace, warn};

use crate::diagnostics::{
    DiagnosticDelegate, DiagnosticsSender, DiagnosticsSubscription, levels, thresholds,
};
use crate::identifiers::{TransactionId, TransactionIdSource};
use crate::protocol::{
    HttpRequest, HttpResponse, ResourceRequest, Response, STATUS_BAD_REQUEST,
    STATUS_SERVICE_UNAVAILABLE, WebSocketRequest, parse_target,
};
use crate::transport::{ClientTransaction, HttpClient, TransactionState, WebSocketEngineFactory};

use super::attempt::connect_websocket;
use super::builder::ConnectionsBuilder;
use super::handle::{
    CancelHandle, ResourceRequestTransaction, ResponseFuture, WebSocketRequestTransaction,
};
use super::options::ConnectionsOptions;

// ============================================================================
// Constants
// ============================================================================

/// Schemes a resource request accepts.
const RESOURCE_SCHEMES: &[&str] = &["http", "https"];

/// Diagnostics level for request and response traces.
const TRACE_LEVEL: usize = 0;

/// Diagnostics level for WebSocket request notices.
const NOTICE_LEVEL: usize = 3;

/// Sender name of connection attempts, below the registry's own.
const ATTEMPT_DIAGNOSTICS_NAME: &str = "ConnectionAttempt";

// ============================================================================
// Types
// ============================================================================

/// One in-flight resource request.
struct PendingTransaction {
    transaction: Arc<dyn ClientTransaction>,
    response_tx: oneshot::Sender<Response>,
    method: String,
    uri: String,
}

/// In-flight resource requests by id.
type TransactionTable = FxHashMap<TransactionId, PendingTransaction>;

/// Shared registry state.
///
/// Callbacks and cancel handles hold [`Weak`] references to this, so the
/// registry's lifetime is owned by [`Connections`] handles alone.
pub(crate) struct ConnectionsInner {
    client: Arc<dyn HttpClient>,
    engines: Arc<dyn WebSocketEngineFactory>,
    options: ConnectionsOptions,
    diagnostics: DiagnosticsSender,
    ids: TransactionIdSource,
    transactions: Mutex<TransactionTable>,
}

// ============================================================================
// Connections
// ============================================================================

/// Issues resource and WebSocket requests through a host-supplied transport.
///
/// Cheap to clone; clones share one transaction table. Dropping the last
/// clone resolves every request still in flight with status 499.
///
/// # Example
///
/// ```ignore
/// use gateway_connections::{Connections, ResourceRequest};
///
/// let connections = Connections::builder()
///     .client(client)
///     .engine_factory(engines)
///     .build()?;
///
/// let transaction = connections.queue_resource_request(
///     ResourceRequest::get("https://discord.example.test/api/v6/gateway"),
/// );
/// let response = transaction.response.await;
/// ```
///
/// # Thread Safety
///
/// `Connections` is `Send + Sync`. The table lock is never held while
/// calling into the transport or resolving a future.
#[derive(Clone)]
pub struct Connections {
    inner: Arc<ConnectionsInner>,
}

impl fmt::Debug for Connections {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connections")
            .field("pending", &self.pending_count())
            .field("options", &self.inner.options)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Connections - Constructor
// ============================================================================

impl Connections {
    /// Creates a builder.
    #[inline]
    #[must_use]
    pub fn builder() -> ConnectionsBuilder {
        ConnectionsBuilder::new()
    }

    pub(crate) fn new(
        client: Arc<dyn HttpClient>,
        engines: Arc<dyn WebSocketEngineFactory>,
        options: ConnectionsOptions,
        diagnostics: DiagnosticsSender,
    ) -> Self {
        Self {
            inner: Arc::new(ConnectionsInner {
                client,
                engines,
                options,
                diagnostics,
                ids: TransactionIdSource::new(),
                transactions: Mutex::new(TransactionTable::default()),
            }),
        }
    }
}

// ============================================================================
// Connections - Requests
// ============================================================================

impl Connections {
    /// Issues a resource request.
    ///
    /// Returns immediately. The response future resolves with:
    ///
    /// - the transport's response once the transaction finishes, even if
    ///   it did not finish in the `Completed` state
    /// - status 499 if the request is cancelled first, or abandoned
    /// - status 400 if the URI is not an absolute `http`/`https` URI
    /// - status 503 if the pending-request limit is reached
    pub fn queue_resource_request(&self, request: ResourceRequest) -> ResourceRequestTransaction {
        self.inner.queue_resource_request(request)
    }

    /// Starts a WebSocket connection attempt on a worker thread.
    ///
    /// Returns immediately. The future resolves to the connected
    /// WebSocket, or `None` if the attempt failed or was aborted first.
    pub fn queue_websocket_request(&self, request: WebSocketRequest) -> WebSocketRequestTransaction {
        let inner = &self.inner;
        inner.diagnostics.send(
            NOTICE_LEVEL,
            format!("WebSocket request for {}", request.uri),
        );

        let diagnostics = DiagnosticsSender::new(ATTEMPT_DIAGNOSTICS_NAME);
        diagnostics
            .subscribe(inner.diagnostics.chain(), thresholds::CONNECTION_ATTEMPT)
            .detach();

        let attempt = connect_websocket(
            Arc::clone(&inner.client),
            inner.engines.create(),
            request.uri,
            &inner.options.worker_name,
            diagnostics,
        );

        WebSocketRequestTransaction {
            id: attempt.id,
            web_socket: attempt.connection,
            abort: attempt.abort,
        }
    }

    /// Cancels every resource request still in flight.
    ///
    /// Each affected future resolves with status 499.
    pub fn cancel_all(&self) {
        let drained: Vec<PendingTransaction> = {
            let mut transactions = self.inner.transactions.lock();
            transactions.drain().map(|(_, pending)| pending).collect()
        };
        if !drained.is_empty() {
            debug!(count = drained.len(), "Cancelling all pending requests");
        }
        for pending in drained {
            let _ = pending.response_tx.send(Response::cancelled());
        }
    }

    /// Returns the number of resource requests in flight.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inner.transactions.lock().len()
    }

    /// Returns the registry's options.
    #[inline]
    #[must_use]
    pub fn options(&self) -> &ConnectionsOptions {
        &self.inner.options
    }

    /// Subscribes to the registry's diagnostics.
    ///
    /// Connection attempt and WebSocket adapter diagnostics are forwarded
    /// through the same sender.
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
// ConnectionsInner - Resource Requests
// ============================================================================

impl ConnectionsInner {
    fn queue_resource_request(
        self: &Arc<Self>,
        request: ResourceRequest,
    ) -> ResourceRequestTransaction {
        self.diagnostics.send(
            TRACE_LEVEL,
            format!("{} request for {}", request.method, request.uri),
        );
        let id = self.ids.next();

        let target = match parse_target(&request.uri, RESOURCE_SCHEMES) {
            Ok(target) => target,
            Err(e) => {
                self.diagnostics.send(levels::ERROR, e.to_string());
                return resolved(id, STATUS_BAD_REQUEST);
            }
        };

        if self.options.is_at_capacity(self.transactions.lock().len()) {
            self.diagnostics.send(
                levels::WARNING,
                format!(
                    "Too many pending requests; refusing {} {}",
                    request.method, request.uri
                ),
            );
            return resolved(id, STATUS_SERVICE_UNAVAILABLE);
        }

        let mut http = HttpRequest::new(request.method.clone(), target);
        for header in request.headers {
            http.set_header(header.name, header.value);
        }
        if let Some(user_agent) = &self.options.user_agent
            && http.header("User-Agent").is_none()
        {
            http.set_header("User-Agent", user_agent.clone());
        }
        http.body = request.body;

        let transaction = self.client.request(http, None);
        let (response_tx, response_rx) = oneshot::channel();
        self.transactions.lock().insert(
            id,
            PendingTransaction {
                transaction: Arc::clone(&transaction),
                response_tx,
                method: request.method,
                uri: request.uri,
            },
        );
        trace!(%id, "Transaction registered");

        // May run right here if the transaction is already finished.
        let guard = CompletionGuard::new(id, Arc::downgrade(self));
        transaction.set_completion_delegate(Box::new(move || guard.complete()));

        ResourceRequestTransaction {
            id,
            response: ResponseFuture::new(response_rx, Response::cancelled),
            handle: CancelHandle::new(id, Arc::downgrade(self)),
        }
    }

    /// Removes the entry for `id`, if it is still in the table.
    fn take(&self, id: TransactionId) -> Option<PendingTransaction> {
        self.transactions.lock().remove(&id)
    }

    /// Completion path: resolves with the transport's response.
    fn complete(&self, id: TransactionId) {
        let Some(pending) = self.take(id) else {
            trace!(%id, "Completion after cancellation ignored");
            return;
        };

        let state = pending.transaction.state();
        let response = pending.transaction.response();
        self.log_response(&response);

        match state {
            TransactionState::Completed => {}
            TransactionState::Unknown(raw) => self.diagnostics.send(
                levels::ERROR,
                format!(
                    "{} {}: unknown transaction state ({raw})",
                    pending.method, pending.uri
                ),
            ),
            other => self.diagnostics.send(
                levels::WARNING,
                format!("{} {}: {other}", pending.method, pending.uri),
            ),
        }

        let _ = pending.response_tx.send(Response::from(response));
    }

    /// Cancellation path: resolves with status 499.
    pub(crate) fn cancel(&self, id: TransactionId) {
        let Some(pending) = self.take(id) else {
            return;
        };
        debug!(%id, uri = %pending.uri, "Request cancelled");
        let _ = pending.response_tx.send(Response::cancelled());
    }

    /// The transport dropped the completion delegate without calling it.
    fn abandon(&self, id: TransactionId) {
        let Some(pending) = self.take(id) else {
            return;
        };
        warn!(%id, uri = %pending.uri, "Transport abandoned request");
        self.diagnostics.send(
            levels::WARNING,
            format!("{} {}: abandoned by transport", pending.method, pending.uri),
        );
        let _ = pending.response_tx.send(Response::cancelled());
    }

    fn log_response(&self, response: &HttpResponse) {
        let diagnostics = &self.diagnostics;
        diagnostics.send(
            TRACE_LEVEL,
            format!(
                "Response: {} {}",
                response.status_code, response.reason_phrase
            ),
        );
        diagnostics.send(TRACE_LEVEL, "Headers: ---------------");
        for header in &response.headers {
            diagnostics.send(TRACE_LEVEL, format!("{}: {}", header.name, header.value));
        }
        diagnostics.send(TRACE_LEVEL, "Body: ------------------------");
        if !response.body.is_empty() {
            diagnostics.send(TRACE_LEVEL, String::from_utf8_lossy(&response.body));
        }
        diagnostics.send(TRACE_LEVEL, "------------------------");
    }
}

/// A transaction that never entered the table, resolved on the spot.
fn resolved(id: TransactionId, status: u16) -> ResourceRequestTransaction {
    ResourceRequestTransaction {
        id,
        response: ResponseFuture::ready(Response::from_status(status)),
        handle: CancelHandle::detached(id),
    }
}

// ============================================================================
// CompletionGuard
// ============================================================================

/// Carried by the completion delegate.
///
/// Runs the completion path when invoked and the abandonment path if
/// dropped uncalled. Acts only while the registry is alive.
struct CompletionGuard {
    id: TransactionId,
    registry: Weak<ConnectionsInner>,
    armed: bool,
}

impl CompletionGuard {
    fn new(id: TransactionId, registry: Weak<ConnectionsInner>) -> Self {
        Self {
            id,
            registry,
            armed: true,
        }
    }

    fn complete(mut self) {
        self.armed = false;
        if let Some(registry) = self.registry.upgrade() {
            registry.complete(self.id);
        }
    }
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Some(registry) = self.registry.upgrade() {
            registry.abandon(self.id);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
