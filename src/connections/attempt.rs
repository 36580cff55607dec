//! WebSocket connection attempts.
//!
//! One attempt performs a single upgrade request on a dedicated worker
//! thread. The worker blocks until either the transport finishes the
//! request or the caller aborts, then reports one outcome through a
//! [`WebSocketFuture`].
//!
//! # Outcomes
//!
//! | Transport result | Outcome | Diagnostic |
//! |------------------|---------|------------|
//! | aborted first | `None` | warning |
//! | completed, engaged | `Some(web_socket)` | level 2 |
//! | completed, 101, not engaged | `None` | warning |
//! | completed, other status | `None` | warning with status line |
//! | unable to connect, broken, timeout | `None` | warning |
//! | abandoned by the transport | `None` | error |
//! | unknown state | `None` | error with raw state |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use parking_lot::{Condvar, Mutex};
use tokio::sync::oneshot;
use tracing::{debug, error};

use crate::diagnostics::{DiagnosticsSender, levels, thresholds};
use crate::error::Error;
use crate::identifiers::AttemptId;
use crate::protocol::{HttpRequest, HttpResponse, STATUS_SWITCHING_PROTOCOLS, parse_target};
use crate::transport::{
    HttpClient, RawConnection, TransactionState, UpgradeDelegate, WebSocketEngine,
};
use crate::websocket::WebSocket;

use super::handle::WebSocketFuture;

// ============================================================================
// Constants
// ============================================================================

/// Schemes a WebSocket attempt accepts.
const WEBSOCKET_SCHEMES: &[&str] = &["ws", "wss"];

/// Diagnostics level for connection progress.
const PROGRESS_LEVEL: usize = 2;

// ============================================================================
// AttemptContext
// ============================================================================

/// Flags shared between an attempt's worker and its abort handle.
#[derive(Debug, Default)]
struct AttemptState {
    abort_requested: bool,
    completed: bool,
}

/// Wait state of one attempt: two flags under one lock and one condition
/// variable signalled when either is set.
#[derive(Debug, Default)]
pub struct AttemptContext {
    state: Mutex<AttemptState>,
    wake: Condvar,
}

impl AttemptContext {
    /// Creates a context with neither flag set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks until the transport completes or an abort is requested.
    ///
    /// Returns `true` if the transport completed without an abort. An
    /// abort requested before the wait ends always wins, even if the
    /// transport also completed.
    pub fn wait(&self) -> bool {
        let mut state = self.state.lock();
        while !state.abort_requested && !state.completed {
            self.wake.wait(&mut state);
        }
        !state.abort_requested
    }

    /// Marks the transport as complete and wakes the worker.
    pub fn complete(&self) {
        self.state.lock().completed = true;
        self.wake.notify_all();
    }

    /// Requests an abort and wakes the worker.
    pub fn abort(&self) {
        self.state.lock().abort_requested = true;
        self.wake.notify_all();
    }

    /// Returns `true` once an abort was requested.
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.state.lock().abort_requested
    }
}

// ============================================================================
// AbortHandle
// ============================================================================

/// Aborts a connection attempt.
///
/// Cheap to clone. Aborting is idempotent and does nothing once the
/// attempt has finished waiting.
#[derive(Clone)]
pub struct AbortHandle {
    context: Arc<AttemptContext>,
}

impl AbortHandle {
    /// Aborts the attempt.
    pub fn abort(&self) {
        self.context.abort();
    }

    /// Returns `true` once [`abort`](Self::abort) has been called.
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.context.is_aborted()
    }
}

impl fmt::Debug for AbortHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AbortHandle")
            .field("aborted", &self.is_aborted())
            .finish()
    }
}

// ============================================================================
// ConnectionAttempt
// ============================================================================

/// A running connection attempt.
#[derive(Debug)]
pub struct ConnectionAttempt {
    /// Id of the attempt; also names its worker thread.
    pub id: AttemptId,
    /// Resolves to the connected WebSocket, or `None`.
    pub connection: WebSocketFuture,
    /// Aborts the attempt.
    pub abort: AbortHandle,
}

/// Starts a connection attempt on a new worker thread.
///
/// Returns immediately. The worker is named `{worker_name}-{id}`. If the
/// worker cannot be started the failure is reported on `diagnostics` and
/// the returned future resolves to `None`.
pub fn connect_websocket(
    client: Arc<dyn HttpClient>,
    engine: Arc<dyn WebSocketEngine>,
    uri: impl Into<String>,
    worker_name: &str,
    diagnostics: DiagnosticsSender,
) -> ConnectionAttempt {
    let id = AttemptId::next();
    let uri = uri.into();
    let context = Arc::new(AttemptContext::new());
    let (tx, rx) = oneshot::channel();

    let spawned = thread::Builder::new()
        .name(format!("{worker_name}-{id}"))
        .spawn({
            let context = Arc::clone(&context);
            let diagnostics = diagnostics.clone();
            move || {
                let web_socket =
                    connect_synchronous(id, &*client, engine, &uri, &context, &diagnostics);
                // The receiver may already be gone; nobody is waiting then.
                let _ = tx.send(web_socket);
            }
        });

    if let Err(e) = spawned {
        let e = Error::worker_spawn(e);
        error!(attempt = %id, error = %e, "Connection attempt not started");
        diagnostics.send(levels::ERROR, e.to_string());
    }

    ConnectionAttempt {
        id,
        connection: WebSocketFuture::new(rx, || None),
        abort: AbortHandle { context },
    }
}

// ============================================================================
// Worker
// ============================================================================

/// Performs one upgrade attempt on the calling thread.
fn connect_synchronous(
    id: AttemptId,
    client: &dyn HttpClient,
    engine: Arc<dyn WebSocketEngine>,
    uri: &str,
    context: &Arc<AttemptContext>,
    diagnostics: &DiagnosticsSender,
) -> Option<WebSocket> {
    let target = match parse_target(uri, WEBSOCKET_SCHEMES) {
        Ok(target) => target,
        Err(e) => {
            debug!(attempt = %id, error = %e, "Rejected WebSocket URI");
            diagnostics.send(levels::ERROR, format!("WebSocket URI \"{uri}\" is invalid"));
            return None;
        }
    };

    let mut request = HttpRequest::new("GET", target);
    debug!(attempt = %id, port = ?request.port, "Connecting");
    diagnostics.send(PROGRESS_LEVEL, "Connecting...");

    // Delegates must be in place before the transport can engage the
    // engine, or early frames would have nowhere to go.
    let web_socket = WebSocket::new(Arc::clone(&engine));
    web_socket
        .subscribe_to_diagnostics(diagnostics.chain(), thresholds::WEB_SOCKET_WRAPPER)
        .detach();
    engine.start_open_as_client(&mut request);

    let engaged = Arc::new(AtomicBool::new(false));
    let upgrade: UpgradeDelegate = Box::new({
        let engaged = Arc::clone(&engaged);
        move |response: &HttpResponse, connection: Arc<dyn RawConnection>, _trailer: Vec<u8>| {
            if engine.finish_open_as_client(connection, response) {
                engaged.store(true, Ordering::Release);
            }
        }
    });

    let transaction = client.request(request, Some(upgrade));
    let signal = CompletionSignal(Arc::clone(context));
    transaction.set_completion_delegate(Box::new(move || drop(signal)));

    if !context.wait() {
        diagnostics.send(levels::WARNING, "connection aborted");
        return None;
    }

    let engaged = engaged.load(Ordering::Acquire);
    match transaction.state() {
        TransactionState::Completed if engaged => {
            diagnostics.send(PROGRESS_LEVEL, "Connection established.");
            return Some(web_socket);
        }
        TransactionState::Completed => {
            let response = transaction.response();
            if response.status_code == STATUS_SWITCHING_PROTOCOLS {
                diagnostics.send(
                    levels::WARNING,
                    "Connection upgraded, but failed to engage WebSocket",
                );
            } else {
                diagnostics.send(
                    levels::WARNING,
                    format!(
                        "Got back response: {} {}",
                        response.status_code, response.reason_phrase
                    ),
                );
            }
        }
        TransactionState::UnableToConnect => {
            diagnostics.send(levels::WARNING, "unable to connect");
        }
        TransactionState::Broken => {
            diagnostics.send(levels::WARNING, "connection broken by server");
        }
        TransactionState::Timeout => {
            diagnostics.send(levels::WARNING, "timeout waiting for response");
        }
        state @ TransactionState::InProgress => {
            diagnostics.send(levels::ERROR, format!("Transaction abandoned while {state}"));
        }
        TransactionState::Unknown(raw) => {
            diagnostics.send(levels::ERROR, format!("Unknown transaction state ({raw})"));
        }
    }
    None
}

/// Wakes the worker when dropped.
///
/// Moved into the completion delegate, so the worker wakes whether the
/// transport calls the delegate or discards it uncalled.
struct CompletionSignal(Arc<AttemptContext>);

impl Drop for CompletionSignal {
    fn drop(&mut self) {
        self.0.complete();
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use futures_util::FutureExt;

    use crate::diagnostics::tests::{Recorder, init_tracing};
    use crate::transport::mock::{MockClient, MockEngine};

    struct Fixture {
        client: Arc<MockClient>,
        engine: Arc<MockEngine>,
        recorder: Recorder,
        attempt: ConnectionAttempt,
    }

    fn start(client: Arc<MockClient>, engage: bool, uri: &str) -> Fixture {
        init_tracing();
        let engine = MockEngine::new(engage);
        let diagnostics = DiagnosticsSender::new("ConnectionAttempt");
        let recorder = Recorder::default();
        recorder.attach(&diagnostics, 0);
        let attempt = connect_websocket(
            client.clone(),
            engine.clone(),
            uri,
            "test-connect",
            diagnostics,
        );
        Fixture {
            client,
            engine,
            recorder,
            attempt,
        }
    }

    fn switching_protocols() -> HttpResponse {
        HttpResponse::new(101, "Switching Protocols")
    }

    #[test]
    fn test_context_abort_wins_over_completion() {
        let context = AttemptContext::new();
        context.complete();
        context.abort();
        assert!(!context.wait());
    }

    #[test]
    fn test_context_completion_without_abort() {
        let context = Arc::new(AttemptContext::new());
        let signaller = Arc::clone(&context);
        let worker = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            signaller.complete();
        });
        assert!(context.wait());
        worker.join().expect("signaller thread");
    }

    #[test]
    fn test_engaged_upgrade_yields_web_socket() {
        let fixture = start(MockClient::new(), true, "wss://gateway.example.test/?v=6");
        let transaction = fixture.client.wait_for_transaction(0);

        assert_eq!(transaction.request().port, Some(443));
        assert_eq!(transaction.request().method, "GET");
        assert_eq!(transaction.request().header("Upgrade"), Some("websocket"));
        assert!(fixture.engine.started());

        transaction.finish(TransactionState::Completed, switching_protocols());
        let web_socket = fixture.attempt.connection.wait().expect("engaged");

        web_socket.send_text("hello");
        assert_eq!(fixture.engine.sent_text(), vec!["hello"]);
        assert!(fixture.recorder.contains(PROGRESS_LEVEL, &["Connection established."]));
    }

    #[test]
    fn test_explicit_port_is_kept() {
        let fixture = start(MockClient::new(), true, "wss://gateway.example.test:8443/");
        let transaction = fixture.client.wait_for_transaction(0);
        assert_eq!(transaction.request().port, Some(8443));
        fixture.attempt.abort.abort();
        assert!(fixture.attempt.connection.wait().is_none());
    }

    #[test]
    fn test_upgrade_without_engagement() {
        let fixture = start(MockClient::new(), false, "wss://gateway.example.test/");
        let transaction = fixture.client.wait_for_transaction(0);
        transaction.finish(TransactionState::Completed, switching_protocols());

        assert!(fixture.attempt.connection.wait().is_none());
        assert!(
            fixture
                .recorder
                .contains(levels::WARNING, &["upgraded", "failed to engage"])
        );
    }

    #[test]
    fn test_rejected_upgrade_reports_status_line() {
        let fixture = start(MockClient::new(), true, "wss://gateway.example.test/");
        let transaction = fixture.client.wait_for_transaction(0);
        transaction.finish(TransactionState::Completed, HttpResponse::new(403, "Forbidden"));

        assert!(fixture.attempt.connection.wait().is_none());
        assert!(
            fixture
                .recorder
                .contains(levels::WARNING, &["Got back response: 403 Forbidden"])
        );
    }

    #[test]
    fn test_transport_failures_are_warnings() {
        let cases = [
            (TransactionState::UnableToConnect, "unable to connect"),
            (TransactionState::Broken, "connection broken by server"),
            (TransactionState::Timeout, "timeout waiting for response"),
        ];
        for (state, expected) in cases {
            let fixture = start(MockClient::new(), true, "wss://gateway.example.test/");
            let transaction = fixture.client.wait_for_transaction(0);
            transaction.finish(state, HttpResponse::default());

            assert!(fixture.attempt.connection.wait().is_none());
            assert!(fixture.recorder.contains(levels::WARNING, &[expected]), "{state}");
        }
    }

    #[test]
    fn test_unknown_state_is_an_error() {
        let fixture = start(MockClient::new(), true, "wss://gateway.example.test/");
        let transaction = fixture.client.wait_for_transaction(0);
        transaction.finish(TransactionState::Unknown(42), HttpResponse::default());

        assert!(fixture.attempt.connection.wait().is_none());
        assert!(
            fixture
                .recorder
                .contains(levels::ERROR, &["Unknown transaction state (42)"])
        );
    }

    #[test]
    fn test_abort_before_completion() {
        let fixture = start(MockClient::new(), true, "wss://gateway.example.test/");
        let transaction = fixture.client.wait_for_transaction(0);

        fixture.attempt.abort.abort();
        assert!(fixture.attempt.abort.is_aborted());
        let outcome = fixture.attempt.connection.wait();
        assert!(outcome.is_none());
        assert!(fixture.recorder.contains(levels::WARNING, &["connection aborted"]));

        // The transport may still finish later; nobody observes it.
        transaction.finish(TransactionState::Completed, switching_protocols());
    }

    #[test]
    fn test_abort_after_resolution_is_noop() {
        let client = MockClient::auto_finishing(TransactionState::Completed, switching_protocols());
        let fixture = start(client, true, "wss://gateway.example.test/");

        let web_socket = fixture.attempt.connection.wait();
        assert!(web_socket.is_some());
        fixture.attempt.abort.abort();
        fixture.attempt.abort.abort();
    }

    #[test]
    fn test_invalid_uri_fails_without_request() {
        for uri in ["not a uri", "https://gateway.example.test/"] {
            let fixture = start(MockClient::new(), true, uri);
            assert!(fixture.attempt.connection.wait().is_none());
            assert!(fixture.client.transactions().is_empty());
            assert!(fixture.recorder.contains(levels::ERROR, &["is invalid"]));
        }
    }

    #[test]
    fn test_adapter_diagnostics_are_chained() {
        let client = MockClient::auto_finishing(TransactionState::Completed, switching_protocols());
        let fixture = start(client, true, "ws://gateway.example.test/");
        let _web_socket = fixture.attempt.connection.wait().expect("engaged");

        fixture.engine.deliver_text("{\"op\":10}");
        let chained = fixture
            .recorder
            .messages()
            .into_iter()
            .any(|(name, _, message)| {
                name == "ConnectionAttempt/WebSocketAdapter" && message.contains("op")
            });
        assert!(chained);
    }

    #[tokio::test]
    async fn test_future_does_not_block_caller() {
        let fixture = start(MockClient::new(), true, "wss://gateway.example.test/");
        let mut connection = fixture.attempt.connection;
        assert!((&mut connection).now_or_never().is_none());

        let transaction = fixture.client.wait_for_transaction(0);
        transaction.finish(TransactionState::Completed, switching_protocols());
        assert!(connection.await.is_some());
    }

    #[test]
    fn test_abandoned_transaction_wakes_worker() {
        let fixture = start(MockClient::new(), true, "wss://gateway.example.test/");
        let transaction = fixture.client.wait_for_transaction(0);
        transaction.abandon();

        assert!(fixture.attempt.connection.wait().is_none());
        assert!(!fixture.attempt.abort.is_aborted());
        assert!(
            fixture
                .recorder
                .contains(levels::ERROR, &["Transaction abandoned while in progress"])
        );
    }
}
