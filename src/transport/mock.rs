//! Scriptable in-memory transport.
//!
//! Tests finish transactions by hand (or let the client finish them
//! synchronously inside `request`) and push inbound WebSocket traffic
//! through the engine's registered delegates.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::protocol::{HttpRequest, HttpResponse, STATUS_SWITCHING_PROTOCOLS};

use super::{
    ClientTransaction, CompletionDelegate, HttpClient, RawConnection, TransactionState,
    UpgradeDelegate, WebSocketDelegates, WebSocketEngine, WebSocketEngineFactory,
};

/// How long helpers wait for background activity before failing the test.
const WAIT_LIMIT: Duration = Duration::from_secs(5);

// ============================================================================
// MockTransaction
// ============================================================================

struct TransactionSlot {
    state: TransactionState,
    response: HttpResponse,
    completion: Option<CompletionDelegate>,
    upgrade: Option<UpgradeDelegate>,
}

pub(crate) struct MockTransaction {
    request: HttpRequest,
    slot: Mutex<TransactionSlot>,
}

impl MockTransaction {
    fn new(request: HttpRequest, upgrade: Option<UpgradeDelegate>) -> Self {
        Self {
            request,
            slot: Mutex::new(TransactionSlot {
                state: TransactionState::InProgress,
                response: HttpResponse::default(),
                completion: None,
                upgrade,
            }),
        }
    }

    /// The request this transaction was issued for.
    pub(crate) fn request(&self) -> &HttpRequest {
        &self.request
    }

    /// Moves to a terminal state, running the upgrade delegate for a
    /// completed upgrade request and then the completion delegate.
    pub(crate) fn finish(&self, state: TransactionState, response: HttpResponse) {
        let (upgrade, completion) = {
            let mut slot = self.slot.lock();
            slot.state = state;
            slot.response = response.clone();
            let upgrade = if state == TransactionState::Completed {
                slot.upgrade.take()
            } else {
                None
            };
            (upgrade, slot.completion.take())
        };

        if let Some(upgrade) = upgrade {
            upgrade(&response, Arc::new(MockConnection), Vec::new());
        }
        if let Some(completion) = completion {
            completion();
        }
    }

    /// Discards the delegates without calling them.
    pub(crate) fn abandon(&self) {
        let (completion, upgrade) = {
            let mut slot = self.slot.lock();
            (slot.completion.take(), slot.upgrade.take())
        };
        drop(completion);
        drop(upgrade);
    }
}

impl ClientTransaction for MockTransaction {
    fn state(&self) -> TransactionState {
        self.slot.lock().state
    }

    fn response(&self) -> HttpResponse {
        self.slot.lock().response.clone()
    }

    fn set_completion_delegate(&self, delegate: CompletionDelegate) {
        let mut slot = self.slot.lock();
        if slot.state.is_terminal() {
            drop(slot);
            delegate();
        } else {
            slot.completion = Some(delegate);
        }
    }
}

// ============================================================================
// MockClient
// ============================================================================

pub(crate) struct MockClient {
    transactions: Mutex<Vec<Arc<MockTransaction>>>,
    issued: Condvar,
    auto_finish: Option<(TransactionState, HttpResponse)>,
}

impl MockClient {
    /// A client whose transactions stay in progress until finished by hand.
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            transactions: Mutex::new(Vec::new()),
            issued: Condvar::new(),
            auto_finish: None,
        })
    }

    /// A client that finishes every transaction before `request` returns.
    pub(crate) fn auto_finishing(state: TransactionState, response: HttpResponse) -> Arc<Self> {
        Arc::new(Self {
            transactions: Mutex::new(Vec::new()),
            issued: Condvar::new(),
            auto_finish: Some((state, response)),
        })
    }

    pub(crate) fn transactions(&self) -> Vec<Arc<MockTransaction>> {
        self.transactions.lock().clone()
    }

    /// Blocks until the `index`-th request has been issued.
    pub(crate) fn wait_for_transaction(&self, index: usize) -> Arc<MockTransaction> {
        let mut transactions = self.transactions.lock();
        while transactions.len() <= index {
            let timed_out = self.issued.wait_for(&mut transactions, WAIT_LIMIT).timed_out();
            assert!(!timed_out, "request {index} was never issued");
        }
        Arc::clone(&transactions[index])
    }
}

impl HttpClient for MockClient {
    fn request(
        &self,
        request: HttpRequest,
        upgrade: Option<UpgradeDelegate>,
    ) -> Arc<dyn ClientTransaction> {
        let transaction = Arc::new(MockTransaction::new(request, upgrade));
        if let Some((state, response)) = &self.auto_finish {
            transaction.finish(*state, response.clone());
        }
        self.transactions.lock().push(Arc::clone(&transaction));
        self.issued.notify_all();
        transaction
    }
}

// ============================================================================
// MockConnection
// ============================================================================

pub(crate) struct MockConnection;

impl RawConnection for MockConnection {
    fn peer_id(&self) -> String {
        "mock-peer:443".to_string()
    }

    fn send_data(&self, _data: Vec<u8>) {}

    fn break_connection(&self, _clean: bool) {}
}

// ============================================================================
// MockEngine
// ============================================================================

pub(crate) struct MockEngine {
    engage: bool,
    started: AtomicBool,
    delegates: Mutex<Option<Arc<WebSocketDelegates>>>,
    sent_text: Mutex<Vec<String>>,
    sent_binary: Mutex<Vec<Vec<u8>>>,
    closes: Mutex<Vec<(u16, String)>>,
}

impl MockEngine {
    /// An engine that engages on a 101 response if `engage` is set.
    pub(crate) fn new(engage: bool) -> Arc<Self> {
        Arc::new(Self {
            engage,
            started: AtomicBool::new(false),
            delegates: Mutex::new(None),
            sent_text: Mutex::new(Vec::new()),
            sent_binary: Mutex::new(Vec::new()),
            closes: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    fn delegates(&self) -> Arc<WebSocketDelegates> {
        let delegates = self.delegates.lock().clone();
        delegates.expect("delegates registered")
    }

    pub(crate) fn deliver_text(&self, message: &str) {
        (self.delegates().on_text)(message.to_string());
    }

    pub(crate) fn deliver_binary(&self, message: &[u8]) {
        (self.delegates().on_binary)(message.to_vec());
    }

    pub(crate) fn deliver_ping(&self, payload: &[u8]) {
        (self.delegates().on_ping)(payload.to_vec());
    }

    pub(crate) fn deliver_close(&self, code: u16, reason: &str) {
        (self.delegates().on_close)(code, reason.to_string());
    }

    pub(crate) fn sent_text(&self) -> Vec<String> {
        self.sent_text.lock().clone()
    }

    pub(crate) fn sent_binary(&self) -> Vec<Vec<u8>> {
        self.sent_binary.lock().clone()
    }

    pub(crate) fn closes(&self) -> Vec<(u16, String)> {
        self.closes.lock().clone()
    }
}

impl WebSocketEngine for MockEngine {
    fn start_open_as_client(&self, request: &mut HttpRequest) {
        request.set_header("Upgrade", "websocket");
        request.set_header("Connection", "upgrade");
        request.set_header("Sec-WebSocket-Version", "13");
        self.started.store(true, Ordering::Release);
    }

    fn finish_open_as_client(
        &self,
        _connection: Arc<dyn RawConnection>,
        response: &HttpResponse,
    ) -> bool {
        self.engage && response.status_code == STATUS_SWITCHING_PROTOCOLS
    }

    fn set_delegates(&self, delegates: WebSocketDelegates) {
        *self.delegates.lock() = Some(Arc::new(delegates));
    }

    fn send_text(&self, message: String) {
        self.sent_text.lock().push(message);
    }

    fn send_binary(&self, message: Vec<u8>) {
        self.sent_binary.lock().push(message);
    }

    fn close(&self, code: u16, reason: String) {
        self.closes.lock().push((code, reason));
    }
}

// ============================================================================
// MockEngineFactory
// ============================================================================

pub(crate) struct MockEngineFactory {
    engage: bool,
    created: Mutex<Vec<Arc<MockEngine>>>,
}

impl MockEngineFactory {
    pub(crate) fn new(engage: bool) -> Arc<Self> {
        Arc::new(Self {
            engage,
            created: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn created(&self) -> Vec<Arc<MockEngine>> {
        self.created.lock().clone()
    }
}

impl WebSocketEngineFactory for MockEngineFactory {
    fn create(&self) -> Arc<dyn WebSocketEngine> {
        let engine = MockEngine::new(self.engage);
        self.created.lock().push(Arc::clone(&engine));
        engine
    }
}
