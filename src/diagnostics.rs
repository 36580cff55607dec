//! Level-filtered diagnostics publishing.
//!
//! Every component owns a named [`DiagnosticsSender`]. Messages are
//! mirrored to `tracing` and fanned out to subscribers whose minimum
//! level they meet. Senders can be chained so that a component's
//! messages reach the subscribers of its owner, prefixed with the
//! component's name.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use gateway_connections::diagnostics::{DiagnosticsSender, levels};
//!
//! let sender = DiagnosticsSender::new("Connections");
//! let subscription = sender.subscribe(
//!     Arc::new(|name: &str, level: usize, message: &str| {
//!         eprintln!("[{name}:{level}] {message}");
//!     }),
//!     levels::WARNING,
//! );
//!
//! sender.send(levels::WARNING, "unable to connect");
//! drop(subscription);
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tracing::{debug, error, info, trace, warn};

// ============================================================================
// Levels
// ============================================================================

/// Well-known diagnostic levels. Lower values are more routine.
pub mod levels {
    /// Something unexpected happened but the operation carried on.
    pub const WARNING: usize = 5;

    /// An operation failed.
    pub const ERROR: usize = 10;
}

/// Default subscription thresholds for the crate's components.
pub mod thresholds {
    /// Connections interface (transaction registry).
    pub const CONNECTIONS_INTERFACE: usize = 1;

    /// Connection attempt workers.
    pub const CONNECTION_ATTEMPT: usize = 1;

    /// WebSocket adapter.
    pub const WEB_SOCKET_WRAPPER: usize = 0;
}

// ============================================================================
// Types
// ============================================================================

/// Subscriber callback: `(sender_name, level, message)`.
pub type DiagnosticDelegate = Arc<dyn Fn(&str, usize, &str) + Send + Sync>;

/// One registered subscriber.
struct Subscriber {
    delegate: DiagnosticDelegate,
    min_level: usize,
}

/// Shared state of a sender.
struct SenderInner {
    name: String,
    subscribers: Mutex<FxHashMap<u64, Subscriber>>,
    next_token: AtomicU64,
}

// ============================================================================
// DiagnosticsSender
// ============================================================================

/// Named publisher of diagnostic messages.
///
/// Cheap to clone; clones publish to the same subscribers.
#[derive(Clone)]
pub struct DiagnosticsSender {
    inner: Arc<SenderInner>,
}

impl fmt::Debug for DiagnosticsSender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiagnosticsSender")
            .field("name", &self.inner.name)
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl DiagnosticsSender {
    /// Creates a sender with the given name and no subscribers.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(SenderInner {
                name: name.into(),
                subscribers: Mutex::new(FxHashMap::default()),
                next_token: AtomicU64::new(1),
            }),
        }
    }

    /// Returns the sender's name.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Returns the number of live subscriptions.
    #[inline]
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.lock().len()
    }

    /// Subscribes to messages at or above `min_level`.
    ///
    /// The subscription ends when the returned handle is dropped, unless
    /// it is [detached](DiagnosticsSubscription::detach).
    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn subscribe(
        &self,
        delegate: DiagnosticDelegate,
        min_level: usize,
    ) -> DiagnosticsSubscription {
        let token = self.inner.next_token.fetch_add(1, Ordering::Relaxed);
        self.inner.subscribers.lock().insert(
            token,
            Subscriber {
                delegate,
                min_level,
            },
        );
        DiagnosticsSubscription {
            token,
            sender: Some(Arc::downgrade(&self.inner)),
        }
    }

    /// Returns a delegate that republishes into this sender.
    ///
    /// The originating sender's name is appended to this sender's name,
    /// separated by `/`. The delegate keeps this sender alive, so a child
    /// keeps forwarding after its owner's own handles are gone.
    #[must_use]
    pub fn chain(&self) -> DiagnosticDelegate {
        let parent = Arc::clone(&self.inner);
        Arc::new(move |sender_name: &str, level: usize, message: &str| {
            let name = format!("{}/{}", parent.name, sender_name);
            publish(&parent, &name, level, message);
        })
    }

    /// Publishes a message.
    pub fn send(&self, level: usize, message: impl AsRef<str>) {
        let message = message.as_ref();
        mirror_to_tracing(&self.inner.name, level, message);
        publish(&self.inner, &self.inner.name, level, message);
    }
}

/// Mirrors a diagnostic into `tracing` at a comparable severity.
fn mirror_to_tracing(sender: &str, level: usize, message: &str) {
    match level {
        l if l >= levels::ERROR => error!(sender, diag_level = level, "{message}"),
        l if l >= levels::WARNING => warn!(sender, diag_level = level, "{message}"),
        l if l >= 3 => info!(sender, diag_level = level, "{message}"),
        2 => debug!(sender, diag_level = level, "{message}"),
        _ => trace!(sender, diag_level = level, "{message}"),
    }
}

/// Delivers a message to every subscriber whose threshold it meets.
///
/// Delegates run after the subscriber table lock is released.
fn publish(inner: &SenderInner, name: &str, level: usize, message: &str) {
    let targets: Vec<DiagnosticDelegate> = inner
        .subscribers
        .lock()
        .values()
        .filter(|subscriber| level >= subscriber.min_level)
        .map(|subscriber| Arc::clone(&subscriber.delegate))
        .collect();

    for delegate in targets {
        delegate(name, level, message);
    }
}

// ============================================================================
// DiagnosticsSubscription
// ============================================================================

/// Handle to a diagnostics subscription.
///
/// Dropping the handle unsubscribes.
pub struct DiagnosticsSubscription {
    token: u64,
    sender: Option<Weak<SenderInner>>,
}

impl DiagnosticsSubscription {
    /// Keeps the subscription alive for as long as the sender lives.
    pub fn detach(mut self) {
        self.sender = None;
    }
}

impl fmt::Debug for DiagnosticsSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiagnosticsSubscription")
            .field("token", &self.token)
            .field("attached", &self.sender.is_some())
            .finish()
    }
}

impl Drop for DiagnosticsSubscription {
    fn drop(&mut self) {
        if let Some(inner) = self.sender.take().and_then(|weak| weak.upgrade()) {
            inner.subscribers.lock().remove(&self.token);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    use tracing_subscriber::EnvFilter;

    /// Routes `tracing` output to the test harness; filter with `RUST_LOG`.
    pub(crate) fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    /// Records every message a sender publishes.
    #[derive(Clone, Default)]
    pub(crate) struct Recorder {
        messages: Arc<Mutex<Vec<(String, usize, String)>>>,
    }

    impl Recorder {
        pub(crate) fn attach(&self, sender: &DiagnosticsSender, min_level: usize) {
            let messages = Arc::clone(&self.messages);
            sender
                .subscribe(
                    Arc::new(move |name: &str, level: usize, message: &str| {
                        messages
                            .lock()
                            .push((name.to_string(), level, message.to_string()));
                    }),
                    min_level,
                )
                .detach();
        }

        pub(crate) fn messages(&self) -> Vec<(String, usize, String)> {
            self.messages.lock().clone()
        }

        /// Returns `true` if some message at `level` contains every fragment.
        pub(crate) fn contains(&self, level: usize, fragments: &[&str]) -> bool {
            self.messages.lock().iter().any(|(_, l, message)| {
                *l == level && fragments.iter().all(|f| message.contains(f))
            })
        }
    }

    #[test]
    fn test_level_filtering() {
        let sender = DiagnosticsSender::new("Test");
        let recorder = Recorder::default();
        recorder.attach(&sender, levels::WARNING);

        sender.send(0, "routine");
        sender.send(levels::WARNING, "careful");
        sender.send(levels::ERROR, "broken");

        let levels_seen: Vec<usize> = recorder.messages().iter().map(|m| m.1).collect();
        assert_eq!(levels_seen, vec![levels::WARNING, levels::ERROR]);
    }

    #[test]
    fn test_drop_unsubscribes() {
        let sender = DiagnosticsSender::new("Test");
        let subscription = sender.subscribe(Arc::new(|_: &str, _: usize, _: &str| {}), 0);
        assert_eq!(sender.subscriber_count(), 1);
        drop(subscription);
        assert_eq!(sender.subscriber_count(), 0);
    }

    #[test]
    fn test_detach_keeps_subscription() {
        let sender = DiagnosticsSender::new("Test");
        sender
            .subscribe(Arc::new(|_: &str, _: usize, _: &str| {}), 0)
            .detach();
        assert_eq!(sender.subscriber_count(), 1);
    }

    #[test]
    fn test_chain_prefixes_names() {
        let outer = DiagnosticsSender::new("App");
        let inner = DiagnosticsSender::new("Connections");
        let recorder = Recorder::default();
        recorder.attach(&outer, 0);
        inner.subscribe(outer.chain(), 1).detach();

        inner.send(0, "filtered by the chain threshold");
        inner.send(3, "GET request for https://example.test/");

        let messages = recorder.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].0, "App/Connections");
        assert_eq!(messages[0].1, 3);
    }

    #[test]
    fn test_chain_outlives_parent_handles() {
        let recorder = Recorder::default();
        let child = DiagnosticsSender::new("WebSocketAdapter");
        {
            let parent = DiagnosticsSender::new("ConnectionAttempt");
            recorder.attach(&parent, 0);
            child.subscribe(parent.chain(), 0).detach();
        }

        child.send(levels::ERROR, "connection lost");

        let messages = recorder.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].0, "ConnectionAttempt/WebSocketAdapter");
        assert_eq!(messages[0].2, "connection lost");
    }

    #[test]
    fn test_delegate_may_resubscribe() {
        let sender = DiagnosticsSender::new("Test");
        let reentrant = sender.clone();
        sender
            .subscribe(
                Arc::new(move |_: &str, _: usize, _: &str| {
                    let _ = reentrant.subscriber_count();
                }),
                0,
            )
            .detach();
        sender.send(0, "does not deadlock");
    }
}
