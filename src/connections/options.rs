//! Registry tuning options.
//!
//! # Example
//!
//! ```
//! use gateway_connections::ConnectionsOptions;
//!
//! let options = ConnectionsOptions::new()
//!     .with_user_agent("ExampleBot (https://example.test, 1.0)")
//!     .with_max_pending_requests(64)
//!     .with_worker_name("gateway-connect");
//!
//! assert_eq!(options.max_pending_requests, Some(64));
//! ```

// ============================================================================
// Constants
// ============================================================================

/// Default name prefix of connection attempt worker threads.
pub const DEFAULT_WORKER_NAME: &str = "ws-connect";

// ============================================================================
// ConnectionsOptions
// ============================================================================

/// Options applied to every request issued through a registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionsOptions {
    /// `User-Agent` added to resource requests that do not carry one.
    pub user_agent: Option<String>,

    /// Maximum number of resource requests in flight at once.
    ///
    /// Requests over the limit resolve immediately with status 503.
    /// `None` means unlimited.
    pub max_pending_requests: Option<usize>,

    /// Name prefix of connection attempt worker threads.
    ///
    /// Each worker is named `{worker_name}-{attempt_id}`.
    pub worker_name: String,
}

impl Default for ConnectionsOptions {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl ConnectionsOptions {
    /// Creates options with no user agent, no request limit and the
    /// default worker name.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            user_agent: None,
            max_pending_requests: None,
            worker_name: DEFAULT_WORKER_NAME.to_string(),
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl ConnectionsOptions {
    /// Sets the default `User-Agent`.
    #[inline]
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Limits the number of resource requests in flight.
    #[inline]
    #[must_use]
    pub fn with_max_pending_requests(mut self, limit: usize) -> Self {
        self.max_pending_requests = Some(limit);
        self
    }

    /// Sets the worker thread name prefix.
    #[inline]
    #[must_use]
    pub fn with_worker_name(mut self, name: impl Into<String>) -> Self {
        self.worker_name = name.into();
        self
    }
}

// ============================================================================
// Validation
// ============================================================================

impl ConnectionsOptions {
    /// Validates the options.
    ///
    /// # Errors
    ///
    /// Returns a message describing the first invalid setting.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_pending_requests == Some(0) {
            return Err("max_pending_requests must be greater than zero".to_string());
        }
        if self.worker_name.trim().is_empty() {
            return Err("worker_name must not be empty".to_string());
        }
        if self.worker_name.contains('\0') {
            return Err("worker_name must not contain NUL bytes".to_string());
        }
        Ok(())
    }

    /// Returns `true` if `pending` requests already fill the limit.
    #[inline]
    #[must_use]
    pub(crate) fn is_at_capacity(&self, pending: usize) -> bool {
        self.max_pending_requests
            .is_some_and(|limit| pending >= limit)
    }
}

// ============================================================================
// Tests
// ============================================================================
