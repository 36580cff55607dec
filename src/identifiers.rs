//! Type-safe identifiers for transactions and connection attempts.
//!
//! Newtype wrappers keep the two id spaces from being mixed up.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

// ============================================================================
// TransactionId
// ============================================================================

/// Locally-assigned identifier of one in-flight resource request.
///
/// Unique for the lifetime of the [`Connections`](crate::Connections)
/// instance that issued it. Ids start at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransactionId(u64);

impl TransactionId {
    /// Returns the raw id value.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonic source of [`TransactionId`]s.
///
/// One counter per registry, so ids are dense within a registry.
#[derive(Debug)]
pub(crate) struct TransactionIdSource {
    next: AtomicU64,
}

impl TransactionIdSource {
    /// Creates a source whose first id is 1.
    pub(crate) const fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    /// Returns the next id.
    pub(crate) fn next(&self) -> TransactionId {
        TransactionId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for TransactionIdSource {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// AttemptId
// ============================================================================

/// Process-wide counter for WebSocket connection attempts.
static NEXT_ATTEMPT_ID: AtomicU64 = AtomicU64::new(1);

/// Identifier of one WebSocket upgrade attempt.
///
/// Used to name the attempt's worker thread and to correlate log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttemptId(u64);

impl AttemptId {
    /// Allocates the next process-wide attempt id.
    #[inline]
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_ATTEMPT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw id value.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Tests
// ============================================================================
