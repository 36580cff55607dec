//! Transport collaborator contracts.
//!
//! The crate does not speak HTTP or WebSocket framing itself. It drives
//! an [`HttpClient`] and a [`WebSocketEngine`] supplied by the host.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐   request()    ┌─────────────────┐
//! │   Connections    │───────────────►│   HttpClient    │
//! │                  │◄───────────────│                 │
//! │ transaction table│  completion    │ (own threads)   │
//! └────────┬─────────┘   delegate     └────────┬────────┘
//!          │                                   │ upgrade delegate
//!          ▼                                   ▼
//! ┌──────────────────┐   delegates    ┌─────────────────┐
//! │ WebSocket adapter│◄───────────────│ WebSocketEngine │
//! └──────────────────┘                └─────────────────┘
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `client` | HTTP client, transaction and raw connection traits |
//! | `engine` | WebSocket protocol engine traits |

// ============================================================================
// Submodules
// ============================================================================

/// HTTP client contract.
pub mod client;

/// WebSocket protocol engine contract.
pub mod engine;

/// Scriptable in-memory transport for tests.
#[cfg(test)]
pub(crate) mod mock;

// ============================================================================
// Re-exports
// ============================================================================

pub use client::{
    ClientTransaction, CompletionDelegate, HttpClient, RawConnection, TransactionState,
    UpgradeDelegate,
};
pub use engine::{WebSocketDelegates, WebSocketEngine, WebSocketEngineFactory};
