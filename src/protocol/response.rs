//! Response types.
//!
//! [`HttpResponse`] is what the transport reports; [`Response`] is the
//! application-facing result a resource request resolves to.

// ============================================================================
// Imports
// ============================================================================

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::Result;

use super::Header;

// ============================================================================
// Status Codes
// ============================================================================

/// Status reported for a request the client cancelled before completion.
pub const STATUS_CLIENT_CLOSED_REQUEST: u16 = 499;

/// Status reported for a request whose URI could not be used.
pub const STATUS_BAD_REQUEST: u16 = 400;

/// Status reported for a request refused by the local admission limit.
pub const STATUS_SERVICE_UNAVAILABLE: u16 = 503;

/// Status the server sends when it agrees to switch protocols.
pub const STATUS_SWITCHING_PROTOCOLS: u16 = 101;

// ============================================================================
// HttpResponse
// ============================================================================

/// Response as reported by the transport on a finished transaction.
///
/// Transactions that never got a response report status 0.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpResponse {
    /// Numeric status code.
    pub status_code: u16,
    /// Reason phrase from the status line.
    pub reason_phrase: String,
    /// Response headers in order.
    pub headers: Vec<Header>,
    /// Response body.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Creates a response with the given status line and nothing else.
    #[inline]
    #[must_use]
    pub fn new(status_code: u16, reason_phrase: impl Into<String>) -> Self {
        Self {
            status_code,
            reason_phrase: reason_phrase.into(),
            headers: Vec::new(),
            body: Vec::new(),
        }
    }
}

// ============================================================================
// Response
// ============================================================================

/// Result of a resource request.
///
/// # Example
///
/// ```
/// use gateway_connections::protocol::{Response, STATUS_CLIENT_CLOSED_REQUEST};
///
/// let cancelled = Response::cancelled();
/// assert_eq!(cancelled.status, STATUS_CLIENT_CLOSED_REQUEST);
/// assert!(cancelled.headers.is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    /// Numeric status code.
    pub status: u16,
    /// Response headers in order.
    pub headers: Vec<Header>,
    /// Response body.
    pub body: Vec<u8>,
}

impl Response {
    /// Creates a response carrying only a status.
    #[inline]
    #[must_use]
    pub fn from_status(status: u16) -> Self {
        Self {
            status,
            ..Default::default()
        }
    }

    /// The result of a cancelled request.
    #[inline]
    #[must_use]
    pub fn cancelled() -> Self {
        Self::from_status(STATUS_CLIENT_CLOSED_REQUEST)
    }

    /// Returns `true` for 2xx statuses.
    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Returns `true` if this response records a client-side cancellation.
    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.status == STATUS_CLIENT_CLOSED_REQUEST
    }

    /// Returns the first header value with the given name, ignoring case.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|header| header.is(name))
            .map(|header| header.value.as_str())
    }

    /// Returns the body as text, replacing invalid UTF-8.
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Deserializes the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`](crate::Error::Json) if the body is not valid
    /// JSON for `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

impl From<HttpResponse> for Response {
    fn from(response: HttpResponse) -> Self {
        Self {
            status: response.status_code,
            headers: response.headers,
            body: response.body,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
