//! Request types.
//!
//! Application-facing requests ([`ResourceRequest`], [`WebSocketRequest`])
//! and the transport-facing [`HttpRequest`] they are translated into.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Standard port for TLS-protected HTTP and WebSocket traffic.
pub const DEFAULT_SECURE_PORT: u16 = 443;

/// Standard port for plain HTTP and WebSocket traffic.
pub const DEFAULT_PLAIN_PORT: u16 = 80;

// ============================================================================
// Header
// ============================================================================

/// A single header as a `(name, value)` pair.
///
/// Order is preserved wherever headers are carried.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    /// Header name.
    pub name: String,
    /// Header value.
    pub value: String,
}

impl Header {
    /// Creates a header.
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Returns `true` if this header's name matches, ignoring ASCII case.
    #[inline]
    #[must_use]
    pub fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

// ============================================================================
// ResourceRequest
// ============================================================================

/// A plain HTTP request issued by the application.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceRequest {
    /// HTTP method, e.g. `GET`.
    pub method: String,
    /// Absolute target URI.
    pub uri: String,
    /// Request headers in order.
    pub headers: Vec<Header>,
    /// Request body.
    pub body: Vec<u8>,
}

impl ResourceRequest {
    /// Creates a request with no headers and an empty body.
    #[inline]
    #[must_use]
    pub fn new(method: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            uri: uri.into(),
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    /// Creates a `GET` request.
    #[inline]
    #[must_use]
    pub fn get(uri: impl Into<String>) -> Self {
        Self::new("GET", uri)
    }

    /// Appends a header.
    #[inline]
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push(Header::new(name, value));
        self
    }

    /// Sets the body.
    #[inline]
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }
}

// ============================================================================
// WebSocketRequest
// ============================================================================

/// A request to open a WebSocket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebSocketRequest {
    /// Absolute `ws://` or `wss://` URI.
    pub uri: String,
}

impl WebSocketRequest {
    /// Creates a WebSocket request.
    #[inline]
    #[must_use]
    pub fn new(uri: impl Into<String>) -> Self {
        Self { uri: uri.into() }
    }
}

// ============================================================================
// HttpRequest
// ============================================================================

/// A request as handed to the [`HttpClient`](crate::transport::HttpClient).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// HTTP method.
    pub method: String,
    /// Parsed target.
    pub target: Url,
    /// Port the transport must connect to, after defaulting.
    pub port: Option<u16>,
    /// Request headers in order.
    pub headers: Vec<Header>,
    /// Request body.
    pub body: Vec<u8>,
}

impl HttpRequest {
    /// Creates a request for a parsed target, applying the default-port rule.
    #[must_use]
    pub fn new(method: impl Into<String>, target: Url) -> Self {
        let port = resolve_port(&target);
        Self {
            method: method.into(),
            target,
            port,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    /// Returns the first header value with the given name, ignoring case.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|header| header.is(name))
            .map(|header| header.value.as_str())
    }

    /// Replaces any existing header of the same name, or appends it.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let header = Header::new(name, value);
        match self.headers.iter_mut().find(|h| h.is(&header.name)) {
            Some(existing) => existing.value = header.value,
            None => self.headers.push(header),
        }
    }
}

// ============================================================================
// URI Helpers
// ============================================================================

/// Returns the port a transport should connect to for `target`.
///
/// An explicit port always wins. Without one, encrypted schemes
/// (`https`, `wss`) use 443 and plain ones (`http`, `ws`) use 80. The
/// transport's own defaulting assumes port 80 for everything, so the
/// encrypted case must be filled in here.
#[must_use]
pub fn resolve_port(target: &Url) -> Option<u16> {
    if let Some(port) = target.port() {
        return Some(port);
    }
    match target.scheme() {
        scheme if is_secure_scheme(scheme) => Some(DEFAULT_SECURE_PORT),
        "http" | "ws" => Some(DEFAULT_PLAIN_PORT),
        _ => None,
    }
}

/// Returns `true` if the scheme implies a TLS-protected transport.
#[inline]
#[must_use]
pub fn is_secure_scheme(scheme: &str) -> bool {
    matches!(scheme, "https" | "wss")
}

/// Parses `uri` and checks that its scheme is one of `allowed`.
///
/// # Errors
///
/// - [`Error::InvalidUri`] if the URI does not parse
/// - [`Error::UnsupportedScheme`] if the scheme is not allowed
pub fn parse_target(uri: &str, allowed: &[&str]) -> Result<Url> {
    let target = Url::parse(uri).map_err(|e| Error::invalid_uri(uri, e))?;
    if !allowed.contains(&target.scheme()) {
        return Err(Error::unsupported_scheme(target.scheme(), uri));
    }
    Ok(target)
}

// ============================================================================
// Tests
// ============================================================================
