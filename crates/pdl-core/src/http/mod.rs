//! HTTP collaborator used by the probe, the chunk workers and the fallback stream.
//!
//! The downloader only needs one operation: issue a request, learn the final
//! (post-redirect) response head, and receive the body as a push stream. The
//! default implementation is [`CurlClient`]; tests substitute an in-memory one.

mod curl_client;
mod parse;

pub use self::curl_client::CurlClient;
pub use self::parse::{parse_content_range, parse_header_line, parse_http_status};

use crate::control::AbortToken;
use std::fmt;

/// Maximum number of redirects followed before the request fails.
pub const MAX_REDIRECTS: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Head,
    Get,
}

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
}

impl HttpRequest {
    pub fn head(url: &str) -> Self {
        Self {
            method: Method::Head,
            url: url.to_string(),
            headers: Vec::new(),
        }
    }

    pub fn get(url: &str) -> Self {
        Self {
            method: Method::Get,
            url: url.to_string(),
            headers: Vec::new(),
        }
    }

    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }

    /// Value of the `Range` header, if one was set.
    pub fn range(&self) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case("range"))
            .map(|(_, v)| v.as_str())
    }
}

/// Status line and headers of the final response, plus the URL it came from.
#[derive(Debug, Clone, Default)]
pub struct ResponseHead {
    pub status: u32,
    pub headers: Vec<(String, String)>,
    pub effective_url: String,
}

impl ResponseHead {
    /// First header value with the given name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Parsed `Content-Range: bytes start-end/total` as an inclusive range.
    pub fn content_range(&self) -> Option<(u64, u64)> {
        self.header("content-range").and_then(parse_content_range)
    }
}

/// Receiver for a response body.
///
/// `accept` is called exactly once per response with the final head: before
/// the first body byte, or after the transfer when no body arrived. Returning
/// `false` aborts the transfer with [`TransportError::Rejected`].
pub trait BodySink {
    fn accept(&mut self, head: &ResponseHead) -> bool;
    fn write(&mut self, data: &[u8]) -> std::io::Result<()>;
}

/// Sink that accepts any response and discards the body (used for HEAD).
pub struct DiscardBody;

impl BodySink for DiscardBody {
    fn accept(&mut self, _head: &ResponseHead) -> bool {
        true
    }

    fn write(&mut self, _data: &[u8]) -> std::io::Result<()> {
        Ok(())
    }
}

/// Failure below the HTTP status level.
#[derive(Debug)]
pub enum TransportError {
    /// The abort token fired mid-request.
    Aborted,
    /// More than [`MAX_REDIRECTS`] redirects.
    TooManyRedirects,
    /// Connect, low-speed or overall timeout.
    Timeout(String),
    /// DNS, connect, send or receive failure.
    Connection(String),
    /// The sink refused the response head.
    Rejected,
    /// The sink failed to store body bytes.
    Sink(std::io::Error),
    /// Anything else the client reported.
    Other(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Aborted => write!(f, "request aborted"),
            TransportError::TooManyRedirects => {
                write!(f, "stopped after {} redirects", MAX_REDIRECTS)
            }
            TransportError::Timeout(e) => write!(f, "timeout: {}", e),
            TransportError::Connection(e) => write!(f, "connection: {}", e),
            TransportError::Rejected => write!(f, "response rejected"),
            TransportError::Sink(e) => write!(f, "write: {}", e),
            TransportError::Other(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TransportError::Sink(e) => Some(e),
            _ => None,
        }
    }
}

/// Issues HTTP requests. Implementations must be usable from many worker threads.
pub trait HttpClient: Send + Sync {
    /// Perform `request`, following redirects, streaming the body into `sink`.
    /// Must poll `abort` while the transfer is in progress.
    fn execute(
        &self,
        request: &HttpRequest,
        sink: &mut dyn BodySink,
        abort: &AbortToken,
    ) -> Result<ResponseHead, TransportError>;
}
