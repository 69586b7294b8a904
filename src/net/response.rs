//! Minimal HTTP response model.
//!
//! A [`Response`] carries everything known once the response head arrived: the
//! final URL (after redirects, if the transport follows them), status code +
//! reason, and headers. The body is a [`ResponseBody`] that still has to be
//! read, which is a separate suspension point for the caller.
//!
//! ## Notes
//! - `headers` is an `http::HeaderMap`, which is **case-insensitive** for
//!   header names.
//! - `status_text` is derived from the status code's canonical reason phrase
//!   and is `"Unknown"` for non-standard codes.
//!
use crate::errors::TransportError;
use futures::future::BoxFuture;
use futures::FutureExt;
use http::HeaderMap;
use std::fmt;
use std::future::Future;

/// Response head plus a pending body reader.
pub struct Response {
    /// Final URL of the response (after redirects, if any).
    pub url: url::Url,

    /// Numeric HTTP status code (e.g., `200`, `404`).
    pub status: u16,

    /// Human-readable reason phrase (e.g., `"OK"`, `"Not Found"`).
    pub status_text: String,

    /// Response headers as a case-insensitive map.
    pub headers: HeaderMap,

    /// Body, read on demand.
    pub body: ResponseBody,
}

impl Response {
    /// True for 2xx status codes.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("url", &self.url.as_str())
            .field("status", &self.status)
            .field("status_text", &self.status_text)
            .field("headers", &self.headers)
            .field("body", &"ResponseBody")
            .finish()
    }
}

/// Reason phrase for a status code, `"Unknown"` if there is none.
pub(crate) fn status_text(status: u16) -> String {
    http::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("Unknown")
        .to_string()
}

/// Deferred body of a [`Response`]. Reading consumes it.
pub struct ResponseBody {
    reader: BoxFuture<'static, Result<Vec<u8>, TransportError>>,
}

impl ResponseBody {
    /// Wraps a future that yields the full body. The future should observe the
    /// cancellation token of the call it belongs to.
    pub fn new<F>(reader: F) -> Self
    where
        F: Future<Output = Result<Vec<u8>, TransportError>> + Send + 'static,
    {
        Self {
            reader: reader.boxed(),
        }
    }

    /// A body that is already fully available.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self::new(futures::future::ready(Ok(bytes.into())))
    }

    /// Reads the whole body. Note: does not deal with streaming.
    pub async fn read(self) -> Result<Vec<u8>, TransportError> {
        self.reader.await
    }
}
