use crate::errors::TransportError;
use crate::net::response::status_text;
use crate::net::{prepare, HttpTransport, Response, ResponseBody};
use crate::request::RequestDescriptor;
use async_trait::async_trait;
use http::{HeaderMap, HeaderName, HeaderValue};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

/// Canned response for the [`MockTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl MockResponse {
    /// A JSON response with `content-type: application/json`.
    pub fn json(status: u16, body: &serde_json::Value) -> Self {
        Self {
            status,
            headers: vec![("content-type".into(), "application/json".into())],
            body: body.to_string(),
        }
    }

    /// A response with an arbitrary raw body and no headers.
    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }
}

/// Scripted reply for one call.
enum Scripted {
    /// Resolve right away
    Immediate(Result<MockResponse, TransportError>),
    /// Wait for a trigger before resolving the call
    Triggered {
        reply: Result<MockResponse, TransportError>,
        trigger: oneshot::Receiver<()>,
    },
    /// Resolve the call right away, but hold the body until triggered
    SlowBody {
        response: MockResponse,
        trigger: oneshot::Receiver<()>,
    },
}

/// Record of a call made to the mock transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockCall {
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

/// Transport for tests. Replies are queued per `"{METHOD} {url}"` route and
/// handed out in FIFO order.
///
/// ```ignore
/// let mock = MockTransport::new();
/// mock.add_response(
///     "GET https://api.example.test/posts/1",
///     Ok(MockResponse::json(200, &json!({"id": 1}))),
/// );
/// ```
#[derive(Clone, Default)]
pub struct MockTransport {
    responses: Arc<Mutex<HashMap<String, VecDeque<Scripted>>>>,
    calls: Arc<Mutex<Vec<MockCall>>>,
    in_flight: Arc<AtomicUsize>,
    aborts: Arc<AtomicUsize>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply that resolves immediately.
    pub fn add_response(&self, route: &str, reply: Result<MockResponse, TransportError>) {
        self.push(route, Scripted::Immediate(reply));
    }

    /// Queue a reply that resolves once the returned sender fires (or is dropped).
    pub fn add_response_with_trigger(
        &self,
        route: &str,
        reply: Result<MockResponse, TransportError>,
    ) -> oneshot::Sender<()> {
        let (tx, trigger) = oneshot::channel();
        self.push(route, Scripted::Triggered { reply, trigger });
        tx
    }

    /// Queue a response whose head arrives immediately but whose body is held
    /// back until the returned sender fires (or is dropped).
    pub fn add_response_with_body_trigger(
        &self,
        route: &str,
        response: MockResponse,
    ) -> oneshot::Sender<()> {
        let (tx, trigger) = oneshot::channel();
        self.push(route, Scripted::SlowBody { response, trigger });
        tx
    }

    fn push(&self, route: &str, scripted: Scripted) {
        self.responses
            .lock()
            .entry(route.to_string())
            .or_default()
            .push_back(scripted);
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Number of calls currently waiting for their response head.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Number of times a call or a body read observed its cancellation token.
    pub fn abort_count(&self) -> usize {
        self.aborts.load(Ordering::SeqCst)
    }

    fn aborted(&self) -> Result<Response, TransportError> {
        self.aborts.fetch_add(1, Ordering::SeqCst);
        Err(TransportError::Aborted)
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn perform(
        &self,
        request: &RequestDescriptor,
        cancel: CancellationToken,
    ) -> Result<Response, TransportError> {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let _guard = InFlightGuard {
            in_flight: self.in_flight.clone(),
        };

        self.calls.lock().push(MockCall {
            method: request.options.effective_method().to_string(),
            url: request.url.clone(),
            headers: request
                .options
                .headers()
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            body: request.options.body_str().map(str::to_string),
        });

        let (url, _) = prepare(request)?;

        if cancel.is_cancelled() {
            return self.aborted();
        }

        let route = request.route();
        let scripted = self
            .responses
            .lock()
            .get_mut(&route)
            .and_then(VecDeque::pop_front);

        let (response, body_trigger) = match scripted {
            Some(Scripted::Immediate(reply)) => (reply?, None),
            Some(Scripted::Triggered { reply, trigger }) => {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return self.aborted(),
                    _ = trigger => (reply?, None),
                }
            }
            Some(Scripted::SlowBody { response, trigger }) => (response, Some(trigger)),
            None => {
                return Err(TransportError::Network(format!(
                    "No mock response configured for {}",
                    route
                )))
            }
        };

        let mut headers = HeaderMap::new();
        for (name, value) in &response.headers {
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                headers.append(name, value);
            }
        }

        let bytes = response.body.into_bytes();
        let body = match body_trigger {
            None => ResponseBody::from_bytes(bytes),
            Some(trigger) => {
                let aborts = self.aborts.clone();
                ResponseBody::new(async move {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {
                            aborts.fetch_add(1, Ordering::SeqCst);
                            Err(TransportError::Aborted)
                        }
                        _ = trigger => Ok(bytes),
                    }
                })
            }
        };

        Ok(Response {
            url,
            status: response.status,
            status_text: status_text(response.status),
            headers,
            body,
        })
    }
}

/// Guard that decrements the in-flight counter when dropped.
/// This ensures the counter is decremented even if the call is dropped mid-way.
struct InFlightGuard {
    in_flight: Arc<AtomicUsize>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}
