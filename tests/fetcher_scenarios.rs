//! End-to-end behavior of the fetcher against scripted transports.
//!
//! `MockTransport` honors cancellation the way a real transport does.
//! `StubbornTransport` below ignores it and answers only when told to, which
//! lets the tests pick the completion order of superseded calls.

use async_trait::async_trait;
use fetch_lite::{
    FetchError, Fetcher, HttpTransport, MockResponse, MockTransport, RequestDescriptor,
    RequestOptions, RequestState, RequestStatus, Response, ResponseBody, TransportError,
};
use http::HeaderMap;
use parking_lot::Mutex;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

const API: &str = "https://api.example.test";

async fn let_run() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

/// Answers each URL once its gate fires, ignoring the cancellation token.
#[derive(Default)]
struct StubbornTransport {
    gates: Mutex<HashMap<String, oneshot::Receiver<Result<MockResponse, TransportError>>>>,
}

impl StubbornTransport {
    fn gate(&self, url: &str) -> oneshot::Sender<Result<MockResponse, TransportError>> {
        let (tx, rx) = oneshot::channel();
        self.gates.lock().insert(url.to_string(), rx);
        tx
    }
}

#[async_trait]
impl HttpTransport for StubbornTransport {
    async fn perform(
        &self,
        request: &RequestDescriptor,
        _cancel: CancellationToken,
    ) -> Result<Response, TransportError> {
        let gate = self.gates.lock().remove(&request.url);
        let Some(gate) = gate else {
            return Err(TransportError::Network(format!("no gate for {}", request.url)));
        };

        let reply = gate
            .await
            .map_err(|_| TransportError::Network("gate dropped".into()))??;

        Ok(Response {
            url: url::Url::parse(&request.url).expect("test urls are valid"),
            status: reply.status,
            status_text: String::new(),
            headers: HeaderMap::new(),
            body: ResponseBody::from_bytes(reply.body),
        })
    }
}

#[tokio::test]
async fn scenario_a_get_returns_parsed_data() {
    let url = format!("{API}/posts/1");
    let mock = Arc::new(MockTransport::new());
    mock.add_response(
        &format!("GET {url}"),
        Ok(MockResponse::json(200, &json!({"id": 1, "title": "x"}))),
    );

    let mut fetcher = Fetcher::new(mock.clone());
    fetcher.fetch(url.as_str(), RequestOptions::new());
    let state = fetcher.settled().await;

    assert!(!state.is_loading());
    assert!(state.error().is_none());
    assert_eq!(state.data(), Some(&json!({"id": 1, "title": "x"})));
}

#[tokio::test]
async fn scenario_b_post_mirrors_the_created_resource() {
    let url = format!("{API}/posts");
    let created = json!({"id": 101, "title": "Hello", "body": "Test", "userId": 1});
    let mock = Arc::new(MockTransport::new());
    mock.add_response(&format!("POST {url}"), Ok(MockResponse::json(201, &created)));

    let options = RequestOptions::new()
        .method("POST")
        .bearer_auth("123-ABC-XYZ-789")
        .json_body(&json!({"title": "Hello", "body": "Test", "userId": 1}))
        .unwrap();

    let mut fetcher = Fetcher::new(mock.clone());
    fetcher.fetch(url.as_str(), options);
    let state = fetcher.settled().await;

    assert!(!state.is_loading());
    assert_eq!(state.data(), Some(&created));

    let calls = mock.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].method, "POST");
    assert!(calls[0]
        .headers
        .contains(&("authorization".to_string(), "Bearer 123-ABC-XYZ-789".to_string())));
    assert!(calls[0]
        .headers
        .contains(&("content-type".to_string(), "application/json".to_string())));
}

#[tokio::test]
async fn scenario_c_missing_resource_fails_with_status() {
    let url = format!("{API}/missing");
    let mock = Arc::new(MockTransport::new());
    mock.add_response(&format!("GET {url}"), Ok(MockResponse::text(404, "")));

    let mut fetcher = Fetcher::new(mock);
    fetcher.fetch(url.as_str(), RequestOptions::new());
    let state = fetcher.settled().await;

    assert!(!state.is_loading());
    assert!(state.data().is_none());
    assert_eq!(
        state.error(),
        Some(&FetchError::HttpStatus {
            status: 404,
            status_text: "Not Found".into()
        })
    );
}

#[tokio::test]
async fn scenario_d_superseded_call_is_aborted_and_ignored() {
    let x = format!("{API}/posts/1");
    let y = format!("{API}/posts/2");
    let mock = Arc::new(MockTransport::new());
    let x_trigger = mock.add_response_with_trigger(
        &format!("GET {x}"),
        Ok(MockResponse::json(200, &json!({"id": 1}))),
    );
    mock.add_response(&format!("GET {y}"), Ok(MockResponse::json(200, &json!({"id": 2}))));

    let mut fetcher = Fetcher::new(mock.clone());
    fetcher.fetch(x.as_str(), RequestOptions::new());
    let_run().await;
    assert_eq!(mock.in_flight_count(), 1);

    let state = fetcher.fetch(y.as_str(), RequestOptions::new());
    assert!(state.is_loading());

    let state = fetcher.settled().await;
    assert_eq!(state.data(), Some(&json!({"id": 2})));

    // X was aborted, so its trigger has nobody left to wake up
    assert!(x_trigger.send(()).is_err());
    let_run().await;

    assert_eq!(mock.abort_count(), 1);
    assert_eq!(mock.in_flight_count(), 0);
    assert_eq!(fetcher.state().data(), Some(&json!({"id": 2})));
}

#[tokio::test]
async fn scenario_d_late_resolution_never_overwrites() {
    let x = format!("{API}/posts/1");
    let y = format!("{API}/posts/2");
    let transport = Arc::new(StubbornTransport::default());
    let x_gate = transport.gate(&x);
    let y_gate = transport.gate(&y);

    let mut fetcher = Fetcher::new(transport);
    let mut states = fetcher.subscribe();

    fetcher.fetch(x.as_str(), RequestOptions::new());
    let_run().await;
    fetcher.fetch(y.as_str(), RequestOptions::new());
    let_run().await;

    // Y finishes first, then X's transport ignores the abort and answers anyway
    y_gate
        .send(Ok(MockResponse::json(200, &json!({"id": 2}))))
        .unwrap();
    let state = fetcher.settled().await;
    assert_eq!(state.data(), Some(&json!({"id": 2})));

    states.borrow_and_update();
    x_gate
        .send(Ok(MockResponse::json(200, &json!({"id": 1}))))
        .unwrap();
    let_run().await;

    assert!(!states.has_changed().unwrap());
    assert_eq!(fetcher.state().data(), Some(&json!({"id": 2})));
}

#[tokio::test]
async fn scenario_d_late_failure_never_overwrites() {
    let x = format!("{API}/posts/1");
    let y = format!("{API}/posts/2");
    let transport = Arc::new(StubbornTransport::default());
    let x_gate = transport.gate(&x);
    let y_gate = transport.gate(&y);

    let mut fetcher = Fetcher::new(transport);
    fetcher.fetch(x.as_str(), RequestOptions::new());
    let_run().await;
    fetcher.fetch(y.as_str(), RequestOptions::new());
    let_run().await;

    // X fails while Y is still loading
    x_gate
        .send(Err(TransportError::Network("connection reset".into())))
        .unwrap();
    let_run().await;
    assert!(fetcher.state().is_loading());

    y_gate
        .send(Ok(MockResponse::json(200, &json!({"id": 2}))))
        .unwrap();
    let state = fetcher.settled().await;
    assert_eq!(state.status(), RequestStatus::Succeeded);
    assert!(state.error().is_none());
}

#[tokio::test]
async fn scenario_e_detach_while_loading_freezes_state() {
    let url = format!("{API}/posts/1");
    let transport = Arc::new(StubbornTransport::default());
    let gate = transport.gate(&url);

    let mut fetcher = Fetcher::new(transport);
    let mut states = fetcher.subscribe();
    fetcher.fetch(url.as_str(), RequestOptions::new());
    let_run().await;

    fetcher.detach();
    states.borrow_and_update();

    gate.send(Ok(MockResponse::json(200, &json!({"id": 1}))))
        .unwrap();
    let_run().await;

    assert!(!states.has_changed().unwrap());
    assert!(fetcher.state().is_loading());
}

#[tokio::test]
async fn scenario_e_dropping_the_fetcher_aborts_the_call() {
    let url = format!("{API}/posts/1");
    let mock = Arc::new(MockTransport::new());
    let _trigger = mock.add_response_with_trigger(
        &format!("GET {url}"),
        Ok(MockResponse::json(200, &json!({"id": 1}))),
    );

    let mut fetcher = Fetcher::new(mock.clone());
    let states = fetcher.subscribe();
    fetcher.fetch(url.as_str(), RequestOptions::new());
    let_run().await;

    drop(fetcher);
    let_run().await;

    assert_eq!(mock.abort_count(), 1);
    assert_eq!(mock.in_flight_count(), 0);
    assert!(states.borrow().is_loading());
}

#[tokio::test]
async fn only_the_last_of_many_changes_is_reflected() {
    let transport = Arc::new(StubbornTransport::default());
    let urls: Vec<String> = (1..=5).map(|i| format!("{API}/posts/{i}")).collect();
    let gates: Vec<_> = urls.iter().map(|u| transport.gate(u)).collect();

    let mut fetcher = Fetcher::new(transport);
    for url in &urls {
        fetcher.fetch(url.as_str(), RequestOptions::new());
        let_run().await;
    }

    // Resolve in reverse order: the newest first, every older one after it
    for (i, gate) in gates.into_iter().enumerate().rev() {
        gate.send(Ok(MockResponse::json(200, &json!({"id": i + 1}))))
            .unwrap();
        let_run().await;
        assert_eq!(fetcher.state().data(), Some(&json!({"id": 5})));
    }
}

#[tokio::test]
async fn supersession_aborts_exactly_once() {
    let x = format!("{API}/posts/1");
    let y = format!("{API}/posts/2");
    let mock = Arc::new(MockTransport::new());
    let _x_trigger = mock.add_response_with_trigger(
        &format!("GET {x}"),
        Ok(MockResponse::json(200, &json!({"id": 1}))),
    );
    mock.add_response(&format!("GET {y}"), Ok(MockResponse::json(200, &json!({"id": 2}))));

    let mut fetcher = Fetcher::new(mock.clone());
    fetcher.fetch(x.as_str(), RequestOptions::new());
    let_run().await;
    fetcher.fetch(y.as_str(), RequestOptions::new());
    fetcher.settled().await;
    assert_eq!(mock.abort_count(), 1);

    // Re-sending Y and detaching after Y completed do not add aborts
    fetcher.fetch(y.as_str(), RequestOptions::new());
    fetcher.detach();
    let_run().await;
    assert_eq!(mock.abort_count(), 1);
    assert_eq!(mock.call_count(), 2);
}

#[tokio::test]
async fn structurally_equal_inputs_do_not_refetch() {
    let url = format!("{API}/posts");
    let mock = Arc::new(MockTransport::new());
    mock.add_response(
        &format!("POST {url}"),
        Ok(MockResponse::json(201, &json!({"id": 101}))),
    );

    let options = |content_type_header: &str| {
        RequestOptions::new()
            .method("post")
            .header(content_type_header, "application/json")
            .body(r#"{"title":"x"}"#)
    };

    let mut fetcher = Fetcher::new(mock.clone());
    fetcher.fetch(url.as_str(), options("Content-Type"));
    fetcher.settled().await;

    // Rebuilt from scratch, header name in another case
    let state = fetcher.fetch(url.as_str(), options("content-type"));
    assert_eq!(state, RequestState::succeeded(json!({"id": 101})));
    let_run().await;
    assert_eq!(mock.call_count(), 1);
}

#[tokio::test]
async fn invalid_url_fails_without_reaching_the_network() {
    let mock = Arc::new(MockTransport::new());
    let mut fetcher = Fetcher::new(mock);
    fetcher.fetch("not a url", RequestOptions::new());

    let state = fetcher.settled().await;
    assert!(matches!(
        state.error(),
        Some(FetchError::InvalidRequest { .. })
    ));
}
