use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::Response,
    Router,
};
use http_resubmit::{
    ClientOptions, RequestOptions, ResubmitClient, ResubmitError, RetryLimit, Termination,
    TransportErrorKind,
};
use serde_json::{json, Value as JsonValue};

#[derive(Clone)]
struct MockResponse {
    status: StatusCode,
    headers: Vec<(&'static str, &'static str)>,
    body: String,
    delay: Duration,
}

impl MockResponse {
    fn status(status: StatusCode) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: String::new(),
            delay: Duration::from_millis(0),
        }
    }

    fn json(status: StatusCode, body: JsonValue) -> Self {
        Self {
            body: body.to_string(),
            ..Self::status(status)
        }
        .with_header("content-type", "application/json")
    }

    fn with_header(mut self, name: &'static str, value: &'static str) -> Self {
        self.headers.push((name, value));
        self
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[derive(Clone)]
struct MockState {
    responses: Arc<Mutex<VecDeque<MockResponse>>>,
    hits: Arc<AtomicUsize>,
    cookies: Arc<Mutex<Vec<Option<String>>>>,
}

async fn any_handler(State(state): State<MockState>, headers: HeaderMap) -> Response {
    state.hits.fetch_add(1, Ordering::SeqCst);
    state
        .cookies
        .lock()
        .expect("cookie log mutex must not be poisoned")
        .push(
            headers
                .get(header::COOKIE)
                .and_then(|value| value.to_str().ok())
                .map(str::to_owned),
        );

    let response = {
        let mut queue = state
            .responses
            .lock()
            .expect("response queue mutex must not be poisoned");
        queue.pop_front().unwrap_or_else(|| {
            MockResponse::json(
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({"error": "no mock response available"}),
            )
        })
    };

    if !response.delay.is_zero() {
        tokio::time::sleep(response.delay).await;
    }

    let mut builder = axum::http::Response::builder().status(response.status);
    for (name, value) in &response.headers {
        builder = builder.header(*name, *value);
    }
    builder
        .body(Body::from(response.body))
        .expect("mock response must build")
}

struct TestServer {
    base_url: String,
    hits: Arc<AtomicUsize>,
    cookies: Arc<Mutex<Vec<Option<String>>>>,
    task: tokio::task::JoinHandle<()>,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl TestServer {
    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    fn received_cookies(&self) -> Vec<Option<String>> {
        self.cookies
            .lock()
            .expect("cookie log mutex must not be poisoned")
            .clone()
    }
}

async fn spawn_server(responses: Vec<MockResponse>) -> TestServer {
    let state = MockState {
        responses: Arc::new(Mutex::new(responses.into())),
        hits: Arc::new(AtomicUsize::new(0)),
        cookies: Arc::new(Mutex::new(Vec::new())),
    };

    let app = Router::new().fallback(any_handler).with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("must bind test listener");
    let address = listener.local_addr().expect("must have local addr");
    let task = tokio::spawn(async move {
        axum::serve(listener, app)
            .await
            .expect("mock server must run");
    });

    TestServer {
        base_url: format!("http://{address}"),
        hits: state.hits,
        cookies: state.cookies,
        task,
    }
}

fn fast_retries() -> ClientOptions {
    let mut options = ClientOptions::default();
    options.retry.delay_ms = 5;
    options.retry.delay_multiple = 1.0;
    options
}

#[tokio::test]
async fn retries_server_errors_then_returns_success() -> anyhow::Result<()> {
    let server = spawn_server(vec![
        MockResponse::status(StatusCode::INTERNAL_SERVER_ERROR),
        MockResponse::status(StatusCode::BAD_GATEWAY),
        MockResponse::json(StatusCode::OK, json!({"id": 42})),
    ])
    .await;
    let client = ResubmitClient::reqwest().with_options(fast_retries());

    let response = client.get(server.url("/items/42")).await?;

    assert_eq!(response.status(), 200);
    assert_eq!(response.retries(), 2);
    assert_eq!(response.request.retry.retry_wait_ms, 10);
    let body: JsonValue = response.json()?;
    assert_eq!(body["id"], 42);
    assert_eq!(server.hits(), 3);
    Ok(())
}

#[tokio::test]
async fn persistent_server_error_is_returned_after_exhaustion() {
    let server = spawn_server(vec![
        MockResponse::status(StatusCode::SERVICE_UNAVAILABLE),
        MockResponse::status(StatusCode::SERVICE_UNAVAILABLE),
        MockResponse::status(StatusCode::SERVICE_UNAVAILABLE),
    ])
    .await;
    let client = ResubmitClient::reqwest().with_options(fast_retries());

    let response = client
        .get(server.url("/items"))
        .await
        .expect("an error status is still a response");

    assert_eq!(response.status(), 503);
    assert_eq!(response.retries(), 2);
    assert!(matches!(response.termination, Termination::Exhausted { .. }));
    assert_eq!(server.hits(), 3);
}

#[tokio::test]
async fn set_cookie_is_sent_on_later_requests() {
    let server = spawn_server(vec![
        MockResponse::status(StatusCode::OK)
            .with_header("set-cookie", "session=abc; Path=/; HttpOnly")
            .with_header("set-cookie", "theme=dark; Path=/"),
        MockResponse::status(StatusCode::OK),
    ])
    .await;
    let mut options = fast_retries();
    options.cookies = true;
    let client = ResubmitClient::reqwest().with_options(options);

    client
        .send(RequestOptions::post(server.url("/login")))
        .await
        .expect("login must succeed");
    client
        .get(server.url("/profile"))
        .await
        .expect("profile must succeed");

    assert_eq!(
        server.received_cookies(),
        vec![None, Some("session=abc; theme=dark".to_owned())]
    );
    assert_eq!(client.cookie_jar().len(), 2);
}

#[tokio::test]
async fn explicit_request_cookie_wins_over_jar() {
    let server = spawn_server(vec![
        MockResponse::status(StatusCode::OK).with_header("set-cookie", "session=abc; Path=/"),
        MockResponse::status(StatusCode::OK),
    ])
    .await;
    let mut options = fast_retries();
    options.cookies = true;
    let client = ResubmitClient::reqwest().with_options(options);

    client
        .get(server.url("/login"))
        .await
        .expect("login must succeed");
    client
        .send(RequestOptions::get(server.url("/profile")).header("Cookie", "session=mine"))
        .await
        .expect("profile must succeed");

    assert_eq!(
        server.received_cookies().last().cloned().flatten(),
        Some("session=mine".to_owned())
    );
}

#[tokio::test]
async fn cookie_set_during_retry_reaches_next_attempt() {
    let server = spawn_server(vec![
        MockResponse::status(StatusCode::INTERNAL_SERVER_ERROR)
            .with_header("set-cookie", "affinity=node-2; Path=/"),
        MockResponse::status(StatusCode::OK),
    ])
    .await;
    let mut options = fast_retries();
    options.cookies = true;
    let client = ResubmitClient::reqwest().with_options(options);

    let response = client
        .get(server.url("/items"))
        .await
        .expect("request must succeed");

    assert_eq!(response.retries(), 1);
    assert_eq!(
        server.received_cookies(),
        vec![None, Some("affinity=node-2".to_owned())]
    );
}

#[tokio::test]
async fn timeout_surfaces_as_transport_error_after_retries() {
    let server = spawn_server(vec![
        MockResponse::status(StatusCode::OK).with_delay(Duration::from_millis(500)),
        MockResponse::status(StatusCode::OK).with_delay(Duration::from_millis(500)),
    ])
    .await;
    let mut options = fast_retries();
    options.timeout_ms = 50;
    options.retry.count = RetryLimit::Limited(2);
    let client = ResubmitClient::reqwest().with_options(options);

    let err = client
        .get(server.url("/slow"))
        .await
        .expect_err("both attempts time out");

    match err {
        ResubmitError::Transport {
            source,
            request,
            termination,
            ..
        } => {
            assert_eq!(source.kind, TransportErrorKind::Timeout);
            assert_eq!(request.retry.retries, 1);
            assert_eq!(request.timeout, Some(50));
            assert_eq!(
                termination,
                Termination::Exhausted {
                    strategy: "NetworkError".to_owned(),
                    max_retries: 2,
                }
            );
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn retry_after_zero_retries_immediately() {
    let server = spawn_server(vec![
        MockResponse::status(StatusCode::SERVICE_UNAVAILABLE).with_header("retry-after", "0"),
        MockResponse::status(StatusCode::OK),
    ])
    .await;
    let mut options = fast_retries();
    options.retry.delay_ms = 60_000;
    let client = ResubmitClient::reqwest().with_options(options);

    let response = client
        .get(server.url("/items"))
        .await
        .expect("request must succeed");

    assert_eq!(response.retries(), 1);
    assert_eq!(response.request.retry.retry_wait_ms, 0);
}

#[tokio::test]
async fn sensitive_headers_are_redacted_in_snapshot() {
    let server = spawn_server(vec![MockResponse::status(StatusCode::OK)
        .with_header("set-cookie", "session=abc; Path=/")])
    .await;
    let client = ResubmitClient::reqwest();

    let response = client
        .send(
            RequestOptions::get(server.url("/items"))
                .header("Authorization", "Bearer top-secret")
                .header("x-request-id", "req-7"),
        )
        .await
        .expect("request must succeed");

    assert_eq!(response.request.request_id, "req-7");
    let snapshot = serde_json::to_string(&response.request).expect("snapshot must serialize");
    assert!(!snapshot.contains("top-secret"));
    let summary = serde_json::to_string(&response.summary).expect("summary must serialize");
    assert!(!summary.contains("session=abc"));
}
