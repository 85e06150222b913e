use std::time::{Duration, Instant};

use rapidapi_http::stub::{StubHandle, StubResponse, StubServer, BLOCKING_PATH};
use rapidapi_http::{CancellationToken, ClientOptions, RapidApiClient, RapidApiError};
use reqwest::StatusCode;
use tokio::time::sleep;

const API_KEY: &str = "1234";
const HOSTNAME: &str = "example.p.rapidapi.com";

/// Stub scripted like a RapidAPI endpoint under throttling pressure:
/// `/retry` rejects its first call with 429, `/longretry` rejects every call.
fn rapidapi_stub() -> StubServer {
    StubServer::new(API_KEY, |path, calls| match path {
        "/" => StubResponse::ok("OK"),
        "/retry" if calls == 1 => StubResponse::throttled(),
        "/retry" => StubResponse::ok("OK"),
        "/longretry" => StubResponse::throttled(),
        _ => StubResponse::not_found(),
    })
}

async fn spawn_stub(server: &StubServer) -> (RapidApiClient, StubHandle) {
    let handle = server.spawn().await.expect("stub must bind a local port");
    let client = RapidApiClient::new(HOSTNAME, API_KEY).with_base_url(handle.base_url());
    (client, handle)
}

/// Backoff tuned so exhausting the retry budget takes milliseconds.
fn fast_backoff(max_attempts: u32) -> ClientOptions {
    ClientOptions {
        max_attempts,
        initial_backoff_ms: 1,
        max_backoff_ms: 4,
    }
}

#[tokio::test]
async fn call_returns_body_on_success() {
    let server = rapidapi_stub();
    let (client, _handle) = spawn_stub(&server).await;

    let body = client.call("/").await.expect("call must succeed");

    assert_eq!(body, b"OK");
    assert_eq!(server.calls("/"), 1);
}

#[tokio::test]
async fn wrong_key_is_rejected_without_retry() {
    let server = rapidapi_stub();
    let handle = server.spawn().await.expect("stub must bind a local port");
    let client = RapidApiClient::new(HOSTNAME, "wrong-key").with_base_url(handle.base_url());

    let err = client.call("/").await.expect_err("call must be rejected");

    assert_eq!(err.to_string(), "403 Forbidden");
    assert!(matches!(err, RapidApiError::Status(status) if status == StatusCode::FORBIDDEN));
    assert_eq!(server.calls("/"), 0);
}

#[tokio::test]
async fn empty_key_is_rejected_without_retry() {
    let server = rapidapi_stub();
    let handle = server.spawn().await.expect("stub must bind a local port");
    let client = RapidApiClient::new(HOSTNAME, "").with_base_url(handle.base_url());

    let err = client.call("/").await.expect_err("call must be rejected");

    assert_eq!(err.to_string(), "403 Forbidden");
    assert_eq!(server.calls("/"), 0);
}

#[tokio::test]
async fn non_throttle_statuses_are_terminal_after_one_attempt() {
    let server = StubServer::new(API_KEY, |path, _| match path {
        "/boom" => StubResponse::status(StatusCode::INTERNAL_SERVER_ERROR),
        "/unavailable" => StubResponse::status(StatusCode::SERVICE_UNAVAILABLE),
        _ => StubResponse::not_found(),
    });
    let (client, _handle) = spawn_stub(&server).await;

    let cases = [
        ("/boom", "500 Internal Server Error"),
        ("/unavailable", "503 Service Unavailable"),
        ("/invalid", "404 Not Found"),
    ];
    for (path, status_line) in cases {
        let err = client.call(path).await.expect_err("status must be terminal");
        assert_eq!(err.to_string(), status_line);
        assert_eq!(server.calls(path), 1, "{path} must see exactly one attempt");
    }
}

#[tokio::test]
async fn throttled_once_succeeds_on_second_attempt() {
    let server = rapidapi_stub();
    let (client, _handle) = spawn_stub(&server).await;

    let started = Instant::now();
    let body = client.call("/retry").await.expect("retry must succeed");

    assert_eq!(body, b"OK");
    assert_eq!(server.calls("/retry"), 2);
    // The default engine waits its initial 100 ms backoff between the two
    // attempts.
    assert!(started.elapsed() >= Duration::from_millis(100));
}

#[tokio::test]
async fn always_throttled_exhausts_the_attempt_budget() {
    let server = rapidapi_stub();
    let (client, _handle) = spawn_stub(&server).await;
    let client = client.with_options(fast_backoff(3));

    let err = client
        .call("/longretry")
        .await
        .expect_err("call must exhaust its retries");

    assert_eq!(err.to_string(), "429 Too Many Requests");
    assert!(matches!(err, RapidApiError::Throttled { attempts: 3 }));
    assert_eq!(server.calls("/longretry"), 3);
}

#[tokio::test]
async fn final_throttled_attempt_does_not_sleep() {
    let server = rapidapi_stub();
    let (client, _handle) = spawn_stub(&server).await;
    let client = client.with_options(ClientOptions {
        max_attempts: 1,
        initial_backoff_ms: 30_000,
        max_backoff_ms: 30_000,
    });

    let started = Instant::now();
    let err = client
        .call("/longretry")
        .await
        .expect_err("call must report throttling");

    assert!(matches!(err, RapidApiError::Throttled { attempts: 1 }));
    assert_eq!(server.calls("/longretry"), 1);
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn cancellation_during_backoff_stops_the_call() {
    let server = rapidapi_stub();
    let (client, _handle) = spawn_stub(&server).await;

    // A one-second deadline, expiring mid-backoff while the server keeps
    // throttling.
    let cancel = CancellationToken::new();
    let deadline = cancel.clone();
    tokio::spawn(async move {
        sleep(Duration::from_secs(1)).await;
        deadline.cancel();
    });

    let err = client
        .call_with_cancel("/longretry", &cancel)
        .await
        .expect_err("call must be cancelled");

    assert!(matches!(err, RapidApiError::Cancelled));
    let calls_at_cancel = server.calls("/longretry");
    assert!(calls_at_cancel > 1, "at least one retry must happen first");

    // No request goes out once the token has fired; the next attempt would
    // have been due within this window.
    sleep(Duration::from_millis(700)).await;
    assert_eq!(server.calls("/longretry"), calls_at_cancel);
}

#[tokio::test]
async fn already_cancelled_token_prevents_any_request() {
    let server = rapidapi_stub();
    let (client, _handle) = spawn_stub(&server).await;

    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = client
        .call_with_cancel("/", &cancel)
        .await
        .expect_err("call must be cancelled");

    assert!(matches!(err, RapidApiError::Cancelled));
    assert_eq!(server.calls("/"), 0);
}

#[tokio::test]
async fn client_timeout_surfaces_transport_error() {
    let server = rapidapi_stub();
    let handle = server.spawn().await.expect("stub must bind a local port");
    let transport = reqwest::Client::builder()
        .timeout(Duration::from_millis(100))
        .build()
        .expect("transport must build");
    let client = RapidApiClient::new(HOSTNAME, API_KEY)
        .with_base_url(handle.base_url())
        .with_http_client(transport);

    let err = client
        .call(BLOCKING_PATH)
        .await
        .expect_err("request must time out");

    match err {
        RapidApiError::Transport(inner) => assert!(inner.is_timeout()),
        other => panic!("expected transport timeout error, got {other}"),
    }
    assert_eq!(server.calls(BLOCKING_PATH), 1);
}

#[tokio::test]
async fn unreachable_server_surfaces_transport_error() {
    let server = rapidapi_stub();
    let handle = server.spawn().await.expect("stub must bind a local port");
    let client = RapidApiClient::new(HOSTNAME, API_KEY).with_base_url(handle.base_url());

    drop(handle);
    sleep(Duration::from_millis(50)).await;

    let err = client.call("/").await.expect_err("server is gone");
    assert!(matches!(err, RapidApiError::Transport(_)));
    assert_eq!(server.calls("/"), 0);
}

#[tokio::test]
async fn concurrent_calls_keep_independent_backoff_state() {
    let server = rapidapi_stub();
    let (client, _handle) = spawn_stub(&server).await;

    let (retried, direct) = tokio::join!(client.call("/retry"), client.call("/"));

    assert_eq!(retried.expect("retried call must succeed"), b"OK");
    assert_eq!(direct.expect("direct call must succeed"), b"OK");
    assert_eq!(server.calls("/retry"), 2);
    assert_eq!(server.calls("/"), 1);
}
