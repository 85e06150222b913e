//! Rate-limit stub server used to exercise the retry engine end to end.
//!
//! Enabled with the `stub` feature.
//!
//! [`StubServer`] authenticates the same `x-rapidapi-key` header the client
//! sends, counts calls per path, and hands every normal path to a scripted
//! responder. Scripts derive their state from the per-path call count, so two
//! stubs in parallel tests never interfere.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::Router;
use tokio::task::JoinHandle;
use tokio::time::sleep;

use crate::client::KEY_HEADER;

/// Path that blocks instead of answering, for timeout plumbing tests.
pub const BLOCKING_PATH: &str = "/timeout";

/// How long [`BLOCKING_PATH`] holds a request open before answering.
const BLOCKING_DELAY: Duration = Duration::from_secs(60);

/// Canned reply returned by a stub responder.
#[derive(Clone, Debug)]
pub struct StubResponse {
    /// HTTP status to answer with.
    pub status: StatusCode,
    /// Response body text.
    pub body: String,
}

impl StubResponse {
    /// A `200 OK` reply with the given body.
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: StatusCode::OK,
            body: body.into(),
        }
    }

    /// A reply with the given status and its reason phrase as body.
    pub fn status(status: StatusCode) -> Self {
        Self {
            status,
            body: status.canonical_reason().unwrap_or_default().to_owned(),
        }
    }

    /// The throttling reply, `429 Too Many Requests`.
    pub fn throttled() -> Self {
        Self {
            status: StatusCode::TOO_MANY_REQUESTS,
            body: "slow down!".to_owned(),
        }
    }

    /// The unknown-path reply, `404 Not Found`.
    pub fn not_found() -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            body: "Page not found".to_owned(),
        }
    }
}

type Responder = dyn Fn(&str, u64) -> StubResponse + Send + Sync;

/// Emulates a RapidAPI endpoint for tests.
///
/// Every request is first checked against the configured key; a mismatch is
/// rejected with `403 Forbidden` before any path logic runs. Authenticated
/// requests increment a per-path counter and are then answered by the
/// responder, except for [`BLOCKING_PATH`] which blocks instead.
///
/// The responder receives the request path and the 1-based number of
/// authenticated calls seen on that path, so a "throttle once, then succeed"
/// script is just a comparison:
///
/// ```
/// use rapidapi_http::stub::{StubResponse, StubServer};
///
/// let server = StubServer::new("1234", |path, calls| match path {
///     "/retry" if calls == 1 => StubResponse::throttled(),
///     "/retry" => StubResponse::ok("OK"),
///     _ => StubResponse::not_found(),
/// });
/// ```
#[derive(Clone)]
pub struct StubServer {
    state: Arc<StubState>,
}

struct StubState {
    api_key: String,
    responder: Box<Responder>,
    calls: Mutex<HashMap<String, u64>>,
}

impl StubServer {
    /// Creates a stub that accepts `api_key` and scripts replies through
    /// `responder`.
    pub fn new<F>(api_key: impl Into<String>, responder: F) -> Self
    where
        F: Fn(&str, u64) -> StubResponse + Send + Sync + 'static,
    {
        Self {
            state: Arc::new(StubState {
                api_key: api_key.into(),
                responder: Box::new(responder),
                calls: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Returns the axum router serving this stub on every path.
    pub fn router(&self) -> Router {
        Router::new().fallback(handle).with_state(self.clone())
    }

    /// Serves the stub on an ephemeral local port.
    ///
    /// The server runs on a background task until the returned handle is
    /// dropped.
    pub async fn spawn(&self) -> std::io::Result<StubHandle> {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let address = listener.local_addr()?;
        let app = self.router();
        let task = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        Ok(StubHandle {
            base_url: format!("http://{address}"),
            task,
        })
    }

    /// Number of authenticated requests seen on `path`.
    pub fn calls(&self, path: &str) -> u64 {
        let calls = self
            .state
            .calls
            .lock()
            .expect("call counter mutex must not be poisoned");
        calls.get(path).copied().unwrap_or(0)
    }

    fn record_call(&self, path: &str) -> u64 {
        let mut calls = self
            .state
            .calls
            .lock()
            .expect("call counter mutex must not be poisoned");
        let count = calls.entry(path.to_owned()).or_insert(0);
        *count += 1;
        *count
    }
}

/// Running stub bound to a local port. Aborts the server task on drop.
pub struct StubHandle {
    base_url: String,
    task: JoinHandle<()>,
}

impl StubHandle {
    /// Base URL of the running stub, e.g. `http://127.0.0.1:49152`.
    ///
    /// Feed it to [`RapidApiClient::with_base_url`].
    ///
    /// [`RapidApiClient::with_base_url`]: crate::RapidApiClient::with_base_url
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl Drop for StubHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn handle(State(server): State<StubServer>, request: Request) -> (StatusCode, String) {
    let key = request
        .headers()
        .get(KEY_HEADER)
        .and_then(|value| value.to_str().ok());
    if key != Some(server.state.api_key.as_str()) {
        return (StatusCode::FORBIDDEN, "Forbidden".to_owned());
    }

    let path = request.uri().path().to_owned();
    let calls = server.record_call(&path);

    if path == BLOCKING_PATH {
        // Hold the request open. A client that gives up first closes the
        // connection, dropping this future before the sleep completes.
        sleep(BLOCKING_DELAY).await;
        return (StatusCode::OK, String::new());
    }

    let response = (server.state.responder)(&path, calls);
    (response.status, response.body)
}
