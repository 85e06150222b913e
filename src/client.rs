use std::fmt;
use std::time::Duration;

use reqwest::StatusCode;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::{ClientOptions, RapidApiError, Result};

/// Header carrying the caller's RapidAPI key.
pub(crate) const KEY_HEADER: &str = "x-rapidapi-key";
/// Header naming the RapidAPI host the key is subscribed to.
pub(crate) const HOST_HEADER: &str = "x-rapidapi-host";

#[derive(Clone)]
/// HTTP client for a RapidAPI-hosted API.
///
/// One instance targets one API host and holds the credentials for it. Calls
/// retry transparently on `429 Too Many Requests` with exponential backoff;
/// every other failure surfaces immediately.
pub struct RapidApiClient {
    http: reqwest::Client,
    hostname: String,
    api_key: String,
    base_url: Option<String>,
    options: ClientOptions,
}

impl fmt::Debug for RapidApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RapidApiClient")
            .field("hostname", &self.hostname)
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("options", &self.options)
            .finish()
    }
}

impl RapidApiClient {
    /// Creates a client for the given API hostname and key.
    ///
    /// The hostname is used both to derive the request origin
    /// (`https://<hostname>`) and to fill the `x-rapidapi-host` header.
    pub fn new(hostname: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            hostname: hostname.into(),
            api_key: api_key.into(),
            base_url: None,
            options: ClientOptions::default(),
        }
    }

    /// Creates a client from environment variables.
    ///
    /// Reads:
    /// - `RAPIDAPI_HOST` — the API hostname (e.g. `example.p.rapidapi.com`)
    /// - `RAPIDAPI_KEY` — the RapidAPI key for that host
    ///
    /// Returns an error if either variable is missing or empty.
    pub fn from_env() -> std::result::Result<Self, String> {
        let hostname = std::env::var("RAPIDAPI_HOST")
            .map_err(|_| "missing RAPIDAPI_HOST environment variable".to_owned())?;
        let api_key = std::env::var("RAPIDAPI_KEY")
            .map_err(|_| "missing RAPIDAPI_KEY environment variable".to_owned())?;
        if hostname.trim().is_empty() {
            return Err("RAPIDAPI_HOST is set but empty".to_owned());
        }
        if api_key.trim().is_empty() {
            return Err("RAPIDAPI_KEY is set but empty".to_owned());
        }
        Ok(Self::new(hostname, api_key))
    }

    /// Replaces the underlying HTTP transport.
    ///
    /// Transport-level policy such as request timeouts or proxies belongs to
    /// the injected [`reqwest::Client`]; the retry engine only interprets the
    /// outcomes the transport reports.
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    /// Overrides the request origin, bypassing the hostname-derived URL.
    ///
    /// Endpoint paths are appended to the override verbatim. The override
    /// always wins over the hostname; it exists so tests can point the client
    /// at a local server. The `x-rapidapi-host` header keeps its configured
    /// hostname either way.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Applies retry and backoff options.
    pub fn with_options(mut self, options: ClientOptions) -> Self {
        self.options = options;
        self
    }

    /// Calls an endpoint on the API and returns the raw response body.
    ///
    /// Equivalent to [`RapidApiClient::call_with_cancel`] with a token that
    /// never fires: the call runs until it succeeds, fails terminally, or
    /// exhausts its retry budget.
    pub async fn call(&self, endpoint: &str) -> Result<Vec<u8>> {
        self.call_with_cancel(endpoint, &CancellationToken::new())
            .await
    }

    /// Calls an endpoint on the API under a caller-supplied cancellation
    /// token.
    ///
    /// One GET request is issued per attempt, carrying the two RapidAPI auth
    /// headers. A `429` answer schedules a retry after the current backoff
    /// wait; waits double from [`ClientOptions::initial_backoff_ms`] up to
    /// [`ClientOptions::max_backoff_ms`]. Any other non-200 status and any
    /// transport failure end the call immediately.
    ///
    /// The token is observed while a request is in flight and while waiting
    /// out a backoff interval. Once it fires the call returns
    /// [`RapidApiError::Cancelled`] and no further request is issued.
    pub async fn call_with_cancel(
        &self,
        endpoint: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>> {
        let url = self.endpoint_url(endpoint);
        let max_attempts = self.options.max_attempts.max(1);
        let ceiling = Duration::from_millis(self.options.max_backoff_ms);
        let mut wait = Duration::from_millis(self.options.initial_backoff_ms).min(ceiling);
        let mut attempt = 0u32;

        loop {
            let outcome = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(RapidApiError::Cancelled),
                outcome = self.request_once(&url) => outcome,
            };
            attempt += 1;

            let status = match outcome {
                Err(RapidApiError::Status(status)) => status,
                other => return other,
            };

            // 429 is the only retryable answer; everything else is terminal.
            if status != StatusCode::TOO_MANY_REQUESTS {
                return Err(RapidApiError::Status(status));
            }
            if attempt >= max_attempts {
                return Err(RapidApiError::Throttled { attempts: attempt });
            }

            #[cfg(feature = "tracing")]
            tracing::debug!(
                "throttled on attempt {}, retrying after {} ms",
                attempt,
                wait.as_millis()
            );

            tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(RapidApiError::Cancelled),
                () = sleep(wait) => {}
            }

            wait = next_backoff(wait, ceiling);
        }
    }

    /// Issues a single authenticated GET request.
    async fn request_once(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .http
            .get(url)
            .header(KEY_HEADER, &self.api_key)
            .header(HOST_HEADER, &self.hostname)
            .send()
            .await
            .map_err(RapidApiError::Transport)?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(RapidApiError::Status(status));
        }

        response
            .bytes()
            .await
            .map(|body| body.to_vec())
            .map_err(RapidApiError::Transport)
    }

    fn endpoint_url(&self, endpoint: &str) -> String {
        match &self.base_url {
            Some(base_url) => format!("{base_url}{endpoint}"),
            None => format!("https://{}{endpoint}", self.hostname),
        }
    }
}

/// Doubles a backoff wait, saturating at the ceiling.
fn next_backoff(wait: Duration, ceiling: Duration) -> Duration {
    wait.checked_mul(2).unwrap_or(Duration::MAX).min(ceiling)
}
