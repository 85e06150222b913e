use reqwest::StatusCode;

/// Error type returned by this crate.
#[derive(Debug, thiserror::Error)]
pub enum RapidApiError {
    /// Network or request execution error from `reqwest`.
    ///
    /// Connection, DNS, and client-side timeout failures land here. They
    /// signal a structural problem rather than transient throttling and are
    /// never retried.
    #[error("transport error: {0}")]
    Transport(reqwest::Error),
    /// The server kept answering `429 Too Many Requests` until the retry
    /// budget ran out.
    #[error("429 Too Many Requests")]
    Throttled {
        /// Number of attempts made before giving up.
        attempts: u32,
    },
    /// Terminal non-success HTTP status; the message is the status line
    /// (e.g. `404 Not Found`).
    #[error("{0}")]
    Status(StatusCode),
    /// The caller's cancellation token fired during a network or backoff
    /// wait.
    #[error("call cancelled")]
    Cancelled,
}
