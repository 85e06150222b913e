//! `rapidapi-http` is a resilient async HTTP client for RapidAPI-hosted APIs.
//!
//! The crate wraps authenticated GET endpoints with throttle-aware retry:
//! - [`RapidApiClient::call`]
//! - [`RapidApiClient::call_with_cancel`]
//!
//! Every attempt carries the `x-rapidapi-key` and `x-rapidapi-host` headers.
//! A `429 Too Many Requests` answer is retried with exponential backoff
//! (100 ms doubling up to 5 s, at most 10 attempts by default); transport
//! failures and every other HTTP status surface immediately. A
//! [`CancellationToken`] bounds the whole call, backoff waits included.
//!
//! The `stub` feature ships `stub::StubServer`, a scriptable rate-limited
//! endpoint for exercising the retry path in tests.

mod client;
mod error;
mod options;

#[cfg(feature = "stub")]
pub mod stub;

pub use client::RapidApiClient;
pub use error::RapidApiError;
pub use options::ClientOptions;
pub use tokio_util::sync::CancellationToken;

pub type Result<T> = std::result::Result<T, RapidApiError>;
