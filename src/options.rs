/// Configures the retry and backoff behavior of a call.
///
/// The defaults match the RapidAPI throttling envelope: ten attempts with
/// waits doubling from 100 ms up to a 5 s ceiling. Tests tune these down to
/// keep throttling scenarios fast.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ClientOptions {
    /// Maximum number of request attempts per call, including the first.
    pub max_attempts: u32,
    /// Wait before the first retry after a throttled attempt, in milliseconds.
    pub initial_backoff_ms: u64,
    /// Backoff ceiling in milliseconds; waits double up to this value.
    pub max_backoff_ms: u64,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            initial_backoff_ms: 100,
            max_backoff_ms: 5_000,
        }
    }
}
