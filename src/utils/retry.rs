//! Retry utilities: backoff builders.
//!
//! Uses `backon` for exponential backoff with jitter. Retries are only used
//! around startup connections; request handling never retries (a failed
//! dispatch is reported, not re-attempted against another worker).

use std::time::Duration;

use backon::ExponentialBuilder;

/// Backoff for coordination store connection retries at startup.
///
/// - Min delay: 100ms
/// - Max delay: 5s
/// - Max attempts: 30
/// - Jitter enabled
pub fn connection_backoff() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(100))
        .with_max_delay(Duration::from_secs(5))
        .with_max_times(30)
        .with_jitter()
}

/// Backoff for a worker registering itself with a gateway.
///
/// - Min delay: 200ms
/// - Max delay: 5s
/// - Max attempts: 20
/// - Jitter enabled
pub fn registration_backoff() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(200))
        .with_max_delay(Duration::from_secs(5))
        .with_max_times(20)
        .with_jitter()
}
