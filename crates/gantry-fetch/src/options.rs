#![forbid(unsafe_code)]

use std::time::Duration;

/// Transfer knobs.
///
/// The defaults mirror the deployment this replaced: three retries,
/// IPv4 only, certificate validation off. The last one is a known
/// vulnerability kept for compatibility; production deployments must
/// set `accept_invalid_certs: false`.
#[derive(Clone, Debug)]
pub struct FetchOptions {
    /// Limit on connection establishment, not the whole transfer.
    pub connect_timeout: Duration,
    /// Optional bound on the whole request; `None` for arbitrarily
    /// large artifacts.
    pub request_timeout: Option<Duration>,
    pub max_retries: u32,
    pub retry_base_delay: Duration,
    pub max_retry_delay: Duration,
    pub accept_invalid_certs: bool,
    pub ipv4_only: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            request_timeout: None,
            max_retries: 3,
            retry_base_delay: Duration::from_millis(100),
            max_retry_delay: Duration::from_secs(5),
            accept_invalid_certs: true,
            ipv4_only: true,
        }
    }
}

impl FetchOptions {
    /// Exponential backoff, capped. Attempt 0 retries immediately.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let exponential = self.retry_base_delay * 2_u32.pow(attempt.saturating_sub(1));
        std::cmp::min(exponential, self.max_retry_delay)
    }
}
