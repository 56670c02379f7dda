//! Retry policy and pluggable sleeping for image generation.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::ProviderError;

/// Retry knobs for `ImageClient`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt (total attempts = `max_retries + 1`).
    pub max_retries: u32,
    /// Fixed wait after a response that carried no image.
    pub empty_result_delay: Duration,
    /// Base unit of the linear backoff after a transient error.
    pub transient_base_delay: Duration,
    /// Upper bound on a single provider call.
    pub request_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            empty_result_delay: Duration::from_millis(2000),
            transient_base_delay: Duration::from_millis(1000),
            request_timeout: Duration::from_secs(120),
        }
    }
}

impl RetryPolicy {
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Wait before the next attempt after `attempt` (1-based) returned no image.
    pub fn empty_delay(&self, _attempt: u32) -> Duration {
        self.empty_result_delay
    }

    /// Wait before the next attempt after `attempt` (1-based) failed transiently.
    ///
    /// Linear in the attempt number, never shorter than a provider-supplied
    /// `Retry-After`.
    pub fn transient_delay(&self, attempt: u32, error: &ProviderError) -> Duration {
        let linear = self.transient_base_delay.saturating_mul(attempt.max(1));
        match error.retry_after() {
            Some(hint) if hint > linear => hint,
            _ => linear,
        }
    }
}

/// Something that can wait. Tests substitute one that records and returns
/// immediately.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Real-time sleeper backed by the tokio timer.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
