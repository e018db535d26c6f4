//! Retry delays with full jitter.

use std::time::Duration;

use rand::Rng;

/// Exponential backoff with full jitter, honoring server-provided hints.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Base delay of the first retry.
    pub base: Duration,
    /// Upper bound of a computed delay.
    pub cap: Duration,
}

impl RetryPolicy {
    /// Policy with the default 250ms base and 10s cap.
    #[must_use]
    pub const fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            base: Duration::from_millis(250),
            cap: Duration::from_secs(10),
        }
    }

    /// Delay before retry number `attempt` (0-based).
    ///
    /// With a `hint` (e.g. `retry_after`) the delay is the hint plus up to one
    /// base of jitter, so that concurrent callers do not wake together.
    #[must_use]
    pub fn delay(&self, attempt: u32, hint: Option<Duration>) -> Duration {
        let mut rng = rand::rng();
        let base_ms = millis(self.base);
        match hint {
            Some(hint) => hint + Duration::from_millis(rng.random_range(0..=base_ms)),
            None => {
                let ceiling = base_ms
                    .saturating_mul(1_u64 << attempt.min(20))
                    .min(millis(self.cap));
                Duration::from_millis(rng.random_range(0..=ceiling))
            }
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
