//! Retry with linear backoff and jitter for transient network failures.
//!
//! Every network call site in the pipeline wraps its operation in a
//! [`RetryPolicy`] rather than hand-rolling retry loops. A failed attempt
//! sleeps `base_delay * attempt * jitter` before the next try; once the
//! attempt budget is exhausted the last error is returned to the caller,
//! which decides whether to degrade the result ("not found"/"unknown") or
//! propagate.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, warn};

/// Default maximum attempts (including the initial attempt).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default base delay between attempts.
const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Default jitter band applied multiplicatively to each delay.
const DEFAULT_JITTER_BAND: (f64, f64) = (0.8, 1.2);

/// Configuration for retrying a fallible async operation.
///
/// # Delay Calculation
///
/// ```text
/// delay = base_delay * attempt * jitter,  jitter ~ Uniform(band)
/// ```
///
/// With defaults, delays after attempts 1 and 2 are roughly 1s and 2s.
/// Worst-case latency per operation is bounded by
/// `max_attempts * (operation timeout + backoff)`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the initial attempt).
    max_attempts: u32,

    /// Base delay; scaled by the attempt index.
    base_delay: Duration,

    /// Inclusive multiplicative jitter band, e.g. `(0.8, 1.2)`.
    jitter_band: (f64, f64),
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            jitter_band: DEFAULT_JITTER_BAND,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with custom settings.
    ///
    /// `max_attempts` is clamped to at least 1; a reversed jitter band is
    /// reordered.
    #[must_use]
    pub fn new(max_attempts: u32, base_delay: Duration, jitter_band: (f64, f64)) -> Self {
        let (lo, hi) = jitter_band;
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            jitter_band: if lo <= hi { (lo, hi) } else { (hi, lo) },
        }
    }

    /// Creates a policy with a custom attempt budget and default delays.
    #[must_use]
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    /// Returns the maximum number of attempts configured.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Calculates the sleep before the attempt following `attempt` (1-indexed).
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let (lo, hi) = self.jitter_band;
        let jitter = if (hi - lo).abs() < f64::EPSILON {
            lo
        } else {
            rand::thread_rng().gen_range(lo..=hi)
        };
        let millis = self.base_delay.as_millis() as f64 * f64::from(attempt) * jitter;
        Duration::from_millis(millis as u64)
    }

    /// Runs `op` up to `max_attempts` times, sleeping between attempts.
    ///
    /// `label` identifies the operation in logs. On exhaustion the last
    /// error is surfaced to the caller, never swallowed.
    ///
    /// # Errors
    ///
    /// Returns the final attempt's error once all attempts fail.
    pub async fn run<T, E, F, Fut>(&self, label: &str, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match op().await {
                Ok(value) => return Ok(value),
                Err(error) => {
                    if attempt >= self.max_attempts {
                        warn!(
                            operation = label,
                            attempts = attempt,
                            error = %error,
                            "all retry attempts exhausted"
                        );
                        return Err(error);
                    }
                    let delay = self.delay_for(attempt);
                    debug!(
                        operation = label,
                        attempt,
                        next_attempt = attempt + 1,
                        delay_ms = delay.as_millis(),
                        error = %error,
                        "attempt failed, will retry"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
