//! Bounded exponential backoff with jitter for every outbound call the
//! worker and receiver make: the forge REST API, the LLM runtime, the
//! queue, and the secret store.
//!
//! # Example
//!
//! ```
//! use reviewer_retry::{RetryConfig, calculate_delay};
//!
//! let config = RetryConfig::default();
//! let delay = calculate_delay(&config, 1);
//! assert!(delay <= config.max_delay);
//! ```

use std::future::Future;
use std::time::Duration;

/// Retry configuration. Defaults match spec §4.10: `max_attempts=5`,
/// `base_delay=0.25s`, `max_delay=10s`, `jitter_ratio=0.30`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter_ratio: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(10),
            jitter_ratio: 0.30,
        }
    }
}

/// Calculate the delay before attempt `attempt + 1`, given that attempt
/// `attempt` (1-indexed) just failed.
///
/// `min(base * 2^(attempt-1), max) * U(1, 1+jitter)` per spec §4.10. The
/// random factor is sampled fresh on every call, so `attempt` alone does
/// not determine the result deterministically — tests instead assert on
/// the `[lower, upper]` envelope.
pub fn calculate_delay(config: &RetryConfig, attempt: u32) -> Duration {
    let pow = attempt.saturating_sub(1).min(32);
    let exp = config.base_delay.saturating_mul(2_u32.saturating_pow(pow));
    let capped = exp.min(config.max_delay);
    apply_jitter(capped, config.jitter_ratio)
}

/// Multiply `delay` by a uniform random factor in `[1.0, 1.0 + jitter]`.
fn apply_jitter(delay: Duration, jitter: f64) -> Duration {
    use rand::Rng;
    if jitter <= 0.0 {
        return delay;
    }
    let mut rng = rand::rng();
    let factor = 1.0 + rng.random_range(0.0..=jitter);
    let nanos = (delay.as_nanos() as f64 * factor).round();
    Duration::from_nanos(nanos as u64)
}

/// Lower/upper bound on the delay `calculate_delay` can return for a given
/// attempt, ignoring the cap (used by tests and callers who want to
/// reason about worst-case wait time without sampling).
pub fn delay_bounds(config: &RetryConfig, attempt: u32) -> (Duration, Duration) {
    let pow = attempt.saturating_sub(1).min(32);
    let exp = config.base_delay.saturating_mul(2_u32.saturating_pow(pow));
    let capped = exp.min(config.max_delay);
    let upper_nanos = (capped.as_nanos() as f64 * (1.0 + config.jitter_ratio)).round() as u64;
    (capped, Duration::from_nanos(upper_nanos))
}

/// Retryable HTTP status codes: 403, 429, and any 5xx.
pub fn is_retryable_http_status(status: u16) -> bool {
    status == 403 || status == 429 || (500..600).contains(&status)
}

/// Retryable cloud-provider error codes (case-insensitive), matching the
/// named classes in spec §4.10: throttling, service-unavailable,
/// internal-server, too-many-requests.
pub fn is_retryable_cloud_code(code: &str) -> bool {
    let normalized = code.to_ascii_lowercase().replace(['_', ' '], "-");
    matches!(
        normalized.as_str(),
        "throttling"
            | "throttlingexception"
            | "service-unavailable"
            | "serviceunavailable"
            | "internal-server"
            | "internalservererror"
            | "internalserver"
            | "too-many-requests"
            | "toomanyrequests"
    )
}

/// Run a fallible async operation with retry behavior. `is_retryable`
/// classifies an error as retryable or terminal; terminal errors
/// propagate immediately without sleeping. `operation_name` is carried
/// only for the caller's own logging (the envelope itself does not log).
pub async fn retry_async<T, E, Fut, Op, Pred>(
    operation_name: &str,
    config: &RetryConfig,
    is_retryable: Pred,
    mut operation: Op,
) -> Result<T, E>
where
    Op: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    Pred: Fn(&E) -> bool,
{
    let _ = operation_name;
    let mut attempt = 1;
    loop {
        match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if attempt >= config.max_attempts || !is_retryable(&err) {
                    return Err(err);
                }
                let delay = calculate_delay(config, attempt);
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// Synchronous counterpart of [`retry_async`], for call sites that are not
/// already inside an async context (e.g. the secret cache's first read).
pub fn retry_blocking<T, E, Op, Pred>(
    operation_name: &str,
    config: &RetryConfig,
    is_retryable: Pred,
    mut operation: Op,
) -> Result<T, E>
where
    Op: FnMut(u32) -> Result<T, E>,
    Pred: Fn(&E) -> bool,
{
    let _ = operation_name;
    let mut attempt = 1;
    loop {
        match operation(attempt) {
            Ok(value) => return Ok(value),
            Err(err) => {
                if attempt >= config.max_attempts || !is_retryable(&err) {
                    return Err(err);
                }
                let delay = calculate_delay(config, attempt);
                std::thread::sleep(delay);
                attempt += 1;
            }
        }
    }
}
