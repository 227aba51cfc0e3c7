//! Exponential backoff retry logic for transient failures.
//!
//! The first attempt runs immediately; retry `n` (counting from 0) waits
//! `initial_delay * multiplier^n`, capped at `max_delay`.

use std::time::Duration;

use crate::BridgeError;

/// Configuration for retry behavior.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use mdvr_bridge::reliability::RetryPolicy;
///
/// let policy = RetryPolicy {
///     max_retries: 3,
///     initial_delay: Duration::from_secs(1),
///     max_delay: Duration::from_secs(30),
///     backoff_multiplier: 2.0,
/// };
///
/// assert_eq!(policy.max_attempts(), 4);
/// assert_eq!(policy.delay_for_attempt(2), Duration::from_secs(4));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt (default: 3)
    pub max_retries: u32,
    /// Delay before the first retry (default: 1s)
    pub initial_delay: Duration,
    /// Maximum delay between retries (default: 30s)
    pub max_delay: Duration,
    /// Multiplier for exponential backoff (default: 2.0)
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy that never retries.
    #[must_use]
    pub fn no_retry() -> Self {
        Self { max_retries: 0, ..Self::default() }
    }

    /// Total number of attempts including the first one.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Calculates the delay before retry number `attempt` (0-based).
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let factor = self.backoff_multiplier.powi(exponent);
        if !factor.is_finite() || factor < 0.0 {
            return self.max_delay;
        }
        Duration::try_from_secs_f64(self.initial_delay.as_secs_f64() * factor)
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }
}

/// Final failure of a retried operation.
#[derive(Debug)]
pub struct RetryExhausted<E> {
    /// Last error observed.
    pub error: E,
    /// Attempts made, including the first.
    pub attempts: u32,
}

/// Executes `operation` with exponential backoff retry.
///
/// Errors for which `should_retry` returns `false` end the loop at once.
///
/// # Examples
///
/// ```
/// use std::sync::{
///     Arc,
///     atomic::{AtomicU32, Ordering},
/// };
/// use std::time::Duration;
///
/// use mdvr_bridge::reliability::{RetryPolicy, retry_with_backoff};
///
/// # async fn example() {
/// let policy = RetryPolicy { initial_delay: Duration::from_millis(1), ..RetryPolicy::default() };
/// let attempt = Arc::new(AtomicU32::new(0));
///
/// let result = retry_with_backoff(
///     &policy,
///     |_: &String| true,
///     || {
///         let attempt = Arc::clone(&attempt);
///         async move {
///             if attempt.fetch_add(1, Ordering::Relaxed) < 2 {
///                 Err("temporary failure".to_string())
///             } else {
///                 Ok("success")
///             }
///         }
///     },
/// )
/// .await;
///
/// assert_eq!(result.unwrap(), "success");
/// # }
/// ```
///
/// # Errors
///
/// Returns the last error and the attempt count when the budget is spent
/// or a non-retryable error occurs.
pub async fn retry_with_backoff<F, Fut, T, E, R>(
    policy: &RetryPolicy,
    should_retry: R,
    mut operation: F,
) -> Result<T, RetryExhausted<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    R: Fn(&E) -> bool,
{
    let max_attempts = policy.max_attempts();
    let mut attempt = 0;

    loop {
        attempt += 1;
        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(attempt, "operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(error) => {
                let retryable = should_retry(&error);
                tracing::warn!(attempt, max_attempts, retryable, error = %error, "attempt failed");

                if !retryable || attempt >= max_attempts {
                    return Err(RetryExhausted { error, attempts: attempt });
                }

                let delay = policy.delay_for_attempt(attempt - 1);
                tracing::debug!(delay_ms = delay.as_millis(), "sleeping before retry");
                tokio::time::sleep(delay).await;
            }
        }
    }
}

/// Determines if an error is worth another attempt.
///
/// Transient network failures and gateway errors (5xx, 429) are retryable.
/// Anything the vendor or local validation rejected is not.
///
/// # Examples
///
/// ```
/// use mdvr_bridge::{BridgeError, reliability::is_retryable};
///
/// assert!(is_retryable(&BridgeError::HttpStatus(503)));
/// assert!(!is_retryable(&BridgeError::HttpStatus(404)));
/// assert!(!is_retryable(&BridgeError::VendorError { code: 1102, message: "offline".into() }));
/// ```
#[must_use]
pub fn is_retryable(error: &BridgeError) -> bool {
    match error {
        BridgeError::HttpError(e) => {
            e.is_timeout()
                || e.is_connect()
                || e.is_request()
                || e.status().is_some_and(|s| s.is_server_error())
        }
        BridgeError::HttpStatus(status) => *status >= 500 || *status == 429,
        BridgeError::ValidationError(_)
        | BridgeError::RangeTooLarge { .. }
        | BridgeError::UnknownEndpoint(_)
        | BridgeError::ConfigError(_)
        | BridgeError::TransportError { .. }
        | BridgeError::AuthenticationFailed(_)
        | BridgeError::VendorError { .. }
        | BridgeError::InvalidResponse(_)
        | BridgeError::RateLimitExceeded
        | BridgeError::JsonError(_) => false,
    }
}
