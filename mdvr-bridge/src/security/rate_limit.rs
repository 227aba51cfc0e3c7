//! Sliding-window rate limiting.
//!
//! Bounds outbound vendor requests to `limit_per_minute` in any 60-second
//! window. The limiter is process-local; several processes sharing one
//! vendor account each enforce their own window.
//!
//! # Algorithm
//!
//! 1. The admission time of each of the last `limit` requests is kept
//! 2. On acquire, timestamps older than the window are evicted
//! 3. Below the cap, the request is admitted and its time recorded
//! 4. At the cap, the caller sleeps until the oldest timestamp leaves the
//!    window, then tries again
//!
//! # Examples
//!
//! ```rust
//! use mdvr_bridge::security::RateLimiter;
//!
//! # async fn example() {
//! let limiter = RateLimiter::new(60);
//!
//! // Waits when 60 requests were admitted during the last minute
//! limiter.acquire().await;
//!
//! // Fails instead of waiting
//! if limiter.try_acquire().await.is_err() {
//!     println!("window is full");
//! }
//! # }
//! ```

use std::{collections::VecDeque, time::Duration};

use tokio::{sync::Mutex, time::Instant};
use tracing::{debug, instrument};

use crate::error::{BridgeError, Result};

/// Length of the sliding window.
pub const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);

/// Sliding-window rate limiter.
///
/// # Thread Safety
///
/// The window is guarded by an async mutex that is never held across a
/// sleep, so waiting callers do not block admissions that become possible
/// in the meantime. Share it behind an `Arc`.
#[derive(Debug)]
pub struct RateLimiter {
    limit: usize,
    window: Duration,
    admitted: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    /// Creates a limiter admitting `limit_per_minute` requests per minute.
    ///
    /// A limit of 0 disables limiting.
    #[must_use]
    pub fn new(limit_per_minute: u32) -> Self {
        Self::with_window(limit_per_minute, RATE_LIMIT_WINDOW)
    }

    /// Creates a limiter with a custom window length.
    #[must_use]
    pub fn with_window(limit: u32, window: Duration) -> Self {
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        Self { limit, window, admitted: Mutex::new(VecDeque::with_capacity(limit.min(1024))) }
    }

    /// Returns `true` if the limiter never waits.
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.limit == 0
    }

    /// Waits until a slot is free, then takes it.
    #[instrument(skip(self), level = "debug")]
    pub async fn acquire(&self) {
        if self.is_disabled() {
            return;
        }

        loop {
            let wait = match self.admit(Instant::now()).await {
                Ok(()) => return,
                Err(wait) => wait,
            };

            debug!(
                wait_ms = wait.as_millis(),
                limit = self.limit,
                "rate limit reached, waiting for a free slot"
            );
            tokio::time::sleep(wait).await;
        }
    }

    /// Takes a slot if one is free.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::RateLimitExceeded`] if the window is full.
    #[instrument(skip(self), level = "debug")]
    pub async fn try_acquire(&self) -> Result<()> {
        if self.is_disabled() {
            return Ok(());
        }
        self.admit(Instant::now()).await.map_err(|_| BridgeError::RateLimitExceeded)
    }

    /// Number of requests admitted during the current window.
    pub async fn in_window(&self) -> usize {
        let mut admitted = self.admitted.lock().await;
        self.evict(&mut admitted, Instant::now());
        admitted.len()
    }

    /// Admits at `now` or returns how long to wait.
    async fn admit(&self, now: Instant) -> std::result::Result<(), Duration> {
        let mut admitted = self.admitted.lock().await;
        self.evict(&mut admitted, now);

        if admitted.len() < self.limit {
            admitted.push_back(now);
            return Ok(());
        }

        let wait = admitted
            .front()
            .map_or(Duration::ZERO, |oldest| (*oldest + self.window).saturating_duration_since(now));
        // Never spin on a zero wait.
        Err(wait.max(Duration::from_millis(1)))
    }

    fn evict(&self, admitted: &mut VecDeque<Instant>, now: Instant) {
        while admitted.front().is_some_and(|oldest| now.duration_since(*oldest) >= self.window) {
            admitted.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[tokio::test]
    async fn test_rate_limiter_allows_requests_within_limit() {
        let limiter = RateLimiter::new(5);

        for _ in 0..5 {
            assert!(limiter.try_acquire().await.is_ok());
        }
        assert_eq!(limiter.in_window().await, 5);
    }

    #[tokio::test]
    async fn test_rate_limiter_rejects_excess_requests() {
        let limiter = RateLimiter::new(2);

        limiter.try_acquire().await.unwrap();
        limiter.try_acquire().await.unwrap();

        let result = limiter.try_acquire().await;
        assert!(matches!(result, Err(BridgeError::RateLimitExceeded)));
    }

    #[tokio::test]
    async fn test_zero_limit_is_noop() {
        let limiter = RateLimiter::new(0);
        assert!(limiter.is_disabled());

        for _ in 0..1000 {
            limiter.acquire().await;
        }
        assert!(limiter.try_acquire().await.is_ok());
        assert_eq!(limiter.in_window().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_extra_call_waits_for_oldest_to_leave_window() {
        let limiter = RateLimiter::new(3);
        let start = Instant::now();

        limiter.acquire().await;
        tokio::time::advance(Duration::from_millis(200)).await;
        limiter.acquire().await;
        limiter.acquire().await;

        // Fourth call waits until the first admission is 60s old.
        limiter.acquire().await;
        let waited = start.elapsed();

        assert!(waited >= Duration::from_secs(60));
        assert!(waited < Duration::from_millis(60_100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_slides() {
        let limiter = RateLimiter::new(2);

        limiter.try_acquire().await.unwrap();
        tokio::time::advance(Duration::from_secs(30)).await;
        limiter.try_acquire().await.unwrap();
        assert!(limiter.try_acquire().await.is_err());

        tokio::time::advance(Duration::from_secs(30)).await;
        assert!(limiter.try_acquire().await.is_ok());
        assert!(limiter.try_acquire().await.is_err());
        assert_eq!(limiter.in_window().await, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limiter_concurrent_access() {
        let limiter = Arc::new(RateLimiter::with_window(10, Duration::from_secs(1)));
        let start = Instant::now();

        let mut handles = vec![];
        for _ in 0..25 {
            let limiter_clone = Arc::clone(&limiter);
            handles.push(tokio::spawn(async move { limiter_clone.acquire().await }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        // 25 admissions at 10 per second need two extra windows.
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(2));
        assert!(elapsed < Duration::from_secs(3));
    }
}
