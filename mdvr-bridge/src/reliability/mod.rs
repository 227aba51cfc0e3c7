//! Reliability patterns for vendor calls.
//!
//! Provides exponential backoff retry for transient transport failures.

mod retry;

pub use retry::{RetryExhausted, RetryPolicy, is_retryable, retry_with_backoff};
