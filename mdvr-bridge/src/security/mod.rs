//! Shared request controls for vendor calls.
//!
//! Both components here are owned by [`crate::client::VendorClient`] and
//! shared by every call it makes.
//!
//! # Rate Limiting
//!
//! [`RateLimiter`] bounds outbound requests with a sliding 60-second window:
//!
//! ```rust
//! use mdvr_bridge::security::RateLimiter;
//!
//! # async fn example() {
//! let limiter = RateLimiter::new(120);
//! limiter.acquire().await;
//! # }
//! ```
//!
//! # Token Caching
//!
//! [`TokenManager`] holds the vendor session token and makes sure that
//! concurrent callers needing a fresh one share a single login:
//!
//! ```rust
//! use std::time::Duration;
//!
//! use mdvr_bridge::security::TokenManager;
//!
//! # async fn example() -> mdvr_bridge::Result<()> {
//! let tokens = TokenManager::new(Duration::from_secs(23 * 3600));
//! let token = tokens.get_token(|| async { Ok("token-from-login".to_owned()) }).await?;
//! assert_eq!(token.value(), "token-from-login");
//! # Ok(())
//! # }
//! ```

mod rate_limit;
mod token;

pub use rate_limit::{RATE_LIMIT_WINDOW, RateLimiter};
pub use token::{Token, TokenManager};
