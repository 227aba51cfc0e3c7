//! Vendor token caching with single-flight refresh.
//!
//! The vendor issues an opaque token at login that must accompany every
//! other request in the `X-Token` header. [`TokenManager`] keeps the current
//! token, refreshes it when it is missing or locally expired, and drops it
//! when the vendor reports it as invalid.
//!
//! Refreshing is single-flight: when many tasks find the cache empty at the
//! same time, exactly one of them runs the login and the others wait for
//! and share its result.

use std::{
    fmt,
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use tokio::{
    sync::{Mutex, RwLock},
    time::Instant,
};
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::error::{BridgeError, Result};

/// A vendor session token.
///
/// The value is wiped from memory when the last clone is dropped and never
/// appears in `Debug` output.
#[derive(Clone)]
pub struct Token {
    value: Zeroizing<String>,
    issued_at: Instant,
    expires_at: Instant,
}

impl Token {
    /// Creates a token issued now and valid for `ttl`.
    #[must_use]
    pub fn new(value: impl Into<String>, ttl: Duration) -> Self {
        let issued_at = Instant::now();
        Self { value: Zeroizing::new(value.into()), issued_at, expires_at: issued_at + ttl }
    }

    /// Token string sent in the `X-Token` header.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// When the token was obtained.
    #[must_use]
    pub fn issued_at(&self) -> Instant {
        self.issued_at
    }

    /// Estimated expiry.
    #[must_use]
    pub fn expires_at(&self) -> Instant {
        self.expires_at
    }

    /// Returns `true` once the expiry estimate has passed.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        *self.value == *other.value
    }
}

impl Eq for Token {}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("value", &"<redacted>")
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Caches the vendor token and serializes refreshes.
#[derive(Debug)]
pub struct TokenManager {
    ttl: Duration,
    current: RwLock<Option<Token>>,
    refresh: Mutex<()>,
    logins: AtomicU64,
}

impl TokenManager {
    /// Creates an empty manager issuing tokens valid for `ttl`.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, current: RwLock::new(None), refresh: Mutex::new(()), logins: AtomicU64::new(0) }
    }

    /// Returns a valid token, logging in if necessary.
    ///
    /// `login` runs at most once per expiry event no matter how many tasks
    /// call this concurrently. It must return the new token string.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::AuthenticationFailed`] if `login` fails.
    pub async fn get_token<F, Fut>(&self, login: F) -> Result<Token>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String>>,
    {
        if let Some(token) = self.cached().await {
            return Ok(token);
        }

        let _refreshing = self.refresh.lock().await;

        // Another task may have refreshed while we waited.
        if let Some(token) = self.cached().await {
            debug!("token refreshed by a concurrent caller");
            return Ok(token);
        }

        let value = login().await.map_err(|e| match e {
            BridgeError::AuthenticationFailed(_) => e,
            other => BridgeError::AuthenticationFailed(format!("login failed: {other}")),
        })?;

        if value.is_empty() {
            return Err(BridgeError::AuthenticationFailed("login returned an empty token".to_owned()));
        }

        let token = Token::new(value, self.ttl);
        *self.current.write().await = Some(token.clone());
        let logins = self.logins.fetch_add(1, Ordering::Relaxed) + 1;
        info!(logins, ttl_secs = self.ttl.as_secs(), "vendor token refreshed");

        Ok(token)
    }

    /// Drops the cached token unconditionally.
    pub async fn invalidate(&self) {
        if self.current.write().await.take().is_some() {
            warn!("vendor token invalidated");
        }
    }

    /// Drops the cached token only if it is still `stale`.
    ///
    /// Returns `true` if the cache was cleared. When several calls fail with
    /// the same token, only the first clears it, so the re-login happens once.
    pub async fn invalidate_if(&self, stale: &Token) -> bool {
        let mut current = self.current.write().await;
        if current.as_ref() == Some(stale) {
            *current = None;
            warn!("vendor token rejected, invalidated");
            true
        } else {
            false
        }
    }

    /// The cached token, if one is held and not expired.
    pub async fn current(&self) -> Option<Token> {
        self.cached().await
    }

    /// Number of successful logins so far.
    #[must_use]
    pub fn login_count(&self) -> u64 {
        self.logins.load(Ordering::Relaxed)
    }

    async fn cached(&self) -> Option<Token> {
        self.current.read().await.as_ref().filter(|token| !token.is_expired()).cloned()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    };

    use super::*;

    const TTL: Duration = Duration::from_secs(3600);

    #[tokio::test]
    async fn test_token_cached_after_login() {
        let manager = TokenManager::new(TTL);

        let first = manager.get_token(|| async { Ok("tok-1".to_owned()) }).await.unwrap();
        let second = manager
            .get_token(|| async { Ok::<_, BridgeError>(unreachable_login()) })
            .await
            .unwrap();

        assert_eq!(first.value(), "tok-1");
        assert_eq!(first, second);
        assert_eq!(manager.login_count(), 1);
    }

    fn unreachable_login() -> String {
        panic!("login must not run while the token is cached")
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_token_refreshed() {
        let manager = TokenManager::new(Duration::from_secs(10));
        manager.get_token(|| async { Ok("old".to_owned()) }).await.unwrap();

        tokio::time::advance(Duration::from_secs(11)).await;

        let token = manager.get_token(|| async { Ok("new".to_owned()) }).await.unwrap();
        assert_eq!(token.value(), "new");
        assert_eq!(manager.login_count(), 2);
    }

    #[tokio::test]
    async fn test_single_flight_refresh() {
        let manager = Arc::new(TokenManager::new(TTL));
        let logins = Arc::new(AtomicU32::new(0));

        let mut handles = vec![];
        for _ in 0..16 {
            let manager = Arc::clone(&manager);
            let logins = Arc::clone(&logins);
            handles.push(tokio::spawn(async move {
                manager
                    .get_token(|| async move {
                        let n = logins.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        Ok(format!("tok-{n}"))
                    })
                    .await
            }));
        }

        let mut values = vec![];
        for handle in handles {
            values.push(handle.await.unwrap().unwrap().value().to_owned());
        }

        assert_eq!(logins.load(Ordering::SeqCst), 1);
        assert!(values.iter().all(|v| v == "tok-0"));
    }

    #[tokio::test]
    async fn test_login_failure_is_authentication_failed() {
        let manager = TokenManager::new(TTL);
        let err = manager
            .get_token(|| async { Err(BridgeError::VendorError { code: 1001, message: "bad password".into() }) })
            .await
            .unwrap_err();

        assert!(matches!(err, BridgeError::AuthenticationFailed(ref m) if m.contains("bad password")));
        assert_eq!(manager.login_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_token_rejected() {
        let manager = TokenManager::new(TTL);
        let err = manager.get_token(|| async { Ok(String::new()) }).await.unwrap_err();
        assert!(matches!(err, BridgeError::AuthenticationFailed(_)));
    }

    #[tokio::test]
    async fn test_invalidate_if_only_clears_matching_token() {
        let manager = TokenManager::new(TTL);
        let stale = manager.get_token(|| async { Ok("a".to_owned()) }).await.unwrap();

        assert!(manager.invalidate_if(&stale).await);
        let fresh = manager.get_token(|| async { Ok("b".to_owned()) }).await.unwrap();

        // A late failure carrying the old token must not drop the new one.
        assert!(!manager.invalidate_if(&stale).await);
        let again = manager.get_token(|| async { Ok("c".to_owned()) }).await.unwrap();
        assert_eq!(again, fresh);
    }

    #[tokio::test]
    async fn test_invalidate_forces_login() {
        let manager = TokenManager::new(TTL);
        manager.get_token(|| async { Ok("a".to_owned()) }).await.unwrap();
        manager.invalidate().await;

        let token = manager.get_token(|| async { Ok("b".to_owned()) }).await.unwrap();
        assert_eq!(token.value(), "b");
    }

    #[test]
    fn test_debug_redacts_value() {
        let token = Token::new("super-secret", TTL);
        assert!(!format!("{token:?}").contains("super-secret"));
    }
}
