use chrono::{DateTime, Duration, Utc};
use std::sync::RwLock;

/// A cached bearer token with its effective expiry (declared lifetime minus
/// the configured safety margin).
#[derive(Debug, Clone)]
pub struct CachedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Process-wide gateway token cache.
///
/// Lock contention is negligible and a concurrent double-fetch merely costs
/// one redundant auth call, so a plain RwLock over an Option is enough; no
/// cross-instance coordination is attempted.
#[derive(Debug, Default)]
pub struct TokenCache {
    inner: RwLock<Option<CachedToken>>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached token if it is still valid at `now`.
    pub fn get(&self, now: DateTime<Utc>) -> Option<String> {
        let guard = self.inner.read().unwrap_or_else(|e| e.into_inner());
        guard
            .as_ref()
            .filter(|cached| now < cached.expires_at)
            .map(|cached| cached.token.clone())
    }

    /// Replace the cached token. `declared_expiry` is the gateway-declared
    /// expiry; the safety margin is subtracted so the token is refreshed
    /// before it can expire mid-request.
    pub fn store(&self, token: String, declared_expiry: DateTime<Utc>, safety_margin: Duration) {
        let cached = CachedToken {
            token,
            expires_at: declared_expiry - safety_margin,
        };
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        *guard = Some(cached);
    }

    /// Drop the cached token, forcing the next caller to re-authenticate.
    pub fn invalidate(&self) {
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        *guard = None;
    }
}
