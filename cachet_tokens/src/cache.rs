//! A demand-driven cache for tokens
//!
//! The cache holds at most one token and renews it on demand: callers that
//! find a fresh token reuse it, and callers that find a stale, expired, or
//! absent token trigger a renewal against the underlying source. No
//! background task is involved.

use cachet_clock::{Clock, System};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::{sources::AsyncTokenSource, TokenStatus, TokenWithLifetime};

/// No token could be acquired from the underlying source
#[derive(Debug, Error)]
#[error("unable to acquire a token")]
pub struct TokenAcquisitionFailed<E>(#[source] E);

impl<E> TokenAcquisitionFailed<E> {
    /// The underlying acquisition error
    pub fn into_inner(self) -> E {
        self.0
    }
}

/// A thread-safe, demand-driven token cache
///
/// The cache is shared by reference; cloning is not required. Renewals
/// happen outside the lock, so concurrent callers finding a non-fresh token
/// may each request one from the source. Every caller still receives a
/// usable token, and the last writer's token remains cached.
#[derive(Debug)]
#[must_use]
pub struct TokenCache<S, C = System> {
    source: S,
    token: Mutex<Option<TokenWithLifetime>>,
    clock: C,
}

impl<S> TokenCache<S> {
    /// Constructs a new cache around a token source
    pub fn new(source: S) -> Self {
        Self {
            source,
            token: Mutex::new(None),
            clock: System,
        }
    }
}

impl<S, C> TokenCache<S, C> {
    /// Replaces the clock used to judge token freshness
    pub fn with_clock<C2>(self, clock: C2) -> TokenCache<S, C2> {
        TokenCache {
            source: self.source,
            token: self.token,
            clock,
        }
    }

    /// Drops the cached token, forcing the next caller to acquire a new one
    ///
    /// Used when a token that should still be valid is rejected by the
    /// server, for example after the signing secret has been rotated.
    pub async fn invalidate(&self) {
        *self.token.lock().await = None;
        tracing::debug!("cached token invalidated");
    }
}

impl<S: AsyncTokenSource, C: Clock> TokenCache<S, C> {
    /// Returns a fresh token, renewing it through the source if necessary
    ///
    /// # Errors
    ///
    /// Returns an error if the source fails to provide a token. The failure
    /// leaves any cached entry untouched.
    pub async fn token(&self) -> Result<TokenWithLifetime, TokenAcquisitionFailed<S::Error>> {
        {
            let guard = self.token.lock().await;
            if let Some(current) = &*guard {
                if let TokenStatus::Fresh = current.token_status_with_clock(&self.clock) {
                    return Ok(current.clone_it());
                }
            }
        }

        // The lock is not held across the renewal. Concurrent callers may
        // each request a token from the source; the last writer wins.
        match self.source.request_token().await {
            Ok(token) => {
                let issued = token.clone_it();
                *self.token.lock().await = Some(token);
                Ok(issued)
            }
            Err(error) => {
                let error_ref: &dyn std::error::Error = &error;
                tracing::error!(
                    error = error_ref,
                    "token acquisition failed, cached entry left untouched"
                );
                Err(TokenAcquisitionFailed(error))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
        Arc,
    };

    use async_trait::async_trait;
    use cachet_clock::{DurationSecs, UnixTime};
    use thiserror::Error;

    use crate::{AccessToken, TokenLifetimeConfig};

    use super::*;

    #[derive(Clone, Debug, Default)]
    struct SharedClock(Arc<AtomicU64>);

    impl SharedClock {
        fn at(time: u64) -> Self {
            Self(Arc::new(AtomicU64::new(time)))
        }

        fn advance(&self, secs: u64) {
            self.0.fetch_add(secs, Ordering::SeqCst);
        }
    }

    impl Clock for SharedClock {
        fn now(&self) -> UnixTime {
            UnixTime(self.0.load(Ordering::SeqCst))
        }
    }

    #[derive(Debug, Error)]
    #[error("authority unavailable")]
    struct Unavailable;

    #[derive(Clone, Debug)]
    struct CountingSource {
        acquisitions: Arc<AtomicUsize>,
        fail: Arc<AtomicBool>,
        lifetime: DurationSecs,
        clock: SharedClock,
    }

    impl CountingSource {
        fn new(clock: SharedClock, lifetime: DurationSecs) -> Self {
            Self {
                acquisitions: Arc::new(AtomicUsize::new(0)),
                fail: Arc::new(AtomicBool::new(false)),
                lifetime,
                clock,
            }
        }

        fn count(&self) -> usize {
            self.acquisitions.load(Ordering::SeqCst)
        }

        fn set_failing(&self, failing: bool) {
            self.fail.store(failing, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl AsyncTokenSource for CountingSource {
        type Error = Unavailable;

        async fn request_token(&self) -> Result<TokenWithLifetime, Self::Error> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(Unavailable);
            }
            let n = self.acquisitions.fetch_add(1, Ordering::SeqCst);
            Ok(TokenLifetimeConfig::default()
                .with_clock(self.clock.clone())
                .create_token(AccessToken::new(format!("token-{n}")), self.lifetime))
        }
    }

    #[tokio::test]
    async fn fresh_token_is_reused_without_touching_the_source() {
        let clock = SharedClock::at(1000);
        let source = CountingSource::new(clock.clone(), DurationSecs(300));
        let cache = TokenCache::new(source.clone()).with_clock(clock);

        let first = cache.token().await.unwrap();
        let second = cache.token().await.unwrap();

        assert_eq!(first.access_token(), second.access_token());
        assert_eq!(source.count(), 1);
    }

    #[tokio::test]
    async fn stale_token_is_renewed_proactively() {
        let clock = SharedClock::at(1000);
        let source = CountingSource::new(clock.clone(), DurationSecs(300));
        let cache = TokenCache::new(source.clone()).with_clock(clock.clone());

        let first = cache.token().await.unwrap();

        // into the refresh buffer, but still before expiry
        clock.advance(275);
        let second = cache.token().await.unwrap();

        assert_ne!(first.access_token(), second.access_token());
        assert_eq!(source.count(), 2);
    }

    #[tokio::test]
    async fn failed_renewal_of_a_stale_token_is_an_error_and_preserves_the_entry() {
        let clock = SharedClock::at(1000);
        let source = CountingSource::new(clock.clone(), DurationSecs(300));
        let cache = TokenCache::new(source.clone()).with_clock(clock.clone());

        let first = cache.token().await.unwrap();

        clock.advance(275);
        source.set_failing(true);
        assert!(cache.token().await.is_err());
        assert_eq!(source.count(), 1);

        // once the source recovers, renewal proceeds normally
        source.set_failing(false);
        let renewed = cache.token().await.unwrap();
        assert_ne!(first.access_token(), renewed.access_token());
        assert_eq!(source.count(), 2);
    }

    #[tokio::test]
    async fn expired_token_with_a_failed_renewal_is_an_error() {
        let clock = SharedClock::at(1000);
        let source = CountingSource::new(clock.clone(), DurationSecs(300));
        let cache = TokenCache::new(source.clone()).with_clock(clock.clone());

        cache.token().await.unwrap();

        clock.advance(301);
        source.set_failing(true);
        assert!(cache.token().await.is_err());
    }

    #[tokio::test]
    async fn invalidation_forces_reacquisition() {
        let clock = SharedClock::at(1000);
        let source = CountingSource::new(clock.clone(), DurationSecs(300));
        let cache = TokenCache::new(source.clone()).with_clock(clock);

        cache.token().await.unwrap();
        cache.invalidate().await;
        cache.token().await.unwrap();

        assert_eq!(source.count(), 2);
    }

    #[tokio::test]
    async fn concurrent_first_use_leaves_every_caller_with_a_token() {
        let clock = SharedClock::at(1000);
        let source = CountingSource::new(clock.clone(), DurationSecs(300));
        let cache = Arc::new(TokenCache::new(source.clone()).with_clock(clock));

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let cache = Arc::clone(&cache);
            tasks.push(tokio::spawn(async move { cache.token().await }));
        }

        for task in tasks {
            assert!(task.await.unwrap().is_ok());
        }

        // once everyone has settled, further callers reuse the cached token
        let settled = source.count();
        cache.token().await.unwrap();
        assert_eq!(source.count(), settled);
    }
}
