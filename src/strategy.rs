//! Read/write ordering between the cache and the network.

use std::future::Future;
use std::time::Duration;

use crate::{CacheStore, Result};

/// How a cached request consults the [`CacheStore`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CacheStrategy {
    /// Serve a fresh cached value, fetching only on a miss.
    #[default]
    CacheFirst,
    /// Always fetch; fall back to the cached value when the fetch fails.
    NetworkFirst,
    /// Serve the cached value immediately and refresh it in the background.
    StaleWhileRevalidate,
}

impl CacheStrategy {
    /// Resolves `key` through `cache`, calling `fetch` as the strategy requires.
    ///
    /// Concurrent misses on the same key are not coalesced; each caller
    /// issues its own fetch.
    pub async fn resolve<V, F, Fut>(
        self,
        cache: &CacheStore<V>,
        key: String,
        ttl: Duration,
        fetch: F,
    ) -> Result<V>
    where
        V: Clone + Send + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        match self {
            Self::CacheFirst => {
                if let Some(cached) = cache.get(&key) {
                    return Ok(cached);
                }
                let value = fetch().await?;
                cache.set(key, value.clone(), ttl);
                Ok(value)
            }
            Self::NetworkFirst => match fetch().await {
                Ok(value) => {
                    cache.set(key, value.clone(), ttl);
                    Ok(value)
                }
                Err(err) => match cache.get(&key) {
                    Some(stale) => {
                        #[cfg(feature = "tracing")]
                        tracing::warn!(key = %key, error = %err, "network failed, serving cached data");

                        #[cfg(not(feature = "tracing"))]
                        let _ = err;

                        Ok(stale)
                    }
                    None => Err(err),
                },
            },
            Self::StaleWhileRevalidate => {
                let Some(cached) = cache.get(&key) else {
                    let value = fetch().await?;
                    cache.set(key, value.clone(), ttl);
                    return Ok(value);
                };

                // Refresh failures are not reported to the caller, who
                // already has a value.
                let refresh = fetch();
                let cache = cache.clone();
                tokio::spawn(async move {
                    match refresh.await {
                        Ok(value) => cache.set(key, value, ttl),
                        Err(err) => {
                            #[cfg(feature = "tracing")]
                            tracing::warn!(key = %key, error = %err, "background revalidation failed");

                            #[cfg(not(feature = "tracing"))]
                            let _ = (key, err);
                        }
                    }
                });

                Ok(cached)
            }
        }
    }
}
