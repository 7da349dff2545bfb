//! Periodic eviction of expired entries.
//!
//! Lazy eviction only removes entries that are looked up again; the janitor
//! bounds memory growth from keys that never see another request.

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::cache::ResponseCache;

/// Handle to the background sweep task.
///
/// [`stop`](Janitor::stop) shuts the task down deterministically and waits
/// for it to exit. Dropping the handle also ends the task (the shutdown
/// channel closes), without waiting.
pub struct Janitor {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl Janitor {
    pub(crate) fn spawn(cache: ResponseCache) -> Self {
        let (shutdown, mut rx) = watch::channel(false);
        let period = cache.config().janitor_interval();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await; // Skip the first immediate tick
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let removed = cache.evict_expired();
                        if removed > 0 {
                            debug!(removed, "janitor evicted expired entries");
                        }
                    }
                    _ = rx.changed() => break,
                }
            }
        });
        Self { shutdown, handle }
    }

    /// Stop the sweep task and wait for it to exit.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(error) = self.handle.await {
            warn!(%error, "janitor task did not shut down cleanly");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::http::{HeaderMap, Method};

    use super::*;
    use crate::config::CacheConfig;
    use crate::entry::{CachedResponse, Produced};
    use crate::error::BoxError;
    use crate::keys::RequestDescriptor;
    use crate::policy::CachePolicy;

    async fn seed(cache: &ResponseCache, path: &str, ttl_secs: u64) {
        let request =
            RequestDescriptor::new(Method::GET, &path.parse().unwrap(), HeaderMap::new());
        let policy = CachePolicy::new(Duration::from_secs(ttl_secs));
        cache
            .lookup_or_compute(&request, &policy, || {
                std::future::ready(Ok::<_, BoxError>(Produced::Cacheable(
                    CachedResponse::new(
                        axum::http::StatusCode::OK,
                        &HeaderMap::new(),
                        bytes::Bytes::from_static(b"body"),
                    ),
                )))
            })
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_removes_expired_entries_without_lookups() {
        let config = CacheConfig {
            janitor_interval_secs: 60,
            ..Default::default()
        };
        let cache = ResponseCache::new(config);
        let janitor = cache.start_janitor();

        seed(&cache, "/short", 10).await;
        seed(&cache, "/long", 1000).await;
        assert_eq!(cache.stats().entries, 2);

        // first sweep fires at t=60; /short expired at t=10
        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(cache.stats().entries, 1);

        janitor.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn stop_is_deterministic_before_any_tick() {
        let cache = ResponseCache::new(CacheConfig::default());
        let janitor = cache.start_janitor();
        janitor.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn stopped_janitor_no_longer_sweeps() {
        let config = CacheConfig {
            janitor_interval_secs: 60,
            ..Default::default()
        };
        let cache = ResponseCache::new(config);
        let janitor = cache.start_janitor();
        janitor.stop().await;

        seed(&cache, "/short", 10).await;
        tokio::time::sleep(Duration::from_secs(120)).await;
        // still present: only lazy eviction or an explicit sweep removes it now
        assert_eq!(cache.stats().entries, 1);
        assert_eq!(cache.evict_expired(), 1);
    }
}
