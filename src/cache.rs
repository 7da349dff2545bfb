//! The response cache facade.
//!
//! Construct one [`ResponseCache`] at startup, hand clones to the route
//! groups that cache (the handle is a cheap `Arc` wrapper), start the
//! janitor, and stop it on shutdown.

use std::sync::Arc;

use metrics::counter;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::CacheConfig;
use crate::entry::{CacheEntry, CachedResponse, Freshness, Produced};
use crate::error::{BoxError, CacheError};
use crate::janitor::Janitor;
use crate::keys::{CacheKey, RequestDescriptor};
use crate::policy::CachePolicy;
use crate::revalidate::InFlight;
use crate::store::{CacheStats, EntryStore};

const METRIC_REQUESTS: &str = "agora_cache_requests_total";
const METRIC_REVALIDATIONS: &str = "agora_cache_revalidations_total";
const METRIC_EVICTIONS: &str = "agora_cache_evictions_total";

/// How a lookup was satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServedAs {
    /// Served from cache within its TTL.
    Fresh,
    /// Served from cache past its TTL; a background refresh was considered.
    Stale,
    /// Computed by the producer.
    Miss,
}

impl ServedAs {
    /// Value for the `x-cache` diagnostic header.
    pub fn as_header_value(self) -> &'static str {
        match self {
            Self::Fresh => "HIT",
            Self::Stale => "STALE",
            Self::Miss => "MISS",
        }
    }
}

struct CacheInner {
    config: CacheConfig,
    store: EntryStore,
    inflight: InFlight,
}

/// In-process response cache with TTL + stale-while-revalidate freshness and
/// tag-scoped invalidation.
///
/// Cloning shares the same underlying store.
#[derive(Clone)]
pub struct ResponseCache {
    inner: Arc<CacheInner>,
}

impl ResponseCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                config,
                store: EntryStore::new(),
                inflight: InFlight::new(),
            }),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    /// Serve `request` from the cache or compute it with `producer`.
    ///
    /// Fresh hits return immediately. Stale hits return the stale payload
    /// immediately and, for GET/HEAD requests, schedule a single-flight
    /// background refresh. Misses run the producer inline (unlocked) and
    /// store cacheable results; producer failure on a miss is the caller's
    /// error and caches nothing.
    ///
    /// Two concurrent misses for the same key may both run the producer;
    /// whichever completes last wins. Only the stale-refresh path is
    /// single-flight.
    pub async fn lookup_or_compute<F, Fut>(
        &self,
        request: &RequestDescriptor,
        policy: &CachePolicy,
        producer: F,
    ) -> Result<(CachedResponse, ServedAs), CacheError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<Produced, BoxError>> + Send + 'static,
    {
        let key = request.derive_key(&policy.vary_headers);

        match self.inner.store.lookup(&key, Instant::now()) {
            Some((response, Freshness::Fresh)) => {
                counter!(METRIC_REQUESTS, "outcome" => "hit").increment(1);
                debug!(key = %key, "serving fresh cached response");
                Ok((response, ServedAs::Fresh))
            }
            // lookup deletes expired entries, so any non-fresh hit is stale
            Some((response, _)) => {
                counter!(METRIC_REQUESTS, "outcome" => "stale").increment(1);
                if request.is_read() {
                    self.spawn_revalidation(key, policy.clone(), producer);
                } else {
                    debug!(key = %key, "stale hit on non-read method, refresh skipped");
                }
                Ok((response, ServedAs::Stale))
            }
            None => {
                counter!(METRIC_REQUESTS, "outcome" => "miss").increment(1);
                debug!(key = %key, "cache miss, invoking producer");
                match producer().await.map_err(CacheError::Producer)? {
                    Produced::Cacheable(response) => {
                        self.store_response(&key, response.clone(), policy);
                        Ok((response, ServedAs::Miss))
                    }
                    Produced::Uncacheable(response) => {
                        debug!(key = %key, "producer result not cacheable");
                        Ok((response, ServedAs::Miss))
                    }
                }
            }
        }
    }

    /// Schedule a background refresh for a stale key, unless one is already
    /// in flight.
    fn spawn_revalidation<F, Fut>(&self, key: CacheKey, policy: CachePolicy, producer: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<Produced, BoxError>> + Send + 'static,
    {
        let Some(guard) = self.inner.inflight.try_begin(&key) else {
            counter!(METRIC_REVALIDATIONS, "result" => "coalesced").increment(1);
            debug!(key = %key, "refresh already in flight, serving stale");
            return;
        };

        let cache = self.clone();
        let timeout = self.inner.config.revalidate_timeout();
        tokio::spawn(async move {
            // marker released on every exit path, including cancellation by
            // the timeout below
            let _guard = guard;
            match tokio::time::timeout(timeout, producer()).await {
                Ok(Ok(Produced::Cacheable(response))) => {
                    cache.store_response(&key, response, &policy);
                    counter!(METRIC_REVALIDATIONS, "result" => "ok").increment(1);
                    debug!(key = %key, "background refresh replaced entry");
                }
                Ok(Ok(Produced::Uncacheable(_))) => {
                    counter!(METRIC_REVALIDATIONS, "result" => "uncacheable").increment(1);
                    warn!(key = %key, "refresh produced an uncacheable response, keeping stale entry");
                }
                Ok(Err(error)) => {
                    counter!(METRIC_REVALIDATIONS, "result" => "error").increment(1);
                    warn!(key = %key, error = %error, "background refresh failed, keeping stale entry");
                }
                Err(_) => {
                    counter!(METRIC_REVALIDATIONS, "result" => "timeout").increment(1);
                    warn!(
                        key = %key,
                        timeout_secs = timeout.as_secs(),
                        "background refresh timed out, keeping stale entry"
                    );
                }
            }
        });
    }

    fn store_response(&self, key: &CacheKey, response: CachedResponse, policy: &CachePolicy) {
        let entry = CacheEntry::new(response, policy, Instant::now());
        self.inner.store.insert(key.clone(), entry);
    }

    /// Remove every entry indexed under `tag`. Returns the number removed;
    /// an unknown tag removes nothing and returns 0.
    pub fn invalidate_tag(&self, tag: &str) -> usize {
        self.invalidate_tags(&[tag])
    }

    /// Remove every entry indexed under any of `tags`, counting each entry
    /// once.
    pub fn invalidate_tags(&self, tags: &[&str]) -> usize {
        let removed = self.inner.store.remove_tags(tags);
        if removed > 0 {
            counter!(METRIC_EVICTIONS, "reason" => "tag").increment(removed as u64);
        }
        debug!(?tags, removed, "tag invalidation");
        removed
    }

    /// Drop every entry and tag mapping.
    pub fn clear_all(&self) {
        self.inner.store.clear();
        debug!("cache cleared");
    }

    /// Delete entries past their stale deadline. Called by the janitor;
    /// exposed so tests and operators can force a sweep.
    pub fn evict_expired(&self) -> usize {
        let removed = self.inner.store.sweep(Instant::now());
        if removed > 0 {
            counter!(METRIC_EVICTIONS, "reason" => "expired").increment(removed as u64);
        }
        removed
    }

    pub fn stats(&self) -> CacheStats {
        self.inner.store.stats()
    }

    /// Spawn the periodic janitor for this cache.
    pub fn start_janitor(&self) -> Janitor {
        Janitor::spawn(self.clone())
    }

    #[cfg(test)]
    pub(crate) fn inflight_len(&self) -> usize {
        self.inner.inflight.len()
    }
}
