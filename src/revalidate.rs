//! Single-flight tracking for background revalidation.
//!
//! A key is entered into the in-flight set atomically before its refresh task
//! is spawned; while the marker is held, further stale hits for the key serve
//! the stale payload without starting a duplicate refresh. The marker is
//! released by [`InFlightGuard`]'s `Drop`, which covers producer failure,
//! timeout cancellation, and panic unwind alike.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use crate::keys::CacheKey;
use crate::lock::mutex_lock;

#[derive(Default)]
pub(crate) struct InFlight {
    keys: Arc<Mutex<HashSet<CacheKey>>>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to claim the refresh slot for `key`.
    ///
    /// Returns `None` while a refresh for the key is already running.
    pub fn try_begin(&self, key: &CacheKey) -> Option<InFlightGuard> {
        let mut keys = mutex_lock(&self.keys, "try_begin");
        if keys.insert(key.clone()) {
            Some(InFlightGuard {
                keys: Arc::clone(&self.keys),
                key: key.clone(),
            })
        } else {
            None
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        mutex_lock(&self.keys, "len").len()
    }
}

/// Marker for one in-flight refresh; releases the key on drop.
pub(crate) struct InFlightGuard {
    keys: Arc<Mutex<HashSet<CacheKey>>>,
    key: CacheKey,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        mutex_lock(&self.keys, "release").remove(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{AssertUnwindSafe, catch_unwind};

    use axum::http::{HeaderMap, Method};

    use super::*;
    use crate::keys::RequestDescriptor;

    fn key(path: &str) -> CacheKey {
        RequestDescriptor::new(Method::GET, &path.parse().unwrap(), HeaderMap::new())
            .derive_key(&[])
    }

    #[test]
    fn second_claim_for_same_key_is_refused() {
        let inflight = InFlight::new();
        let key = key("/posts");

        let guard = inflight.try_begin(&key).expect("first claim");
        assert!(inflight.try_begin(&key).is_none());
        drop(guard);

        assert!(inflight.try_begin(&key).is_some());
    }

    #[test]
    fn distinct_keys_do_not_contend() {
        let inflight = InFlight::new();

        let _a = inflight.try_begin(&key("/a")).expect("claim /a");
        let _b = inflight.try_begin(&key("/b")).expect("claim /b");
        assert_eq!(inflight.len(), 2);
    }

    #[test]
    fn guard_releases_on_panic_unwind() {
        let inflight = InFlight::new();
        let key = key("/posts");

        let _ = catch_unwind(AssertUnwindSafe(|| {
            let _guard = inflight.try_begin(&key).expect("claim");
            panic!("producer panicked");
        }));

        // marker released during unwind; the key can be claimed again
        assert_eq!(inflight.len(), 0);
        assert!(inflight.try_begin(&key).is_some());
    }
}
