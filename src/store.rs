//! Entry storage and the tag index.
//!
//! The key→entry map and the tag→keys reverse index live behind a single
//! `RwLock` and are only ever mutated together inside one write guard, so no
//! reader can observe a key indexed under a tag without a live entry, or an
//! entry whose tags are not yet indexed.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use serde::Serialize;
use tokio::time::Instant;

use crate::entry::{CacheEntry, CachedResponse, Freshness};
use crate::keys::CacheKey;
use crate::lock::{rw_read, rw_write};

/// Point-in-time cache statistics for operational introspection.
///
/// `payload_bytes` sums stored body lengths on demand; it is diagnostic
/// output, not an eviction input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub tags: usize,
    pub payload_bytes: usize,
}

#[derive(Default)]
struct Maps {
    entries: HashMap<CacheKey, CacheEntry>,
    tag_index: HashMap<String, HashSet<CacheKey>>,
}

impl Maps {
    fn detach(&mut self, key: &CacheKey, tags: &[String]) {
        for tag in tags {
            if let Some(keys) = self.tag_index.get_mut(tag) {
                keys.remove(key);
                if keys.is_empty() {
                    self.tag_index.remove(tag);
                }
            }
        }
    }

    fn insert(&mut self, key: CacheKey, entry: CacheEntry) {
        if let Some(prior) = self.entries.remove(&key) {
            self.detach(&key, &prior.tags);
        }
        for tag in &entry.tags {
            self.tag_index
                .entry(tag.clone())
                .or_default()
                .insert(key.clone());
        }
        self.entries.insert(key, entry);
    }

    fn remove(&mut self, key: &CacheKey) -> bool {
        match self.entries.remove(key) {
            Some(entry) => {
                self.detach(key, &entry.tags);
                true
            }
            None => false,
        }
    }
}

/// The entry map and tag index, guarded as a pair.
pub(crate) struct EntryStore {
    inner: RwLock<Maps>,
}

impl EntryStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Maps::default()),
        }
    }

    /// Classify and serve an entry.
    ///
    /// Expired entries are deleted here (lazy eviction) and reported as
    /// absent, so the returned freshness is always `Fresh` or `Stale`.
    pub fn lookup(&self, key: &CacheKey, now: Instant) -> Option<(CachedResponse, Freshness)> {
        let mut maps = rw_write(&self.inner, "lookup");
        let freshness = maps.entries.get(key).map(|entry| entry.freshness(now));
        match freshness {
            None => None,
            Some(Freshness::Expired) => {
                maps.remove(key);
                None
            }
            Some(freshness) => maps
                .entries
                .get(key)
                .map(|entry| (entry.response.clone(), freshness)),
        }
    }

    /// Store an entry, replacing any prior entry for the key and its tag
    /// memberships in the same critical section.
    pub fn insert(&self, key: CacheKey, entry: CacheEntry) {
        rw_write(&self.inner, "insert").insert(key, entry);
    }

    /// Delete an entry and its tag memberships. Returns whether anything was
    /// removed.
    pub fn remove(&self, key: &CacheKey) -> bool {
        rw_write(&self.inner, "remove").remove(key)
    }

    /// Delete every entry indexed under any of `tags`, in one critical
    /// section. A key under several of the requested tags is deleted and
    /// counted once: removal detaches it from its remaining tags before they
    /// are visited.
    pub fn remove_tags(&self, tags: &[&str]) -> usize {
        let mut maps = rw_write(&self.inner, "remove_tags");
        let mut removed = 0;
        for tag in tags {
            let Some(keys) = maps.tag_index.remove(*tag) else {
                continue;
            };
            for key in keys {
                if maps.remove(&key) {
                    removed += 1;
                }
            }
        }
        removed
    }

    /// Delete every entry past its stale deadline. Returns the number
    /// removed.
    pub fn sweep(&self, now: Instant) -> usize {
        let mut maps = rw_write(&self.inner, "sweep");
        let expired: Vec<CacheKey> = maps
            .entries
            .iter()
            .filter(|(_, entry)| entry.freshness(now) == Freshness::Expired)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            maps.remove(key);
        }
        expired.len()
    }

    pub fn clear(&self) {
        let mut maps = rw_write(&self.inner, "clear");
        maps.entries.clear();
        maps.tag_index.clear();
    }

    pub fn stats(&self) -> CacheStats {
        let maps = rw_read(&self.inner, "stats");
        CacheStats {
            entries: maps.entries.len(),
            tags: maps.tag_index.len(),
            payload_bytes: maps
                .entries
                .values()
                .map(|entry| entry.response.body_len())
                .sum(),
        }
    }

    #[cfg(test)]
    pub fn contains(&self, key: &CacheKey) -> bool {
        rw_read(&self.inner, "contains").entries.contains_key(key)
    }
}
