//! Cache policies and the forum's policy presets.

use std::time::Duration;

// Preset freshness windows, in seconds.
const USER_SPECIFIC_TTL: u64 = 30;
const STATIC_TTL: u64 = 3600;
const STATIC_STALE: u64 = 600;
const SEARCH_TTL: u64 = 120;
const SEARCH_STALE: u64 = 60;
const CONTENT_TTL: u64 = 300;
const CONTENT_STALE: u64 = 120;
const PROFILE_TTL: u64 = 60;
const PROFILE_STALE: u64 = 30;

/// Freshness and invalidation policy for one cached route group.
///
/// Supplied by the caller on every lookup; never stored beyond the deadlines
/// it is folded into.
///
/// Cache keys are not treated as secrets: listing an auth-bearing header in
/// `vary_headers` copies its value into the key verbatim. Vary on an
/// app-assigned identity header, never on raw credentials.
#[derive(Debug, Clone)]
pub struct CachePolicy {
    /// Duration an entry is served as fresh.
    pub ttl: Duration,
    /// Additional window during which a stale entry is still served while a
    /// background refresh runs. Zero disables stale serving entirely.
    pub stale_while_revalidate: Duration,
    /// Tags attached to entries stored under this policy, for bulk
    /// invalidation. An empty list is valid; such entries are only ever
    /// evicted by expiry.
    pub tags: Vec<String>,
    /// Request headers folded into the cache key, in key order.
    pub vary_headers: Vec<String>,
}

impl CachePolicy {
    /// A policy that serves fresh for `ttl` with no stale window, no tags,
    /// and no vary dimensions.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            stale_while_revalidate: Duration::ZERO,
            tags: Vec::new(),
            vary_headers: Vec::new(),
        }
    }

    pub fn with_stale_window(mut self, window: Duration) -> Self {
        self.stale_while_revalidate = window;
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_vary<I, S>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.vary_headers = headers.into_iter().map(Into::into).collect();
        self
    }

    // ========================================================================
    // Presets consumed by the forum's route groups
    // ========================================================================

    /// Short-lived per-user data (notification counters, drafts). Varies on
    /// the identity header the auth layer sets after session validation.
    pub fn user_specific() -> Self {
        Self::new(Duration::from_secs(USER_SPECIFIC_TTL))
            .with_tags(["profile"])
            .with_vary(["x-agora-user"])
    }

    /// Long-lived static content (help pages, category descriptions).
    pub fn static_content() -> Self {
        Self::new(Duration::from_secs(STATIC_TTL))
            .with_stale_window(Duration::from_secs(STATIC_STALE))
            .with_tags(["static"])
    }

    /// Search result pages.
    pub fn search() -> Self {
        Self::new(Duration::from_secs(SEARCH_TTL))
            .with_stale_window(Duration::from_secs(SEARCH_STALE))
            .with_tags(["search"])
    }

    /// Post and comment listings.
    pub fn content() -> Self {
        Self::new(Duration::from_secs(CONTENT_TTL))
            .with_stale_window(Duration::from_secs(CONTENT_STALE))
            .with_tags(["content"])
    }

    /// Public profile pages.
    pub fn profile() -> Self {
        Self::new(Duration::from_secs(PROFILE_TTL))
            .with_stale_window(Duration::from_secs(PROFILE_STALE))
            .with_tags(["profile"])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_policy_has_no_stale_window() {
        let policy = CachePolicy::new(Duration::from_secs(60));
        assert_eq!(policy.ttl, Duration::from_secs(60));
        assert_eq!(policy.stale_while_revalidate, Duration::ZERO);
        assert!(policy.tags.is_empty());
        assert!(policy.vary_headers.is_empty());
    }

    #[test]
    fn builders_replace_fields() {
        let policy = CachePolicy::new(Duration::from_secs(10))
            .with_stale_window(Duration::from_secs(5))
            .with_tags(["a", "b"])
            .with_vary(["accept-language"]);

        assert_eq!(policy.stale_while_revalidate, Duration::from_secs(5));
        assert_eq!(policy.tags, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(policy.vary_headers, vec!["accept-language".to_string()]);
    }

    #[test]
    fn presets_are_tag_scoped() {
        assert_eq!(CachePolicy::search().tags, vec!["search".to_string()]);
        assert_eq!(CachePolicy::content().tags, vec!["content".to_string()]);
        assert_eq!(CachePolicy::profile().tags, vec!["profile".to_string()]);
    }

    #[test]
    fn user_specific_varies_on_identity_header() {
        let policy = CachePolicy::user_specific();
        assert_eq!(policy.vary_headers, vec!["x-agora-user".to_string()]);
        assert_eq!(policy.stale_while_revalidate, Duration::ZERO);
    }
}
