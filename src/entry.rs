//! Cached response payloads and entry freshness.

use axum::body::Body;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::Response;
use bytes::Bytes;
use tokio::time::Instant;

use crate::policy::CachePolicy;

/// A buffered HTTP response as stored in the cache.
///
/// The body is an opaque byte snapshot; the cache never inspects it. Captured
/// headers are replayed verbatim when the entry is served.
#[derive(Clone)]
pub struct CachedResponse {
    pub status: StatusCode,
    pub headers: Vec<(HeaderName, HeaderValue)>,
    pub body: Bytes,
}

impl CachedResponse {
    pub fn new(status: StatusCode, headers: &HeaderMap, body: Bytes) -> Self {
        let mut captured = Vec::with_capacity(headers.len());
        for (name, value) in headers.iter() {
            captured.push((name.clone(), value.clone()));
        }

        Self {
            status,
            headers: captured,
            body,
        }
    }

    /// Rebuild an HTTP response from the captured parts.
    pub fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;

        let headers = response.headers_mut();
        for (name, value) in self.headers {
            headers.append(name, value);
        }

        response
    }

    pub(crate) fn body_len(&self) -> usize {
        self.body.len()
    }
}

/// Producer output: whether the computed response may enter the cache.
///
/// Uncacheable responses (error pages, responses setting cookies) are
/// returned to the caller but never stored; on background revalidation an
/// uncacheable result leaves the stale entry untouched.
pub enum Produced {
    Cacheable(CachedResponse),
    Uncacheable(CachedResponse),
}

impl Produced {
    pub fn into_response(self) -> CachedResponse {
        match self {
            Self::Cacheable(response) | Self::Uncacheable(response) => response,
        }
    }
}

/// Freshness classification of a stored entry at some instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Within the TTL; served as-is.
    Fresh,
    /// Past the TTL but within the stale window; served while a background
    /// refresh runs.
    Stale,
    /// Past the stale window; never served, deleted on sight.
    Expired,
}

/// One stored cache entry.
///
/// Deadlines are precomputed at write time from the policy in effect, so
/// classification is two monotonic-clock comparisons.
pub(crate) struct CacheEntry {
    pub response: CachedResponse,
    pub written_at: Instant,
    pub fresh_until: Instant,
    pub stale_until: Instant,
    pub tags: Vec<String>,
}

impl CacheEntry {
    pub fn new(response: CachedResponse, policy: &CachePolicy, now: Instant) -> Self {
        let fresh_until = now + policy.ttl;
        let stale_until = fresh_until + policy.stale_while_revalidate;
        Self {
            response,
            written_at: now,
            fresh_until,
            stale_until,
            tags: policy.tags.clone(),
        }
    }

    pub fn freshness(&self, now: Instant) -> Freshness {
        if now <= self.fresh_until {
            Freshness::Fresh
        } else if now <= self.stale_until {
            Freshness::Stale
        } else {
            Freshness::Expired
        }
    }
}
