//! Cache key derivation.
//!
//! A key is built from the request line plus the header values named by the
//! policy's vary dimensions, so identical requests always map to the same
//! entry and varied requests never collide.

use std::fmt;

use axum::http::{HeaderMap, Method, Uri};

/// The request attributes a cache key is derived from.
///
/// Built by the middleware from the incoming request; treated as immutable,
/// caller-owned input by the cache.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    pub method: Method,
    pub path: String,
    pub query: String,
    pub headers: HeaderMap,
}

impl RequestDescriptor {
    pub fn new(method: Method, uri: &Uri, headers: HeaderMap) -> Self {
        Self {
            method,
            path: uri.path().to_string(),
            query: uri.query().unwrap_or("").to_string(),
            headers,
        }
    }

    /// True for read methods eligible for stale serving with background
    /// refresh.
    pub fn is_read(&self) -> bool {
        self.method == Method::GET || self.method == Method::HEAD
    }

    /// Derive the cache key for this request under the given vary dimensions.
    ///
    /// Format: `METHOD:PATH?QUERY` (query segment omitted when empty),
    /// followed by one `|vary:<header>:<value>` segment per vary header in
    /// the order the policy lists them. A vary header absent from the request
    /// contributes an empty value, so presence and absence cache separately.
    pub fn derive_key(&self, vary_headers: &[String]) -> CacheKey {
        let mut key = String::with_capacity(self.path.len() + self.query.len() + 16);
        key.push_str(self.method.as_str());
        key.push(':');
        key.push_str(&self.path);
        if !self.query.is_empty() {
            key.push('?');
            key.push_str(&self.query);
        }
        for name in vary_headers {
            let value = self
                .headers
                .get(name.as_str())
                .and_then(|value| value.to_str().ok())
                .unwrap_or("");
            key.push_str("|vary:");
            key.push_str(name);
            key.push(':');
            key.push_str(value);
        }
        CacheKey(key)
    }
}

/// A derived cache key.
///
/// Keys are never treated as secrets; see the vary-header caveat on
/// [`CachePolicy`](crate::CachePolicy).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
