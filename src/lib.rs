//! Agora Response Cache
//!
//! In-process HTTP response cache for the agora forum.
//!
//! - **Freshness**: per-policy TTL plus an optional stale window. Stale
//!   entries are served immediately while a single-flight background refresh
//!   replaces them.
//! - **Tag invalidation**: write paths invalidate whole semantic buckets
//!   (`"content"`, `"search"`, ...) without knowing individual keys.
//! - **Janitor**: a cancellable periodic sweep evicts entries past their
//!   stale deadline to bound memory.
//! - **Middleware**: an axum layer attaches the cache to a route group under
//!   one of the [`CachePolicy`] presets.
//!
//! ## Configuration
//!
//! Cache behavior is controlled via `agora.toml`:
//!
//! ```toml
//! [cache]
//! enabled = true
//! janitor_interval_secs = 300
//! revalidate_timeout_secs = 30
//! max_body_bytes = 1048576
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! let cache = ResponseCache::new(settings.cache.clone());
//! let janitor = cache.start_janitor();
//!
//! let posts = Router::new()
//!     .route("/posts", get(list_posts))
//!     .layer(middleware::from_fn_with_state(
//!         CacheState { cache: cache.clone(), policy: CachePolicy::content() },
//!         response_cache_layer,
//!     ));
//!
//! // after a post is written:
//! cache.invalidate_tag("content");
//!
//! // on shutdown:
//! janitor.stop().await;
//! ```

mod cache;
mod config;
mod entry;
mod error;
mod janitor;
mod keys;
mod lock;
mod middleware;
mod policy;
mod revalidate;
mod store;

pub use cache::{ResponseCache, ServedAs};
pub use config::CacheConfig;
pub use entry::{CachedResponse, Freshness, Produced};
pub use error::{BoxError, CacheError};
pub use janitor::Janitor;
pub use keys::{CacheKey, RequestDescriptor};
pub use middleware::{CACHE_STATUS_HEADER, CacheState, response_cache_layer};
pub use policy::CachePolicy;
pub use store::CacheStats;
