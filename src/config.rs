//! Cache configuration.
//!
//! Controls the response cache via the `[cache]` section of `agora.toml`.

use std::time::Duration;

use serde::Deserialize;

// Default values for cache configuration
const DEFAULT_JANITOR_INTERVAL_SECS: u64 = 300;
const DEFAULT_REVALIDATE_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

/// Cache configuration from `agora.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Enable the response cache. When disabled, the middleware passes every
    /// request straight through to its handler.
    pub enabled: bool,
    /// Interval between janitor sweeps, in seconds.
    pub janitor_interval_secs: u64,
    /// Upper bound on a single background revalidation, in seconds.
    ///
    /// A producer still running at the deadline is cancelled and its
    /// in-flight marker released, so a hung refresh cannot suppress later
    /// revalidation attempts for the same key.
    pub revalidate_timeout_secs: u64,
    /// Largest response body the middleware will buffer for caching, in bytes.
    pub max_body_bytes: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            janitor_interval_secs: DEFAULT_JANITOR_INTERVAL_SECS,
            revalidate_timeout_secs: DEFAULT_REVALIDATE_TIMEOUT_SECS,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl CacheConfig {
    /// Returns the janitor sweep interval, clamping to 1s if zero.
    pub fn janitor_interval(&self) -> Duration {
        Duration::from_secs(self.janitor_interval_secs.max(1))
    }

    /// Returns the revalidation timeout, clamping to 1s if zero.
    pub fn revalidate_timeout(&self) -> Duration {
        Duration::from_secs(self.revalidate_timeout_secs.max(1))
    }
}
