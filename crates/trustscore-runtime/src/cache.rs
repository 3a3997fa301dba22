//! Judgment memoization for trustscore-runtime.
//!
//! Each scoring engine owns one cache, keyed by (question, answer, prompt
//! index). Entries are never evicted or expired: model, prompt set and
//! temperature are fixed for the engine's lifetime, so a stored judgment
//! stays valid until the engine is dropped or the cache is cleared.
//!
//! A disabled cache is the same type with no backing store, so callers never
//! branch on whether caching is on.

use moka::future::Cache;
use trustscore_core::{CacheKey, Judgment};

/// Judgment cache using moka.
pub struct JudgmentCache {
    cache: Option<Cache<CacheKey, Judgment>>,
}

impl JudgmentCache {
    /// Create a cache; `enabled = false` yields a no-op cache.
    pub fn new(enabled: bool) -> Self {
        if enabled {
            Self::enabled()
        } else {
            Self::disabled()
        }
    }

    /// Create an unbounded cache with no time-to-live.
    pub fn enabled() -> Self {
        Self {
            cache: Some(Cache::builder().build()),
        }
    }

    /// Create a cache that never stores anything.
    pub fn disabled() -> Self {
        Self { cache: None }
    }

    /// Whether lookups can ever hit.
    pub fn is_enabled(&self) -> bool {
        self.cache.is_some()
    }

    /// Get a cached judgment. Always `None` when disabled.
    pub async fn lookup(&self, key: &CacheKey) -> Option<Judgment> {
        match &self.cache {
            Some(cache) => cache.get(key).await,
            None => None,
        }
    }

    /// Store a judgment. No-op when disabled.
    pub async fn store(&self, key: CacheKey, judgment: Judgment) {
        if let Some(cache) = &self.cache {
            cache.insert(key, judgment).await;
        }
    }

    /// Remove every entry. No-op when disabled.
    pub fn clear(&self) {
        if let Some(cache) = &self.cache {
            cache.invalidate_all();
        }
    }

    /// Number of stored judgments.
    pub async fn entry_count(&self) -> u64 {
        match &self.cache {
            Some(cache) => {
                // moka applies writes and invalidations lazily
                cache.run_pending_tasks().await;
                cache.entry_count()
            }
            None => 0,
        }
    }
}

impl Default for JudgmentCache {
    fn default() -> Self {
        Self::enabled()
    }
}

impl std::fmt::Debug for JudgmentCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JudgmentCache")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}
