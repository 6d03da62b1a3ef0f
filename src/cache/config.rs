//! Cache configuration.
//!
//! Controls the object cache via `pixie.toml`.

use std::num::NonZeroUsize;
use std::time::Duration;

use serde::Deserialize;

// Default values for cache configuration
const DEFAULT_BLOG_LIMIT: usize = 500;
const DEFAULT_COMMENT_LIST_LIMIT: usize = 200;
const DEFAULT_REPLY_LIST_LIMIT: usize = 400;
const DEFAULT_SEARCH_LIMIT: usize = 100;
const DEFAULT_SEARCH_TTL_SECS: u64 = 3600;
const DEFAULT_TRENDING_TAGS_TTL_SECS: u64 = 600;
const DEFAULT_STATS_TTL_SECS: u64 = 1800;
const DEFAULT_CONSUME_BATCH_LIMIT: usize = 100;

/// Cache configuration from `pixie.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Enable the object cache. Disabled, every read goes to the store.
    pub enabled: bool,
    /// Maximum blogs in the KV cache.
    pub blog_limit: usize,
    /// Maximum per-blog comment lists.
    pub comment_list_limit: usize,
    /// Maximum per-parent reply lists.
    pub reply_list_limit: usize,
    /// Maximum cached search result pages.
    pub search_limit: usize,
    /// TTL for search result pages, seconds.
    pub search_ttl_secs: u64,
    /// TTL for the trending-tags list, seconds.
    pub trending_tags_ttl_secs: u64,
    /// TTL for platform stats, seconds.
    pub stats_ttl_secs: u64,
    /// Maximum events per invalidation batch.
    pub consume_batch_limit: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            blog_limit: DEFAULT_BLOG_LIMIT,
            comment_list_limit: DEFAULT_COMMENT_LIST_LIMIT,
            reply_list_limit: DEFAULT_REPLY_LIST_LIMIT,
            search_limit: DEFAULT_SEARCH_LIMIT,
            search_ttl_secs: DEFAULT_SEARCH_TTL_SECS,
            trending_tags_ttl_secs: DEFAULT_TRENDING_TAGS_TTL_SECS,
            stats_ttl_secs: DEFAULT_STATS_TTL_SECS,
            consume_batch_limit: DEFAULT_CONSUME_BATCH_LIMIT,
        }
    }
}

impl CacheConfig {
    pub fn blog_limit_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.blog_limit).unwrap_or(NonZeroUsize::MIN)
    }

    pub fn comment_list_limit_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.comment_list_limit).unwrap_or(NonZeroUsize::MIN)
    }

    pub fn reply_list_limit_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.reply_list_limit).unwrap_or(NonZeroUsize::MIN)
    }

    pub fn search_limit_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.search_limit).unwrap_or(NonZeroUsize::MIN)
    }

    pub fn search_ttl(&self) -> Duration {
        Duration::from_secs(self.search_ttl_secs)
    }

    pub fn trending_tags_ttl(&self) -> Duration {
        Duration::from_secs(self.trending_tags_ttl_secs)
    }

    pub fn stats_ttl(&self) -> Duration {
        Duration::from_secs(self.stats_ttl_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = CacheConfig::default();
        assert!(config.enabled);
        assert_eq!(config.blog_limit, 500);
        assert_eq!(config.search_ttl_secs, 3600);
        assert_eq!(config.trending_tags_ttl_secs, 600);
        assert_eq!(config.stats_ttl_secs, 1800);
        assert_eq!(config.consume_batch_limit, 100);
    }

    #[test]
    fn non_zero_clamps_to_min() {
        let config = CacheConfig {
            blog_limit: 0,
            ..Default::default()
        };
        assert_eq!(config.blog_limit_non_zero().get(), 1);
    }
}
