//! Object cache storage.
//!
//! Typed, in-process caches for expensive aggregate reads: blogs by id,
//! comment and reply lists, search result pages, trending tags, and platform
//! stats. KV families use LRU eviction; search/tags/stats additionally carry
//! a TTL deadline. Blog, comment and reply families have no TTL and rely
//! entirely on invalidation.

use std::sync::RwLock;
use std::time::{Duration, Instant};

use lru::LruCache;
use metrics::counter;
use uuid::Uuid;

use crate::application::search::SearchResults;
use crate::domain::entities::{BlogRecord, CommentRecord, PlatformStats, TagCount};

use super::config::CacheConfig;
use super::keys::{ReplyKey, SearchKey};
use super::lock::rw_write;

const SOURCE: &str = "cache::store";

const METRIC_HIT: &str = "pixie_cache_hit_total";
const METRIC_MISS: &str = "pixie_cache_miss_total";

/// A cached value with an optional expiry deadline.
#[derive(Clone)]
struct Expiring<T> {
    value: T,
    deadline: Option<Instant>,
}

impl<T> Expiring<T> {
    fn eternal(value: T) -> Self {
        Self {
            value,
            deadline: None,
        }
    }

    fn with_ttl(value: T, ttl: Duration) -> Self {
        Self {
            value,
            deadline: Some(Instant::now() + ttl),
        }
    }

    fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }
}

/// In-process object cache.
///
/// All families are guarded by `RwLock`; LRU getters take the write lock
/// because a read reorders the eviction list.
pub struct ObjectCache {
    config: CacheConfig,

    // KV caches (LRU, no TTL: invalidation-only)
    blogs: RwLock<LruCache<Uuid, Expiring<BlogRecord>>>,
    comments: RwLock<LruCache<Uuid, Expiring<Vec<CommentRecord>>>>,
    replies: RwLock<LruCache<ReplyKey, Expiring<Vec<CommentRecord>>>>,

    // Search pages (LRU + TTL)
    search: RwLock<LruCache<SearchKey, Expiring<SearchResults>>>,

    // Singletons (TTL)
    trending_tags: RwLock<Option<Expiring<Vec<TagCount>>>>,
    stats: RwLock<Option<Expiring<PlatformStats>>>,
}

impl ObjectCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            config: config.clone(),
            blogs: RwLock::new(LruCache::new(config.blog_limit_non_zero())),
            comments: RwLock::new(LruCache::new(config.comment_list_limit_non_zero())),
            replies: RwLock::new(LruCache::new(config.reply_list_limit_non_zero())),
            search: RwLock::new(LruCache::new(config.search_limit_non_zero())),
            trending_tags: RwLock::new(None),
            stats: RwLock::new(None),
        }
    }

    // ========================================================================
    // Blog KV cache (no TTL)
    // ========================================================================

    pub fn get_blog(&self, id: Uuid) -> Option<BlogRecord> {
        if !self.config.enabled {
            return None;
        }
        let mut guard = rw_write(&self.blogs, SOURCE, "get_blog");
        let hit = guard.get(&id).map(|entry| entry.value.clone());
        record_lookup("blog", hit.is_some());
        hit
    }

    pub fn set_blog(&self, blog: BlogRecord) {
        if !self.config.enabled {
            return;
        }
        rw_write(&self.blogs, SOURCE, "set_blog").put(blog.id, Expiring::eternal(blog));
    }

    pub fn invalidate_blog(&self, id: Uuid) {
        rw_write(&self.blogs, SOURCE, "invalidate_blog").pop(&id);
    }

    // ========================================================================
    // Comment list cache (no TTL)
    // ========================================================================

    pub fn get_comments(&self, blog_id: Uuid) -> Option<Vec<CommentRecord>> {
        if !self.config.enabled {
            return None;
        }
        let mut guard = rw_write(&self.comments, SOURCE, "get_comments");
        let hit = guard.get(&blog_id).map(|entry| entry.value.clone());
        record_lookup("comments", hit.is_some());
        hit
    }

    pub fn set_comments(&self, blog_id: Uuid, comments: Vec<CommentRecord>) {
        if !self.config.enabled {
            return;
        }
        rw_write(&self.comments, SOURCE, "set_comments")
            .put(blog_id, Expiring::eternal(comments));
    }

    pub fn invalidate_comments(&self, blog_id: Uuid) {
        rw_write(&self.comments, SOURCE, "invalidate_comments").pop(&blog_id);
    }

    // ========================================================================
    // Reply list cache (no TTL)
    // ========================================================================

    pub fn get_replies(&self, key: ReplyKey) -> Option<Vec<CommentRecord>> {
        if !self.config.enabled {
            return None;
        }
        let mut guard = rw_write(&self.replies, SOURCE, "get_replies");
        let hit = guard.get(&key).map(|entry| entry.value.clone());
        record_lookup("replies", hit.is_some());
        hit
    }

    pub fn set_replies(&self, key: ReplyKey, replies: Vec<CommentRecord>) {
        if !self.config.enabled {
            return;
        }
        rw_write(&self.replies, SOURCE, "set_replies").put(key, Expiring::eternal(replies));
    }

    pub fn invalidate_replies(&self, key: ReplyKey) {
        rw_write(&self.replies, SOURCE, "invalidate_replies").pop(&key);
    }

    /// Drops every reply list belonging to `blog_id`. Used on blog delete,
    /// where individual parents are no longer known.
    pub fn invalidate_replies_for_blog(&self, blog_id: Uuid) {
        let mut guard = rw_write(&self.replies, SOURCE, "invalidate_replies_for_blog");
        let stale: Vec<ReplyKey> = guard
            .iter()
            .filter(|(key, _)| key.blog_id == blog_id)
            .map(|(key, _)| *key)
            .collect();
        for key in stale {
            guard.pop(&key);
        }
    }

    // ========================================================================
    // Search page cache (TTL)
    // ========================================================================

    pub fn get_search(&self, key: &SearchKey) -> Option<SearchResults> {
        if !self.config.enabled {
            return None;
        }
        let mut guard = rw_write(&self.search, SOURCE, "get_search");
        if let Some(entry) = guard.get(key) {
            if entry.is_expired() {
                guard.pop(key);
                record_lookup("search", false);
                return None;
            }
            record_lookup("search", true);
            return Some(entry.value.clone());
        }
        record_lookup("search", false);
        None
    }

    pub fn set_search(&self, key: SearchKey, results: SearchResults) {
        if !self.config.enabled {
            return;
        }
        rw_write(&self.search, SOURCE, "set_search")
            .put(key, Expiring::with_ttl(results, self.config.search_ttl()));
    }

    pub fn invalidate_all_search(&self) {
        rw_write(&self.search, SOURCE, "invalidate_all_search").clear();
    }

    // ========================================================================
    // Singletons (TTL)
    // ========================================================================

    pub fn get_trending_tags(&self) -> Option<Vec<TagCount>> {
        if !self.config.enabled {
            return None;
        }
        let hit = read_singleton(&self.trending_tags, SOURCE, "get_trending_tags");
        record_lookup("trending_tags", hit.is_some());
        hit
    }

    pub fn set_trending_tags(&self, tags: Vec<TagCount>) {
        if !self.config.enabled {
            return;
        }
        *rw_write(&self.trending_tags, SOURCE, "set_trending_tags") =
            Some(Expiring::with_ttl(tags, self.config.trending_tags_ttl()));
    }

    pub fn invalidate_trending_tags(&self) {
        *rw_write(&self.trending_tags, SOURCE, "invalidate_trending_tags") = None;
    }

    pub fn get_stats(&self) -> Option<PlatformStats> {
        if !self.config.enabled {
            return None;
        }
        let hit = read_singleton(&self.stats, SOURCE, "get_stats");
        record_lookup("stats", hit.is_some());
        hit
    }

    pub fn set_stats(&self, stats: PlatformStats) {
        if !self.config.enabled {
            return;
        }
        *rw_write(&self.stats, SOURCE, "set_stats") =
            Some(Expiring::with_ttl(stats, self.config.stats_ttl()));
    }

    pub fn invalidate_stats(&self) {
        *rw_write(&self.stats, SOURCE, "invalidate_stats") = None;
    }

    // ========================================================================
    // Bulk operations
    // ========================================================================

    /// Clear all cached data.
    pub fn clear(&self) {
        rw_write(&self.blogs, SOURCE, "clear.blogs").clear();
        rw_write(&self.comments, SOURCE, "clear.comments").clear();
        rw_write(&self.replies, SOURCE, "clear.replies").clear();
        rw_write(&self.search, SOURCE, "clear.search").clear();
        self.invalidate_trending_tags();
        self.invalidate_stats();
    }
}

fn read_singleton<T: Clone>(
    slot: &RwLock<Option<Expiring<T>>>,
    source: &'static str,
    op: &'static str,
) -> Option<T> {
    let mut guard = rw_write(slot, source, op);
    match guard.as_ref() {
        Some(entry) if entry.is_expired() => {
            *guard = None;
            None
        }
        Some(entry) => Some(entry.value.clone()),
        None => None,
    }
}

fn record_lookup(family: &'static str, hit: bool) {
    if hit {
        counter!(METRIC_HIT, "family" => family).increment(1);
    } else {
        counter!(METRIC_MISS, "family" => family).increment(1);
    }
}

#[cfg(test)]
mod tests {
    use time::OffsetDateTime;

    use crate::domain::entities::AuthorRef;

    use super::*;

    fn sample_blog(id: Uuid) -> BlogRecord {
        BlogRecord {
            id,
            title: "Test Blog".to_string(),
            subtitle: None,
            content: "body".to_string(),
            thumbnail: "/thumb.png".to_string(),
            reading_time: "3 min".to_string(),
            created_at: OffsetDateTime::now_utc(),
            author: AuthorRef {
                id: Uuid::new_v4(),
                name: "Author".to_string(),
                avatar: "/avatar.png".to_string(),
            },
            tags: vec!["rust".to_string()],
            upvote_count: 0,
            comment_count: 0,
        }
    }

    #[test]
    fn blog_cache_roundtrip() {
        let cache = ObjectCache::new(&CacheConfig::default());
        let id = Uuid::new_v4();

        assert!(cache.get_blog(id).is_none());

        cache.set_blog(sample_blog(id));
        assert_eq!(cache.get_blog(id).expect("cached blog").id, id);

        cache.invalidate_blog(id);
        assert!(cache.get_blog(id).is_none());
    }

    #[test]
    fn blog_lru_eviction() {
        let config = CacheConfig {
            blog_limit: 2,
            ..Default::default()
        };
        let cache = ObjectCache::new(&config);

        let id1 = Uuid::new_v4();
        let id2 = Uuid::new_v4();
        let id3 = Uuid::new_v4();

        cache.set_blog(sample_blog(id1));
        cache.set_blog(sample_blog(id2));
        cache.set_blog(sample_blog(id3));

        assert!(cache.get_blog(id1).is_none()); // Evicted
        assert!(cache.get_blog(id2).is_some());
        assert!(cache.get_blog(id3).is_some());
    }

    #[test]
    fn replies_for_blog_invalidation_drops_all_parents() {
        let cache = ObjectCache::new(&CacheConfig::default());
        let blog = Uuid::new_v4();
        let other_blog = Uuid::new_v4();
        let parent1 = Uuid::new_v4();
        let parent2 = Uuid::new_v4();

        cache.set_replies(ReplyKey::new(blog, parent1), Vec::new());
        cache.set_replies(ReplyKey::new(blog, parent2), Vec::new());
        cache.set_replies(ReplyKey::new(other_blog, parent1), Vec::new());

        cache.invalidate_replies_for_blog(blog);

        assert!(cache.get_replies(ReplyKey::new(blog, parent1)).is_none());
        assert!(cache.get_replies(ReplyKey::new(blog, parent2)).is_none());
        assert!(
            cache
                .get_replies(ReplyKey::new(other_blog, parent1))
                .is_some()
        );
    }

    #[test]
    fn ttl_entries_expire() {
        let config = CacheConfig {
            trending_tags_ttl_secs: 0,
            stats_ttl_secs: 0,
            ..Default::default()
        };
        let cache = ObjectCache::new(&config);

        cache.set_trending_tags(vec![TagCount {
            tag: "rust".to_string(),
            count: 3,
        }]);
        cache.set_stats(PlatformStats {
            total_blogs: 1,
            total_words: 100,
            active_authors: 1,
        });

        // Zero TTL means the deadline has already passed on read.
        assert!(cache.get_trending_tags().is_none());
        assert!(cache.get_stats().is_none());
    }

    #[test]
    fn untimed_entries_do_not_expire() {
        let cache = ObjectCache::new(&CacheConfig::default());
        let blog_id = Uuid::new_v4();
        cache.set_comments(blog_id, Vec::new());
        assert!(cache.get_comments(blog_id).is_some());
    }

    #[test]
    fn disabled_cache_never_stores() {
        let config = CacheConfig {
            enabled: false,
            ..Default::default()
        };
        let cache = ObjectCache::new(&config);
        let id = Uuid::new_v4();

        cache.set_blog(sample_blog(id));
        cache.set_stats(PlatformStats {
            total_blogs: 1,
            total_words: 1,
            active_authors: 1,
        });

        assert!(cache.get_blog(id).is_none());
        assert!(cache.get_stats().is_none());
    }

    #[test]
    fn clear_empties_every_family() {
        let cache = ObjectCache::new(&CacheConfig::default());
        let id = Uuid::new_v4();

        cache.set_blog(sample_blog(id));
        cache.set_comments(id, Vec::new());
        cache.set_trending_tags(Vec::new());

        cache.clear();

        assert!(cache.get_blog(id).is_none());
        assert!(cache.get_comments(id).is_none());
        assert!(cache.get_trending_tags().is_none());
    }
}
