//! Cache invalidator.
//!
//! Drains invalidation events and deletes the affected cache entries.
//! There is deliberately no warm phase: repopulation is read-through, so a
//! deleted entry is rebuilt by the next read from the source of truth.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use metrics::histogram;
use tracing::{info, instrument};
use uuid::Uuid;

use super::config::CacheConfig;
use super::events::{CacheEvent, EventQueue, InvalidationKind};
use super::keys::ReplyKey;
use super::store::ObjectCache;

const METRIC_INVALIDATE_MS: &str = "pixie_cache_invalidate_ms";

/// Deduplicated set of deletions folded from a batch of events.
#[derive(Debug, Default)]
pub struct InvalidationPlan {
    pub blogs: HashSet<Uuid>,
    pub comment_lists: HashSet<Uuid>,
    pub reply_lists: HashSet<ReplyKey>,
    pub reply_lists_for_blogs: HashSet<Uuid>,
    pub clear_search: bool,
    pub trending_tags: bool,
    pub stats: bool,
}

impl InvalidationPlan {
    pub fn from_events(events: &[CacheEvent]) -> Self {
        let mut plan = Self::default();
        for event in events {
            match event.kind {
                InvalidationKind::BlogCreated { .. } => {
                    // A new blog shifts tag aggregates, stats and every
                    // search page; nothing keyed by the new id exists yet.
                    plan.trending_tags = true;
                    plan.stats = true;
                    plan.clear_search = true;
                }
                InvalidationKind::BlogDeleted { blog_id } => {
                    plan.blogs.insert(blog_id);
                    plan.comment_lists.insert(blog_id);
                    plan.reply_lists_for_blogs.insert(blog_id);
                    plan.trending_tags = true;
                    plan.stats = true;
                    plan.clear_search = true;
                }
                InvalidationKind::CommentAdded { blog_id } => {
                    // The blog entry carries a derived comment count.
                    plan.blogs.insert(blog_id);
                    plan.comment_lists.insert(blog_id);
                }
                InvalidationKind::ReplyAdded { blog_id, parent_id } => {
                    // The parent's reply count lives in the comment list.
                    plan.blogs.insert(blog_id);
                    plan.comment_lists.insert(blog_id);
                    plan.reply_lists.insert(ReplyKey::new(blog_id, parent_id));
                }
                InvalidationKind::UpvoteToggled { blog_id }
                | InvalidationKind::BookmarkToggled { blog_id } => {
                    plan.blogs.insert(blog_id);
                }
            }
        }
        plan
    }

    pub fn is_empty(&self) -> bool {
        self.blogs.is_empty()
            && self.comment_lists.is_empty()
            && self.reply_lists.is_empty()
            && self.reply_lists_for_blogs.is_empty()
            && !self.clear_search
            && !self.trending_tags
            && !self.stats
    }
}

/// Consumes events from the queue and deletes affected entries.
pub struct CacheInvalidator {
    config: CacheConfig,
    store: Arc<ObjectCache>,
    queue: Arc<EventQueue>,
}

impl CacheInvalidator {
    pub fn new(config: CacheConfig, store: Arc<ObjectCache>, queue: Arc<EventQueue>) -> Self {
        Self {
            config,
            store,
            queue,
        }
    }

    /// Consume pending events and execute the folded plan.
    ///
    /// Returns true if any events were processed.
    #[instrument(skip(self))]
    pub fn consume(&self) -> bool {
        let started_at = Instant::now();
        let events = self.queue.drain(self.config.consume_batch_limit);
        if events.is_empty() {
            return false;
        }

        let event_count = events.len();
        let plan = InvalidationPlan::from_events(&events);

        for blog_id in &plan.blogs {
            self.store.invalidate_blog(*blog_id);
        }
        for blog_id in &plan.comment_lists {
            self.store.invalidate_comments(*blog_id);
        }
        for key in &plan.reply_lists {
            self.store.invalidate_replies(*key);
        }
        for blog_id in &plan.reply_lists_for_blogs {
            self.store.invalidate_replies_for_blog(*blog_id);
        }
        if plan.clear_search {
            self.store.invalidate_all_search();
        }
        if plan.trending_tags {
            self.store.invalidate_trending_tags();
        }
        if plan.stats {
            self.store.invalidate_stats();
        }

        info!(
            event_count,
            blogs = plan.blogs.len(),
            comment_lists = plan.comment_lists.len(),
            reply_lists = plan.reply_lists.len(),
            cleared_search = plan.clear_search,
            "Cache invalidation complete"
        );

        histogram!(METRIC_INVALIDATE_MS).record(started_at.elapsed().as_secs_f64() * 1000.0);

        true
    }

    pub fn queue(&self) -> &Arc<EventQueue> {
        &self.queue
    }

    pub fn store(&self) -> &Arc<ObjectCache> {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_invalidator() -> CacheInvalidator {
        let config = CacheConfig::default();
        let store = Arc::new(ObjectCache::new(&config));
        let queue = Arc::new(EventQueue::new());
        CacheInvalidator::new(config, store, queue)
    }

    #[test]
    fn consume_empty_queue_returns_false() {
        let invalidator = create_invalidator();
        assert!(!invalidator.consume());
    }

    #[test]
    fn consume_respects_batch_limit() {
        let config = CacheConfig {
            consume_batch_limit: 2,
            ..Default::default()
        };
        let store = Arc::new(ObjectCache::new(&config));
        let queue = Arc::new(EventQueue::new());
        let invalidator = CacheInvalidator::new(config, store, queue);

        for _ in 0..5 {
            invalidator.queue.publish(InvalidationKind::UpvoteToggled {
                blog_id: Uuid::nil(),
            });
        }

        invalidator.consume();
        assert_eq!(invalidator.queue.len(), 3); // Only consumed 2
    }

    #[test]
    fn comment_event_drops_blog_and_comment_list() {
        let invalidator = create_invalidator();
        let blog_id = Uuid::new_v4();

        invalidator.store.set_comments(blog_id, Vec::new());
        invalidator
            .queue
            .publish(InvalidationKind::CommentAdded { blog_id });

        assert!(invalidator.consume());
        assert!(invalidator.store.get_comments(blog_id).is_none());
    }

    #[test]
    fn reply_event_drops_parent_reply_list() {
        let invalidator = create_invalidator();
        let blog_id = Uuid::new_v4();
        let parent_id = Uuid::new_v4();
        let key = ReplyKey::new(blog_id, parent_id);

        invalidator.store.set_replies(key, Vec::new());
        invalidator
            .queue
            .publish(InvalidationKind::ReplyAdded { blog_id, parent_id });

        invalidator.consume();
        assert!(invalidator.store.get_replies(key).is_none());
    }

    #[test]
    fn blog_created_clears_search_tags_and_stats() {
        let invalidator = create_invalidator();

        invalidator.store.set_trending_tags(Vec::new());
        invalidator.queue.publish(InvalidationKind::BlogCreated {
            blog_id: Uuid::new_v4(),
        });

        invalidator.consume();
        assert!(invalidator.store.get_trending_tags().is_none());
    }

    #[test]
    fn plan_deduplicates_repeated_toggles() {
        let blog_id = Uuid::new_v4();
        let events: Vec<CacheEvent> = (0..4)
            .map(|epoch| CacheEvent::new(InvalidationKind::UpvoteToggled { blog_id }, epoch))
            .collect();

        let plan = InvalidationPlan::from_events(&events);
        assert_eq!(plan.blogs.len(), 1);
        assert!(!plan.clear_search);
    }
}
