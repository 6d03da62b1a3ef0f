//! Cache trigger service.
//!
//! High-level API used by write paths: publish an invalidation event and
//! consume it synchronously, so affected entries are gone before the
//! mutation reports success to its caller.

use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use super::config::CacheConfig;
use super::events::{EventQueue, InvalidationKind};
use super::invalidator::CacheInvalidator;

pub struct CacheTrigger {
    config: CacheConfig,
    queue: Arc<EventQueue>,
    invalidator: Arc<CacheInvalidator>,
}

impl CacheTrigger {
    pub fn new(
        config: CacheConfig,
        queue: Arc<EventQueue>,
        invalidator: Arc<CacheInvalidator>,
    ) -> Self {
        Self {
            config,
            queue,
            invalidator,
        }
    }

    /// Publish an event and optionally consume immediately.
    ///
    /// Write paths always pass `consume_now = true`: stale entries must be
    /// deleted before the write reports success.
    pub fn trigger(&self, kind: InvalidationKind, consume_now: bool) {
        if !self.config.enabled {
            debug!(event_kind = ?kind, "Cache trigger skipped: cache disabled");
            return;
        }

        self.queue.publish(kind);

        if consume_now {
            self.invalidator.consume();
        }
    }

    pub fn blog_created(&self, blog_id: Uuid) {
        self.trigger(InvalidationKind::BlogCreated { blog_id }, true);
    }

    pub fn blog_deleted(&self, blog_id: Uuid) {
        self.trigger(InvalidationKind::BlogDeleted { blog_id }, true);
    }

    pub fn comment_added(&self, blog_id: Uuid) {
        self.trigger(InvalidationKind::CommentAdded { blog_id }, true);
    }

    pub fn reply_added(&self, blog_id: Uuid, parent_id: Uuid) {
        self.trigger(InvalidationKind::ReplyAdded { blog_id, parent_id }, true);
    }

    pub fn upvote_toggled(&self, blog_id: Uuid) {
        self.trigger(InvalidationKind::UpvoteToggled { blog_id }, true);
    }

    pub fn bookmark_toggled(&self, blog_id: Uuid) {
        self.trigger(InvalidationKind::BookmarkToggled { blog_id }, true);
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn queue(&self) -> &Arc<EventQueue> {
        &self.queue
    }

    pub fn invalidator(&self) -> &Arc<CacheInvalidator> {
        &self.invalidator
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::store::ObjectCache;

    fn create_trigger(enabled: bool) -> CacheTrigger {
        let config = CacheConfig {
            enabled,
            ..Default::default()
        };
        let store = Arc::new(ObjectCache::new(&config));
        let queue = Arc::new(EventQueue::new());
        let invalidator = Arc::new(CacheInvalidator::new(
            config.clone(),
            store,
            queue.clone(),
        ));
        CacheTrigger::new(config, queue, invalidator)
    }

    #[test]
    fn trigger_publishes_without_consuming_when_deferred() {
        let trigger = create_trigger(true);

        trigger.trigger(
            InvalidationKind::UpvoteToggled {
                blog_id: Uuid::nil(),
            },
            false,
        );

        assert_eq!(trigger.queue.len(), 1);
    }

    #[test]
    fn trigger_respects_disabled_config() {
        let trigger = create_trigger(false);

        trigger.upvote_toggled(Uuid::nil());

        assert!(trigger.queue.is_empty());
    }

    #[test]
    fn convenience_methods_consume_immediately() {
        let trigger = create_trigger(true);
        let blog = Uuid::nil();

        trigger.blog_created(blog);
        trigger.blog_deleted(blog);
        trigger.comment_added(blog);
        trigger.reply_added(blog, Uuid::new_v4());
        trigger.upvote_toggled(blog);
        trigger.bookmark_toggled(blog);

        assert!(trigger.queue.is_empty());
    }
}
