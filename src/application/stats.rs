//! Platform aggregates: trending tags and site-wide statistics.
//!
//! Both are expensive full-table aggregates served read-through from the
//! TTL'd singleton cache slots. Writes additionally invalidate them when a
//! blog is created or deleted, so the TTL only bounds staleness from
//! engagement churn.

use std::sync::Arc;

use tracing::instrument;

use crate::application::error::AppError;
use crate::application::repos::StatsRepo;
use crate::cache::ObjectCache;
use crate::domain::entities::{PlatformStats, TagCount};

/// Tags fetched and cached per aggregate run; callers slice from this.
const TRENDING_TAG_POOL: u32 = 20;

pub struct StatsService {
    stats: Arc<dyn StatsRepo>,
    cache: Arc<ObjectCache>,
}

impl StatsService {
    pub fn new(stats: Arc<dyn StatsRepo>, cache: Arc<ObjectCache>) -> Self {
        Self { stats, cache }
    }

    #[instrument(skip(self))]
    pub async fn platform_stats(&self) -> Result<PlatformStats, AppError> {
        if let Some(stats) = self.cache.get_stats() {
            return Ok(stats);
        }

        let stats = self.stats.platform_stats().await?;
        self.cache.set_stats(stats.clone());
        Ok(stats)
    }

    /// The `limit` most used tags, descending by count. One pooled list is
    /// cached and sliced, so every limit up to the pool shares an entry.
    #[instrument(skip(self))]
    pub async fn trending_tags(&self, limit: u32) -> Result<Vec<TagCount>, AppError> {
        let limit = limit.clamp(1, TRENDING_TAG_POOL) as usize;

        if let Some(mut tags) = self.cache.get_trending_tags() {
            tags.truncate(limit);
            return Ok(tags);
        }

        let mut tags = self.stats.trending_tags(TRENDING_TAG_POOL).await?;
        self.cache.set_trending_tags(tags.clone());
        tags.truncate(limit);
        Ok(tags)
    }
}
