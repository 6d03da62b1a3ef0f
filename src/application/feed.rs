//! Feed assembly and ranking.
//!
//! Feeds fetch a bounded window of recent rows from storage, score them in
//! memory against a single clock, and return the top slice. Ranking never
//! reaches beyond the fetched window, so an old post that has aged out of
//! the window cannot re-enter a feed no matter its score. Feed pages are
//! not cached; the per-blog counters they embed change too often.

use std::cmp::Ordering;
use std::sync::Arc;

use serde::Serialize;
use time::OffsetDateTime;
use tracing::instrument;
use uuid::Uuid;

use crate::application::error::AppError;
use crate::application::repos::{BlogsRepo, EngagementRepo, FollowsRepo, OffsetPage};
use crate::domain::entities::{BlogRecord, BookmarkedBlogRecord};
use crate::domain::scoring::{engagement_score, trending_score};

/// Storage window multiplier: fetch twice the page size, rank, keep a page.
const WINDOW_FACTOR: u32 = 2;

/// Per-source candidate pool for recommendations.
const RECOMMENDATION_POOL: u32 = 10;

/// Recommendations returned per source.
const RECOMMENDATION_TOP: usize = 3;

const MAX_PAGE_LIMIT: u32 = 50;

/// A blog together with the trending score it was ranked by.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredBlog {
    pub score: f64,
    #[serde(flatten)]
    pub blog: BlogRecord,
}

/// Related reading for a single blog: recent work by the same author and
/// recent blogs sharing a tag, each ranked by raw engagement.
#[derive(Debug, Clone, Serialize)]
pub struct Recommendations {
    pub from_author: Vec<BlogRecord>,
    pub by_tags: Vec<BlogRecord>,
}

pub struct FeedService {
    blogs: Arc<dyn BlogsRepo>,
    follows: Arc<dyn FollowsRepo>,
    engagement: Arc<dyn EngagementRepo>,
}

impl FeedService {
    pub fn new(
        blogs: Arc<dyn BlogsRepo>,
        follows: Arc<dyn FollowsRepo>,
        engagement: Arc<dyn EngagementRepo>,
    ) -> Self {
        Self {
            blogs,
            follows,
            engagement,
        }
    }

    /// Trending feed: a window of recent blogs re-ranked by trending score.
    #[instrument(skip(self))]
    pub async fn fetch_trending(&self, page: u32, limit: u32) -> Result<Vec<ScoredBlog>, AppError> {
        let limit = clamp_limit(limit)?;
        let window = self.blogs.list_recent(window_for(page, limit)).await?;
        Ok(rank_window(window, limit))
    }

    /// Trending feed restricted to blogs carrying `tag`.
    #[instrument(skip(self))]
    pub async fn fetch_by_tag(
        &self,
        tag: &str,
        page: u32,
        limit: u32,
    ) -> Result<Vec<ScoredBlog>, AppError> {
        let limit = clamp_limit(limit)?;
        let tag = tag.trim();
        if tag.is_empty() {
            return Err(AppError::validation("tag must not be empty"));
        }
        let window = self.blogs.list_by_tag(tag, window_for(page, limit)).await?;
        Ok(rank_window(window, limit))
    }

    /// Trending feed over the authors `user_id` follows. Following nobody
    /// yields an empty feed without touching blog storage.
    #[instrument(skip(self))]
    pub async fn fetch_followed(
        &self,
        user_id: Uuid,
        page: u32,
        limit: u32,
    ) -> Result<Vec<ScoredBlog>, AppError> {
        let limit = clamp_limit(limit)?;
        let authors = self.follows.followed_author_ids(user_id).await?;
        if authors.is_empty() {
            return Ok(Vec::new());
        }
        let window = self
            .blogs
            .list_by_authors(&authors, window_for(page, limit))
            .await?;
        Ok(rank_window(window, limit))
    }

    /// Bookmarked blogs, most recently bookmarked first. Not ranked.
    #[instrument(skip(self))]
    pub async fn fetch_bookmarked(
        &self,
        user_id: Uuid,
        page: u32,
        limit: u32,
    ) -> Result<Vec<BookmarkedBlogRecord>, AppError> {
        let limit = clamp_limit(limit)?;
        let records = self
            .engagement
            .list_bookmarked(user_id, OffsetPage::for_page(page, limit))
            .await?;
        Ok(records)
    }

    /// Related reading for `blog_id`: ten recent candidates per source,
    /// ranked by raw engagement, top three each, the source blog excluded.
    #[instrument(skip(self))]
    pub async fn fetch_recommendations(&self, blog_id: Uuid) -> Result<Recommendations, AppError> {
        let source = self
            .blogs
            .find_by_id(blog_id)
            .await?
            .ok_or(AppError::NotFound)?;

        let author_pool =
            self.blogs
                .list_recent_by_author(source.author.id, blog_id, RECOMMENDATION_POOL);

        // No tags means no tag query at all.
        let (from_author, by_tags) = if source.tags.is_empty() {
            (author_pool.await?, Vec::new())
        } else {
            futures::try_join!(
                author_pool,
                self.blogs
                    .list_recent_sharing_tags(&source.tags, blog_id, RECOMMENDATION_POOL)
            )?
        };

        Ok(Recommendations {
            from_author: top_by_engagement(from_author),
            by_tags: top_by_engagement(by_tags),
        })
    }
}

fn clamp_limit(limit: u32) -> Result<u32, AppError> {
    if limit == 0 {
        return Err(AppError::validation("limit must be at least 1"));
    }
    Ok(limit.min(MAX_PAGE_LIMIT))
}

fn window_for(page: u32, limit: u32) -> OffsetPage {
    let window = limit * WINDOW_FACTOR;
    OffsetPage::for_page(page, window)
}

/// Score the window against one clock, stable-sort descending, keep a page.
/// Stability preserves the storage ordering (createdAt desc) for ties.
fn rank_window(window: Vec<BlogRecord>, limit: u32) -> Vec<ScoredBlog> {
    let now = OffsetDateTime::now_utc();
    let mut scored: Vec<ScoredBlog> = window
        .into_iter()
        .map(|blog| ScoredBlog {
            score: trending_score(blog.created_at, blog.comment_count, blog.upvote_count, now),
            blog,
        })
        .collect();
    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    scored.truncate(limit as usize);
    scored
}

fn top_by_engagement(mut candidates: Vec<BlogRecord>) -> Vec<BlogRecord> {
    // Stable sort keeps the recency ordering for equal engagement.
    candidates.sort_by_key(|blog| {
        std::cmp::Reverse(engagement_score(blog.comment_count, blog.upvote_count))
    });
    candidates.truncate(RECOMMENDATION_TOP);
    candidates
}

#[cfg(test)]
mod tests {
    use time::Duration;

    use crate::domain::entities::AuthorRef;

    use super::*;

    fn blog_with(created_at: OffsetDateTime, comments: u64, upvotes: u64) -> BlogRecord {
        BlogRecord {
            id: Uuid::new_v4(),
            title: "t".to_string(),
            subtitle: None,
            content: "c".to_string(),
            thumbnail: "/t.png".to_string(),
            reading_time: "1 min".to_string(),
            created_at,
            author: AuthorRef {
                id: Uuid::new_v4(),
                name: "a".to_string(),
                avatar: "/a.png".to_string(),
            },
            tags: Vec::new(),
            upvote_count: upvotes,
            comment_count: comments,
        }
    }

    #[test]
    fn rank_window_orders_by_score_desc() {
        let now = OffsetDateTime::now_utc();
        let quiet = blog_with(now - Duration::hours(1), 0, 1);
        let busy = blog_with(now - Duration::hours(1), 5, 10);
        let ranked = rank_window(vec![quiet.clone(), busy.clone()], 10);

        assert_eq!(ranked[0].blog.id, busy.id);
        assert_eq!(ranked[1].blog.id, quiet.id);
        assert!(ranked[0].score > ranked[1].score);
    }

    #[test]
    fn rank_window_truncates_to_limit() {
        let now = OffsetDateTime::now_utc();
        let window: Vec<BlogRecord> = (0..8)
            .map(|i| blog_with(now - Duration::hours(i), 1, 1))
            .collect();
        assert_eq!(rank_window(window, 4).len(), 4);
    }

    #[test]
    fn rank_window_keeps_storage_order_for_ties() {
        let now = OffsetDateTime::now_utc();
        // Identical age and engagement: scores tie exactly.
        let first = blog_with(now, 1, 1);
        let second = blog_with(now, 1, 1);
        let ranked = rank_window(vec![first.clone(), second.clone()], 10);
        assert_eq!(ranked[0].blog.id, first.id);
        assert_eq!(ranked[1].blog.id, second.id);
    }

    #[test]
    fn window_for_doubles_the_page_size() {
        assert_eq!(window_for(1, 5), OffsetPage::new(0, 10));
        assert_eq!(window_for(3, 5), OffsetPage::new(20, 10));
    }

    #[test]
    fn top_by_engagement_takes_three() {
        let now = OffsetDateTime::now_utc();
        let candidates: Vec<BlogRecord> =
            (0..6).map(|i| blog_with(now, i, i)).collect();
        let top = top_by_engagement(candidates);
        assert_eq!(top.len(), 3);
        assert_eq!(top[0].comment_count, 5);
        assert_eq!(top[2].comment_count, 3);
    }

    #[test]
    fn clamp_limit_rejects_zero_and_caps_large() {
        assert!(clamp_limit(0).is_err());
        assert_eq!(clamp_limit(10).expect("valid limit"), 10);
        assert_eq!(clamp_limit(500).expect("valid limit"), MAX_PAGE_LIMIT);
    }
}
