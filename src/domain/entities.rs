//! Entity records shared between the application services and the
//! persistence adapters.
//!
//! Records are plain owned structs: the repositories hydrate them from rows,
//! the cache clones them, and the HTTP layer serializes them. Engagement
//! counters (`upvote_count`, `comment_count`) are derived via `COUNT` at
//! query time, never stored.

use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

/// Author identity embedded in blog and comment records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorRef {
    pub id: Uuid,
    pub name: String,
    pub avatar: String,
}

/// A blog with its author and derived engagement counters.
#[derive(Debug, Clone, Serialize)]
pub struct BlogRecord {
    pub id: Uuid,
    pub title: String,
    pub subtitle: Option<String>,
    pub content: String,
    pub thumbnail: String,
    pub reading_time: String,
    pub created_at: OffsetDateTime,
    pub author: AuthorRef,
    /// Tag strings; order is irrelevant, storage is case-sensitive.
    pub tags: Vec<String>,
    pub upvote_count: u64,
    pub comment_count: u64,
}

/// A comment or reply. `parent_id` is `None` for top-level comments; replies
/// carry the id of a top-level comment on the same blog (one materialized
/// level of nesting).
#[derive(Debug, Clone, Serialize)]
pub struct CommentRecord {
    pub id: Uuid,
    pub content: String,
    pub created_at: OffsetDateTime,
    pub blog_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub user: AuthorRef,
    pub reply_count: u64,
}

/// Composite-unique engagement edges: existence is the whole state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngagementKind {
    Upvote,
    Bookmark,
}

impl EngagementKind {
    pub fn table(self) -> &'static str {
        match self {
            EngagementKind::Upvote => "upvotes",
            EngagementKind::Bookmark => "bookmarks",
        }
    }
}

/// A bookmark joined with its blog, ordered by bookmark time.
#[derive(Debug, Clone, Serialize)]
pub struct BookmarkedBlogRecord {
    pub bookmarked_at: OffsetDateTime,
    pub blog: BlogRecord,
}

/// A platform user.
#[derive(Debug, Clone, Serialize)]
pub struct UserRecord {
    pub id: Uuid,
    pub social_id: String,
    pub name: String,
    pub email: String,
    pub avatar: String,
    pub bio: Option<String>,
    pub github: Option<String>,
    pub twitter: Option<String>,
    pub linkedin: Option<String>,
    pub created_at: OffsetDateTime,
}

/// A user profile with follow counts and recent work.
#[derive(Debug, Clone, Serialize)]
pub struct ProfileRecord {
    pub user: UserRecord,
    pub follower_count: u64,
    pub following_count: u64,
    pub recent_blogs: Vec<BlogRecord>,
}

/// Tag usage count for the trending-tags sidebar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagCount {
    pub tag: String,
    pub count: u64,
}

/// Aggregate platform statistics, cached with a TTL.
#[derive(Debug, Clone, Serialize)]
pub struct PlatformStats {
    pub total_blogs: u64,
    pub total_words: u64,
    pub active_authors: u64,
}
