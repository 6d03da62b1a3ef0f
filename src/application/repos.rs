//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::entities::{
    BlogRecord, BookmarkedBlogRecord, CommentRecord, EngagementKind, PlatformStats, ProfileRecord,
    TagCount, UserRecord,
};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }

    pub fn duplicate(constraint: impl Into<String>) -> Self {
        Self::Duplicate {
            constraint: constraint.into(),
        }
    }
}

/// Storage-level offset/limit window. Feeds fetch their window here and
/// re-rank in memory; ranking never reaches beyond the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OffsetPage {
    pub offset: u32,
    pub limit: u32,
}

impl OffsetPage {
    pub fn new(offset: u32, limit: u32) -> Self {
        Self { offset, limit }
    }

    /// Window for a 1-based page of `limit` rows. Offsets saturate rather
    /// than wrap, so an absurd page number reads past the data and comes
    /// back empty.
    pub fn for_page(page: u32, limit: u32) -> Self {
        let page = page.max(1);
        Self {
            offset: (page - 1).saturating_mul(limit),
            limit,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CreateBlogParams {
    pub title: String,
    pub subtitle: Option<String>,
    pub content: String,
    pub thumbnail: String,
    pub reading_time: String,
    pub author_id: Uuid,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct CreateCommentParams {
    pub content: String,
    pub user_id: Uuid,
    pub blog_id: Uuid,
    pub parent_id: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct UpsertUserParams {
    pub social_id: String,
    pub name: String,
    pub email: String,
    pub avatar: String,
}

#[async_trait]
pub trait BlogsRepo: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<BlogRecord>, RepoError>;

    /// Most recent blogs, createdAt desc, windowed at the storage level.
    async fn list_recent(&self, page: OffsetPage) -> Result<Vec<BlogRecord>, RepoError>;

    /// Most recent blogs carrying `tag` (case-insensitive match).
    async fn list_by_tag(&self, tag: &str, page: OffsetPage)
    -> Result<Vec<BlogRecord>, RepoError>;

    /// Most recent blogs authored by any of `author_ids`.
    async fn list_by_authors(
        &self,
        author_ids: &[Uuid],
        page: OffsetPage,
    ) -> Result<Vec<BlogRecord>, RepoError>;

    /// Up to `limit` most recent blogs by `author_id`, excluding `exclude`.
    async fn list_recent_by_author(
        &self,
        author_id: Uuid,
        exclude: Uuid,
        limit: u32,
    ) -> Result<Vec<BlogRecord>, RepoError>;

    /// Up to `limit` most recent blogs sharing at least one of `tags`,
    /// excluding `exclude`.
    async fn list_recent_sharing_tags(
        &self,
        tags: &[String],
        exclude: Uuid,
        limit: u32,
    ) -> Result<Vec<BlogRecord>, RepoError>;

    /// Case-insensitive substring search over title, subtitle, author name
    /// and tag, createdAt desc.
    async fn search(
        &self,
        query: &str,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<BlogRecord>, RepoError>;
}

#[async_trait]
pub trait BlogsWriteRepo: Send + Sync {
    async fn create_blog(&self, params: CreateBlogParams) -> Result<BlogRecord, RepoError>;

    /// Deletes the blog; comments, engagement edges and tags cascade at the
    /// storage layer.
    async fn delete_blog(&self, id: Uuid) -> Result<(), RepoError>;
}

#[async_trait]
pub trait CommentsRepo: Send + Sync {
    /// Top-level comments for a blog, createdAt desc, each with its reply
    /// count and user.
    async fn list_top_level(&self, blog_id: Uuid) -> Result<Vec<CommentRecord>, RepoError>;

    /// Replies under one top-level comment, createdAt desc.
    async fn list_replies(
        &self,
        blog_id: Uuid,
        parent_id: Uuid,
    ) -> Result<Vec<CommentRecord>, RepoError>;

    async fn find_comment(&self, id: Uuid) -> Result<Option<CommentRecord>, RepoError>;
}

#[async_trait]
pub trait CommentsWriteRepo: Send + Sync {
    async fn create_comment(&self, params: CreateCommentParams)
    -> Result<CommentRecord, RepoError>;
}

/// Upvotes and bookmarks share one shape: a composite-unique
/// `(user_id, blog_id)` edge whose existence is the whole state.
#[async_trait]
pub trait EngagementRepo: Send + Sync {
    async fn exists(
        &self,
        kind: EngagementKind,
        user_id: Uuid,
        blog_id: Uuid,
    ) -> Result<bool, RepoError>;

    /// Inserts the edge. A concurrent duplicate surfaces as
    /// [`RepoError::Duplicate`] via the unique constraint.
    async fn insert(
        &self,
        kind: EngagementKind,
        user_id: Uuid,
        blog_id: Uuid,
    ) -> Result<(), RepoError>;

    /// Deletes the edge; returns whether a row was removed.
    async fn delete(
        &self,
        kind: EngagementKind,
        user_id: Uuid,
        blog_id: Uuid,
    ) -> Result<bool, RepoError>;

    /// Bookmarked blogs for a user, most recently bookmarked first.
    async fn list_bookmarked(
        &self,
        user_id: Uuid,
        page: OffsetPage,
    ) -> Result<Vec<BookmarkedBlogRecord>, RepoError>;
}

#[async_trait]
pub trait UsersRepo: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, RepoError>;

    async fn find_by_social_id(&self, social_id: &str) -> Result<Option<UserRecord>, RepoError>;

    /// Login path: find by social id or create.
    async fn upsert_on_login(&self, params: UpsertUserParams) -> Result<UserRecord, RepoError>;

    /// Case-insensitive substring match over user name.
    async fn search_authors(&self, query: &str, limit: u32)
    -> Result<Vec<UserRecord>, RepoError>;

    /// Profile with follow counts and the five most recent blogs.
    async fn profile(&self, id: Uuid) -> Result<Option<ProfileRecord>, RepoError>;
}

#[async_trait]
pub trait FollowsRepo: Send + Sync {
    async fn is_following(&self, follower: Uuid, followed: Uuid) -> Result<bool, RepoError>;

    async fn insert(&self, follower: Uuid, followed: Uuid) -> Result<(), RepoError>;

    async fn delete(&self, follower: Uuid, followed: Uuid) -> Result<bool, RepoError>;

    async fn followed_author_ids(&self, follower: Uuid) -> Result<Vec<Uuid>, RepoError>;
}

#[async_trait]
pub trait StatsRepo: Send + Sync {
    async fn platform_stats(&self) -> Result<PlatformStats, RepoError>;

    /// Tags by usage count, descending.
    async fn trending_tags(&self, limit: u32) -> Result<Vec<TagCount>, RepoError>;
}
