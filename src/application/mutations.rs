//! Write paths: blogs, comments, engagement edges and follows.
//!
//! Every mutation authorizes the caller against the claimed user, writes
//! through the repositories, and fires the matching cache trigger before
//! returning, so a read that follows a successful write never sees the
//! pre-write cached value.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::application::error::AppError;
use crate::application::repos::{
    BlogsRepo, BlogsWriteRepo, CommentsRepo, CommentsWriteRepo, CreateBlogParams,
    CreateCommentParams, EngagementRepo, FollowsRepo, RepoError, UsersRepo,
};
use crate::cache::CacheTrigger;
use crate::domain::entities::{BlogRecord, CommentRecord, EngagementKind, UserRecord};
use crate::infra::auth::TokenVerifier;

const MAX_TITLE_LEN: usize = 200;
const MAX_COMMENT_LEN: usize = 5_000;
const MAX_TAGS: usize = 10;

/// Result of a toggle: the edge now exists, or it no longer does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToggleOutcome {
    Added,
    Removed,
}

impl ToggleOutcome {
    pub fn added(self) -> bool {
        matches!(self, ToggleOutcome::Added)
    }
}

/// Caller-supplied fields for a new blog, before validation.
#[derive(Debug, Clone)]
pub struct NewBlog {
    pub title: String,
    pub subtitle: Option<String>,
    pub content: String,
    pub thumbnail: String,
    pub reading_time: String,
    pub tags: Vec<String>,
}

pub struct MutationService {
    blogs: Arc<dyn BlogsRepo>,
    blogs_write: Arc<dyn BlogsWriteRepo>,
    comments: Arc<dyn CommentsRepo>,
    comments_write: Arc<dyn CommentsWriteRepo>,
    engagement: Arc<dyn EngagementRepo>,
    follows: Arc<dyn FollowsRepo>,
    users: Arc<dyn UsersRepo>,
    verifier: Arc<dyn TokenVerifier>,
    trigger: Arc<CacheTrigger>,
}

impl MutationService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        blogs: Arc<dyn BlogsRepo>,
        blogs_write: Arc<dyn BlogsWriteRepo>,
        comments: Arc<dyn CommentsRepo>,
        comments_write: Arc<dyn CommentsWriteRepo>,
        engagement: Arc<dyn EngagementRepo>,
        follows: Arc<dyn FollowsRepo>,
        users: Arc<dyn UsersRepo>,
        verifier: Arc<dyn TokenVerifier>,
        trigger: Arc<CacheTrigger>,
    ) -> Self {
        Self {
            blogs,
            blogs_write,
            comments,
            comments_write,
            engagement,
            follows,
            users,
            verifier,
            trigger,
        }
    }

    /// Verify the token and check its subject matches the claimed user.
    async fn authorize(&self, token: &str, user_id: Uuid) -> Result<UserRecord, AppError> {
        let claims = self.verifier.verify(token).await?;
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(AppError::Unauthorized)?;
        if user.social_id != claims.subject_id {
            warn!(%user_id, "token subject does not match claimed user");
            return Err(AppError::Unauthorized);
        }
        Ok(user)
    }

    #[instrument(skip(self, token, blog))]
    pub async fn create_blog(
        &self,
        token: &str,
        author_id: Uuid,
        blog: NewBlog,
    ) -> Result<BlogRecord, AppError> {
        self.authorize(token, author_id).await?;

        let title = required_trimmed(&blog.title, "title")?;
        if title.len() > MAX_TITLE_LEN {
            return Err(AppError::validation("title is too long"));
        }
        let content = required_trimmed(&blog.content, "content")?;
        let thumbnail = required_trimmed(&blog.thumbnail, "thumbnail")?;
        let reading_time = required_trimmed(&blog.reading_time, "reading time")?;
        let tags = normalize_tags(blog.tags)?;

        let created = self
            .blogs_write
            .create_blog(CreateBlogParams {
                title,
                subtitle: blog.subtitle.and_then(non_empty_trimmed),
                content,
                thumbnail,
                reading_time,
                author_id,
                tags,
            })
            .await?;

        info!(blog_id = %created.id, %author_id, "blog created");
        self.trigger.blog_created(created.id);
        Ok(created)
    }

    /// Deletes a blog the caller owns and returns the deleted record, so
    /// callers can release attached resources. Comments, engagement edges
    /// and tags cascade at the storage layer.
    #[instrument(skip(self, token))]
    pub async fn delete_blog(
        &self,
        token: &str,
        user_id: Uuid,
        blog_id: Uuid,
    ) -> Result<BlogRecord, AppError> {
        self.authorize(token, user_id).await?;

        let blog = self
            .blogs
            .find_by_id(blog_id)
            .await?
            .ok_or(AppError::NotFound)?;
        if blog.author.id != user_id {
            return Err(AppError::Forbidden);
        }

        self.blogs_write.delete_blog(blog_id).await?;
        info!(%blog_id, %user_id, "blog deleted");
        self.trigger.blog_deleted(blog_id);
        Ok(blog)
    }

    #[instrument(skip(self, token, content))]
    pub async fn add_comment(
        &self,
        token: &str,
        user_id: Uuid,
        blog_id: Uuid,
        content: &str,
    ) -> Result<CommentRecord, AppError> {
        self.authorize(token, user_id).await?;
        let content = validated_comment_body(content)?;
        self.ensure_blog_exists(blog_id).await?;

        let comment = self
            .comments_write
            .create_comment(CreateCommentParams {
                content,
                user_id,
                blog_id,
                parent_id: None,
            })
            .await?;

        self.trigger.comment_added(blog_id);
        Ok(comment)
    }

    /// Adds a reply under a top-level comment. The parent must belong to
    /// the same blog and must itself be top-level; nesting is one level.
    #[instrument(skip(self, token, content))]
    pub async fn add_reply(
        &self,
        token: &str,
        user_id: Uuid,
        blog_id: Uuid,
        parent_id: Uuid,
        content: &str,
    ) -> Result<CommentRecord, AppError> {
        self.authorize(token, user_id).await?;
        let content = validated_comment_body(content)?;

        let parent = self
            .comments
            .find_comment(parent_id)
            .await?
            .ok_or(AppError::NotFound)?;
        if parent.blog_id != blog_id {
            return Err(AppError::validation(
                "parent comment belongs to a different blog",
            ));
        }
        if parent.parent_id.is_some() {
            return Err(AppError::validation("replies cannot be nested"));
        }

        let reply = self
            .comments_write
            .create_comment(CreateCommentParams {
                content,
                user_id,
                blog_id,
                parent_id: Some(parent_id),
            })
            .await?;

        self.trigger.reply_added(blog_id, parent_id);
        Ok(reply)
    }

    #[instrument(skip(self, token))]
    pub async fn toggle_upvote(
        &self,
        token: &str,
        user_id: Uuid,
        blog_id: Uuid,
    ) -> Result<ToggleOutcome, AppError> {
        let outcome = self
            .toggle_engagement(token, EngagementKind::Upvote, user_id, blog_id)
            .await?;
        self.trigger.upvote_toggled(blog_id);
        Ok(outcome)
    }

    #[instrument(skip(self, token))]
    pub async fn toggle_bookmark(
        &self,
        token: &str,
        user_id: Uuid,
        blog_id: Uuid,
    ) -> Result<ToggleOutcome, AppError> {
        let outcome = self
            .toggle_engagement(token, EngagementKind::Bookmark, user_id, blog_id)
            .await?;
        self.trigger.bookmark_toggled(blog_id);
        Ok(outcome)
    }

    async fn toggle_engagement(
        &self,
        token: &str,
        kind: EngagementKind,
        user_id: Uuid,
        blog_id: Uuid,
    ) -> Result<ToggleOutcome, AppError> {
        self.authorize(token, user_id).await?;
        self.ensure_blog_exists(blog_id).await?;

        if self.engagement.exists(kind, user_id, blog_id).await? {
            // A concurrent toggle may have removed the edge first; either
            // way it is gone, which is what the caller asked for.
            self.engagement.delete(kind, user_id, blog_id).await?;
            return Ok(ToggleOutcome::Removed);
        }

        match self.engagement.insert(kind, user_id, blog_id).await {
            Ok(()) => Ok(ToggleOutcome::Added),
            // Lost a race with an identical toggle: the edge exists, so the
            // intended end state holds.
            Err(RepoError::Duplicate { .. }) => {
                info!(?kind, %user_id, %blog_id, "duplicate toggle resolved as no-op");
                Ok(ToggleOutcome::Added)
            }
            Err(other) => Err(other.into()),
        }
    }

    /// Toggles `user_id` following `author_id`. Self-follows are rejected.
    /// No cache trigger: no cached family embeds follow state.
    #[instrument(skip(self, token))]
    pub async fn toggle_follow(
        &self,
        token: &str,
        user_id: Uuid,
        author_id: Uuid,
    ) -> Result<ToggleOutcome, AppError> {
        self.authorize(token, user_id).await?;
        if user_id == author_id {
            return Err(AppError::validation("users cannot follow themselves"));
        }
        self.users
            .find_by_id(author_id)
            .await?
            .ok_or(AppError::NotFound)?;

        if self.follows.is_following(user_id, author_id).await? {
            self.follows.delete(user_id, author_id).await?;
            return Ok(ToggleOutcome::Removed);
        }

        match self.follows.insert(user_id, author_id).await {
            Ok(()) => Ok(ToggleOutcome::Added),
            Err(RepoError::Duplicate { .. }) => Ok(ToggleOutcome::Added),
            Err(other) => Err(other.into()),
        }
    }

    pub async fn has_upvoted(&self, user_id: Uuid, blog_id: Uuid) -> Result<bool, AppError> {
        Ok(self
            .engagement
            .exists(EngagementKind::Upvote, user_id, blog_id)
            .await?)
    }

    pub async fn has_bookmarked(&self, user_id: Uuid, blog_id: Uuid) -> Result<bool, AppError> {
        Ok(self
            .engagement
            .exists(EngagementKind::Bookmark, user_id, blog_id)
            .await?)
    }

    pub async fn is_following(&self, user_id: Uuid, author_id: Uuid) -> Result<bool, AppError> {
        Ok(self.follows.is_following(user_id, author_id).await?)
    }

    async fn ensure_blog_exists(&self, blog_id: Uuid) -> Result<(), AppError> {
        self.blogs
            .find_by_id(blog_id)
            .await?
            .ok_or(AppError::NotFound)?;
        Ok(())
    }
}

fn required_trimmed(value: &str, field: &str) -> Result<String, AppError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::validation(format!("{field} must not be empty")));
    }
    Ok(trimmed.to_string())
}

fn non_empty_trimmed(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn validated_comment_body(content: &str) -> Result<String, AppError> {
    let content = required_trimmed(content, "comment")?;
    if content.len() > MAX_COMMENT_LEN {
        return Err(AppError::validation("comment is too long"));
    }
    Ok(content)
}

/// Trim tags, drop blanks, deduplicate preserving first occurrence.
fn normalize_tags(tags: Vec<String>) -> Result<Vec<String>, AppError> {
    let mut seen = std::collections::HashSet::new();
    let normalized: Vec<String> = tags
        .into_iter()
        .filter_map(non_empty_trimmed)
        .filter(|tag| seen.insert(tag.to_lowercase()))
        .collect();
    if normalized.len() > MAX_TAGS {
        return Err(AppError::validation("too many tags"));
    }
    Ok(normalized)
}
