//! Read-through content lookups.
//!
//! Single blogs, comment lists and reply lists are served from the object
//! cache when present. On a miss the repositories are consulted and the
//! result is stored; these families carry no TTL and are dropped by the
//! invalidator when a write touches them.

use std::sync::Arc;

use tracing::instrument;
use uuid::Uuid;

use crate::application::error::AppError;
use crate::application::repos::{BlogsRepo, CommentsRepo};
use crate::cache::{ObjectCache, ReplyKey};
use crate::domain::entities::{BlogRecord, CommentRecord};

pub struct ContentService {
    blogs: Arc<dyn BlogsRepo>,
    comments: Arc<dyn CommentsRepo>,
    cache: Arc<ObjectCache>,
}

impl ContentService {
    pub fn new(
        blogs: Arc<dyn BlogsRepo>,
        comments: Arc<dyn CommentsRepo>,
        cache: Arc<ObjectCache>,
    ) -> Self {
        Self {
            blogs,
            comments,
            cache,
        }
    }

    /// A single blog with derived counters. Absent blogs are never cached,
    /// so a later create is visible immediately.
    #[instrument(skip(self))]
    pub async fn get_blog(&self, id: Uuid) -> Result<BlogRecord, AppError> {
        if let Some(blog) = self.cache.get_blog(id) {
            return Ok(blog);
        }

        let blog = self.blogs.find_by_id(id).await?.ok_or(AppError::NotFound)?;
        self.cache.set_blog(blog.clone());
        Ok(blog)
    }

    /// Top-level comments for a blog, newest first, each with its reply
    /// count.
    #[instrument(skip(self))]
    pub async fn get_comments(&self, blog_id: Uuid) -> Result<Vec<CommentRecord>, AppError> {
        if let Some(comments) = self.cache.get_comments(blog_id) {
            return Ok(comments);
        }

        let comments = self.comments.list_top_level(blog_id).await?;
        self.cache.set_comments(blog_id, comments.clone());
        Ok(comments)
    }

    /// Replies under one top-level comment, newest first.
    #[instrument(skip(self))]
    pub async fn get_replies(
        &self,
        blog_id: Uuid,
        parent_id: Uuid,
    ) -> Result<Vec<CommentRecord>, AppError> {
        let key = ReplyKey::new(blog_id, parent_id);
        if let Some(replies) = self.cache.get_replies(key) {
            return Ok(replies);
        }

        let replies = self.comments.list_replies(blog_id, parent_id).await?;
        self.cache.set_replies(key, replies.clone());
        Ok(replies)
    }
}
