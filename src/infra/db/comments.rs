use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::repos::{
        CommentsRepo, CommentsWriteRepo, CreateCommentParams, RepoError,
    },
    domain::entities::{AuthorRef, CommentRecord},
};

use super::{PostgresRepositories, map_sqlx_error};

const COMMENT_SELECT: &str = "SELECT \
    c.id, c.content, c.created_at, c.blog_id, c.parent_id, \
    u.id AS user_id, u.name AS user_name, u.avatar AS user_avatar, \
    (SELECT COUNT(*) FROM comments r WHERE r.parent_id = c.id) AS reply_count \
    FROM comments c \
    INNER JOIN users u ON u.id = c.user_id";

#[derive(sqlx::FromRow)]
struct CommentRow {
    id: Uuid,
    content: String,
    created_at: OffsetDateTime,
    blog_id: Uuid,
    parent_id: Option<Uuid>,
    user_id: Uuid,
    user_name: String,
    user_avatar: String,
    reply_count: i64,
}

impl CommentRow {
    fn into_record(self) -> Result<CommentRecord, RepoError> {
        Ok(CommentRecord {
            id: self.id,
            content: self.content,
            created_at: self.created_at,
            blog_id: self.blog_id,
            parent_id: self.parent_id,
            user: AuthorRef {
                id: self.user_id,
                name: self.user_name,
                avatar: self.user_avatar,
            },
            reply_count: PostgresRepositories::convert_count(self.reply_count)?,
        })
    }
}

#[async_trait]
impl CommentsRepo for PostgresRepositories {
    async fn list_top_level(&self, blog_id: Uuid) -> Result<Vec<CommentRecord>, RepoError> {
        let rows: Vec<CommentRow> = sqlx::query_as(&format!(
            "{COMMENT_SELECT} WHERE c.blog_id = $1 AND c.parent_id IS NULL \
             ORDER BY c.created_at DESC"
        ))
        .bind(blog_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(CommentRow::into_record).collect()
    }

    async fn list_replies(
        &self,
        blog_id: Uuid,
        parent_id: Uuid,
    ) -> Result<Vec<CommentRecord>, RepoError> {
        let rows: Vec<CommentRow> = sqlx::query_as(&format!(
            "{COMMENT_SELECT} WHERE c.blog_id = $1 AND c.parent_id = $2 \
             ORDER BY c.created_at DESC"
        ))
        .bind(blog_id)
        .bind(parent_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(CommentRow::into_record).collect()
    }

    async fn find_comment(&self, id: Uuid) -> Result<Option<CommentRecord>, RepoError> {
        let row: Option<CommentRow> =
            sqlx::query_as(&format!("{COMMENT_SELECT} WHERE c.id = $1"))
                .bind(id)
                .fetch_optional(self.pool())
                .await
                .map_err(map_sqlx_error)?;

        row.map(CommentRow::into_record).transpose()
    }
}

#[async_trait]
impl CommentsWriteRepo for PostgresRepositories {
    async fn create_comment(
        &self,
        params: CreateCommentParams,
    ) -> Result<CommentRecord, RepoError> {
        let id: Uuid = sqlx::query_scalar(
            "INSERT INTO comments (content, blog_id, user_id, parent_id) \
             VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(&params.content)
        .bind(params.blog_id)
        .bind(params.user_id)
        .bind(params.parent_id)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        self.find_comment(id)
            .await?
            .ok_or_else(|| RepoError::from_persistence("created comment vanished before readback"))
    }
}
