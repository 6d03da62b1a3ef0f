use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::repos::{EngagementRepo, OffsetPage, RepoError},
    domain::entities::{AuthorRef, BlogRecord, BookmarkedBlogRecord, EngagementKind},
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct BookmarkedRow {
    bookmarked_at: OffsetDateTime,
    id: Uuid,
    title: String,
    subtitle: Option<String>,
    content: String,
    thumbnail: String,
    reading_time: String,
    created_at: OffsetDateTime,
    author_id: Uuid,
    author_name: String,
    author_avatar: String,
    tags: Vec<String>,
    upvote_count: i64,
    comment_count: i64,
}

impl BookmarkedRow {
    fn into_record(self) -> Result<BookmarkedBlogRecord, RepoError> {
        Ok(BookmarkedBlogRecord {
            bookmarked_at: self.bookmarked_at,
            blog: BlogRecord {
                id: self.id,
                title: self.title,
                subtitle: self.subtitle,
                content: self.content,
                thumbnail: self.thumbnail,
                reading_time: self.reading_time,
                created_at: self.created_at,
                author: AuthorRef {
                    id: self.author_id,
                    name: self.author_name,
                    avatar: self.author_avatar,
                },
                tags: self.tags,
                upvote_count: PostgresRepositories::convert_count(self.upvote_count)?,
                comment_count: PostgresRepositories::convert_count(self.comment_count)?,
            },
        })
    }
}

#[async_trait]
impl EngagementRepo for PostgresRepositories {
    async fn exists(
        &self,
        kind: EngagementKind,
        user_id: Uuid,
        blog_id: Uuid,
    ) -> Result<bool, RepoError> {
        // Table names come from a closed enum, never from input.
        let sql = format!(
            "SELECT EXISTS(SELECT 1 FROM {} WHERE user_id = $1 AND blog_id = $2)",
            kind.table()
        );
        sqlx::query_scalar(&sql)
            .bind(user_id)
            .bind(blog_id)
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)
    }

    async fn insert(
        &self,
        kind: EngagementKind,
        user_id: Uuid,
        blog_id: Uuid,
    ) -> Result<(), RepoError> {
        let sql = format!(
            "INSERT INTO {} (user_id, blog_id) VALUES ($1, $2)",
            kind.table()
        );
        sqlx::query(&sql)
            .bind(user_id)
            .bind(blog_id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn delete(
        &self,
        kind: EngagementKind,
        user_id: Uuid,
        blog_id: Uuid,
    ) -> Result<bool, RepoError> {
        let sql = format!(
            "DELETE FROM {} WHERE user_id = $1 AND blog_id = $2",
            kind.table()
        );
        let result = sqlx::query(&sql)
            .bind(user_id)
            .bind(blog_id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_bookmarked(
        &self,
        user_id: Uuid,
        page: OffsetPage,
    ) -> Result<Vec<BookmarkedBlogRecord>, RepoError> {
        let mut qb: QueryBuilder<'_, Postgres> = QueryBuilder::new(
            "SELECT \
             bm.created_at AS bookmarked_at, \
             b.id, b.title, b.subtitle, b.content, b.thumbnail, b.reading_time, b.created_at, \
             u.id AS author_id, u.name AS author_name, u.avatar AS author_avatar, \
             COALESCE(array_agg(bt.tag) FILTER (WHERE bt.tag IS NOT NULL), '{}') AS tags, \
             (SELECT COUNT(*) FROM upvotes uv WHERE uv.blog_id = b.id) AS upvote_count, \
             (SELECT COUNT(*) FROM comments c WHERE c.blog_id = b.id) AS comment_count \
             FROM bookmarks bm \
             INNER JOIN blogs b ON b.id = bm.blog_id \
             INNER JOIN users u ON u.id = b.author_id \
             LEFT JOIN blog_tags bt ON bt.blog_id = b.id \
             WHERE bm.user_id = ",
        );
        qb.push_bind(user_id);
        qb.push(" GROUP BY bm.created_at, b.id, u.id ORDER BY bm.created_at DESC OFFSET ");
        qb.push_bind(i64::from(page.offset));
        qb.push(" LIMIT ");
        qb.push_bind(i64::from(page.limit));

        let rows: Vec<BookmarkedRow> = qb
            .build_query_as()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        rows.into_iter().map(BookmarkedRow::into_record).collect()
    }
}
