use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::repos::{
        BlogsRepo, BlogsWriteRepo, CreateBlogParams, OffsetPage, RepoError,
    },
    domain::entities::{AuthorRef, BlogRecord},
};

use super::{BLOG_GROUP_BY, PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
pub(super) struct BlogRow {
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

impl BlogRow {
    pub(super) fn into_record(self) -> Result<BlogRecord, RepoError> {
        Ok(BlogRecord {
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
        })
    }
}

fn push_recent_tail(qb: &mut QueryBuilder<'_, Postgres>, offset: u32, limit: u32) {
    qb.push(BLOG_GROUP_BY);
    qb.push(" ORDER BY b.created_at DESC OFFSET ");
    qb.push_bind(i64::from(offset));
    qb.push(" LIMIT ");
    qb.push_bind(i64::from(limit));
}

async fn fetch_blogs(
    repos: &PostgresRepositories,
    mut qb: QueryBuilder<'_, Postgres>,
) -> Result<Vec<BlogRecord>, RepoError> {
    let rows: Vec<BlogRow> = qb
        .build_query_as()
        .fetch_all(repos.pool())
        .await
        .map_err(map_sqlx_error)?;
    rows.into_iter().map(BlogRow::into_record).collect()
}

#[async_trait]
impl BlogsRepo for PostgresRepositories {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<BlogRecord>, RepoError> {
        let mut qb = Self::blog_query();
        qb.push(" WHERE b.id = ");
        qb.push_bind(id);
        qb.push(BLOG_GROUP_BY);

        let row: Option<BlogRow> = qb
            .build_query_as()
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        row.map(BlogRow::into_record).transpose()
    }

    async fn list_recent(&self, page: OffsetPage) -> Result<Vec<BlogRecord>, RepoError> {
        let mut qb = Self::blog_query();
        push_recent_tail(&mut qb, page.offset, page.limit);
        fetch_blogs(self, qb).await
    }

    async fn list_by_tag(
        &self,
        tag: &str,
        page: OffsetPage,
    ) -> Result<Vec<BlogRecord>, RepoError> {
        let mut qb = Self::blog_query();
        qb.push(
            " WHERE EXISTS (SELECT 1 FROM blog_tags ft WHERE ft.blog_id = b.id AND LOWER(ft.tag) = LOWER(",
        );
        qb.push_bind(tag.to_string());
        qb.push("))");
        push_recent_tail(&mut qb, page.offset, page.limit);
        fetch_blogs(self, qb).await
    }

    async fn list_by_authors(
        &self,
        author_ids: &[Uuid],
        page: OffsetPage,
    ) -> Result<Vec<BlogRecord>, RepoError> {
        let mut qb = Self::blog_query();
        qb.push(" WHERE b.author_id = ANY(");
        qb.push_bind(author_ids.to_vec());
        qb.push(")");
        push_recent_tail(&mut qb, page.offset, page.limit);
        fetch_blogs(self, qb).await
    }

    async fn list_recent_by_author(
        &self,
        author_id: Uuid,
        exclude: Uuid,
        limit: u32,
    ) -> Result<Vec<BlogRecord>, RepoError> {
        let mut qb = Self::blog_query();
        qb.push(" WHERE b.author_id = ");
        qb.push_bind(author_id);
        qb.push(" AND b.id <> ");
        qb.push_bind(exclude);
        push_recent_tail(&mut qb, 0, limit);
        fetch_blogs(self, qb).await
    }

    async fn list_recent_sharing_tags(
        &self,
        tags: &[String],
        exclude: Uuid,
        limit: u32,
    ) -> Result<Vec<BlogRecord>, RepoError> {
        let mut qb = Self::blog_query();
        qb.push(" WHERE b.id <> ");
        qb.push_bind(exclude);
        qb.push(" AND EXISTS (SELECT 1 FROM blog_tags st WHERE st.blog_id = b.id AND st.tag = ANY(");
        qb.push_bind(tags.to_vec());
        qb.push("))");
        push_recent_tail(&mut qb, 0, limit);
        fetch_blogs(self, qb).await
    }

    async fn search(
        &self,
        query: &str,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<BlogRecord>, RepoError> {
        let pattern = format!("%{query}%");
        let mut qb = Self::blog_query();
        qb.push(" WHERE (b.title ILIKE ");
        qb.push_bind(pattern.clone());
        qb.push(" OR b.subtitle ILIKE ");
        qb.push_bind(pattern.clone());
        qb.push(" OR u.name ILIKE ");
        qb.push_bind(pattern.clone());
        qb.push(" OR EXISTS (SELECT 1 FROM blog_tags qt WHERE qt.blog_id = b.id AND qt.tag ILIKE ");
        qb.push_bind(pattern);
        qb.push("))");
        push_recent_tail(&mut qb, offset, limit);
        fetch_blogs(self, qb).await
    }
}

#[async_trait]
impl BlogsWriteRepo for PostgresRepositories {
    async fn create_blog(&self, params: CreateBlogParams) -> Result<BlogRecord, RepoError> {
        let mut tx = self.pool().begin().await.map_err(map_sqlx_error)?;

        let blog_id: Uuid = sqlx::query_scalar(
            "INSERT INTO blogs (title, subtitle, content, thumbnail, reading_time, author_id) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING id",
        )
        .bind(&params.title)
        .bind(&params.subtitle)
        .bind(&params.content)
        .bind(&params.thumbnail)
        .bind(&params.reading_time)
        .bind(params.author_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        for tag in &params.tags {
            sqlx::query("INSERT INTO blog_tags (blog_id, tag) VALUES ($1, $2)")
                .bind(blog_id)
                .bind(tag)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
        }

        tx.commit().await.map_err(map_sqlx_error)?;

        self.find_by_id(blog_id)
            .await?
            .ok_or_else(|| RepoError::from_persistence("created blog vanished before readback"))
    }

    async fn delete_blog(&self, id: Uuid) -> Result<(), RepoError> {
        let result = sqlx::query("DELETE FROM blogs WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}
