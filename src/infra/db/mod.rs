//! Postgres-backed repository implementations.
//!
//! Queries are built at runtime with `QueryBuilder`; engagement counters
//! are derived with `COUNT` subqueries at read time and never stored.

mod blogs;
mod comments;
mod engagement;
mod stats;
mod users;
mod util;

pub use util::map_sqlx_error;

use std::sync::Arc;

use sqlx::{
    Postgres, QueryBuilder,
    postgres::{PgPool, PgPoolOptions},
    query,
};

use crate::application::repos::RepoError;

/// Shared head of every blog query: blog columns, author identity, tag
/// array and derived counters. Callers append WHERE / GROUP BY / ORDER BY.
const BLOG_SELECT: &str = "SELECT \
    b.id, b.title, b.subtitle, b.content, b.thumbnail, b.reading_time, b.created_at, \
    u.id AS author_id, u.name AS author_name, u.avatar AS author_avatar, \
    COALESCE(array_agg(bt.tag) FILTER (WHERE bt.tag IS NOT NULL), '{}') AS tags, \
    (SELECT COUNT(*) FROM upvotes uv WHERE uv.blog_id = b.id) AS upvote_count, \
    (SELECT COUNT(*) FROM comments c WHERE c.blog_id = b.id) AS comment_count \
    FROM blogs b \
    INNER JOIN users u ON u.id = b.author_id \
    LEFT JOIN blog_tags bt ON bt.blog_id = b.id";

const BLOG_GROUP_BY: &str = " GROUP BY b.id, u.id";

#[derive(Clone)]
pub struct PostgresRepositories {
    pool: Arc<PgPool>,
}

impl PostgresRepositories {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
        PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
    }

    pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations")
            .run(pool)
            .await
            .map_err(Into::into)
    }

    pub async fn health_check(&self) -> Result<(), sqlx::Error> {
        query("SELECT 1").execute(self.pool()).await.map(|_| ())
    }

    fn blog_query() -> QueryBuilder<'static, Postgres> {
        QueryBuilder::new(BLOG_SELECT)
    }

    fn convert_count(value: i64) -> Result<u64, RepoError> {
        value
            .try_into()
            .map_err(|_| RepoError::from_persistence("count exceeds supported range"))
    }
}
