use async_trait::async_trait;

use crate::{
    application::repos::{RepoError, StatsRepo},
    domain::entities::{PlatformStats, TagCount},
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct StatsRow {
    total_blogs: i64,
    total_words: i64,
    active_authors: i64,
}

#[derive(sqlx::FromRow)]
struct TagCountRow {
    tag: String,
    count: i64,
}

#[async_trait]
impl StatsRepo for PostgresRepositories {
    async fn platform_stats(&self) -> Result<PlatformStats, RepoError> {
        // Word totals are a whitespace-split approximation, good enough for
        // a headline number.
        let row: StatsRow = sqlx::query_as(
            "SELECT \
             (SELECT COUNT(*) FROM blogs) AS total_blogs, \
             (SELECT COALESCE(SUM(array_length(regexp_split_to_array(content, '\\s+'), 1)), 0) \
              FROM blogs) AS total_words, \
             (SELECT COUNT(DISTINCT author_id) FROM blogs) AS active_authors",
        )
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(PlatformStats {
            total_blogs: Self::convert_count(row.total_blogs)?,
            total_words: Self::convert_count(row.total_words)?,
            active_authors: Self::convert_count(row.active_authors)?,
        })
    }

    async fn trending_tags(&self, limit: u32) -> Result<Vec<TagCount>, RepoError> {
        let rows: Vec<TagCountRow> = sqlx::query_as(
            "SELECT tag, COUNT(*) AS count FROM blog_tags \
             GROUP BY tag ORDER BY count DESC, tag ASC LIMIT $1",
        )
        .bind(i64::from(limit))
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter()
            .map(|row| {
                Ok(TagCount {
                    tag: row.tag,
                    count: Self::convert_count(row.count)?,
                })
            })
            .collect()
    }
}
