use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::repos::{
        BlogsRepo, FollowsRepo, RepoError, UpsertUserParams, UsersRepo,
    },
    domain::entities::{ProfileRecord, UserRecord},
};

use super::{PostgresRepositories, map_sqlx_error};

const USER_SELECT: &str = "SELECT \
    id, social_id, name, email, avatar, bio, github, twitter, linkedin, created_at \
    FROM users";

const PROFILE_BLOG_LIMIT: u32 = 5;

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    social_id: String,
    name: String,
    email: String,
    avatar: String,
    bio: Option<String>,
    github: Option<String>,
    twitter: Option<String>,
    linkedin: Option<String>,
    created_at: OffsetDateTime,
}

impl From<UserRow> for UserRecord {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            social_id: row.social_id,
            name: row.name,
            email: row.email,
            avatar: row.avatar,
            bio: row.bio,
            github: row.github,
            twitter: row.twitter,
            linkedin: row.linkedin,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl UsersRepo for PostgresRepositories {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, RepoError> {
        let row: Option<UserRow> = sqlx::query_as(&format!("{USER_SELECT} WHERE id = $1"))
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(row.map(UserRecord::from))
    }

    async fn find_by_social_id(&self, social_id: &str) -> Result<Option<UserRecord>, RepoError> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("{USER_SELECT} WHERE social_id = $1"))
                .bind(social_id)
                .fetch_optional(self.pool())
                .await
                .map_err(map_sqlx_error)?;
        Ok(row.map(UserRecord::from))
    }

    async fn upsert_on_login(&self, params: UpsertUserParams) -> Result<UserRecord, RepoError> {
        let row: UserRow = sqlx::query_as(
            "INSERT INTO users (social_id, name, email, avatar) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (social_id) DO UPDATE \
             SET name = EXCLUDED.name, email = EXCLUDED.email, avatar = EXCLUDED.avatar \
             RETURNING id, social_id, name, email, avatar, bio, github, twitter, linkedin, created_at",
        )
        .bind(&params.social_id)
        .bind(&params.name)
        .bind(&params.email)
        .bind(&params.avatar)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn search_authors(
        &self,
        query: &str,
        limit: u32,
    ) -> Result<Vec<UserRecord>, RepoError> {
        let rows: Vec<UserRow> = sqlx::query_as(&format!(
            "{USER_SELECT} WHERE name ILIKE $1 ORDER BY name LIMIT $2"
        ))
        .bind(format!("%{query}%"))
        .bind(i64::from(limit))
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(UserRecord::from).collect())
    }

    async fn profile(&self, id: Uuid) -> Result<Option<ProfileRecord>, RepoError> {
        let Some(user) = UsersRepo::find_by_id(self, id).await? else {
            return Ok(None);
        };

        let follower_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM follows WHERE followed_id = $1")
                .bind(id)
                .fetch_one(self.pool())
                .await
                .map_err(map_sqlx_error)?;
        let following_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM follows WHERE follower_id = $1")
                .bind(id)
                .fetch_one(self.pool())
                .await
                .map_err(map_sqlx_error)?;

        // Nil is not a valid blog id, so nothing is excluded here.
        let recent_blogs = self
            .list_recent_by_author(id, Uuid::nil(), PROFILE_BLOG_LIMIT)
            .await?;

        Ok(Some(ProfileRecord {
            user,
            follower_count: Self::convert_count(follower_count)?,
            following_count: Self::convert_count(following_count)?,
            recent_blogs,
        }))
    }
}

#[async_trait]
impl FollowsRepo for PostgresRepositories {
    async fn is_following(&self, follower: Uuid, followed: Uuid) -> Result<bool, RepoError> {
        sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM follows WHERE follower_id = $1 AND followed_id = $2)",
        )
        .bind(follower)
        .bind(followed)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)
    }

    async fn insert(&self, follower: Uuid, followed: Uuid) -> Result<(), RepoError> {
        sqlx::query("INSERT INTO follows (follower_id, followed_id) VALUES ($1, $2)")
            .bind(follower)
            .bind(followed)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn delete(&self, follower: Uuid, followed: Uuid) -> Result<bool, RepoError> {
        let result =
            sqlx::query("DELETE FROM follows WHERE follower_id = $1 AND followed_id = $2")
                .bind(follower)
                .bind(followed)
                .execute(self.pool())
                .await
                .map_err(map_sqlx_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn followed_author_ids(&self, follower: Uuid) -> Result<Vec<Uuid>, RepoError> {
        sqlx::query_scalar("SELECT followed_id FROM follows WHERE follower_id = $1")
            .bind(follower)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)
    }
}
