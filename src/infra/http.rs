//! JSON API surface.
//!
//! Thin axum handlers over the application services: extract, delegate,
//! serialize. No ranking, caching or validation logic lives here.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::application::{
    AccountService, AppError, ContentService, FeedService, MutationService, NewBlog,
    SearchService, StatsService, accounts::LoginProfile,
};
use crate::infra::compose::SocialComposer;
use crate::infra::db::PostgresRepositories;
use crate::infra::uploads::ImageStore;

#[derive(Clone)]
pub struct AppState {
    pub content: Arc<ContentService>,
    pub feeds: Arc<FeedService>,
    pub search: Arc<SearchService>,
    pub stats: Arc<StatsService>,
    pub mutations: Arc<MutationService>,
    pub accounts: Arc<AccountService>,
    pub images: Arc<dyn ImageStore>,
    pub composer: Option<Arc<dyn SocialComposer>>,
    pub repositories: PostgresRepositories,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/auth/login", post(login))
        .route("/api/blogs", post(create_blog))
        .route("/api/blogs/trending", get(trending))
        .route("/api/blogs/followed", get(followed))
        .route("/api/blogs/bookmarked", get(bookmarked))
        .route("/api/blogs/tag/{tag}", get(by_tag))
        .route("/api/blogs/{id}", get(blog_detail).delete(delete_blog))
        .route("/api/blogs/{id}/recommendations", get(recommendations))
        .route("/api/blogs/{id}/thread", post(compose_thread))
        .route(
            "/api/blogs/{id}/comments",
            get(list_comments).post(add_comment),
        )
        .route(
            "/api/blogs/{id}/comments/{parent_id}/replies",
            get(list_replies).post(add_reply),
        )
        .route("/api/blogs/{id}/upvote", get(upvote_state).post(toggle_upvote))
        .route(
            "/api/blogs/{id}/bookmark",
            get(bookmark_state).post(toggle_bookmark),
        )
        .route("/api/search", get(search))
        .route("/api/tags/trending", get(trending_tags))
        .route("/api/stats", get(platform_stats))
        .route("/api/users/{id}/profile", get(profile))
        .route(
            "/api/users/{id}/follow",
            get(follow_state).post(toggle_follow),
        )
        .route("/api/uploads", post(upload_image))
        .with_state(state)
}

/// Pulls the bearer token out of the Authorization header.
fn bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .filter(|token| !token.is_empty())
        .ok_or(AppError::Unauthorized)
}

async fn health(State(state): State<AppState>) -> Response {
    match state.repositories.health_check().await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            warn!(error = %err, "database health check failed");
            StatusCode::SERVICE_UNAVAILABLE.into_response()
        }
    }
}

#[derive(Deserialize)]
struct PageQuery {
    #[serde(default = "default_page")]
    page: u32,
    #[serde(default = "default_limit")]
    limit: u32,
}

fn default_page() -> u32 {
    1
}

fn default_limit() -> u32 {
    5
}

#[derive(Deserialize)]
struct UserPageQuery {
    user_id: Uuid,
    #[serde(default = "default_page")]
    page: u32,
    #[serde(default = "default_limit")]
    limit: u32,
}

#[derive(Deserialize)]
struct UserQuery {
    user_id: Uuid,
}

async fn trending(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Response, AppError> {
    let blogs = state.feeds.fetch_trending(query.page, query.limit).await?;
    Ok(Json(blogs).into_response())
}

async fn by_tag(
    State(state): State<AppState>,
    Path(tag): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Response, AppError> {
    let blogs = state
        .feeds
        .fetch_by_tag(&tag, query.page, query.limit)
        .await?;
    Ok(Json(blogs).into_response())
}

async fn followed(
    State(state): State<AppState>,
    Query(query): Query<UserPageQuery>,
) -> Result<Response, AppError> {
    let blogs = state
        .feeds
        .fetch_followed(query.user_id, query.page, query.limit)
        .await?;
    Ok(Json(blogs).into_response())
}

async fn bookmarked(
    State(state): State<AppState>,
    Query(query): Query<UserPageQuery>,
) -> Result<Response, AppError> {
    let blogs = state
        .feeds
        .fetch_bookmarked(query.user_id, query.page, query.limit)
        .await?;
    Ok(Json(blogs).into_response())
}

async fn blog_detail(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let blog = state.content.get_blog(id).await?;
    Ok(Json(blog).into_response())
}

async fn recommendations(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let related = state.feeds.fetch_recommendations(id).await?;
    Ok(Json(related).into_response())
}

async fn list_comments(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let comments = state.content.get_comments(id).await?;
    Ok(Json(comments).into_response())
}

async fn list_replies(
    State(state): State<AppState>,
    Path((id, parent_id)): Path<(Uuid, Uuid)>,
) -> Result<Response, AppError> {
    let replies = state.content.get_replies(id, parent_id).await?;
    Ok(Json(replies).into_response())
}

#[derive(Deserialize)]
struct SearchQuery {
    #[serde(default)]
    q: String,
    #[serde(default = "default_page")]
    page: u32,
}

async fn search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Response, AppError> {
    let results = state.search.search(&query.q, query.page).await?;
    Ok(Json(results).into_response())
}

#[derive(Deserialize)]
struct TagLimitQuery {
    #[serde(default = "default_tag_limit")]
    limit: u32,
}

fn default_tag_limit() -> u32 {
    10
}

async fn trending_tags(
    State(state): State<AppState>,
    Query(query): Query<TagLimitQuery>,
) -> Result<Response, AppError> {
    let tags = state.stats.trending_tags(query.limit).await?;
    Ok(Json(tags).into_response())
}

async fn platform_stats(State(state): State<AppState>) -> Result<Response, AppError> {
    let stats = state.stats.platform_stats().await?;
    Ok(Json(stats).into_response())
}

#[derive(Deserialize)]
struct LoginBody {
    token: String,
    social_id: String,
    name: String,
    email: String,
    avatar: String,
}

async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginBody>,
) -> Result<Response, AppError> {
    let user = state
        .accounts
        .login(
            &body.token,
            LoginProfile {
                social_id: body.social_id,
                name: body.name,
                email: body.email,
                avatar: body.avatar,
            },
        )
        .await?;
    Ok(Json(user).into_response())
}

async fn profile(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let profile = state.accounts.profile(id).await?;
    Ok(Json(profile).into_response())
}

#[derive(Deserialize)]
struct CreateBlogBody {
    author_id: Uuid,
    title: String,
    subtitle: Option<String>,
    content: String,
    thumbnail: String,
    reading_time: String,
    #[serde(default)]
    tags: Vec<String>,
}

async fn create_blog(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CreateBlogBody>,
) -> Result<Response, AppError> {
    let token = bearer_token(&headers)?;
    let blog = state
        .mutations
        .create_blog(
            token,
            body.author_id,
            NewBlog {
                title: body.title,
                subtitle: body.subtitle,
                content: body.content,
                thumbnail: body.thumbnail,
                reading_time: body.reading_time,
                tags: body.tags,
            },
        )
        .await?;

    // Best effort: promotion copy runs after persistence and never affects
    // the response.
    if let Some(composer) = state.composer.clone() {
        let announced = blog.clone();
        tokio::spawn(async move {
            let link = format!("/blogs/{}", announced.id);
            match composer.summary_tweet(&announced, &link).await {
                Ok(tweet) => tracing::info!(blog_id = %announced.id, tweet, "composed announcement"),
                Err(err) => warn!(blog_id = %announced.id, error = %err, "announcement composition failed"),
            }
        });
    }

    Ok((StatusCode::CREATED, Json(blog)).into_response())
}

#[derive(Serialize)]
struct ThreadResponse {
    posts: Vec<String>,
}

/// Drafts a promotional thread for an existing blog. Unlike the
/// announcement on create, this one is synchronous: the caller wants the
/// copy back.
async fn compose_thread(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let Some(composer) = state.composer.clone() else {
        return Ok(StatusCode::NOT_IMPLEMENTED.into_response());
    };
    let blog = state.content.get_blog(id).await?;
    let link = format!("/blogs/{}", blog.id);
    let posts = composer.thread(&blog, &link).await?;
    Ok(Json(ThreadResponse { posts }).into_response())
}

#[derive(Deserialize)]
struct ActorBody {
    user_id: Uuid,
}

async fn delete_blog(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(body): Json<ActorBody>,
) -> Result<Response, AppError> {
    let token = bearer_token(&headers)?;
    let blog = state.mutations.delete_blog(token, body.user_id, id).await?;

    // Best effort: the record is gone either way.
    let images = state.images.clone();
    tokio::spawn(async move {
        if let Err(err) = images.remove(&blog.thumbnail).await {
            warn!(blog_id = %blog.id, error = %err, "failed to remove thumbnail");
        }
    });

    Ok(StatusCode::NO_CONTENT.into_response())
}

#[derive(Deserialize)]
struct CommentBody {
    user_id: Uuid,
    content: String,
}

async fn add_comment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(body): Json<CommentBody>,
) -> Result<Response, AppError> {
    let token = bearer_token(&headers)?;
    let comment = state
        .mutations
        .add_comment(token, body.user_id, id, &body.content)
        .await?;
    Ok((StatusCode::CREATED, Json(comment)).into_response())
}

async fn add_reply(
    State(state): State<AppState>,
    Path((id, parent_id)): Path<(Uuid, Uuid)>,
    headers: HeaderMap,
    Json(body): Json<CommentBody>,
) -> Result<Response, AppError> {
    let token = bearer_token(&headers)?;
    let reply = state
        .mutations
        .add_reply(token, body.user_id, id, parent_id, &body.content)
        .await?;
    Ok((StatusCode::CREATED, Json(reply)).into_response())
}

#[derive(Serialize)]
struct ToggleResponse {
    added: bool,
}

async fn toggle_upvote(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(body): Json<ActorBody>,
) -> Result<Response, AppError> {
    let token = bearer_token(&headers)?;
    let outcome = state.mutations.toggle_upvote(token, body.user_id, id).await?;
    Ok(Json(ToggleResponse {
        added: outcome.added(),
    })
    .into_response())
}

async fn toggle_bookmark(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(body): Json<ActorBody>,
) -> Result<Response, AppError> {
    let token = bearer_token(&headers)?;
    let outcome = state
        .mutations
        .toggle_bookmark(token, body.user_id, id)
        .await?;
    Ok(Json(ToggleResponse {
        added: outcome.added(),
    })
    .into_response())
}

async fn toggle_follow(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(body): Json<ActorBody>,
) -> Result<Response, AppError> {
    let token = bearer_token(&headers)?;
    let outcome = state.mutations.toggle_follow(token, body.user_id, id).await?;
    Ok(Json(ToggleResponse {
        added: outcome.added(),
    })
    .into_response())
}

#[derive(Serialize)]
struct StateResponse {
    active: bool,
}

async fn upvote_state(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<UserQuery>,
) -> Result<Response, AppError> {
    let active = state.mutations.has_upvoted(query.user_id, id).await?;
    Ok(Json(StateResponse { active }).into_response())
}

async fn bookmark_state(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<UserQuery>,
) -> Result<Response, AppError> {
    let active = state.mutations.has_bookmarked(query.user_id, id).await?;
    Ok(Json(StateResponse { active }).into_response())
}

async fn follow_state(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<UserQuery>,
) -> Result<Response, AppError> {
    let active = state.mutations.is_following(query.user_id, id).await?;
    Ok(Json(StateResponse { active }).into_response())
}

#[derive(Serialize)]
struct UploadResponse {
    url: String,
}

async fn upload_image(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AppError::validation("a content type is required"))?;
    if body.is_empty() {
        return Err(AppError::validation("upload body must not be empty"));
    }
    let url = state.images.store(body, content_type).await?;
    Ok((StatusCode::CREATED, Json(UploadResponse { url })).into_response())
}
