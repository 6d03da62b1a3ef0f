//! In-memory fakes for the repository traits, shared by the integration
//! suites. Derived counters are recomputed on every read so engagement
//! toggles show up in blog records the same way the SQL counts do.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};

use async_trait::async_trait;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use pixie::application::repos::{
    BlogsRepo, BlogsWriteRepo, CommentsRepo, CommentsWriteRepo, CreateBlogParams,
    CreateCommentParams, EngagementRepo, FollowsRepo, OffsetPage, RepoError, StatsRepo,
    UpsertUserParams, UsersRepo,
};
use pixie::cache::{CacheConfig, CacheInvalidator, CacheTrigger, EventQueue, ObjectCache};
use pixie::domain::entities::{
    AuthorRef, BlogRecord, BookmarkedBlogRecord, CommentRecord, EngagementKind, PlatformStats,
    ProfileRecord, TagCount, UserRecord,
};
use pixie::infra::auth::{AuthError, TokenClaims, TokenVerifier};

#[derive(Default)]
pub struct FakeRepos {
    blogs: Mutex<Vec<BlogRecord>>,
    comments: Mutex<Vec<CommentRecord>>,
    users: Mutex<Vec<UserRecord>>,
    upvotes: Mutex<HashSet<(Uuid, Uuid)>>,
    bookmarks: Mutex<HashMap<(Uuid, Uuid), OffsetDateTime>>,
    follows: Mutex<HashSet<(Uuid, Uuid)>>,
    /// Forces the next engagement insert to fail with a unique violation,
    /// simulating a lost race against an identical toggle.
    pub fail_next_insert: AtomicBool,
    pub search_calls: AtomicUsize,
    pub comment_list_calls: AtomicUsize,
}

impl FakeRepos {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_user(&self, name: &str, social_id: &str) -> UserRecord {
        let user = UserRecord {
            id: Uuid::new_v4(),
            social_id: social_id.to_string(),
            name: name.to_string(),
            email: format!("{name}@example.com"),
            avatar: "/avatar.png".to_string(),
            bio: None,
            github: None,
            twitter: None,
            linkedin: None,
            created_at: OffsetDateTime::now_utc(),
        };
        self.users.lock().unwrap().push(user.clone());
        user
    }

    pub fn add_blog(&self, author: &UserRecord, title: &str, age_hours: i64) -> BlogRecord {
        self.add_tagged_blog(author, title, age_hours, &[])
    }

    pub fn add_tagged_blog(
        &self,
        author: &UserRecord,
        title: &str,
        age_hours: i64,
        tags: &[&str],
    ) -> BlogRecord {
        let blog = BlogRecord {
            id: Uuid::new_v4(),
            title: title.to_string(),
            subtitle: None,
            content: "body".to_string(),
            thumbnail: "/thumb.png".to_string(),
            reading_time: "3 min".to_string(),
            created_at: OffsetDateTime::now_utc() - Duration::hours(age_hours),
            author: AuthorRef {
                id: author.id,
                name: author.name.clone(),
                avatar: author.avatar.clone(),
            },
            tags: tags.iter().map(|tag| (*tag).to_string()).collect(),
            upvote_count: 0,
            comment_count: 0,
        };
        self.blogs.lock().unwrap().push(blog.clone());
        blog
    }

    pub fn add_upvotes(&self, blog_id: Uuid, count: usize) {
        let mut upvotes = self.upvotes.lock().unwrap();
        for _ in 0..count {
            upvotes.insert((Uuid::new_v4(), blog_id));
        }
    }

    pub fn add_comments(&self, blog: &BlogRecord, user: &UserRecord, count: usize) {
        let mut comments = self.comments.lock().unwrap();
        for i in 0..count {
            comments.push(CommentRecord {
                id: Uuid::new_v4(),
                content: format!("comment {i}"),
                created_at: OffsetDateTime::now_utc(),
                blog_id: blog.id,
                parent_id: None,
                user: AuthorRef {
                    id: user.id,
                    name: user.name.clone(),
                    avatar: user.avatar.clone(),
                },
                reply_count: 0,
            });
        }
    }

    fn hydrate(&self, mut blog: BlogRecord) -> BlogRecord {
        blog.upvote_count = self
            .upvotes
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, blog_id)| *blog_id == blog.id)
            .count() as u64;
        blog.comment_count = self
            .comments
            .lock()
            .unwrap()
            .iter()
            .filter(|comment| comment.blog_id == blog.id)
            .count() as u64;
        blog
    }

    fn recent(&self, filter: impl Fn(&BlogRecord) -> bool) -> Vec<BlogRecord> {
        let mut blogs: Vec<BlogRecord> = self
            .blogs
            .lock()
            .unwrap()
            .iter()
            .filter(|blog| filter(blog))
            .cloned()
            .collect();
        blogs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        blogs.into_iter().map(|blog| self.hydrate(blog)).collect()
    }

    fn window(blogs: Vec<BlogRecord>, offset: u32, limit: u32) -> Vec<BlogRecord> {
        blogs
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect()
    }

    fn reply_count(&self, comment_id: Uuid) -> u64 {
        self.comments
            .lock()
            .unwrap()
            .iter()
            .filter(|comment| comment.parent_id == Some(comment_id))
            .count() as u64
    }

    fn edges(&self, kind: EngagementKind) -> Vec<(Uuid, Uuid)> {
        match kind {
            EngagementKind::Upvote => self.upvotes.lock().unwrap().iter().copied().collect(),
            EngagementKind::Bookmark => self.bookmarks.lock().unwrap().keys().copied().collect(),
        }
    }
}

#[async_trait]
impl BlogsRepo for FakeRepos {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<BlogRecord>, RepoError> {
        let blog = self
            .blogs
            .lock()
            .unwrap()
            .iter()
            .find(|blog| blog.id == id)
            .cloned();
        Ok(blog.map(|blog| self.hydrate(blog)))
    }

    async fn list_recent(&self, page: OffsetPage) -> Result<Vec<BlogRecord>, RepoError> {
        Ok(Self::window(self.recent(|_| true), page.offset, page.limit))
    }

    async fn list_by_tag(
        &self,
        tag: &str,
        page: OffsetPage,
    ) -> Result<Vec<BlogRecord>, RepoError> {
        let needle = tag.to_lowercase();
        let blogs = self.recent(|blog| {
            blog.tags
                .iter()
                .any(|candidate| candidate.to_lowercase() == needle)
        });
        Ok(Self::window(blogs, page.offset, page.limit))
    }

    async fn list_by_authors(
        &self,
        author_ids: &[Uuid],
        page: OffsetPage,
    ) -> Result<Vec<BlogRecord>, RepoError> {
        let blogs = self.recent(|blog| author_ids.contains(&blog.author.id));
        Ok(Self::window(blogs, page.offset, page.limit))
    }

    async fn list_recent_by_author(
        &self,
        author_id: Uuid,
        exclude: Uuid,
        limit: u32,
    ) -> Result<Vec<BlogRecord>, RepoError> {
        let blogs = self.recent(|blog| blog.author.id == author_id && blog.id != exclude);
        Ok(Self::window(blogs, 0, limit))
    }

    async fn list_recent_sharing_tags(
        &self,
        tags: &[String],
        exclude: Uuid,
        limit: u32,
    ) -> Result<Vec<BlogRecord>, RepoError> {
        let blogs = self.recent(|blog| {
            blog.id != exclude && blog.tags.iter().any(|tag| tags.contains(tag))
        });
        Ok(Self::window(blogs, 0, limit))
    }

    async fn search(
        &self,
        query: &str,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<BlogRecord>, RepoError> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        let needle = query.to_lowercase();
        let blogs = self.recent(|blog| {
            blog.title.to_lowercase().contains(&needle)
                || blog
                    .subtitle
                    .as_ref()
                    .is_some_and(|subtitle| subtitle.to_lowercase().contains(&needle))
                || blog.author.name.to_lowercase().contains(&needle)
                || blog
                    .tags
                    .iter()
                    .any(|tag| tag.to_lowercase().contains(&needle))
        });
        Ok(Self::window(blogs, offset, limit))
    }
}

#[async_trait]
impl BlogsWriteRepo for FakeRepos {
    async fn create_blog(&self, params: CreateBlogParams) -> Result<BlogRecord, RepoError> {
        let author = self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|user| user.id == params.author_id)
            .cloned()
            .ok_or(RepoError::InvalidInput {
                message: "unknown author".to_string(),
            })?;
        let blog = BlogRecord {
            id: Uuid::new_v4(),
            title: params.title,
            subtitle: params.subtitle,
            content: params.content,
            thumbnail: params.thumbnail,
            reading_time: params.reading_time,
            created_at: OffsetDateTime::now_utc(),
            author: AuthorRef {
                id: author.id,
                name: author.name,
                avatar: author.avatar,
            },
            tags: params.tags,
            upvote_count: 0,
            comment_count: 0,
        };
        self.blogs.lock().unwrap().push(blog.clone());
        Ok(blog)
    }

    async fn delete_blog(&self, id: Uuid) -> Result<(), RepoError> {
        let mut blogs = self.blogs.lock().unwrap();
        let before = blogs.len();
        blogs.retain(|blog| blog.id != id);
        if blogs.len() == before {
            return Err(RepoError::NotFound);
        }
        self.comments
            .lock()
            .unwrap()
            .retain(|comment| comment.blog_id != id);
        self.upvotes
            .lock()
            .unwrap()
            .retain(|(_, blog_id)| *blog_id != id);
        self.bookmarks
            .lock()
            .unwrap()
            .retain(|(_, blog_id), _| *blog_id != id);
        Ok(())
    }
}

#[async_trait]
impl CommentsRepo for FakeRepos {
    async fn list_top_level(&self, blog_id: Uuid) -> Result<Vec<CommentRecord>, RepoError> {
        self.comment_list_calls.fetch_add(1, Ordering::SeqCst);
        let mut comments: Vec<CommentRecord> = self
            .comments
            .lock()
            .unwrap()
            .iter()
            .filter(|comment| comment.blog_id == blog_id && comment.parent_id.is_none())
            .cloned()
            .collect();
        comments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        for comment in &mut comments {
            comment.reply_count = self.reply_count(comment.id);
        }
        Ok(comments)
    }

    async fn list_replies(
        &self,
        blog_id: Uuid,
        parent_id: Uuid,
    ) -> Result<Vec<CommentRecord>, RepoError> {
        let mut replies: Vec<CommentRecord> = self
            .comments
            .lock()
            .unwrap()
            .iter()
            .filter(|comment| {
                comment.blog_id == blog_id && comment.parent_id == Some(parent_id)
            })
            .cloned()
            .collect();
        replies.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(replies)
    }

    async fn find_comment(&self, id: Uuid) -> Result<Option<CommentRecord>, RepoError> {
        let comment = self
            .comments
            .lock()
            .unwrap()
            .iter()
            .find(|comment| comment.id == id)
            .cloned();
        Ok(comment.map(|mut comment| {
            comment.reply_count = self.reply_count(comment.id);
            comment
        }))
    }
}

#[async_trait]
impl CommentsWriteRepo for FakeRepos {
    async fn create_comment(
        &self,
        params: CreateCommentParams,
    ) -> Result<CommentRecord, RepoError> {
        let user = self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|user| user.id == params.user_id)
            .cloned()
            .ok_or(RepoError::InvalidInput {
                message: "unknown user".to_string(),
            })?;
        let comment = CommentRecord {
            id: Uuid::new_v4(),
            content: params.content,
            created_at: OffsetDateTime::now_utc(),
            blog_id: params.blog_id,
            parent_id: params.parent_id,
            user: AuthorRef {
                id: user.id,
                name: user.name,
                avatar: user.avatar,
            },
            reply_count: 0,
        };
        self.comments.lock().unwrap().push(comment.clone());
        Ok(comment)
    }
}

#[async_trait]
impl EngagementRepo for FakeRepos {
    async fn exists(
        &self,
        kind: EngagementKind,
        user_id: Uuid,
        blog_id: Uuid,
    ) -> Result<bool, RepoError> {
        Ok(self.edges(kind).contains(&(user_id, blog_id)))
    }

    async fn insert(
        &self,
        kind: EngagementKind,
        user_id: Uuid,
        blog_id: Uuid,
    ) -> Result<(), RepoError> {
        if self.fail_next_insert.swap(false, Ordering::SeqCst) {
            return Err(RepoError::duplicate(format!("{}_pkey", kind.table())));
        }
        let inserted = match kind {
            EngagementKind::Upvote => self.upvotes.lock().unwrap().insert((user_id, blog_id)),
            EngagementKind::Bookmark => self
                .bookmarks
                .lock()
                .unwrap()
                .insert((user_id, blog_id), OffsetDateTime::now_utc())
                .is_none(),
        };
        if !inserted {
            return Err(RepoError::duplicate(format!("{}_pkey", kind.table())));
        }
        Ok(())
    }

    async fn delete(
        &self,
        kind: EngagementKind,
        user_id: Uuid,
        blog_id: Uuid,
    ) -> Result<bool, RepoError> {
        let removed = match kind {
            EngagementKind::Upvote => self.upvotes.lock().unwrap().remove(&(user_id, blog_id)),
            EngagementKind::Bookmark => self
                .bookmarks
                .lock()
                .unwrap()
                .remove(&(user_id, blog_id))
                .is_some(),
        };
        Ok(removed)
    }

    async fn list_bookmarked(
        &self,
        user_id: Uuid,
        page: OffsetPage,
    ) -> Result<Vec<BookmarkedBlogRecord>, RepoError> {
        let mut entries: Vec<(OffsetDateTime, Uuid)> = self
            .bookmarks
            .lock()
            .unwrap()
            .iter()
            .filter(|((owner, _), _)| *owner == user_id)
            .map(|((_, blog_id), at)| (*at, *blog_id))
            .collect();
        entries.sort_by(|a, b| b.0.cmp(&a.0));

        let mut records = Vec::new();
        for (bookmarked_at, blog_id) in entries
            .into_iter()
            .skip(page.offset as usize)
            .take(page.limit as usize)
        {
            if let Some(blog) = BlogsRepo::find_by_id(self, blog_id).await? {
                records.push(BookmarkedBlogRecord {
                    bookmarked_at,
                    blog,
                });
            }
        }
        Ok(records)
    }
}

#[async_trait]
impl UsersRepo for FakeRepos {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, RepoError> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|user| user.id == id)
            .cloned())
    }

    async fn find_by_social_id(&self, social_id: &str) -> Result<Option<UserRecord>, RepoError> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|user| user.social_id == social_id)
            .cloned())
    }

    async fn upsert_on_login(&self, params: UpsertUserParams) -> Result<UserRecord, RepoError> {
        let mut users = self.users.lock().unwrap();
        if let Some(user) = users
            .iter_mut()
            .find(|user| user.social_id == params.social_id)
        {
            user.name = params.name;
            user.email = params.email;
            user.avatar = params.avatar;
            return Ok(user.clone());
        }
        let user = UserRecord {
            id: Uuid::new_v4(),
            social_id: params.social_id,
            name: params.name,
            email: params.email,
            avatar: params.avatar,
            bio: None,
            github: None,
            twitter: None,
            linkedin: None,
            created_at: OffsetDateTime::now_utc(),
        };
        users.push(user.clone());
        Ok(user)
    }

    async fn search_authors(
        &self,
        query: &str,
        limit: u32,
    ) -> Result<Vec<UserRecord>, RepoError> {
        let needle = query.to_lowercase();
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .filter(|user| user.name.to_lowercase().contains(&needle))
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn profile(&self, id: Uuid) -> Result<Option<ProfileRecord>, RepoError> {
        let Some(user) = UsersRepo::find_by_id(self, id).await? else {
            return Ok(None);
        };
        let recent_blogs = self.list_recent_by_author(id, Uuid::nil(), 5).await?;
        // The guard must not be alive across an await or the future loses Send.
        let (follower_count, following_count) = {
            let follows = self.follows.lock().unwrap();
            let followers = follows.iter().filter(|(_, to)| *to == id).count() as u64;
            let following = follows.iter().filter(|(from, _)| *from == id).count() as u64;
            (followers, following)
        };
        Ok(Some(ProfileRecord {
            user,
            follower_count,
            following_count,
            recent_blogs,
        }))
    }
}

#[async_trait]
impl FollowsRepo for FakeRepos {
    async fn is_following(&self, follower: Uuid, followed: Uuid) -> Result<bool, RepoError> {
        Ok(self.follows.lock().unwrap().contains(&(follower, followed)))
    }

    async fn insert(&self, follower: Uuid, followed: Uuid) -> Result<(), RepoError> {
        if !self.follows.lock().unwrap().insert((follower, followed)) {
            return Err(RepoError::duplicate("follows_pkey"));
        }
        Ok(())
    }

    async fn delete(&self, follower: Uuid, followed: Uuid) -> Result<bool, RepoError> {
        Ok(self.follows.lock().unwrap().remove(&(follower, followed)))
    }

    async fn followed_author_ids(&self, follower: Uuid) -> Result<Vec<Uuid>, RepoError> {
        Ok(self
            .follows
            .lock()
            .unwrap()
            .iter()
            .filter(|(from, _)| *from == follower)
            .map(|(_, to)| *to)
            .collect())
    }
}

#[async_trait]
impl StatsRepo for FakeRepos {
    async fn platform_stats(&self) -> Result<PlatformStats, RepoError> {
        let blogs = self.blogs.lock().unwrap();
        let total_blogs = blogs.len() as u64;
        let total_words = blogs
            .iter()
            .map(|blog| blog.content.split_whitespace().count() as u64)
            .sum();
        let active_authors = blogs
            .iter()
            .map(|blog| blog.author.id)
            .collect::<HashSet<_>>()
            .len() as u64;
        Ok(PlatformStats {
            total_blogs,
            total_words,
            active_authors,
        })
    }

    async fn trending_tags(&self, limit: u32) -> Result<Vec<TagCount>, RepoError> {
        let mut counts: HashMap<String, u64> = HashMap::new();
        for blog in self.blogs.lock().unwrap().iter() {
            for tag in &blog.tags {
                *counts.entry(tag.clone()).or_default() += 1;
            }
        }
        let mut tags: Vec<TagCount> = counts
            .into_iter()
            .map(|(tag, count)| TagCount { tag, count })
            .collect();
        tags.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.tag.cmp(&b.tag)));
        tags.truncate(limit as usize);
        Ok(tags)
    }
}

/// Verifier whose subject is the token itself: a caller presenting the
/// user's social id as token authorizes as that user.
pub struct EchoVerifier;

#[async_trait]
impl TokenVerifier for EchoVerifier {
    async fn verify(&self, token: &str) -> Result<TokenClaims, AuthError> {
        if token.is_empty() {
            return Err(AuthError::InvalidToken("empty token".to_string()));
        }
        Ok(TokenClaims {
            subject_id: token.to_string(),
        })
    }
}

pub struct CacheHarness {
    pub store: Arc<ObjectCache>,
    pub trigger: Arc<CacheTrigger>,
}

pub fn cache_harness(config: CacheConfig) -> CacheHarness {
    let store = Arc::new(ObjectCache::new(&config));
    let queue = Arc::new(EventQueue::new());
    let invalidator = Arc::new(CacheInvalidator::new(
        config.clone(),
        store.clone(),
        queue.clone(),
    ));
    let trigger = Arc::new(CacheTrigger::new(config, queue, invalidator));
    CacheHarness { store, trigger }
}
