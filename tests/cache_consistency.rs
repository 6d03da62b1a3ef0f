mod common;

use std::sync::Arc;
use std::sync::atomic::Ordering;

use common::{CacheHarness, EchoVerifier, FakeRepos, cache_harness};
use pixie::application::{AppError, ContentService, MutationService};
use pixie::cache::CacheConfig;

fn wired_services(repos: &Arc<FakeRepos>) -> (ContentService, MutationService) {
    let CacheHarness { store, trigger } = cache_harness(CacheConfig::default());
    let content = ContentService::new(repos.clone(), repos.clone(), store);
    let mutations = MutationService::new(
        repos.clone(),
        repos.clone(),
        repos.clone(),
        repos.clone(),
        repos.clone(),
        repos.clone(),
        repos.clone(),
        Arc::new(EchoVerifier),
        trigger,
    );
    (content, mutations)
}

#[tokio::test]
async fn adding_a_comment_is_visible_through_the_cache() {
    let repos = FakeRepos::new();
    let (content, mutations) = wired_services(&repos);
    let user = repos.add_user("ada", "sub-ada");
    let author = repos.add_user("grace", "sub-grace");
    let blog = repos.add_blog(&author, "post", 1);

    assert!(content.get_comments(blog.id).await.expect("list").is_empty());
    content.get_comments(blog.id).await.expect("cached list");
    assert_eq!(repos.comment_list_calls.load(Ordering::SeqCst), 1);

    mutations
        .add_comment("sub-ada", user.id, blog.id, "first!")
        .await
        .expect("comment");

    let refreshed = content.get_comments(blog.id).await.expect("fresh list");
    assert_eq!(refreshed.len(), 1);
    assert_eq!(refreshed[0].content, "first!");
    // The write dropped the cached list, so storage was consulted again.
    assert_eq!(repos.comment_list_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn upvote_toggle_refreshes_the_cached_blog_counters() {
    let repos = FakeRepos::new();
    let (content, mutations) = wired_services(&repos);
    let user = repos.add_user("ada", "sub-ada");
    let author = repos.add_user("grace", "sub-grace");
    let blog = repos.add_blog(&author, "post", 1);

    let before = content.get_blog(blog.id).await.expect("blog");
    assert_eq!(before.upvote_count, 0);

    mutations
        .toggle_upvote("sub-ada", user.id, blog.id)
        .await
        .expect("toggle");

    let after = content.get_blog(blog.id).await.expect("blog after toggle");
    assert_eq!(after.upvote_count, 1);
}

#[tokio::test]
async fn reply_is_visible_through_cached_reply_and_comment_lists() {
    let repos = FakeRepos::new();
    let (content, mutations) = wired_services(&repos);
    let user = repos.add_user("ada", "sub-ada");
    let author = repos.add_user("grace", "sub-grace");
    let blog = repos.add_blog(&author, "post", 1);

    let comment = mutations
        .add_comment("sub-ada", user.id, blog.id, "top level")
        .await
        .expect("comment");

    // Prime both lists.
    let listed = content.get_comments(blog.id).await.expect("comments");
    assert_eq!(listed[0].reply_count, 0);
    assert!(
        content
            .get_replies(blog.id, comment.id)
            .await
            .expect("replies")
            .is_empty()
    );

    mutations
        .add_reply("sub-ada", user.id, blog.id, comment.id, "a reply")
        .await
        .expect("reply");

    let replies = content
        .get_replies(blog.id, comment.id)
        .await
        .expect("fresh replies");
    assert_eq!(replies.len(), 1);
    let listed = content.get_comments(blog.id).await.expect("fresh comments");
    assert_eq!(listed[0].reply_count, 1);
}

#[tokio::test]
async fn deleting_a_blog_drops_its_cached_entry() {
    let repos = FakeRepos::new();
    let (content, mutations) = wired_services(&repos);
    let author = repos.add_user("grace", "sub-grace");
    let blog = repos.add_blog(&author, "post", 1);

    content.get_blog(blog.id).await.expect("blog");

    mutations
        .delete_blog("sub-grace", author.id, blog.id)
        .await
        .expect("delete");

    let gone = content.get_blog(blog.id).await;
    assert!(matches!(gone, Err(AppError::NotFound)));
}
