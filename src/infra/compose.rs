//! Social post composition.
//!
//! Drafts promotional copy for a freshly published blog through a
//! generative text provider. Best-effort only: composition runs after the
//! blog is persisted, and a failure here never unwinds core state.

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::domain::entities::BlogRecord;

use super::error::InfraError;

const TWEET_LIMIT: usize = 280;

#[async_trait]
pub trait SocialComposer: Send + Sync {
    /// A single post announcing the blog, at most 280 characters.
    async fn summary_tweet(&self, blog: &BlogRecord, link: &str) -> Result<String, InfraError>;

    /// A short thread expanding on the blog's main points.
    async fn thread(&self, blog: &BlogRecord, link: &str) -> Result<Vec<String>, InfraError>;
}

#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize)]
struct Part {
    text: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Deserialize)]
struct CandidateContent {
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: String,
}

/// Composes copy through the Gemini generate-content endpoint.
///
/// The single-post prompt expects plain text back; the thread prompt asks
/// for a JSON string array, which some model revisions wrap in a Markdown
/// code fence, so the parser strips one before deserializing.
pub struct GeminiComposer {
    client: Client,
    endpoint: Url,
    api_key: String,
}

impl GeminiComposer {
    pub fn new(endpoint: Url, api_key: String) -> Result<Self, InfraError> {
        let client = Client::builder()
            .user_agent(concat!("pixie/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| InfraError::upstream(err.to_string()))?;
        Ok(Self {
            client,
            endpoint,
            api_key,
        })
    }

    async fn generate(&self, prompt: String) -> Result<String, InfraError> {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut().append_pair("key", &self.api_key);

        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
        };

        let response = self
            .client
            .post(url)
            .json(&request)
            .send()
            .await
            .map_err(|err| InfraError::upstream(err.to_string()))?
            .error_for_status()
            .map_err(|err| InfraError::upstream(err.to_string()))?;

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|err| InfraError::upstream(err.to_string()))?;

        body.candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content.parts.into_iter().next())
            .map(|part| part.text)
            .ok_or_else(|| InfraError::upstream("empty generation response"))
    }
}

#[async_trait]
impl SocialComposer for GeminiComposer {
    #[instrument(skip(self, blog))]
    async fn summary_tweet(&self, blog: &BlogRecord, link: &str) -> Result<String, InfraError> {
        let prompt = format!(
            "Write one post of at most {TWEET_LIMIT} characters announcing a new blog \
             titled \"{}\" by {}. End with this link: {link}. \
             Reply with the post text only.",
            blog.title, blog.author.name
        );
        let text = self.generate(prompt).await?;
        Ok(truncate_chars(text.trim(), TWEET_LIMIT))
    }

    #[instrument(skip(self, blog))]
    async fn thread(&self, blog: &BlogRecord, link: &str) -> Result<Vec<String>, InfraError> {
        let prompt = format!(
            "Write a thread of 3 to 5 posts, each at most {TWEET_LIMIT} characters, \
             summarizing a blog titled \"{}\" by {}. Put this link in the final \
             post: {link}. Reply with a JSON array of strings only.",
            blog.title, blog.author.name
        );
        let text = self.generate(prompt).await?;
        parse_thread(&text)
    }
}

fn parse_thread(text: &str) -> Result<Vec<String>, InfraError> {
    let stripped = strip_code_fence(text.trim());
    let posts: Vec<String> = serde_json::from_str(stripped)
        .map_err(|err| InfraError::upstream(format!("malformed thread response: {err}")))?;
    if posts.is_empty() {
        return Err(InfraError::upstream("empty thread response"));
    }
    Ok(posts
        .into_iter()
        .map(|post| truncate_chars(post.trim(), TWEET_LIMIT))
        .collect())
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop an optional language tag after the opening fence.
    let rest = rest.split_once('\n').map_or(rest, |(_, body)| body);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

fn truncate_chars(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_thread_accepts_plain_json() {
        let posts = parse_thread(r#"["one", "two"]"#).expect("valid thread");
        assert_eq!(posts, vec!["one".to_string(), "two".to_string()]);
    }

    #[test]
    fn parse_thread_strips_code_fence() {
        let fenced = "```json\n[\"one\", \"two\", \"three\"]\n```";
        let posts = parse_thread(fenced).expect("valid thread");
        assert_eq!(posts.len(), 3);
    }

    #[test]
    fn parse_thread_rejects_non_array() {
        assert!(parse_thread("just some text").is_err());
        assert!(parse_thread("[]").is_err());
    }

    #[test]
    fn truncate_chars_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("ok", 280), "ok");
    }
}
