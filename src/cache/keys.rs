//! Cache key definitions.

use uuid::Uuid;

/// Key for a cached search result page.
///
/// The query component is normalized (trimmed, lowercased) so that
/// `"Rust "` and `"rust"` share one entry, matching the case-insensitive
/// match semantics of the search itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SearchKey {
    query: String,
    page: u32,
}

impl SearchKey {
    pub fn new(query: &str, page: u32) -> Self {
        Self {
            query: query.trim().to_lowercase(),
            page,
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn page(&self) -> u32 {
        self.page
    }
}

/// Key for a cached reply list: one top-level parent on one blog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReplyKey {
    pub blog_id: Uuid,
    pub parent_id: Uuid,
}

impl ReplyKey {
    pub fn new(blog_id: Uuid, parent_id: Uuid) -> Self {
        Self { blog_id, parent_id }
    }
}
