//! Search over blogs and authors.
//!
//! Result pages are cached under the normalized `(query, page)` key with a
//! one-hour TTL, and the whole search family is cleared whenever a blog is
//! created or deleted.
//!
//! Pagination is uneven on purpose and pinned by [`page_window`]: the first
//! page carries ten blogs, later pages five, and the offset arithmetic
//! accounts for the larger first page. Author matches appear on the first
//! page only.

use std::sync::Arc;

use serde::Serialize;
use tracing::instrument;

use crate::application::error::AppError;
use crate::application::repos::{BlogsRepo, UsersRepo};
use crate::cache::{ObjectCache, SearchKey};
use crate::domain::entities::{BlogRecord, UserRecord};

const FIRST_PAGE_BLOGS: u32 = 10;
const LATER_PAGE_BLOGS: u32 = 5;
const AUTHOR_MATCHES: u32 = 5;

/// One page of search results. `has_more` is a window-full heuristic: true
/// when the blog slice filled its window, so the last page can report a
/// spurious next page when the total is an exact multiple.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResults {
    pub blogs: Vec<BlogRecord>,
    pub authors: Vec<UserRecord>,
    pub has_more: bool,
}

impl SearchResults {
    fn empty() -> Self {
        Self {
            blogs: Vec::new(),
            authors: Vec::new(),
            has_more: false,
        }
    }
}

pub struct SearchService {
    blogs: Arc<dyn BlogsRepo>,
    users: Arc<dyn UsersRepo>,
    cache: Arc<ObjectCache>,
}

impl SearchService {
    pub fn new(
        blogs: Arc<dyn BlogsRepo>,
        users: Arc<dyn UsersRepo>,
        cache: Arc<ObjectCache>,
    ) -> Self {
        Self {
            blogs,
            users,
            cache,
        }
    }

    /// One search page for `query`. Blank queries yield an empty page
    /// without touching storage or the cache.
    #[instrument(skip(self))]
    pub async fn search(&self, query: &str, page: u32) -> Result<SearchResults, AppError> {
        let page = page.max(1);
        let key = SearchKey::new(query, page);
        if key.query().is_empty() {
            return Ok(SearchResults::empty());
        }

        if let Some(results) = self.cache.get_search(&key) {
            return Ok(results);
        }

        let (offset, limit) = page_window(page);
        let blog_page = self.blogs.search(key.query(), offset, limit);
        let (blogs, authors) = if page == 1 {
            futures::try_join!(
                blog_page,
                self.users.search_authors(key.query(), AUTHOR_MATCHES)
            )?
        } else {
            (blog_page.await?, Vec::new())
        };

        let results = SearchResults {
            has_more: blogs.len() as u32 == limit,
            blogs,
            authors,
        };
        self.cache.set_search(key, results.clone());
        Ok(results)
    }
}

/// Offset and blog count for a 1-based search page.
///
/// Page 1 reads rows `0..10`; page n reads `10 + (n - 2) * 5 .. + 5`. The
/// two window sizes make the offset arithmetic asymmetric, which is why it
/// lives in one place.
fn page_window(page: u32) -> (u32, u32) {
    if page <= 1 {
        (0, FIRST_PAGE_BLOGS)
    } else {
        // Saturating: a huge page number reads past the data, not at a
        // wrapped-around offset.
        let offset = FIRST_PAGE_BLOGS.saturating_add((page - 2).saturating_mul(LATER_PAGE_BLOGS));
        (offset, LATER_PAGE_BLOGS)
    }
}
