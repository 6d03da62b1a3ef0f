//! Application services: use-case orchestration over the repository traits,
//! the object cache and the external collaborators. No SQL and no HTTP in
//! this layer.

pub mod accounts;
pub mod content;
pub mod error;
pub mod feed;
pub mod mutations;
pub mod repos;
pub mod search;
pub mod stats;

pub use accounts::AccountService;
pub use content::ContentService;
pub use error::AppError;
pub use feed::{FeedService, Recommendations, ScoredBlog};
pub use mutations::{MutationService, NewBlog, ToggleOutcome};
pub use search::{SearchResults, SearchService};
pub use stats::StatsService;
