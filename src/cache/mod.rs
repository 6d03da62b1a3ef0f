//! Pixie cache system.
//!
//! An in-process object cache for expensive aggregate reads, with
//! deletion-based invalidation driven by write events:
//!
//! - **Read-through**: services consult the cache, fall back to the
//!   repositories on a miss, and store the computed value.
//! - **Invalidation**: every mutation publishes an event through
//!   [`CacheTrigger`] and consumes it synchronously, deleting affected
//!   entries before the mutation returns. Entries are never patched.
//! - **TTL policy**: search pages (1 h), trending tags (10 min) and
//!   platform stats (30 min) expire; blog/comment/reply entries have no TTL
//!   and rely entirely on invalidation.
//!
//! Configured via the `[cache]` table in `pixie.toml`.

mod config;
mod events;
mod invalidator;
mod keys;
mod lock;
mod store;
mod trigger;

pub use config::CacheConfig;
pub use events::{CacheEvent, Epoch, EventQueue, InvalidationKind};
pub use invalidator::{CacheInvalidator, InvalidationPlan};
pub use keys::{ReplyKey, SearchKey};
pub use store::ObjectCache;
pub use trigger::CacheTrigger;
