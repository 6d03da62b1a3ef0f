//! Trending score computation.
//!
//! Pure functions over `(created_at, comment_count, upvote_count)`; the
//! caller supplies `now` so feeds score a whole page against one clock and
//! tests stay deterministic.

use time::OffsetDateTime;

const SECONDS_PER_HOUR: f64 = 3600.0;

/// Trending score: engagement damped by logarithmic recency decay.
///
/// ```text
/// age_hours = max(0, now - created_at) / 3600
/// score     = (comments * 2 + upvotes) / log2(age_hours + 2)
/// ```
///
/// Age is clamped to zero, so the denominator is at least `log2(2) = 1` and
/// the score is always finite and non-negative. For fixed engagement the
/// score never increases with age; for fixed age it never decreases with
/// engagement.
pub fn trending_score(
    created_at: OffsetDateTime,
    comment_count: u64,
    upvote_count: u64,
    now: OffsetDateTime,
) -> f64 {
    let age_hours = age_in_hours(created_at, now);
    let recency_weight = 1.0 / (age_hours + 2.0).log2();
    let engagement_weight = (comment_count * 2 + upvote_count) as f64;
    recency_weight * engagement_weight
}

/// The earlier linear-penalty formula (`upvotes*3 + comments*2 -
/// age_hours*0.5`). Kept for comparison; no feed uses it. It can go
/// negative and orders high-engagement old posts very differently from
/// [`trending_score`], so the two are never mixed.
pub fn legacy_trending_score(
    created_at: OffsetDateTime,
    comment_count: u64,
    upvote_count: u64,
    now: OffsetDateTime,
) -> f64 {
    let age_hours = age_in_hours(created_at, now);
    (upvote_count * 3 + comment_count * 2) as f64 - age_hours * 0.5
}

/// Additive engagement used by recommendations, which rank within an
/// already-recent window and need no recency term.
pub fn engagement_score(comment_count: u64, upvote_count: u64) -> u64 {
    comment_count + upvote_count
}

fn age_in_hours(created_at: OffsetDateTime, now: OffsetDateTime) -> f64 {
    let elapsed = (now - created_at).as_seconds_f64();
    (elapsed / SECONDS_PER_HOUR).max(0.0)
}
