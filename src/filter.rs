//! Predicates applied to summaries between the merge and the collector.

use crate::summary::PrSummary;
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeSet;

/// Width of the dashboard window. Also the span covered by the ruler.
pub const WINDOW_HOURS: i64 = 240;

pub fn window() -> Duration {
    Duration::hours(WINDOW_HOURS)
}

/// True when the pull request closed (or is still open) less than ten days
/// before `now`. A pull request closed exactly 240 hours ago is outside.
pub fn within_window(summary: &PrSummary, now: DateTime<Utc>) -> bool {
    now - summary.closed_at < window()
}

/// True when no allow-list is configured or the author is on it.
pub fn allowed_author(summary: &PrSummary, authors: Option<&BTreeSet<String>>) -> bool {
    authors.map_or(true, |authors| authors.contains(&summary.author))
}
