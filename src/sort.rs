use crate::config::SortBy;
use crate::summary::PrSummary;
use std::cmp::Ordering;

fn by_times(a: &PrSummary, b: &PrSummary) -> Ordering {
    b.closed_at
        .cmp(&a.closed_at)
        .then_with(|| b.opened_at.cmp(&a.opened_at))
}

/// Total order on identity, so equal times never fall back to arrival order.
fn by_identity(a: &PrSummary, b: &PrSummary) -> Ordering {
    a.repo_path()
        .cmp(b.repo_path())
        .then_with(|| a.number.cmp(&b.number))
}

/// Newest `closed_at` first; newest `opened_at` first among equals.
pub fn by_date(a: &PrSummary, b: &PrSummary) -> Ordering {
    by_times(a, b).then_with(|| by_identity(a, b))
}

/// "owner/name" ascending, then [`by_date`] within a repository.
pub fn by_repo(a: &PrSummary, b: &PrSummary) -> Ordering {
    a.repo_path()
        .cmp(b.repo_path())
        .then_with(|| by_times(a, b))
        .then_with(|| a.number.cmp(&b.number))
}

/// In-place sort of the collected summaries. The result does not depend on
/// the order they arrived in.
pub fn sort_summaries(summaries: &mut [PrSummary], sort: SortBy) {
    match sort {
        SortBy::Date => summaries.sort_by(by_date),
        SortBy::Repo => summaries.sort_by(by_repo),
    }
}
