//! The per-request dashboard pipeline.
//!
//! Every request builds its own set of tasks connected by channels:
//!
//! ```text
//! repos ─> resolve ─┬─> retrieve(open, created)  ─┐
//!                   └─> retrieve(closed, updated) ─┴─> merge ─> age filter ─> author filter ─> display
//! ```
//!
//! Each stage owns the sending half of its output channel and drops it once
//! its input is drained, so closing propagates downstream on its own. The
//! display stage buffers everything, sorts, renders and hands the page back
//! through a oneshot channel that [`run`] awaits.

use crate::config::{DashboardConfig, RepoRef};
use crate::error::DashboardError;
use crate::filter::{allowed_author, within_window};
use crate::github::{Direction, ListOptions, ListState, PullRequestSource, SortKey};
use crate::render::Renderer;
use crate::sort::sort_summaries;
use crate::summary::{normalize, PrSummary};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

/// Slots per stage channel. Tokio has no zero-capacity channel.
const STAGE_CAPACITY: usize = 1;

/// Everything a request's pipeline reads. Captured once when the request arrives.
#[derive(Clone)]
pub struct RequestContext {
    pub config: Arc<DashboardConfig>,
    pub source: Arc<dyn PullRequestSource>,
    pub renderer: Arc<Renderer>,
    /// Reference time for every age comparison of the request.
    pub now: DateTime<Utc>,
}

/// Runs the pipeline for one request and returns the rendered page.
pub async fn run(ctx: RequestContext) -> Result<String, DashboardError> {
    let (open_tx, open_rx) = mpsc::channel::<FetchTarget>(STAGE_CAPACITY);
    let (closed_tx, closed_rx) = mpsc::channel::<FetchTarget>(STAGE_CAPACITY);

    let merged = merge(vec![
        retrieve(
            open_rx,
            ctx.source.clone(),
            ctx.now,
            ListState::Open,
            SortKey::Created,
        ),
        retrieve(
            closed_rx,
            ctx.source.clone(),
            ctx.now,
            ListState::Closed,
            SortKey::Updated,
        ),
    ]);

    let now = ctx.now;
    let recent = filter(merged, move |summary| within_window(summary, now));

    let authors = ctx.config.authors.clone();
    let allowed = filter(recent, move |summary| {
        allowed_author(summary, authors.as_ref())
    });

    let done = display(allowed, ctx.clone());

    for repo in &ctx.config.repos {
        let Some(target) = resolve(ctx.source.as_ref(), repo).await else {
            continue;
        };
        // A send fails only when that fetcher gave up after a remote error.
        let _ = open_tx.send(target.clone()).await;
        let _ = closed_tx.send(target).await;
    }
    drop(open_tx);
    drop(closed_tx);

    done.await.map_err(|_| {
        DashboardError::Internal("display stage exited without completing".to_string())
    })?
}

/// A repository together with the branch its pull requests must target.
#[derive(Clone, Debug, PartialEq)]
pub struct FetchTarget {
    pub repo: RepoRef,
    pub base: String,
}

/// Picks the target branch once per repository, shared by both fetchers.
///
/// A repository whose default branch cannot be looked up is left out of the
/// dashboard.
async fn resolve(source: &dyn PullRequestSource, repo: &RepoRef) -> Option<FetchTarget> {
    let base = match &repo.base {
        Some(base) => base.clone(),
        None => match source.default_branch(repo).await {
            Ok(branch) => branch,
            Err(e) => {
                tracing::warn!(
                    owner = %repo.owner,
                    repo = %repo.name,
                    "Skipping repository without a default branch: {:#}",
                    e
                );
                return None;
            }
        },
    };

    Some(FetchTarget {
        repo: repo.clone(),
        base,
    })
}

/// Fetches pull requests for every target received on `targets`.
///
/// A remote error ends this fetcher: its output closes and the rest of the
/// pipeline carries on with what already arrived.
pub fn retrieve(
    mut targets: mpsc::Receiver<FetchTarget>,
    source: Arc<dyn PullRequestSource>,
    now: DateTime<Utc>,
    state: ListState,
    sort: SortKey,
) -> mpsc::Receiver<PrSummary> {
    let (tx, rx) = mpsc::channel(STAGE_CAPACITY);

    tokio::spawn(async move {
        while let Some(FetchTarget { repo, base }) = targets.recv().await {
            let options = ListOptions {
                state,
                sort,
                direction: Direction::Desc,
                base,
                per_page: repo.depth,
                page: 0,
            };
            let records = match source.list_pull_requests(&repo, &options).await {
                Ok(records) => records,
                Err(e) => {
                    tracing::warn!(
                        owner = %repo.owner,
                        repo = %repo.name,
                        state = state.as_str(),
                        "Stopping fetcher after GitHub error: {:#}",
                        e
                    );
                    return;
                }
            };

            tracing::debug!(
                owner = %repo.owner,
                repo = %repo.name,
                state = state.as_str(),
                count = records.len(),
                "Fetched pull requests"
            );

            for raw in records {
                let number = raw.number;
                let Some(summary) = normalize(raw, &repo, now) else {
                    tracing::debug!(repo_id = %repo, ?number, "Dropping incomplete pull request");
                    continue;
                };
                if tx.send(summary).await.is_err() {
                    return;
                }
            }
        }
    });

    rx
}

/// Interleaves `inputs` into one channel that closes once every input has closed.
pub fn merge(inputs: Vec<mpsc::Receiver<PrSummary>>) -> mpsc::Receiver<PrSummary> {
    let (tx, rx) = mpsc::channel(STAGE_CAPACITY);

    for mut input in inputs {
        let tx = tx.clone();
        tokio::spawn(async move {
            while let Some(summary) = input.recv().await {
                if tx.send(summary).await.is_err() {
                    return;
                }
            }
        });
    }

    rx
}

/// Forwards the summaries for which `keep` holds, in arrival order.
pub fn filter<F>(mut input: mpsc::Receiver<PrSummary>, keep: F) -> mpsc::Receiver<PrSummary>
where
    F: Fn(&PrSummary) -> bool + Send + 'static,
{
    let (tx, rx) = mpsc::channel(STAGE_CAPACITY);

    tokio::spawn(async move {
        while let Some(summary) = input.recv().await {
            if keep(&summary) && tx.send(summary).await.is_err() {
                return;
            }
        }
    });

    rx
}

/// Collects the stream, sorts it and renders the page once the input closes.
///
/// The returned receiver resolves exactly once, after the input has closed.
pub fn display(
    mut input: mpsc::Receiver<PrSummary>,
    ctx: RequestContext,
) -> oneshot::Receiver<Result<String, DashboardError>> {
    let (done_tx, done_rx) = oneshot::channel();

    tokio::spawn(async move {
        let mut summaries = Vec::new();
        while let Some(summary) = input.recv().await {
            summaries.push(summary);
        }

        sort_summaries(&mut summaries, ctx.config.sort);
        let page = ctx
            .renderer
            .render(&summaries, &ctx.config, ctx.now)
            .map_err(DashboardError::from);

        tracing::info!(rows = summaries.len(), "Rendered dashboard");

        // The request may have been abandoned; nobody is left to tell.
        let _ = done_tx.send(page);
    });

    done_rx
}
