//! Remote data source for pull requests.
//!
//! Records are deserialized into [`RawPullRequest`], where every field is
//! optional, instead of Octocrab's typed models. The API occasionally omits
//! fields (deleted users, removed forks) and the dashboard must keep working
//! when it does.

use crate::config::{AppConfig, RepoRef};
use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::http::Uri;
use chrono::{DateTime, Utc};
use octocrab::Octocrab;
use serde::{Deserialize, Serialize};

/// State filter for a list call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ListState {
    Open,
    Closed,
    All,
}

impl ListState {
    pub fn as_str(self) -> &'static str {
        match self {
            ListState::Open => "open",
            ListState::Closed => "closed",
            ListState::All => "all",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    Created,
    Updated,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Asc,
    Desc,
}

/// Query parameters of `GET /repos/{owner}/{repo}/pulls`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ListOptions {
    pub state: ListState,
    pub sort: SortKey,
    pub direction: Direction,
    pub base: String,
    pub per_page: u8,
    pub page: u32,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct RawUser {
    pub login: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct RawRepository {
    pub name: Option<String>,
    pub owner: Option<RawUser>,
    pub default_branch: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct RawBase {
    pub repo: Option<RawRepository>,
}

/// A pull request as returned by the list endpoint. Any field may be absent.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct RawPullRequest {
    pub number: Option<u64>,
    pub title: Option<String>,
    pub user: Option<RawUser>,
    pub state: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub base: Option<RawBase>,
}

impl RawPullRequest {
    pub fn author(&self) -> Option<&str> {
        self.user.as_ref()?.login.as_deref()
    }

    /// Owner and name of the repository the pull request targets.
    pub fn base_repository(&self) -> (Option<&str>, Option<&str>) {
        let repo = self.base.as_ref().and_then(|base| base.repo.as_ref());
        let owner = repo
            .and_then(|repo| repo.owner.as_ref())
            .and_then(|owner| owner.login.as_deref());
        let name = repo.and_then(|repo| repo.name.as_deref());
        (owner, name)
    }
}

/// Anything that can list pull requests for a repository.
///
/// Implementations are shared by every fetcher of a request and must
/// tolerate concurrent calls.
#[async_trait]
pub trait PullRequestSource: Send + Sync {
    /// Name of the branch pull requests are filtered against when the
    /// configuration does not name one.
    async fn default_branch(&self, repo: &RepoRef) -> Result<String>;

    /// A single page of pull requests.
    async fn list_pull_requests(
        &self,
        repo: &RepoRef,
        options: &ListOptions,
    ) -> Result<Vec<RawPullRequest>>;
}

/// Octocrab-backed [`PullRequestSource`].
#[derive(Clone)]
pub struct GitHubClient {
    octocrab: Octocrab,
}

impl GitHubClient {
    /// Builds the client from the process configuration.
    ///
    /// Credentials are picked in order: token, user/password, anonymous.
    pub fn new(config: &AppConfig) -> Result<Self> {
        let mut builder = Octocrab::builder()
            .set_connect_timeout(Some(config.github_timeout()))
            .set_read_timeout(Some(config.github_timeout()));

        if let Some(token) = config.github_token() {
            builder = builder.personal_token(token.to_string());
        } else if let Some((user, password)) = config.github_basic_auth() {
            builder = builder.basic_auth(user.to_string(), password.to_string());
        }

        if let Some(api_url) = config.github_api_url.as_deref() {
            let base_uri: Uri = api_url
                .parse()
                .with_context(|| format!("invalid GITHUB_API_URL {api_url}"))?;
            builder = builder
                .base_uri(base_uri)
                .context("failed to set GitHub API base")?;
        }

        Ok(Self {
            octocrab: builder.build().context("failed to build GitHub client")?,
        })
    }
}

/// Strips path separators and traversal sequences out of a route segment.
fn sanitize(segment: &str) -> String {
    segment.trim().replace("..", "").replace('/', "")
}

fn repo_route(repo: &RepoRef) -> String {
    format!("/repos/{}/{}", sanitize(&repo.owner), sanitize(&repo.name))
}

#[async_trait]
impl PullRequestSource for GitHubClient {
    async fn default_branch(&self, repo: &RepoRef) -> Result<String> {
        let repository: RawRepository = self
            .octocrab
            .get(repo_route(repo), None::<&()>)
            .await
            .with_context(|| format!("failed to look up {repo}"))?;

        repository
            .default_branch
            .filter(|branch| !branch.is_empty())
            .with_context(|| format!("{repo} reported no default branch"))
    }

    async fn list_pull_requests(
        &self,
        repo: &RepoRef,
        options: &ListOptions,
    ) -> Result<Vec<RawPullRequest>> {
        let route = format!("{}/pulls", repo_route(repo));
        self.octocrab
            .get(route, Some(options))
            .await
            .with_context(|| {
                format!(
                    "failed to list {} pull requests for {repo}",
                    options.state.as_str()
                )
            })
    }
}
