//! Application configuration and environment variable parsing.
//!
//! Process-level settings (port, credentials, remote API options) are read from
//! the environment with `envy`. The dashboard itself is described by a JSON
//! document carried in the `CONFIG` variable and parsed into [`DashboardConfig`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration as StdDuration;

const MIN_DEPTH: u8 = 1;
const MAX_DEPTH: u8 = 100;

/// A repository to monitor and how many of its most recent pull requests to pull.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoRef {
    /// The owner of the repository (e.g., "docker").
    pub owner: String,
    /// The name of the repository (e.g., "swarmkit").
    #[serde(rename = "repo")]
    pub name: String,
    /// Items per state query. Clamped into 1..=100.
    #[serde(deserialize_with = "deserialize_depth")]
    pub depth: u8,
    /// Target branch filter. The repository's default branch is used when absent.
    #[serde(default)]
    pub base: Option<String>,
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

fn deserialize_depth<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let depth: i64 = Deserialize::deserialize(deserializer)?;
    Ok(clamp_depth(depth))
}

fn clamp_depth(depth: i64) -> u8 {
    let clamped = depth.clamp(i64::from(MIN_DEPTH), i64::from(MAX_DEPTH));
    u8::try_from(clamped).unwrap_or(MAX_DEPTH)
}

/// How rows are ordered on the dashboard.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Option<serde_json::Value>", into = "String")]
pub enum SortBy {
    /// Newest close time first, newest open time breaking ties.
    #[default]
    Date,
    /// Grouped by "owner/name", then as [`SortBy::Date`] within a group.
    Repo,
}

/// Anything other than the string "repo", `null` and non-strings included,
/// sorts by date.
impl From<Option<serde_json::Value>> for SortBy {
    fn from(value: Option<serde_json::Value>) -> Self {
        match value.as_ref().and_then(serde_json::Value::as_str) {
            Some("repo") => SortBy::Repo,
            _ => SortBy::Date,
        }
    }
}

impl From<SortBy> for String {
    fn from(value: SortBy) -> Self {
        match value {
            SortBy::Date => "date".to_string(),
            SortBy::Repo => "repo".to_string(),
        }
    }
}

/// Colour tokens used for the bars. Opaque to the dashboard, usually CSS colours.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Colours {
    pub passive: String,
    pub warning: String,
    pub alert: String,
    pub closed: String,
}

impl Default for Colours {
    fn default() -> Self {
        Self {
            passive: "#00cc66".to_string(),
            warning: "#ffff00".to_string(),
            alert: "#cc0000".to_string(),
            closed: "#999".to_string(),
        }
    }
}

/// Open-interval boundaries (in hours) between the passive, warning and alert colours.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Thresholds {
    pub passive_hours: f64,
    pub warning_hours: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            passive_hours: 24.0,
            warning_hours: 48.0,
        }
    }
}

/// Raw customization block as written in the `CONFIG` document.
///
/// Every field is optional; blanks and zeroes fall back to the defaults.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
struct Customization {
    passive_color: Option<String>,
    warning_color: Option<String>,
    alert_color: Option<String>,
    closed_color: Option<String>,
    passive_time: Option<f64>,
    warning_time: Option<f64>,
}

impl Customization {
    fn into_parts(self) -> (Colours, Thresholds) {
        let colours = Colours::default();
        let thresholds = Thresholds::default();

        let colour = |value: Option<String>, fallback: String| {
            value.filter(|v| !v.trim().is_empty()).unwrap_or(fallback)
        };
        let hours = |value: Option<f64>, fallback: f64| {
            value.filter(|v| *v > 0.0 && v.is_finite()).unwrap_or(fallback)
        };

        (
            Colours {
                passive: colour(self.passive_color, colours.passive),
                warning: colour(self.warning_color, colours.warning),
                alert: colour(self.alert_color, colours.alert),
                closed: colour(self.closed_color, colours.closed),
            },
            Thresholds {
                passive_hours: hours(self.passive_time, thresholds.passive_hours),
                warning_hours: hours(self.warning_time, thresholds.warning_hours),
            },
        )
    }
}

#[derive(Deserialize)]
struct RawDashboardConfig {
    #[serde(default)]
    repos: Vec<RepoRef>,
    #[serde(default)]
    authors: Option<Vec<String>>,
    #[serde(default)]
    sort: SortBy,
    #[serde(default)]
    customization: Customization,
}

/// What the dashboard shows and how. Read-only for the lifetime of a request.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(from = "RawDashboardConfig")]
pub struct DashboardConfig {
    /// Repositories in display-configuration order.
    pub repos: Vec<RepoRef>,
    /// Author allow-list. `None` disables the filter; an empty set drops everything.
    pub authors: Option<BTreeSet<String>>,
    pub sort: SortBy,
    pub colours: Colours,
    pub thresholds: Thresholds,
}

impl From<RawDashboardConfig> for DashboardConfig {
    fn from(raw: RawDashboardConfig) -> Self {
        let (colours, thresholds) = raw.customization.into_parts();
        Self {
            repos: raw.repos,
            authors: raw.authors.map(|authors| authors.into_iter().collect()),
            sort: raw.sort,
            colours,
            thresholds,
        }
    }
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            repos: Vec::new(),
            authors: None,
            sort: SortBy::default(),
            colours: Colours::default(),
            thresholds: Thresholds::default(),
        }
    }
}

impl DashboardConfig {
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

/// Application configuration loaded from environment variables.
#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    /// Port the HTTP server listens on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Basic auth credentials for the dashboard. Auth is enforced only when both are set.
    pub dashboard_user: Option<String>,
    pub dashboard_password: Option<String>,

    /// Redirect target for requests that did not arrive over HTTPS.
    pub ssl_host: Option<String>,

    /// Personal access token for the GitHub API. Preferred over user/password.
    pub github_token: Option<String>,
    pub github_user: Option<String>,
    pub github_password: Option<String>,

    /// Alternative API base, e.g. a GitHub Enterprise instance.
    pub github_api_url: Option<String>,

    /// Per-call timeout for GitHub requests.
    #[serde(default = "default_github_timeout_seconds")]
    pub github_timeout_seconds: u64,

    /// The dashboard description, given as a JSON document.
    #[serde(rename = "config", deserialize_with = "deserialize_dashboard")]
    pub dashboard: DashboardConfig,
}

fn default_port() -> u16 {
    8080
}

fn default_github_timeout_seconds() -> u64 {
    10
}

fn deserialize_dashboard<'de, D>(deserializer: D) -> Result<DashboardConfig, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    DashboardConfig::from_json(&s).map_err(serde::de::Error::custom)
}

/// Trims a credential and discards it when nothing is left.
fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::from_env()
    }

    pub fn github_timeout(&self) -> StdDuration {
        StdDuration::from_secs(self.github_timeout_seconds)
    }

    /// Dashboard credentials, when basic auth should be enforced.
    pub fn dashboard_credentials(&self) -> Option<(&str, &str)> {
        Some((
            non_blank(&self.dashboard_user)?,
            non_blank(&self.dashboard_password)?,
        ))
    }

    pub fn ssl_host(&self) -> Option<&str> {
        non_blank(&self.ssl_host)
    }

    pub fn github_token(&self) -> Option<&str> {
        non_blank(&self.github_token)
    }

    pub fn github_basic_auth(&self) -> Option<(&str, &str)> {
        Some((
            non_blank(&self.github_user)?,
            non_blank(&self.github_password)?,
        ))
    }
}
