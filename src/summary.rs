use crate::config::RepoRef;
use crate::github::RawPullRequest;
use chrono::{DateTime, Utc};

/// Login GitHub shows for pull requests whose author account was deleted.
pub const GHOST_AUTHOR: &str = "ghost";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PrState {
    #[default]
    Open,
    Closed,
}

impl PrState {
    /// Anything other than "closed" is treated as open.
    pub fn from_api(state: Option<&str>) -> Self {
        match state {
            Some(state) if state.eq_ignore_ascii_case("closed") => PrState::Closed,
            _ => PrState::Open,
        }
    }
}

/// A pull request with every optional field resolved.
///
/// `opened_at <= closed_at <= reference time` holds for every summary
/// produced by [`normalize`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PrSummary {
    pub owner: String,
    pub name: String,
    pub number: u64,
    pub title: String,
    pub author: String,
    pub opened_at: DateTime<Utc>,
    /// The reference time while the pull request is still open.
    pub closed_at: DateTime<Utc>,
    pub state: PrState,
}

impl PrSummary {
    /// "owner/name" as bytes, for ordering without allocating.
    pub fn repo_path(&self) -> impl Iterator<Item = u8> + '_ {
        self.owner
            .bytes()
            .chain(std::iter::once(b'/'))
            .chain(self.name.bytes())
    }
}

/// Converts a raw record into a [`PrSummary`], or `None` when it cannot be used.
///
/// `repo` is the repository that was queried; its owner and name stand in when
/// the record does not carry its base repository.
pub fn normalize(raw: RawPullRequest, repo: &RepoRef, now: DateTime<Utc>) -> Option<PrSummary> {
    let number = raw.number?;
    let opened_at = raw.created_at?;
    let closed_at = raw.closed_at.map_or(now, |closed_at| closed_at.min(now));
    if opened_at > closed_at {
        return None;
    }

    let (owner, name) = raw.base_repository();
    let owner = owner.unwrap_or(repo.owner.as_str()).to_string();
    let name = name.unwrap_or(repo.name.as_str()).to_string();
    let author = raw.author().unwrap_or(GHOST_AUTHOR).to_string();

    Some(PrSummary {
        owner,
        name,
        number,
        title: raw.title.unwrap_or_default(),
        author,
        opened_at,
        closed_at,
        state: PrState::from_api(raw.state.as_deref()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::{RawBase, RawRepository, RawUser};
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 10, 12, 0, 0).unwrap()
    }

    fn repo() -> RepoRef {
        RepoRef {
            owner: "docker".to_string(),
            name: "swarmkit".to_string(),
            depth: 15,
            base: None,
        }
    }

    fn raw() -> RawPullRequest {
        RawPullRequest {
            number: Some(42),
            title: Some("Add retries".to_string()),
            user: Some(RawUser {
                login: Some("alice".to_string()),
            }),
            state: Some("open".to_string()),
            created_at: Some(now() - Duration::hours(5)),
            closed_at: None,
            base: Some(RawBase {
                repo: Some(RawRepository {
                    name: Some("moby".to_string()),
                    owner: Some(RawUser {
                        login: Some("moby".to_string()),
                    }),
                    default_branch: None,
                }),
            }),
        }
    }

    #[test]
    fn test_open_pull_request_closes_at_reference_time() {
        let summary = normalize(raw(), &repo(), now()).unwrap();

        assert_eq!(summary.owner, "moby");
        assert_eq!(summary.name, "moby");
        assert_eq!(summary.number, 42);
        assert_eq!(summary.title, "Add retries");
        assert_eq!(summary.author, "alice");
        assert_eq!(summary.opened_at, now() - Duration::hours(5));
        assert_eq!(summary.closed_at, now());
        assert_eq!(summary.state, PrState::Open);
    }

    #[test]
    fn test_missing_created_at_drops_record() {
        let record = RawPullRequest {
            created_at: None,
            ..raw()
        };
        assert_eq!(normalize(record, &repo(), now()), None);
    }

    #[test]
    fn test_missing_number_drops_record() {
        let record = RawPullRequest {
            number: None,
            ..raw()
        };
        assert_eq!(normalize(record, &repo(), now()), None);
    }

    #[test]
    fn test_missing_optional_fields_are_resolved() {
        let record = RawPullRequest {
            title: None,
            user: None,
            base: None,
            state: None,
            ..raw()
        };
        let summary = normalize(record, &repo(), now()).unwrap();

        assert_eq!(summary.title, "");
        assert_eq!(summary.author, GHOST_AUTHOR);
        assert_eq!(summary.owner, "docker");
        assert_eq!(summary.name, "swarmkit");
        assert_eq!(summary.state, PrState::Open);
    }

    #[test]
    fn test_closed_state_and_time_are_kept() {
        let closed_at = now() - Duration::hours(2);
        let record = RawPullRequest {
            state: Some("closed".to_string()),
            closed_at: Some(closed_at),
            ..raw()
        };
        let summary = normalize(record, &repo(), now()).unwrap();

        assert_eq!(summary.state, PrState::Closed);
        assert_eq!(summary.closed_at, closed_at);
    }

    #[test]
    fn test_future_close_time_is_clamped_to_reference_time() {
        let record = RawPullRequest {
            closed_at: Some(now() + Duration::minutes(3)),
            ..raw()
        };
        let summary = normalize(record, &repo(), now()).unwrap();
        assert_eq!(summary.closed_at, now());
    }

    #[test]
    fn test_opened_after_closed_drops_record() {
        let record = RawPullRequest {
            created_at: Some(now() + Duration::hours(1)),
            ..raw()
        };
        assert_eq!(normalize(record, &repo(), now()), None);
    }

    #[test]
    fn test_unknown_state_maps_to_open() {
        assert_eq!(PrState::from_api(Some("merged")), PrState::Open);
        assert_eq!(PrState::from_api(Some("CLOSED")), PrState::Closed);
        assert_eq!(PrState::from_api(None), PrState::Open);
    }

    #[test]
    fn test_repo_path_joins_owner_and_name() {
        let summary = normalize(raw(), &repo(), now()).unwrap();
        let path: Vec<u8> = summary.repo_path().collect();
        assert_eq!(path, b"moby/moby");
    }
}
