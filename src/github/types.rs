use serde::Deserialize;

/// A repository the bot polls for open pull requests.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RepositoryTarget {
    pub owner: String,
    pub name: String,
}

impl RepositoryTarget {
    #[cfg(test)]
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for RepositoryTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// The repository that owns a pull request's source branch.
/// Reviews are listed and created here, which differs from the polled
/// repository for pull requests opened from forks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadRepository {
    pub owner: String,
    pub name: String,
}

/// An open pull request as seen by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequest {
    /// PR number (e.g., 42)
    pub number: u64,
    /// PR title
    pub title: String,
    /// Author's GitHub login
    pub author: String,
    /// Head repository of the source branch
    pub head: HeadRepository,
}

/// Review verdicts the pipeline distinguishes. Everything else is carried
/// through verbatim so unknown states never fail parsing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum ReviewState {
    Approved,
    Commented,
    Other(String),
}

impl From<String> for ReviewState {
    fn from(value: String) -> Self {
        match value.as_str() {
            "APPROVED" => ReviewState::Approved,
            "COMMENTED" => ReviewState::Commented,
            _ => ReviewState::Other(value),
        }
    }
}

/// A review left on a pull request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Review {
    /// Reviewer login; `None` when the account was deleted
    pub login: Option<String>,
    pub state: ReviewState,
    pub body: Option<String>,
}

/// Event submitted when creating a review.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewEvent {
    Approve,
}

impl ReviewEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewEvent::Approve => "APPROVE",
        }
    }
}

// Wire shapes returned by the GitHub REST API. Only the fields the bot reads
// are modelled; nullable objects stay optional until conversion.

#[derive(Debug, Deserialize)]
pub(crate) struct WireUser {
    pub login: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireRepo {
    pub name: String,
    pub owner: WireUser,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireHead {
    pub repo: Option<WireRepo>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WirePullRequest {
    pub number: u64,
    pub title: String,
    pub user: Option<WireUser>,
    pub head: WireHead,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireReview {
    pub user: Option<WireUser>,
    pub state: ReviewState,
    pub body: Option<String>,
}

impl WirePullRequest {
    /// Convert into a `PullRequest`. A deleted fork leaves `head.repo` null,
    /// in which case the queried repository stands in as the head.
    pub(crate) fn into_pull_request(self, queried: &RepositoryTarget) -> PullRequest {
        let head = match self.head.repo {
            Some(repo) => HeadRepository {
                owner: repo.owner.login,
                name: repo.name,
            },
            None => HeadRepository {
                owner: queried.owner.clone(),
                name: queried.name.clone(),
            },
        };

        PullRequest {
            number: self.number,
            title: self.title,
            author: self.user.map(|u| u.login).unwrap_or_default(),
            head,
        }
    }
}

impl From<WireReview> for Review {
    fn from(wire: WireReview) -> Self {
        Review {
            login: wire.user.map(|u| u.login),
            state: wire.state,
            body: wire.body,
        }
    }
}
