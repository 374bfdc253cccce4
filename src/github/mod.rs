pub mod client;
pub mod types;

pub use client::GitHubClient;
pub use types::{PullRequest, RepositoryTarget, Review, ReviewEvent, ReviewState};

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GitHubError {
    #[error("GitHub API request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("GitHub API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("GitHub token not found in config or environment")]
    MissingToken,
}

/// Remote operations the review pipeline needs from a code host.
///
/// Implementations return typed records; any payload parsing happens behind
/// this boundary.
#[async_trait]
pub trait RepositoryClient: Send + Sync {
    /// Open pull requests of `target`, most recently updated first.
    ///
    /// `limit` is how many the caller will use; implementations may stop
    /// fetching once they have that many, or return more.
    async fn list_open_pull_requests(
        &self,
        target: &RepositoryTarget,
        limit: usize,
    ) -> Result<Vec<PullRequest>, GitHubError>;

    /// Reviews on a pull request, in the order the host returns them.
    async fn list_reviews(
        &self,
        owner: &str,
        name: &str,
        number: u64,
    ) -> Result<Vec<Review>, GitHubError>;

    /// Submit a review on a pull request.
    async fn create_review(
        &self,
        owner: &str,
        name: &str,
        number: u64,
        event: ReviewEvent,
        body: &str,
    ) -> Result<(), GitHubError>;
}
