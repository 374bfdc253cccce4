pub mod signals;

pub use signals::TitleSignal;

use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::config::Config;
use crate::github::{GitHubError, PullRequest, RepositoryClient, Review, ReviewEvent, ReviewState};

/// Body of every review the bot submits, and the comment text counted as an
/// informal approval.
pub const APPROVAL_BODY: &str = "LGTM";

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Failed to retrieve data from {owner}/{name}: {source}")]
    Retrieval {
        owner: String,
        name: String,
        #[source]
        source: GitHubError,
    },

    #[error("Failed to approve {owner}/{name}#{number}: {source}")]
    Approval {
        owner: String,
        name: String,
        number: u64,
        #[source]
        source: GitHubError,
    },
}

/// What the existing reviews on a pull request amount to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewTally {
    /// The bot has already approved it.
    ApprovedByUser,
    /// Number of approvals from others, formal or `LGTM` comments.
    Approvals(u32),
}

impl ReviewTally {
    /// Scan reviews in order, stopping at the first approval by `user`.
    pub fn from_reviews(reviews: &[Review], user: &str) -> Self {
        let mut approvals = 0;
        for review in reviews {
            if review.login.as_deref() == Some(user) && review.state == ReviewState::Approved {
                return ReviewTally::ApprovedByUser;
            }
            let lgtm_comment = review.state == ReviewState::Commented
                && review.body.as_deref() == Some(APPROVAL_BODY);
            if review.state == ReviewState::Approved || lgtm_comment {
                approvals += 1;
            }
        }
        ReviewTally::Approvals(approvals)
    }

    pub fn is_sufficient(&self, required: u32) -> bool {
        match self {
            ReviewTally::ApprovedByUser => false,
            ReviewTally::Approvals(count) => *count >= required,
        }
    }
}

/// An approval that was rejected, with its position in the working list.
#[derive(Debug)]
pub struct ApprovalFailure {
    pub index: usize,
    pub pull_request: PullRequest,
    pub error: PipelineError,
}

/// Result of `approve_all`. Approval is best-effort: one failure does not
/// stop the remaining pull requests from being approved.
#[derive(Debug, Default)]
pub struct ApprovalOutcome {
    pub approved: Vec<PullRequest>,
    pub failed: Vec<ApprovalFailure>,
}

impl ApprovalOutcome {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// Surface the first failure, if any.
    pub fn into_result(self) -> Result<Vec<PullRequest>, PipelineError> {
        match self.failed.into_iter().next() {
            Some(failure) => Err(failure.error),
            None => Ok(self.approved),
        }
    }
}

/// Retrieves open pull requests, narrows them down to the ones worth
/// approving, and approves them.
///
/// Steps are meant to run in order: `retrieve`, the four filters, then
/// `approve_all`. Nothing enforces that order.
pub struct ReviewPipeline<C> {
    client: C,
    config: Config,
    pull_requests: Vec<PullRequest>,
}

impl<C: RepositoryClient> ReviewPipeline<C> {
    pub fn new(client: C, config: Config) -> Self {
        Self {
            client,
            config,
            pull_requests: Vec::new(),
        }
    }

    /// Seed the working list without going through `retrieve`.
    #[cfg(test)]
    pub fn with_pull_requests(mut self, pull_requests: Vec<PullRequest>) -> Self {
        self.pull_requests = pull_requests;
        self
    }

    pub fn pull_requests(&self) -> &[PullRequest] {
        &self.pull_requests
    }

    #[cfg(test)]
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Replace the working list with the `max_retrieval` most recently
    /// updated open pull requests of each repository, in config order.
    ///
    /// On failure the working list is left untouched.
    #[instrument(skip(self))]
    pub async fn retrieve(&mut self) -> Result<&mut Self, PipelineError> {
        let mut retrieved = Vec::new();
        for target in &self.config.repositories {
            let open = self
                .client
                .list_open_pull_requests(target, self.config.max_retrieval)
                .await
                .map_err(|source| PipelineError::Retrieval {
                    owner: target.owner.clone(),
                    name: target.name.clone(),
                    source,
                })?;
            debug!(repo = %target, open = open.len(), "listed open pull requests");
            retrieved.extend(open.into_iter().take(self.config.max_retrieval));
        }
        info!(count = retrieved.len(), "retrieved pull requests");
        self.pull_requests = retrieved;
        Ok(self)
    }

    pub fn filter_work_in_progress(&mut self) -> &mut Self {
        self.filter_title(TitleSignal::WorkInProgress)
    }

    pub fn filter_do_not_merge(&mut self) -> &mut Self {
        self.filter_title(TitleSignal::DoNotMerge)
    }

    fn filter_title(&mut self, signal: TitleSignal) -> &mut Self {
        self.pull_requests.retain(|pr| {
            let flagged = signal.matches(&pr.title);
            if flagged {
                debug!(pr = pr.number, signal = signal.label(), "ignoring flagged pull request");
            }
            !flagged
        });
        self
    }

    /// Drop pull requests opened by the bot's own account.
    pub fn filter_own_authored(&mut self) -> &mut Self {
        let user = &self.config.user;
        self.pull_requests.retain(|pr| {
            let own = pr.author == *user;
            if own {
                debug!(pr = pr.number, "ignoring user's own pull request");
            }
            !own
        });
        self
    }

    /// Keep pull requests the bot has not approved yet and that already carry
    /// `approval_count` approvals. Reviews are read from each PR's head
    /// repository.
    ///
    /// On failure the working list is left untouched.
    #[instrument(skip(self))]
    pub async fn filter_sufficiently_reviewed(&mut self) -> Result<&mut Self, PipelineError> {
        let mut kept = Vec::with_capacity(self.pull_requests.len());
        for pr in &self.pull_requests {
            let head = &pr.head;
            let reviews = self
                .client
                .list_reviews(&head.owner, &head.name, pr.number)
                .await
                .map_err(|source| PipelineError::Retrieval {
                    owner: head.owner.clone(),
                    name: head.name.clone(),
                    source,
                })?;

            let tally = ReviewTally::from_reviews(&reviews, &self.config.user);
            if tally.is_sufficient(self.config.approval_count) {
                kept.push(pr.clone());
            } else {
                debug!(pr = pr.number, ?tally, "ignoring approved pull request");
            }
        }
        self.pull_requests = kept;
        Ok(self)
    }

    /// Submit an `APPROVE` review with body `LGTM` on the PR's head
    /// repository.
    pub async fn approve_one(&self, pr: &PullRequest) -> Result<(), PipelineError> {
        let head = &pr.head;
        debug!(pr = pr.number, owner = %head.owner, name = %head.name, "approving");
        self.client
            .create_review(
                &head.owner,
                &head.name,
                pr.number,
                ReviewEvent::Approve,
                APPROVAL_BODY,
            )
            .await
            .map_err(|source| PipelineError::Approval {
                owner: head.owner.clone(),
                name: head.name.clone(),
                number: pr.number,
                source,
            })
    }

    /// Approve every pull request in the working list, in order. Failures
    /// are collected and the remaining pull requests are still approved.
    pub async fn approve_all(&self) -> ApprovalOutcome {
        let mut outcome = ApprovalOutcome::default();
        for (index, pr) in self.pull_requests.iter().enumerate() {
            match self.approve_one(pr).await {
                Ok(()) => outcome.approved.push(pr.clone()),
                Err(error) => {
                    warn!(pr = pr.number, %error, "approval failed");
                    outcome.failed.push(ApprovalFailure {
                        index,
                        pull_request: pr.clone(),
                        error,
                    });
                }
            }
        }
        info!(
            approved = outcome.approved.len(),
            failed = outcome.failed.len(),
            "approval pass complete"
        );
        outcome
    }
}
