use crate::github::PullRequest;

/// What happened to a pull request that survived every filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// Approval submitted
    Approved,
    /// Approval attempted and rejected by the API
    Failed(String),
    /// Dry run: would have been approved
    Skipped,
}

impl std::fmt::Display for Disposition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Disposition::Approved => write!(f, "APPROVED"),
            Disposition::Failed(_) => write!(f, "FAILED"),
            Disposition::Skipped => write!(f, "DRY RUN"),
        }
    }
}

/// One line of the run summary.
#[derive(Debug, Clone)]
pub struct Entry {
    pub pull_request: PullRequest,
    pub disposition: Disposition,
}

/// Summary of one bot run.
#[derive(Debug)]
pub struct RunReport {
    /// Repositories polled
    pub repositories: usize,
    /// Pull requests retrieved before filtering
    pub retrieved: usize,
    /// Pull requests that passed every filter, in working-list order
    pub entries: Vec<Entry>,
}

impl RunReport {
    pub fn approved(&self) -> usize {
        self.count(|d| matches!(d, Disposition::Approved))
    }

    pub fn failed(&self) -> usize {
        self.count(|d| matches!(d, Disposition::Failed(_)))
    }

    fn count(&self, pred: impl Fn(&Disposition) -> bool) -> usize {
        self.entries.iter().filter(|e| pred(&e.disposition)).count()
    }
}
