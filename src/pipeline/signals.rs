/// Title markers that keep a pull request away from auto-approval.
///
/// Matching is a case-insensitive substring search with no word boundaries,
/// so `[WIP]`, `(wip)` and `wipe` all count as work in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TitleSignal {
    WorkInProgress,
    DoNotMerge,
}

impl TitleSignal {
    /// Lowercase substrings that trigger this signal.
    pub fn patterns(&self) -> &'static [&'static str] {
        match self {
            TitleSignal::WorkInProgress => &["wip", "work in progress"],
            TitleSignal::DoNotMerge => &["do not merge", "do_not_merge"],
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TitleSignal::WorkInProgress => "work-in-progress",
            TitleSignal::DoNotMerge => "do-not-merge",
        }
    }

    pub fn matches(&self, title: &str) -> bool {
        let title = title.to_lowercase();
        self.patterns().iter().any(|p| title.contains(p))
    }
}
