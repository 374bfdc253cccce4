pub mod types;

pub use types::{Disposition, Entry, RunReport};

use crate::github::PullRequest;
use crate::pipeline::ApprovalOutcome;
use colored::Colorize;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, instrument};

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Failed to write report file: {0}")]
    FileWrite(#[from] std::io::Error),
}

/// Build a report for a run that submitted approvals.
///
/// `candidates` must be the working list `outcome` was produced from;
/// failures are matched back by their index in it.
pub fn build(
    repositories: usize,
    retrieved: usize,
    candidates: &[PullRequest],
    outcome: &ApprovalOutcome,
) -> RunReport {
    let entries = candidates
        .iter()
        .enumerate()
        .map(|(index, pr)| {
            let failure = outcome
                .failed
                .iter()
                .find(|failure| failure.index == index)
                .map(|failure| failure.error.to_string());
            let disposition = match failure {
                Some(reason) => Disposition::Failed(reason),
                None => Disposition::Approved,
            };
            Entry {
                pull_request: pr.clone(),
                disposition,
            }
        })
        .collect();

    RunReport {
        repositories,
        retrieved,
        entries,
    }
}

/// Build a report for a dry run: every candidate is listed, nothing was
/// submitted.
pub fn build_dry_run(repositories: usize, retrieved: usize, candidates: &[PullRequest]) -> RunReport {
    RunReport {
        repositories,
        retrieved,
        entries: candidates
            .iter()
            .map(|pr| Entry {
                pull_request: pr.clone(),
                disposition: Disposition::Skipped,
            })
            .collect(),
    }
}

/// Output the report to terminal (default) or to a markdown file.
#[instrument(skip(report), fields(approved = report.approved(), failed = report.failed()))]
pub fn output(report: &RunReport, output_path: Option<&Path>) -> Result<(), ReportError> {
    match output_path {
        None => {
            debug!("writing report to terminal");
            print_terminal_report(report);
            Ok(())
        }
        Some(path) => {
            debug!(path = %path.display(), "writing report to file");
            write_markdown_report(report, path)
        }
    }
}

/// Format and print the report to the terminal with colors:
///
/// Repositories: 2 | Retrieved: 5 | Candidates: 2
///
///   APPROVED  octo/widgets#12 "Fix typo"
///   FAILED    octo/gadgets#3 "Bump deps" (GitHub API returned 502: ...)
///
/// ═══ Approved 1 of 2 ═══
fn print_terminal_report(report: &RunReport) {
    println!();
    println!(
        "Repositories: {} | Retrieved: {} | Candidates: {}",
        report.repositories,
        report.retrieved,
        report.entries.len()
    );
    println!();

    if report.entries.is_empty() {
        println!("  Nothing to approve.");
    }
    for entry in &report.entries {
        let pr = &entry.pull_request;
        let reason = match &entry.disposition {
            Disposition::Failed(reason) => format!(" ({})", reason),
            _ => String::new(),
        };
        println!(
            "  {:<9} {}/{}#{} \"{}\"{}",
            colorize_disposition(&entry.disposition),
            pr.head.owner,
            pr.head.name,
            pr.number,
            pr.title,
            reason
        );
    }
    println!();

    println!(
        "═══ Approved {} of {} ═══",
        report.approved(),
        report.entries.len()
    );
    println!();
}

/// Write the report as a markdown file.
fn write_markdown_report(report: &RunReport, path: &Path) -> Result<(), ReportError> {
    let mut md = String::new();
    md.push_str("# LGTM bot run\n\n");
    md.push_str(&format!(
        "**Repositories:** {} | **Retrieved:** {} | **Candidates:** {}\n\n",
        report.repositories,
        report.retrieved,
        report.entries.len()
    ));

    if report.entries.is_empty() {
        md.push_str("Nothing to approve.\n\n");
    } else {
        md.push_str("| Pull request | Title | Result |\n");
        md.push_str("|---|---|---|\n");
        for entry in &report.entries {
            let pr = &entry.pull_request;
            let result = match &entry.disposition {
                Disposition::Failed(reason) => format!("{} ({})", entry.disposition, reason),
                other => other.to_string(),
            };
            md.push_str(&format!(
                "| `{}/{}#{}` | {} | {} |\n",
                pr.head.owner,
                pr.head.name,
                pr.number,
                escape_cell(&pr.title),
                escape_cell(&result)
            ));
        }
        md.push('\n');
    }

    md.push_str(&format!(
        "## Approved {} of {}\n",
        report.approved(),
        report.entries.len()
    ));

    std::fs::write(path, md)?;
    Ok(())
}

/// Keep a `|` inside a table cell from starting a new column.
fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|")
}

fn colorize_disposition(disposition: &Disposition) -> colored::ColoredString {
    let label = disposition.to_string();
    match disposition {
        Disposition::Approved => label.green().bold(),
        Disposition::Failed(_) => label.red().bold(),
        Disposition::Skipped => label.yellow().bold(),
    }
}
