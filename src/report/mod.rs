pub mod types;

pub use types::{Outcome, PullAction, Summary};

use colored::Colorize;
use tracing::debug;

use crate::pulls::{Comment, PullRequest};

/// Heading printed above a dry-run file preview.
pub fn file_preview_heading(branch: &str, repo: &str, file_name: &str) -> String {
    format!("Would have created {file_name} file on branch {branch} in {repo}:")
}

/// Show the file a dry run would have committed.
pub fn print_file_preview(branch: &str, repo: &str, file_name: &str, contents: &str) {
    debug!(repo, branch, "printing dry-run preview");
    println!("{}", file_preview_heading(branch, repo, file_name).green());
    println!("{}", contents.yellow());
}

/// Print the report line for one repository, if it has one.
pub fn print_outcome(outcome: &Outcome, dry: bool) {
    let Some(message) = outcome.message(dry) else {
        debug!(repo = outcome.repo(), "nothing to report");
        return;
    };
    match outcome {
        Outcome::SkippedNoCommit { .. } => println!("{}", message.red()),
        _ => println!("{}", message.green()),
    }
}

/// Print the totals line at the end of a run.
pub fn print_summary(summary: &Summary, dry: bool) {
    let prefix = if dry { "Dry run: " } else { "" };
    println!();
    println!(
        "{}",
        format!(
            "{prefix}{} created, {} updated, {} skipped",
            summary.created, summary.updated, summary.skipped
        )
        .bold()
    );
}

/// One line per pull request, plus a details line once they're loaded.
pub fn print_pull(pull: &PullRequest) {
    let issue = &pull.issue;
    let author = issue.user_login.as_deref().unwrap_or("ghost");
    let draft = pull
        .raw_issue()
        .get("draft")
        .and_then(|d| d.as_bool())
        .unwrap_or(false);
    let mut line = format!(
        "{} {} by {} ({}, updated {})",
        format!("#{}", issue.number).bold(),
        issue.title,
        author.cyan(),
        issue.state,
        issue.updated_at.format("%Y-%m-%d"),
    );
    if draft {
        line.push_str(" [draft]");
    }
    if !issue.labels.is_empty() {
        line.push_str(&format!(" [{}]", issue.labels.join(", ")).yellow().to_string());
    }
    println!("{line}");

    if let Ok(details) = pull.details() {
        let merged = details
            .merged_at
            .map(|ts| format!(", merged {}", ts.format("%Y-%m-%d")))
            .unwrap_or_default();
        println!(
            "    into {}: {} commits, {} files, {} {}{merged}",
            details.base_ref,
            details.commits,
            details.changed_files,
            format!("+{}", details.additions).green(),
            format!("-{}", details.deletions).red(),
        );
    }
}

pub fn print_comment(comment: &Comment) {
    let first_line = comment.body.lines().next().unwrap_or("");
    println!(
        "    {} {}: {}",
        comment.created_at.format("%Y-%m-%d %H:%M"),
        comment.user_login.as_deref().unwrap_or("ghost").cyan(),
        first_line.dimmed()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_preview_heading() {
        assert_eq!(
            file_preview_heading("add-openedx-yaml", "edx/alpha", "openedx.yaml"),
            "Would have created openedx.yaml file on branch add-openedx-yaml in edx/alpha:"
        );
    }
}
