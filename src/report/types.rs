use crate::oep2::BRANCH_NAME;

/// What happened (or would have happened) to a repo's pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullAction {
    Created,
    Updated,
}

/// Result of exploding the manifest into one repository.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Forks are never written to.
    SkippedFork { repo: String },
    /// The work branch was missing and there was no commit to start it from.
    SkippedNoCommit { repo: String, default_branch: String },
    Pull {
        repo: String,
        action: PullAction,
        /// None when a dry run would have created the pull request
        url: Option<String>,
    },
}

impl Outcome {
    pub fn repo(&self) -> &str {
        match self {
            Outcome::SkippedFork { repo }
            | Outcome::SkippedNoCommit { repo, .. }
            | Outcome::Pull { repo, .. } => repo,
        }
    }

    /// The line reported to the user, worded for a dry or a real run.
    /// Forks produce no line.
    pub fn message(&self, dry: bool) -> Option<String> {
        match self {
            Outcome::SkippedFork { .. } => None,
            Outcome::SkippedNoCommit {
                repo,
                default_branch,
            } => Some(format!(
                "Skipped {repo}: no commit on {default_branch} to start {BRANCH_NAME} from"
            )),
            Outcome::Pull { repo, action, url } => {
                let verb = match (action, dry) {
                    (PullAction::Created, true) => "Would have created",
                    (PullAction::Created, false) => "Created",
                    (PullAction::Updated, true) => "Would have updated",
                    (PullAction::Updated, false) => "Updated",
                };
                Some(format!(
                    "{verb} pull request {} against {repo}",
                    url.as_deref().unwrap_or("N/A")
                ))
            }
        }
    }
}

/// Totals across one explode run.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Summary {
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
}

impl Summary {
    pub fn from_outcomes(outcomes: &[Outcome]) -> Self {
        outcomes.iter().fold(Summary::default(), |mut summary, outcome| {
            match outcome {
                Outcome::Pull {
                    action: PullAction::Created,
                    ..
                } => summary.created += 1,
                Outcome::Pull {
                    action: PullAction::Updated,
                    ..
                } => summary.updated += 1,
                _ => summary.skipped += 1,
            }
            summary
        })
    }
}
