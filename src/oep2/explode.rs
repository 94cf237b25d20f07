use tracing::{debug, error, info, instrument, warn};

use super::manifest::{self, ManifestEntry};
use super::{Oep2Error, BRANCH_NAME, OPEN_EDX_YAML};
use crate::config::ManifestConfig;
use crate::github::{GitHubApi, NewFile, NewPull, Repository};
use crate::report::{self, Outcome, PullAction};

const COMMIT_MESSAGE: &str = "Add an OEP-2 compliant openedx.yaml file";
const PR_TITLE: &str = "Add an OEP-2 compliant openedx.yaml file";

fn pull_body(manifest: &ManifestConfig) -> String {
    format!(
        "This adds an `openedx.yaml` file, as described by OEP-2:\n\
         http://open-edx-proposals.readthedocs.io/en/latest/oeps/oep-0002.html\n\
         \n\
         The data in this file was transformed from the contents of\n\
         {}:{}\n",
        manifest.repository, manifest.path
    )
}

/// Open or update one `openedx.yaml` pull request per manifest entry.
///
/// With `dry` set nothing is written; each step is reported as what would
/// have happened. Forks are skipped silently. Any API failure other than the
/// default-branch commit lookup aborts the whole run.
#[instrument(skip(api, manifest), fields(manifest = %manifest.repository))]
pub async fn explode(
    api: &dyn GitHubApi,
    manifest: &ManifestConfig,
    dry: bool,
) -> Result<Vec<Outcome>, Oep2Error> {
    let source = api
        .file_contents(&manifest.repository, &manifest.path, None)
        .await?
        .ok_or_else(|| Oep2Error::MissingManifest {
            repo: manifest.repository.clone(),
            path: manifest.path.clone(),
        })?;
    let entries = manifest::parse_manifest(&source.text)?;
    info!(entries = entries.len(), "loaded manifest");

    let body = pull_body(manifest);
    let mut outcomes = Vec::with_capacity(entries.len());
    for entry in &entries {
        let outcome = explode_repo(api, entry, &body, dry).await?;
        report::print_outcome(&outcome, dry);
        outcomes.push(outcome);
    }
    Ok(outcomes)
}

#[instrument(skip(api, entry, body), fields(repo = %entry.full_name))]
async fn explode_repo(
    api: &dyn GitHubApi,
    entry: &ManifestEntry,
    body: &str,
    dry: bool,
) -> Result<Outcome, Oep2Error> {
    let file_contents = manifest::render_openedx_yaml(&entry.data)?;

    let repo = api.repository(&entry.full_name).await?;
    if repo.fork {
        info!(repo = %repo.full_name, "skipping fork");
        return Ok(Outcome::SkippedFork {
            repo: entry.full_name.clone(),
        });
    }

    let parent_commit = default_branch_commit(api, &repo).await;

    if dry {
        report::print_file_preview(BRANCH_NAME, &repo.full_name, OPEN_EDX_YAML, &file_contents);
    } else {
        if api.branch_head(&repo.full_name, BRANCH_NAME).await?.is_none() {
            let Some(sha) = parent_commit.as_deref() else {
                error!(
                    repo = %repo.full_name,
                    default_branch = %repo.default_branch,
                    "cannot create {BRANCH_NAME} without a commit on the default branch"
                );
                return Ok(Outcome::SkippedNoCommit {
                    repo: entry.full_name.clone(),
                    default_branch: repo.default_branch.clone(),
                });
            };
            info!(sha, "creating branch {BRANCH_NAME}");
            api.create_ref(&repo.full_name, &format!("refs/heads/{BRANCH_NAME}"), sha)
                .await?;
        }
        write_openedx_yaml(api, &repo.full_name, &file_contents).await?;
    }

    // The branch lives in the repository GitHub resolved, which may have
    // moved away from the owner named in the manifest.
    let owner = repo
        .full_name
        .split_once('/')
        .map_or(entry.owner.as_str(), |(owner, _)| owner);
    let head = format!("{owner}:{BRANCH_NAME}");
    let existing = api.list_pulls(&repo.full_name, &head, "open").await?;

    if let Some(pull) = existing.into_iter().next() {
        if !dry {
            api.update_pull(&repo.full_name, pull.number, PR_TITLE, body)
                .await?;
        }
        Ok(Outcome::Pull {
            repo: entry.full_name.clone(),
            action: PullAction::Updated,
            url: Some(pull.html_url),
        })
    } else {
        let url = if dry {
            None
        } else {
            let pull = api
                .create_pull(
                    &repo.full_name,
                    &NewPull {
                        title: PR_TITLE,
                        body,
                        head: BRANCH_NAME,
                        base: &repo.default_branch,
                    },
                )
                .await?;
            Some(pull.html_url)
        };
        Ok(Outcome::Pull {
            repo: entry.full_name.clone(),
            action: PullAction::Created,
            url,
        })
    }
}

/// Latest commit on the default branch. Failures are logged and become None;
/// the caller decides whether the commit is actually needed.
async fn default_branch_commit(api: &dyn GitHubApi, repo: &Repository) -> Option<String> {
    match api.branch_head(&repo.full_name, &repo.default_branch).await {
        Ok(Some(sha)) => Some(sha),
        Ok(None) => {
            warn!(
                repo = %repo.full_name,
                default_branch = %repo.default_branch,
                "no commit on default branch"
            );
            None
        }
        Err(err) => {
            warn!(
                repo = %repo.full_name,
                default_branch = %repo.default_branch,
                error = %err,
                "no commit on default branch"
            );
            None
        }
    }
}

/// Create the file on the work branch, or update it if an earlier run left
/// different contents there.
async fn write_openedx_yaml(
    api: &dyn GitHubApi,
    full_name: &str,
    contents: &str,
) -> Result<(), Oep2Error> {
    let existing = api
        .file_contents(full_name, OPEN_EDX_YAML, Some(BRANCH_NAME))
        .await?;
    if existing.as_ref().is_some_and(|file| file.text == contents) {
        debug!(repo = full_name, "{OPEN_EDX_YAML} already up to date");
        return Ok(());
    }

    api.put_file(
        full_name,
        &NewFile {
            path: OPEN_EDX_YAML,
            message: COMMIT_MESSAGE,
            content: contents,
            branch: BRANCH_NAME,
            sha: existing.as_ref().map(|file| file.sha.as_str()),
        },
    )
    .await?;
    info!(repo = full_name, "wrote {OPEN_EDX_YAML} on {BRANCH_NAME}");
    Ok(())
}
