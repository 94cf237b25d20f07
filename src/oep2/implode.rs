use std::collections::BTreeMap;

use serde_yaml::{Mapping, Value};
use tracing::{debug, info, instrument};

use super::manifest::{sort_keys, ManifestError};
use super::{Oep2Error, OPEN_EDX_YAML};
use crate::github::GitHubApi;

/// Collect every non-fork repository's `openedx.yaml` across `orgs`, keyed
/// by full repository name. Repositories without the file are left out.
#[instrument(skip(api))]
pub async fn implode(
    api: &dyn GitHubApi,
    orgs: &[String],
) -> Result<BTreeMap<String, Value>, Oep2Error> {
    let mut data = BTreeMap::new();
    for org in orgs {
        let repos = api.org_repos(org).await?;
        debug!(org = %org, repos = repos.len(), "listed organization");
        for repo in repos {
            if repo.fork {
                debug!(repo = %repo.full_name, "skipping fork");
                continue;
            }
            let Some(contents) = api.file_contents(&repo.full_name, OPEN_EDX_YAML, None).await?
            else {
                debug!(repo = %repo.full_name, "skipping, no {OPEN_EDX_YAML}");
                continue;
            };
            let document: Value =
                serde_yaml::from_str(&contents.text).map_err(ManifestError::from)?;
            data.insert(repo.full_name, document);
        }
    }
    info!(repos = data.len(), "imploded {OPEN_EDX_YAML} files");
    Ok(data)
}

/// The aggregated document as printed on stdout, keys sorted at every level.
pub fn render_imploded(data: &BTreeMap<String, Value>) -> Result<String, ManifestError> {
    let sorted: Mapping = data
        .iter()
        .map(|(repo, document)| (Value::String(repo.clone()), sort_keys(document)))
        .collect();
    Ok(serde_yaml::to_string(&sorted)?)
}
