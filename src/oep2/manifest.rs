use serde_yaml::{Mapping, Value};
use thiserror::Error;

/// Value written when the manifest names no owner.
pub const OWNER_PLACEHOLDER: &str = "MUST FILL IN OWNER";

const HEADER: &str = "\
# This file describes this Open edX repo, as described in OEP-2:
# http://open-edx-proposals.readthedocs.io/en/latest/oeps/oep-0002.html#specification";

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Manifest must be a mapping of repo names to metadata")]
    NotAMapping,

    #[error("Invalid repository name in manifest: {0:?}")]
    InvalidRepoName(String),

    #[error("Entry for {repo} is not a mapping")]
    InvalidEntry { repo: String },

    #[error("Entry for {repo} has non-sequence tags, cannot fold area into them")]
    InvalidTags { repo: String },
}

/// One repository from the shared manifest, already normalized.
#[derive(Debug, Clone)]
pub struct ManifestEntry {
    /// "owner/name" as written in the manifest
    pub full_name: String,
    pub owner: String,
    pub repo: String,
    pub data: Mapping,
}

/// Parse the manifest into normalized entries, in document order.
pub fn parse_manifest(text: &str) -> Result<Vec<ManifestEntry>, ManifestError> {
    let document: Value = serde_yaml::from_str(text)?;
    let repos = match document {
        Value::Null => return Ok(Vec::new()),
        Value::Mapping(repos) => repos,
        _ => return Err(ManifestError::NotAMapping),
    };

    repos
        .into_iter()
        .map(|(key, value)| {
            let full_name = key
                .as_str()
                .ok_or_else(|| ManifestError::InvalidRepoName(format!("{key:?}")))?
                .to_string();
            let (owner, repo) = split_repo_name(&full_name)?;
            let (owner, repo) = (owner.to_string(), repo.to_string());
            let data = normalize_entry(&full_name, value)?;
            Ok(ManifestEntry {
                full_name,
                owner,
                repo,
                data,
            })
        })
        .collect()
}

/// Split "owner/name" at the first '/'.
pub fn split_repo_name(full_name: &str) -> Result<(&str, &str), ManifestError> {
    match full_name.split_once('/') {
        Some((owner, repo)) if !owner.is_empty() && !repo.is_empty() => Ok((owner, repo)),
        _ => Err(ManifestError::InvalidRepoName(full_name.to_string())),
    }
}

/// Bring one manifest record up to the openedx.yaml shape:
/// `owner` filled in, legacy `area` folded into `tags`, `oeps` present.
/// Everything else passes through untouched.
pub fn normalize_entry(repo: &str, value: Value) -> Result<Mapping, ManifestError> {
    let mut data = match value {
        Value::Null => Mapping::new(),
        Value::Mapping(data) => data,
        _ => {
            return Err(ManifestError::InvalidEntry {
                repo: repo.to_string(),
            })
        }
    };

    if !data.contains_key("owner") {
        data.insert("owner".into(), OWNER_PLACEHOLDER.into());
    }

    if let Some(area) = data.remove("area") {
        let tags = data
            .entry("tags".into())
            .or_insert_with(|| Value::Sequence(Vec::new()));
        if tags.is_null() {
            *tags = Value::Sequence(Vec::new());
        }
        match tags {
            Value::Sequence(tags) => tags.push(area),
            _ => {
                return Err(ManifestError::InvalidTags {
                    repo: repo.to_string(),
                })
            }
        }
    }

    if !data.contains_key("oeps") {
        data.insert("oeps".into(), Value::Mapping(Mapping::new()));
    }

    Ok(data)
}

/// Render the openedx.yaml file for a normalized entry: the OEP-2 header,
/// then the entry with mapping keys sorted at every level.
pub fn render_openedx_yaml(data: &Mapping) -> Result<String, ManifestError> {
    let body = serde_yaml::to_string(&sort_mapping(data))?;
    Ok(format!("{HEADER}\n\n{body}").trim().to_string())
}

/// Copy of `value` with the keys of every nested mapping sorted.
pub fn sort_keys(value: &Value) -> Value {
    match value {
        Value::Mapping(mapping) => Value::Mapping(sort_mapping(mapping)),
        Value::Sequence(items) => Value::Sequence(items.iter().map(sort_keys).collect()),
        Value::Tagged(tagged) => Value::Tagged(Box::new(serde_yaml::value::TaggedValue {
            tag: tagged.tag.clone(),
            value: sort_keys(&tagged.value),
        })),
        other => other.clone(),
    }
}

fn sort_mapping(mapping: &Mapping) -> Mapping {
    let mut entries: Vec<(&Value, &Value)> = mapping.iter().collect();
    entries.sort_by_cached_key(|(key, _)| key_text(key));
    entries
        .into_iter()
        .map(|(key, value)| (key.clone(), sort_keys(value)))
        .collect()
}

/// Sort text for a mapping key; non-string keys sort by their YAML form.
fn key_text(key: &Value) -> String {
    match key.as_str() {
        Some(text) => text.to_string(),
        None => serde_yaml::to_string(key).unwrap_or_default(),
    }
}
