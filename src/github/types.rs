use reqwest::Url;
use serde::Deserialize;
use serde_json::Value;

/// The subset of a GitHub repository payload the tools act on.
#[derive(Debug, Clone, Deserialize)]
pub struct Repository {
    /// "owner/name"
    pub full_name: String,
    pub name: String,
    #[serde(default)]
    pub fork: bool,
    pub default_branch: String,
}

/// A decoded file from the contents API.
#[derive(Debug, Clone, PartialEq)]
pub struct FileContents {
    pub path: String,
    /// Blob sha, required when updating the file in place
    pub sha: String,
    pub text: String,
}

/// Raw contents API payload; `content` is base64 with embedded newlines.
#[derive(Debug, Deserialize)]
pub(crate) struct ContentsResponse {
    pub(crate) path: String,
    pub(crate) sha: String,
    #[serde(default)]
    pub(crate) content: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PullSummary {
    pub number: u64,
    pub html_url: String,
    pub title: String,
    pub state: String,
}

/// A file to create or update on a branch.
#[derive(Debug, Clone)]
pub struct NewFile<'a> {
    pub path: &'a str,
    pub message: &'a str,
    pub content: &'a str,
    pub branch: &'a str,
    /// Existing blob sha; None creates the file
    pub sha: Option<&'a str>,
}

#[derive(Debug, Clone)]
pub struct NewPull<'a> {
    pub title: &'a str,
    pub body: &'a str,
    pub head: &'a str,
    pub base: &'a str,
}

/// One page of a JSON array listing plus the URL of the next page, if any.
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub items: Vec<Value>,
    pub next: Option<Url>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_from_api_payload() {
        let payload = serde_json::json!({
            "id": 1,
            "name": "edx-platform",
            "full_name": "edx/edx-platform",
            "fork": false,
            "default_branch": "master",
            "owner": {"login": "edx"}
        });
        let repo: Repository = serde_json::from_value(payload).unwrap();
        assert_eq!(repo.full_name, "edx/edx-platform");
        assert_eq!(repo.default_branch, "master");
        assert!(!repo.fork);
    }

    #[test]
    fn test_repository_fork_defaults_to_false() {
        let payload = serde_json::json!({
            "name": "x",
            "full_name": "edx/x",
            "default_branch": "main"
        });
        let repo: Repository = serde_json::from_value(payload).unwrap();
        assert!(!repo.fork);
    }
}
