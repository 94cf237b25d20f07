use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use reqwest::header::{ACCEPT, LINK, USER_AGENT};
use reqwest::{RequestBuilder, StatusCode, Url};
use serde_json::{json, Value};
use tracing::{debug, instrument};

use super::types::ContentsResponse;
use super::{
    FileContents, GitHubApi, GitHubError, NewFile, NewPull, Page, Pager, PullSummary, Repository,
};
use crate::config::Config;

const PER_PAGE: &str = "100";

/// reqwest-backed implementation of [`GitHubApi`].
pub struct RestClient {
    http: reqwest::Client,
    api_url: Url,
    token: String,
}

impl RestClient {
    /// Build a client from config. A token is required: every command here
    /// either writes to repositories or walks whole organizations.
    pub fn new(config: &Config) -> Result<Self, GitHubError> {
        let token = config.github_token().ok_or(GitHubError::MissingToken)?;
        let mut root = config.github.api_url.clone();
        if !root.ends_with('/') {
            root.push('/');
        }
        let api_url =
            Url::parse(&root).map_err(|_| GitHubError::InvalidUrl(config.github.api_url.clone()))?;

        Ok(Self {
            http: reqwest::Client::new(),
            api_url,
            token,
        })
    }

    fn authed(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header(USER_AGENT, "edx-repo-tools")
            .header(ACCEPT, "application/vnd.github+json")
            .bearer_auth(&self.token)
    }

    fn get(&self, url: Url) -> RequestBuilder {
        self.authed(self.http.get(url))
    }

    async fn get_typed<T: serde::de::DeserializeOwned>(&self, url: Url) -> Result<T, GitHubError> {
        let value = self.get(url).send().await?.error_for_status()?.json().await?;
        Ok(value)
    }

    /// GET that maps 404 to None.
    async fn get_optional(&self, url: Url) -> Result<Option<Value>, GitHubError> {
        let response = self.get(url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let value = response.error_for_status()?.json().await?;
        Ok(Some(value))
    }

    async fn collect_typed<T: serde::de::DeserializeOwned>(
        &self,
        url: Url,
    ) -> Result<Vec<T>, GitHubError> {
        let items = Pager::new(self, url).collect_all().await?;
        items
            .into_iter()
            .map(|item| serde_json::from_value(item).map_err(GitHubError::from))
            .collect()
    }
}

#[async_trait]
impl GitHubApi for RestClient {
    fn api_url(&self) -> &Url {
        &self.api_url
    }

    #[instrument(skip(self, url), fields(url = %url))]
    async fn get_page(&self, url: &Url) -> Result<Page, GitHubError> {
        let mut url = url.clone();
        if !url.query_pairs().any(|(k, _)| k == "per_page") {
            url.query_pairs_mut().append_pair("per_page", PER_PAGE);
        }

        let response = self.get(url).send().await?.error_for_status()?;
        let next = response
            .headers()
            .get(LINK)
            .and_then(|value| value.to_str().ok())
            .and_then(next_link);
        let items: Vec<Value> = response.json().await?;
        debug!(items = items.len(), has_next = next.is_some(), "received page");

        Ok(Page { items, next })
    }

    #[instrument(skip(self))]
    async fn get_json(&self, url: &str) -> Result<Value, GitHubError> {
        let url = Url::parse(url).map_err(|_| GitHubError::InvalidUrl(url.to_string()))?;
        self.get_typed(url).await
    }

    #[instrument(skip(self))]
    async fn repository(&self, full_name: &str) -> Result<Repository, GitHubError> {
        let url = self.endpoint(&format!("repos/{full_name}"))?;
        self.get_typed(url).await
    }

    #[instrument(skip(self))]
    async fn org_repos(&self, org: &str) -> Result<Vec<Repository>, GitHubError> {
        let mut url = self.endpoint(&format!("orgs/{org}/repos"))?;
        url.query_pairs_mut().append_pair("type", "all");
        self.collect_typed(url).await
    }

    #[instrument(skip(self))]
    async fn branch_head(
        &self,
        full_name: &str,
        branch: &str,
    ) -> Result<Option<String>, GitHubError> {
        let url = self.endpoint(&format!("repos/{full_name}/branches/{branch}"))?;
        let Some(payload) = self.get_optional(url).await? else {
            return Ok(None);
        };
        let sha = payload
            .pointer("/commit/sha")
            .and_then(Value::as_str)
            .ok_or_else(|| GitHubError::Decode(format!("branch {branch} has no commit sha")))?;
        Ok(Some(sha.to_string()))
    }

    #[instrument(skip(self))]
    async fn create_ref(
        &self,
        full_name: &str,
        git_ref: &str,
        sha: &str,
    ) -> Result<(), GitHubError> {
        let url = self.endpoint(&format!("repos/{full_name}/git/refs"))?;
        self.authed(self.http.post(url))
            .json(&json!({ "ref": git_ref, "sha": sha }))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn file_contents(
        &self,
        full_name: &str,
        path: &str,
        branch: Option<&str>,
    ) -> Result<Option<FileContents>, GitHubError> {
        let mut url = self.endpoint(&format!("repos/{full_name}/contents/{path}"))?;
        if let Some(branch) = branch {
            url.query_pairs_mut().append_pair("ref", branch);
        }
        let Some(payload) = self.get_optional(url).await? else {
            return Ok(None);
        };
        let contents: ContentsResponse = serde_json::from_value(payload)?;
        let text = decode_content(&contents.content)?;
        Ok(Some(FileContents {
            path: contents.path,
            sha: contents.sha,
            text,
        }))
    }

    #[instrument(skip(self, file), fields(path = file.path, branch = file.branch))]
    async fn put_file(&self, full_name: &str, file: &NewFile<'_>) -> Result<(), GitHubError> {
        let url = self.endpoint(&format!("repos/{full_name}/contents/{}", file.path))?;
        let mut body = json!({
            "message": file.message,
            "content": BASE64.encode(file.content),
            "branch": file.branch,
        });
        if let Some(sha) = file.sha {
            body["sha"] = json!(sha);
        }
        self.authed(self.http.put(url))
            .json(&body)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_pulls(
        &self,
        full_name: &str,
        head: &str,
        state: &str,
    ) -> Result<Vec<PullSummary>, GitHubError> {
        let mut url = self.endpoint(&format!("repos/{full_name}/pulls"))?;
        url.query_pairs_mut()
            .append_pair("head", head)
            .append_pair("state", state);
        self.collect_typed(url).await
    }

    #[instrument(skip(self, pull), fields(head = pull.head, base = pull.base))]
    async fn create_pull(
        &self,
        full_name: &str,
        pull: &NewPull<'_>,
    ) -> Result<PullSummary, GitHubError> {
        let url = self.endpoint(&format!("repos/{full_name}/pulls"))?;
        let created = self
            .authed(self.http.post(url))
            .json(&json!({
                "title": pull.title,
                "body": pull.body,
                "head": pull.head,
                "base": pull.base,
            }))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(created)
    }

    #[instrument(skip(self, body))]
    async fn update_pull(
        &self,
        full_name: &str,
        number: u64,
        title: &str,
        body: &str,
    ) -> Result<PullSummary, GitHubError> {
        let url = self.endpoint(&format!("repos/{full_name}/pulls/{number}"))?;
        let updated = self
            .authed(self.http.patch(url))
            .json(&json!({ "title": title, "body": body }))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(updated)
    }
}

/// Pick the `rel="next"` target out of a `Link` header.
///
/// Format: `<https://api.github.com/...?page=2>; rel="next", <...>; rel="last"`
pub fn next_link(header: &str) -> Option<Url> {
    header.split(',').find_map(|part| {
        let (target, params) = part.split_once(';')?;
        let is_next = params
            .split(';')
            .any(|param| param.trim() == "rel=\"next\"");
        if !is_next {
            return None;
        }
        let target = target.trim().strip_prefix('<')?.strip_suffix('>')?;
        Url::parse(target).ok()
    })
}

/// The contents API wraps base64 at 60 columns.
fn decode_content(content: &str) -> Result<String, GitHubError> {
    let compact: String = content.split_whitespace().collect();
    let bytes = BASE64
        .decode(compact)
        .map_err(|e| GitHubError::Decode(format!("file content is not base64: {e}")))?;
    String::from_utf8(bytes).map_err(|e| GitHubError::Decode(format!("file content is not UTF-8: {e}")))
}
