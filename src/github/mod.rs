pub mod client;
#[cfg(test)]
pub mod mock;
pub mod types;

pub use client::RestClient;
pub use types::{FileContents, NewFile, NewPull, Page, PullSummary, Repository};

use async_trait::async_trait;
use reqwest::Url;
use serde_json::Value;
use std::collections::VecDeque;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GitHubError {
    #[error("GitHub API request failed: {0}")]
    ApiRequest(#[from] reqwest::Error),

    #[error("Invalid GitHub API URL: {0}")]
    InvalidUrl(String),

    #[error("Unexpected GitHub API response: {0}")]
    Decode(String),

    #[error("GitHub token not found in config or environment")]
    MissingToken,
}

impl From<serde_json::Error> for GitHubError {
    fn from(err: serde_json::Error) -> Self {
        GitHubError::Decode(err.to_string())
    }
}

/// Authenticated handle on the GitHub REST API.
///
/// Commands only talk to GitHub through this trait so they can run against
/// an in-memory implementation in tests. Lookups that can legitimately miss
/// (branch, file) return `Ok(None)` on 404 instead of an error.
#[async_trait]
pub trait GitHubApi: Send + Sync {
    /// Root of the REST API, always ending in '/'.
    fn api_url(&self) -> &Url;

    /// Fetch one page of a JSON array listing.
    async fn get_page(&self, url: &Url) -> Result<Page, GitHubError>;

    /// Fetch a single JSON document by absolute URL.
    async fn get_json(&self, url: &str) -> Result<Value, GitHubError>;

    async fn repository(&self, full_name: &str) -> Result<Repository, GitHubError>;

    async fn org_repos(&self, org: &str) -> Result<Vec<Repository>, GitHubError>;

    /// Sha of the latest commit on `branch`, or None if the branch doesn't exist.
    async fn branch_head(&self, full_name: &str, branch: &str)
        -> Result<Option<String>, GitHubError>;

    async fn create_ref(&self, full_name: &str, git_ref: &str, sha: &str)
        -> Result<(), GitHubError>;

    /// Read a file; `branch` None means the default branch.
    async fn file_contents(
        &self,
        full_name: &str,
        path: &str,
        branch: Option<&str>,
    ) -> Result<Option<FileContents>, GitHubError>;

    /// Create the file, or update it when `file.sha` is set.
    async fn put_file(&self, full_name: &str, file: &NewFile<'_>) -> Result<(), GitHubError>;

    /// Pull requests from `head` ("owner:branch") in the given state.
    async fn list_pulls(
        &self,
        full_name: &str,
        head: &str,
        state: &str,
    ) -> Result<Vec<PullSummary>, GitHubError>;

    async fn create_pull(&self, full_name: &str, pull: &NewPull<'_>)
        -> Result<PullSummary, GitHubError>;

    async fn update_pull(
        &self,
        full_name: &str,
        number: u64,
        title: &str,
        body: &str,
    ) -> Result<PullSummary, GitHubError>;

    /// Resolve a path such as "repos/edx/x/issues" against the API root.
    fn endpoint(&self, path: &str) -> Result<Url, GitHubError> {
        self.api_url()
            .join(path)
            .map_err(|e| GitHubError::InvalidUrl(format!("{path}: {e}")))
    }
}

/// Lazy, single-pass cursor over a paginated listing.
///
/// Pages are fetched one at a time as items are consumed, so a caller that
/// stops early never requests the remaining pages.
pub struct Pager<'a> {
    api: &'a dyn GitHubApi,
    next: Option<Url>,
    buffer: VecDeque<Value>,
    remaining: Option<usize>,
}

impl<'a> Pager<'a> {
    pub fn new(api: &'a dyn GitHubApi, url: Url) -> Self {
        Self {
            api,
            next: Some(url),
            buffer: VecDeque::new(),
            remaining: None,
        }
    }

    /// Stop after `limit` items.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.remaining = Some(limit);
        self
    }

    pub async fn next(&mut self) -> Result<Option<Value>, GitHubError> {
        if self.remaining == Some(0) {
            return Ok(None);
        }
        loop {
            if let Some(item) = self.buffer.pop_front() {
                if let Some(remaining) = self.remaining.as_mut() {
                    *remaining -= 1;
                }
                return Ok(Some(item));
            }
            let Some(url) = self.next.take() else {
                return Ok(None);
            };
            let page = self.api.get_page(&url).await?;
            self.buffer.extend(page.items);
            self.next = page.next;
        }
    }

    /// Drain the cursor.
    pub async fn collect_all(mut self) -> Result<Vec<Value>, GitHubError> {
        let mut items = Vec::new();
        while let Some(item) = self.next().await? {
            items.push(item);
        }
        Ok(items)
    }
}
