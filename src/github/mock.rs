use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use reqwest::Url;
use serde_json::Value;

use super::{
    FileContents, GitHubApi, GitHubError, NewFile, NewPull, Page, PullSummary, Repository,
};

/// A write the code under test asked GitHub to perform.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    CreateRef {
        repo: String,
        git_ref: String,
        sha: String,
    },
    PutFile {
        repo: String,
        path: String,
        branch: String,
        sha: Option<String>,
    },
    CreatePull {
        repo: String,
        head: String,
        base: String,
    },
    UpdatePull {
        repo: String,
        number: u64,
    },
}

/// In-memory GitHub for tests: canned responses plus a record of writes.
pub struct MockGitHub {
    api_url: Url,
    repos: Mutex<HashMap<String, Repository>>,
    orgs: Mutex<HashMap<String, Vec<String>>>,
    /// key: (repo, branch) → head sha
    branches: Mutex<HashMap<(String, String), String>>,
    /// (repo, branch) lookups that fail outright
    broken_branches: Mutex<HashSet<(String, String)>>,
    /// key: (repo, branch, path)
    files: Mutex<HashMap<(String, String, String), FileContents>>,
    /// key: repo → (head, pull)
    pulls: Mutex<HashMap<String, Vec<(String, PullSummary)>>>,
    /// key: URL path → pages of items
    pages: Mutex<HashMap<String, Vec<Vec<Value>>>>,
    /// key: absolute URL → document
    documents: Mutex<HashMap<String, Value>>,
    requests: Mutex<Vec<String>>,
    pub mutations: Mutex<Vec<Mutation>>,
}

impl Default for MockGitHub {
    fn default() -> Self {
        Self {
            api_url: Url::parse("https://api.github.test/v3/").unwrap(),
            repos: Mutex::new(HashMap::new()),
            orgs: Mutex::new(HashMap::new()),
            branches: Mutex::new(HashMap::new()),
            broken_branches: Mutex::new(HashSet::new()),
            files: Mutex::new(HashMap::new()),
            pulls: Mutex::new(HashMap::new()),
            pages: Mutex::new(HashMap::new()),
            documents: Mutex::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
            mutations: Mutex::new(Vec::new()),
        }
    }
}

impl MockGitHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a repository whose default branch is "master" at `sha`.
    pub fn add_repo(&self, full_name: &str, fork: bool, sha: Option<&str>) {
        let name = full_name.split_once('/').map_or(full_name, |(_, n)| n);
        self.repos.lock().unwrap().insert(
            full_name.to_string(),
            Repository {
                full_name: full_name.to_string(),
                name: name.to_string(),
                fork,
                default_branch: "master".to_string(),
            },
        );
        if let Some(sha) = sha {
            self.set_branch(full_name, "master", sha);
        }
        if let Some((org, _)) = full_name.split_once('/') {
            self.orgs
                .lock()
                .unwrap()
                .entry(org.to_string())
                .or_default()
                .push(full_name.to_string());
        }
    }

    /// Make lookups of `from` resolve to the already registered `to`, the
    /// way GitHub follows a renamed or transferred repository.
    pub fn add_redirect(&self, from: &str, to: &str) {
        let mut repos = self.repos.lock().unwrap();
        let target = repos.get(to).cloned().unwrap();
        repos.insert(from.to_string(), target);
    }

    pub fn set_branch(&self, repo: &str, branch: &str, sha: &str) {
        self.branches
            .lock()
            .unwrap()
            .insert((repo.to_string(), branch.to_string()), sha.to_string());
    }

    pub fn break_branch_lookup(&self, repo: &str, branch: &str) {
        self.broken_branches
            .lock()
            .unwrap()
            .insert((repo.to_string(), branch.to_string()));
    }

    pub fn set_file(&self, repo: &str, branch: &str, path: &str, text: &str) {
        self.files.lock().unwrap().insert(
            (repo.to_string(), branch.to_string(), path.to_string()),
            FileContents {
                path: path.to_string(),
                sha: format!("blob-{}", text.len()),
                text: text.to_string(),
            },
        );
    }

    pub fn file(&self, repo: &str, branch: &str, path: &str) -> Option<FileContents> {
        self.files
            .lock()
            .unwrap()
            .get(&(repo.to_string(), branch.to_string(), path.to_string()))
            .cloned()
    }

    pub fn add_open_pull(&self, repo: &str, head: &str, number: u64) {
        self.pulls.lock().unwrap().entry(repo.to_string()).or_default().push((
            head.to_string(),
            PullSummary {
                number,
                html_url: format!("https://github.com/{repo}/pull/{number}"),
                title: "existing".to_string(),
                state: "open".to_string(),
            },
        ));
    }

    pub fn open_pull_count(&self, repo: &str) -> usize {
        self.pulls.lock().unwrap().get(repo).map_or(0, Vec::len)
    }

    /// Serve `pages` for any URL with this API-relative path ("/repos/..."),
    /// selected by the `page` query param.
    pub fn add_pages(&self, path: &str, pages: Vec<Vec<Value>>) {
        self.pages.lock().unwrap().insert(path.to_string(), pages);
    }

    pub fn add_document(&self, url: &str, document: Value) {
        self.documents.lock().unwrap().insert(url.to_string(), document);
    }

    pub fn requested_urls(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn mutations(&self) -> Vec<Mutation> {
        self.mutations.lock().unwrap().clone()
    }

    fn not_found(what: &str) -> GitHubError {
        GitHubError::Decode(format!("mock has no {what}"))
    }
}

#[async_trait]
impl GitHubApi for MockGitHub {
    fn api_url(&self) -> &Url {
        &self.api_url
    }

    async fn get_page(&self, url: &Url) -> Result<Page, GitHubError> {
        self.requests.lock().unwrap().push(url.to_string());
        let page_number: usize = url
            .query_pairs()
            .find(|(k, _)| k == "page")
            .and_then(|(_, v)| v.parse().ok())
            .unwrap_or(1);
        let prefix = self.api_url.path().trim_end_matches('/');
        let path = url.path().strip_prefix(prefix).unwrap_or(url.path());
        let pages = self.pages.lock().unwrap();
        let Some(pages) = pages.get(path) else {
            return Ok(Page::default());
        };
        let items = pages.get(page_number - 1).cloned().unwrap_or_default();
        let next = (page_number < pages.len()).then(|| {
            let mut next = url.clone();
            let kept: Vec<(String, String)> = url
                .query_pairs()
                .filter(|(k, _)| k != "page")
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect();
            next.query_pairs_mut()
                .clear()
                .extend_pairs(kept)
                .append_pair("page", &(page_number + 1).to_string());
            next
        });
        Ok(Page { items, next })
    }

    async fn get_json(&self, url: &str) -> Result<Value, GitHubError> {
        self.requests.lock().unwrap().push(url.to_string());
        self.documents
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| Self::not_found(url))
    }

    async fn repository(&self, full_name: &str) -> Result<Repository, GitHubError> {
        self.repos
            .lock()
            .unwrap()
            .get(full_name)
            .cloned()
            .ok_or_else(|| Self::not_found(full_name))
    }

    async fn org_repos(&self, org: &str) -> Result<Vec<Repository>, GitHubError> {
        let names = self.orgs.lock().unwrap().get(org).cloned().unwrap_or_default();
        let repos = self.repos.lock().unwrap();
        Ok(names.iter().filter_map(|n| repos.get(n).cloned()).collect())
    }

    async fn branch_head(
        &self,
        full_name: &str,
        branch: &str,
    ) -> Result<Option<String>, GitHubError> {
        let key = (full_name.to_string(), branch.to_string());
        if self.broken_branches.lock().unwrap().contains(&key) {
            return Err(Self::not_found("branch listing"));
        }
        Ok(self
            .branches
            .lock()
            .unwrap()
            .get(&(full_name.to_string(), branch.to_string()))
            .cloned())
    }

    async fn create_ref(
        &self,
        full_name: &str,
        git_ref: &str,
        sha: &str,
    ) -> Result<(), GitHubError> {
        self.mutations.lock().unwrap().push(Mutation::CreateRef {
            repo: full_name.to_string(),
            git_ref: git_ref.to_string(),
            sha: sha.to_string(),
        });
        if let Some(branch) = git_ref.strip_prefix("refs/heads/") {
            self.set_branch(full_name, branch, sha);
        }
        Ok(())
    }

    async fn file_contents(
        &self,
        full_name: &str,
        path: &str,
        branch: Option<&str>,
    ) -> Result<Option<FileContents>, GitHubError> {
        let branch = match branch {
            Some(branch) => branch.to_string(),
            None => self.repository(full_name).await?.default_branch,
        };
        Ok(self.file(full_name, &branch, path))
    }

    async fn put_file(&self, full_name: &str, file: &NewFile<'_>) -> Result<(), GitHubError> {
        self.mutations.lock().unwrap().push(Mutation::PutFile {
            repo: full_name.to_string(),
            path: file.path.to_string(),
            branch: file.branch.to_string(),
            sha: file.sha.map(str::to_string),
        });
        self.set_file(full_name, file.branch, file.path, file.content);
        Ok(())
    }

    async fn list_pulls(
        &self,
        full_name: &str,
        head: &str,
        state: &str,
    ) -> Result<Vec<PullSummary>, GitHubError> {
        Ok(self
            .pulls
            .lock()
            .unwrap()
            .get(full_name)
            .map(|pulls| {
                pulls
                    .iter()
                    .filter(|(h, p)| h == head && p.state == state)
                    .map(|(_, p)| p.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn create_pull(
        &self,
        full_name: &str,
        pull: &NewPull<'_>,
    ) -> Result<PullSummary, GitHubError> {
        self.mutations.lock().unwrap().push(Mutation::CreatePull {
            repo: full_name.to_string(),
            head: pull.head.to_string(),
            base: pull.base.to_string(),
        });
        let number = self.open_pull_count(full_name) as u64 + 1;
        let owner = full_name.split_once('/').map_or(full_name, |(o, _)| o);
        self.add_open_pull(full_name, &format!("{owner}:{}", pull.head), number);
        Ok(PullSummary {
            number,
            html_url: format!("https://github.com/{full_name}/pull/{number}"),
            title: pull.title.to_string(),
            state: "open".to_string(),
        })
    }

    async fn update_pull(
        &self,
        full_name: &str,
        number: u64,
        title: &str,
        _body: &str,
    ) -> Result<PullSummary, GitHubError> {
        self.mutations.lock().unwrap().push(Mutation::UpdatePull {
            repo: full_name.to_string(),
            number,
        });
        Ok(PullSummary {
            number,
            html_url: format!("https://github.com/{full_name}/pull/{number}"),
            title: title.to_string(),
            state: "open".to_string(),
        })
    }
}
