use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use super::fields::{FieldError, Resolver};
use crate::github::{GitHubApi, GitHubError};

pub const ISSUE_FIELDS: &[&str] = &[
    "assignee_login",
    "closed_at",
    "comments",
    "comments_url",
    "created_at",
    "labels",
    "number",
    "pull_request_url",
    "pull_request_html_url",
    "state",
    "title",
    "updated_at",
    "user_html_url",
    "user_login",
];

pub const PULL_FIELDS: &[&str] = &[
    "additions",
    "base_ref",
    "changed_files",
    "commits",
    "deletions",
    "merged_at",
];

pub const MAPPED_FIELDS: &[(&str, &str)] = &[
    ("assignee_login", "assignee.login"),
    ("base_ref", "base.ref"),
    ("pull_request_url", "pull_request.url"),
    ("pull_request_html_url", "pull_request.html_url"),
    ("user_login", "user.login"),
    ("user_html_url", "user.html_url"),
];

pub const COMMENT_FIELDS: &[&str] = &["body", "created_at", "user_login"];

const COMMENT_MAPPED_FIELDS: &[(&str, &str)] = &[("user_login", "user.login")];

#[derive(Debug, Error)]
pub enum RecordError {
    #[error(transparent)]
    Field(#[from] FieldError),

    #[error(transparent)]
    GitHub(#[from] GitHubError),

    #[error("Pull request details not loaded for #{number}")]
    DetailsNotLoaded { number: u64 },
}

/// Strip a "namespace:" prefix from a label name: "type: bug" -> "bug".
pub fn short_label(name: &str) -> &str {
    name.split_once(':').map_or(name, |(_, rest)| rest.trim())
}

/// Fields available from the issue listing.
#[derive(Debug, Clone, PartialEq)]
pub struct IssueFields {
    pub number: u64,
    pub assignee_login: Option<String>,
    pub closed_at: Option<DateTime<Utc>>,
    pub comments: u64,
    pub comments_url: String,
    pub created_at: DateTime<Utc>,
    /// Short label names
    pub labels: Vec<String>,
    pub pull_request_url: String,
    pub pull_request_html_url: Option<String>,
    pub state: String,
    pub title: String,
    pub updated_at: DateTime<Utc>,
    pub user_html_url: Option<String>,
    pub user_login: Option<String>,
}

impl IssueFields {
    fn from_json(issue: &Value) -> Result<Self, FieldError> {
        let fields = Resolver {
            sources: vec![(ISSUE_FIELDS, issue)],
            mapped: MAPPED_FIELDS,
            record: "PullRequest",
        };
        let labels = fields
            .array("labels")?
            .iter()
            .filter_map(|label| label.get("name").and_then(Value::as_str))
            .map(|name| short_label(name).to_string())
            .collect();

        Ok(Self {
            number: fields.u64("number")?,
            assignee_login: fields.opt_string("assignee_login")?,
            closed_at: fields.opt_timestamp("closed_at")?,
            comments: fields.u64_or("comments", 0)?,
            comments_url: fields.string("comments_url")?,
            created_at: fields.timestamp("created_at")?,
            labels,
            pull_request_url: fields.string("pull_request_url")?,
            pull_request_html_url: fields.opt_string("pull_request_html_url")?,
            state: fields.string("state")?,
            title: fields.string("title")?,
            updated_at: fields.timestamp("updated_at")?,
            user_html_url: fields.opt_string("user_html_url")?,
            user_login: fields.opt_string("user_login")?,
        })
    }
}

/// Fields only the pull request document carries.
#[derive(Debug, Clone, PartialEq)]
pub struct PullFields {
    pub additions: u64,
    pub base_ref: String,
    pub changed_files: u64,
    pub commits: u64,
    pub deletions: u64,
    pub merged_at: Option<DateTime<Utc>>,
}

impl PullFields {
    fn from_json(pull: &Value) -> Result<Self, FieldError> {
        let fields = Resolver {
            sources: vec![(PULL_FIELDS, pull)],
            mapped: MAPPED_FIELDS,
            record: "PullRequest",
        };
        Ok(Self {
            additions: fields.u64("additions")?,
            base_ref: fields.string("base_ref")?,
            changed_files: fields.u64("changed_files")?,
            commits: fields.u64("commits")?,
            deletions: fields.u64("deletions")?,
            merged_at: fields.opt_timestamp("merged_at")?,
        })
    }
}

/// A pull request seen through the issues API, optionally joined with the
/// pull request document.
#[derive(Debug, Clone)]
pub struct PullRequest {
    /// "{owner/repo}.{number}"; set by the fetch that produced the record
    pub id: String,
    pub issue: IssueFields,
    pull: Option<PullFields>,
    raw_issue: Value,
    raw_pull: Option<Value>,
}

impl PullRequest {
    /// Issues that are really pull requests carry a `pull_request.url`.
    pub fn wants(issue: &Value) -> bool {
        issue
            .pointer("/pull_request/url")
            .and_then(Value::as_str)
            .is_some_and(|url| !url.is_empty())
    }

    pub fn from_issue(issue: Value) -> Result<Self, FieldError> {
        let fields = IssueFields::from_json(&issue)?;
        Ok(Self {
            id: String::new(),
            issue: fields,
            pull: None,
            raw_issue: issue,
            raw_pull: None,
        })
    }

    pub fn number(&self) -> u64 {
        self.issue.number
    }

    pub fn has_details(&self) -> bool {
        self.pull.is_some()
    }

    /// Pull request fields; an error until [`load_pull_details`] has run.
    ///
    /// [`load_pull_details`]: PullRequest::load_pull_details
    pub fn details(&self) -> Result<&PullFields, RecordError> {
        self.pull.as_ref().ok_or(RecordError::DetailsNotLoaded {
            number: self.issue.number,
        })
    }

    /// The issue JSON the record was built from, for fields outside the table.
    pub fn raw_issue(&self) -> &Value {
        &self.raw_issue
    }

    pub fn raw_pull(&self) -> Option<&Value> {
        self.raw_pull.as_ref()
    }

    /// Join the pull request document. `pulls` is a batch keyed by number;
    /// when it's absent, empty, or lacks this number the document is
    /// fetched individually.
    pub async fn load_pull_details(
        &mut self,
        api: &dyn GitHubApi,
        pulls: Option<&HashMap<u64, Value>>,
    ) -> Result<(), RecordError> {
        let batched = pulls
            .filter(|pulls| !pulls.is_empty())
            .and_then(|pulls| pulls.get(&self.issue.number));
        let pull = match batched {
            Some(pull) => pull.clone(),
            None => {
                debug!(number = self.issue.number, "fetching pull request details");
                api.get_json(&self.issue.pull_request_url).await?
            }
        };
        self.pull = Some(PullFields::from_json(&pull)?);
        self.raw_pull = Some(pull);
        Ok(())
    }
}

/// One issue comment.
#[derive(Debug, Clone, PartialEq)]
pub struct Comment {
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub user_login: Option<String>,
}

impl Comment {
    pub fn from_json(comment: &Value) -> Result<Self, FieldError> {
        let fields = Resolver {
            sources: vec![(COMMENT_FIELDS, comment)],
            mapped: COMMENT_MAPPED_FIELDS,
            record: "Comment",
        };
        Ok(Self {
            body: fields.opt_string("body")?.unwrap_or_default(),
            created_at: fields.timestamp("created_at")?,
            user_login: fields.opt_string("user_login")?,
        })
    }
}
