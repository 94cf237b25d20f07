use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use reqwest::Url;
use serde_json::Value;
use tracing::{debug, instrument};

use super::records::{Comment, PullRequest, RecordError};
use crate::github::{GitHubApi, GitHubError, Pager};

/// How much of the pull request document to join onto each record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum PullDetails {
    /// Issue data only
    #[default]
    None,
    /// What the pull request listing carries, fetched in one batch up front
    List,
    /// The full document, fetched per pull request
    All,
}

/// Streaming yields records as pages arrive. Batch collects everything,
/// sorts by the caller's key, then yields.
#[derive(Clone, Copy, Default)]
pub enum PullOrder {
    #[default]
    Streaming,
    Batch(fn(&PullRequest) -> String),
}

impl std::fmt::Debug for PullOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PullOrder::Streaming => write!(f, "Streaming"),
            PullOrder::Batch(_) => write!(f, "Batch"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PullQuery {
    pub labels: Vec<String>,
    pub state: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub details: PullDetails,
    pub order: PullOrder,
}

impl Default for PullQuery {
    fn default() -> Self {
        Self {
            labels: Vec::new(),
            state: Some("open".to_string()),
            since: None,
            details: PullDetails::None,
            order: PullOrder::Streaming,
        }
    }
}

enum Source<'a> {
    Pages(Pager<'a>),
    Buffered(VecDeque<PullRequest>),
}

/// Single-pass sequence of pull requests. Iterating again means calling
/// [`get_pulls`] again.
pub struct PullStream<'a> {
    api: &'a dyn GitHubApi,
    owner_repo: String,
    details: PullDetails,
    batch: Option<HashMap<u64, Value>>,
    source: Source<'a>,
}

impl<'a> PullStream<'a> {
    pub async fn next(&mut self) -> Result<Option<PullRequest>, RecordError> {
        let record = match &mut self.source {
            Source::Buffered(records) => records.pop_front(),
            Source::Pages(pager) => next_pull(pager).await?,
        };
        let Some(mut record) = record else {
            return Ok(None);
        };

        if self.details != PullDetails::None {
            record
                .load_pull_details(self.api, self.batch.as_ref())
                .await?;
        }
        record.id = format!("{}.{}", self.owner_repo, record.number());
        Ok(Some(record))
    }

    pub async fn collect_all(mut self) -> Result<Vec<PullRequest>, RecordError> {
        let mut records = Vec::new();
        while let Some(record) = self.next().await? {
            records.push(record);
        }
        Ok(records)
    }
}

/// Next issue from the pager that is a pull request.
async fn next_pull(pager: &mut Pager<'_>) -> Result<Option<PullRequest>, RecordError> {
    while let Some(issue) = pager.next().await? {
        if PullRequest::wants(&issue) {
            return Ok(Some(PullRequest::from_issue(issue)?));
        }
    }
    Ok(None)
}

fn issues_url(
    api: &dyn GitHubApi,
    owner_repo: &str,
    query: &PullQuery,
) -> Result<Url, GitHubError> {
    let mut url = api.endpoint(&format!("repos/{owner_repo}/issues"))?;
    {
        let mut pairs = url.query_pairs_mut();
        if !query.labels.is_empty() {
            pairs.append_pair("labels", &query.labels.join(","));
        }
        if let Some(since) = query.since {
            pairs.append_pair("since", &since.to_rfc3339());
        }
        if let Some(state) = &query.state {
            pairs.append_pair("state", state);
        }
        pairs.append_pair("sort", "updated");
    }
    Ok(url)
}

/// Pull requests of `owner_repo`, read through the issues API.
///
/// In `PullDetails::List` mode the issues are materialized first so a batch
/// of pull request documents (about 1.5x as many, since the two endpoints
/// can't be filtered the same way) can be fetched for joining.
#[instrument(skip(api, query), fields(details = ?query.details))]
pub async fn get_pulls<'a>(
    api: &'a dyn GitHubApi,
    owner_repo: &str,
    query: PullQuery,
) -> Result<PullStream<'a>, RecordError> {
    let url = issues_url(api, owner_repo, &query)?;
    let mut pager = Pager::new(api, url);

    let mut stream = PullStream {
        api,
        owner_repo: owner_repo.to_string(),
        details: query.details,
        batch: None,
        source: Source::Buffered(VecDeque::new()),
    };

    let materialize =
        matches!(query.order, PullOrder::Batch(_)) || query.details == PullDetails::List;
    if !materialize {
        stream.source = Source::Pages(pager);
        return Ok(stream);
    }

    let mut records = Vec::new();
    while let Some(record) = next_pull(&mut pager).await? {
        records.push(record);
    }
    if let PullOrder::Batch(key) = query.order {
        records.sort_by_cached_key(key);
    }

    if query.details == PullDetails::List && !records.is_empty() {
        let limit = records.len() * 3 / 2;
        let mut pulls_url = api.endpoint(&format!("repos/{owner_repo}/pulls"))?;
        if let Some(state) = &query.state {
            pulls_url.query_pairs_mut().append_pair("state", state);
        }
        let pulls = Pager::new(api, pulls_url)
            .with_limit(limit)
            .collect_all()
            .await?;
        let batch: HashMap<u64, Value> = pulls
            .into_iter()
            .filter_map(|pull| {
                let number = pull.get("number").and_then(Value::as_u64)?;
                Some((number, pull))
            })
            .collect();
        debug!(issues = records.len(), pulls = batch.len(), "prefetched pull requests");
        stream.batch = Some(batch);
    }

    stream.source = Source::Buffered(records.into());
    Ok(stream)
}

/// Sequence of comments on a pull request, newest first.
pub struct CommentStream<'a> {
    pager: Pager<'a>,
}

impl<'a> CommentStream<'a> {
    pub async fn next(&mut self) -> Result<Option<Comment>, RecordError> {
        match self.pager.next().await? {
            Some(comment) => Ok(Some(Comment::from_json(&comment)?)),
            None => Ok(None),
        }
    }

    pub async fn collect_all(mut self) -> Result<Vec<Comment>, RecordError> {
        let mut comments = Vec::new();
        while let Some(comment) = self.next().await? {
            comments.push(comment);
        }
        Ok(comments)
    }
}

pub fn get_comments<'a>(
    api: &'a dyn GitHubApi,
    pull: &PullRequest,
) -> Result<CommentStream<'a>, RecordError> {
    let mut url = Url::parse(&pull.issue.comments_url)
        .map_err(|_| GitHubError::InvalidUrl(pull.issue.comments_url.clone()))?;
    url.query_pairs_mut()
        .append_pair("sort", "created")
        .append_pair("direction", "desc");
    Ok(CommentStream {
        pager: Pager::new(api, url),
    })
}
