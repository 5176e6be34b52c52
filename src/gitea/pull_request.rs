use chrono::{DateTime, NaiveTime, Utc};
use gitea_sdk::model::issues::State;
use gitea_sdk::model::reviews::ReviewStateType;
use gitea_sdk::{Auth, Client};
use reqwest::header::{ACCEPT, AUTHORIZATION};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Display;
use tracing::debug;

use crate::error::ApiError;
use crate::gitea::{PageResult, PullQuery, PullRole, PullSummary, SourceControlApi};
use crate::model::{CiStatus, PullRequestRecord, RepoId, RepoScope};

pub type GiteaPullRequest = gitea_sdk::model::pulls::PullRequest;
pub type GiteaPullReview = gitea_sdk::model::reviews::PullReview;

const PAGE_SIZE: u32 = 50;

/// Gitea backend. Pull listings and reviews go through `gitea-sdk`; the
/// endpoints it does not model are called over plain REST.
pub struct GiteaApi {
    client: Client,
    http: reqwest::Client,
    base_url: String,
    token: String,
}

// Create
impl GiteaApi {
    pub fn new(url: &str, token: &str) -> Self {
        let base_url = url.trim_end_matches('/').to_string();
        let token = token.to_string();
        Self {
            client: Client::new(&base_url, Auth::Token(&token)),
            http: reqwest::Client::new(),
            base_url,
            token,
        }
    }
}

impl SourceControlApi for GiteaApi {
    async fn list_pull_requests(
        &self,
        query: &PullQuery,
        page: u32,
    ) -> Result<PageResult<PullSummary>, ApiError> {
        let listed = match &query.scope {
            RepoScope::Single(repo) => self.list_repo_pulls(repo, page).await?,
            RepoScope::All => self.search_pulls(query, page).await?,
        };
        let has_next = listed.len() >= PAGE_SIZE as usize;

        let mut items = Vec::with_capacity(listed.len());
        for summary in listed {
            let keep = match query.role {
                PullRole::Authored => summary.author == query.author,
                PullRole::Reviewed => {
                    summary.author != query.author
                        && summary.merged_at.is_some()
                        && self.reviewed_by(&summary, &query.author).await?
                }
            };
            if keep {
                items.push(summary);
            }
        }
        debug!(page, found = items.len(), has_next, "listed pull requests");
        Ok(PageResult { items, has_next })
    }

    async fn get_pull_request_detail(
        &self,
        repo: &RepoId,
        number: u64,
    ) -> Result<PullRequestRecord, ApiError> {
        let path = format!("/repos/{}/{}/pulls/{number}", repo.owner, repo.name);
        let json = self.get_json(&path, &[]).await?;
        let mut record = record_from_json(repo, &json)?;

        let verdicts = self
            .fetch_reviews(repo, number)
            .await?
            .iter()
            .filter_map(review_verdict)
            .collect::<Vec<_>>();
        let (approvals, reviewers) = tally_reviews(&record.author, verdicts);
        record.reviewer_approvals = approvals;
        record.review_count = reviewers;
        Ok(record)
    }

    async fn get_pull_request_diff(
        &self,
        repo: &RepoId,
        number: u64,
        page: u32,
    ) -> Result<PageResult<String>, ApiError> {
        let path = format!("/repos/{}/{}/pulls/{number}/files", repo.owner, repo.name);
        let json = self.get_json(&path, &page_params(page)).await?;
        let files = json
            .as_array()
            .ok_or_else(|| ApiError::Malformed(format!("{path}: expected an array")))?;
        let has_next = files.len() >= PAGE_SIZE as usize;
        let items = files
            .iter()
            .filter_map(|file| file.get("filename").and_then(Value::as_str))
            .map(str::to_string)
            .collect();
        Ok(PageResult { items, has_next })
    }

    async fn get_post_merge_status(
        &self,
        repo: &RepoId,
        commit_sha: &str,
    ) -> Result<CiStatus, ApiError> {
        let path = format!("/repos/{}/{}/commits/{commit_sha}/status", repo.owner, repo.name);
        let json = self.get_json(&path, &[]).await?;
        Ok(json
            .get("state")
            .and_then(Value::as_str)
            .map(CiStatus::from_state)
            .unwrap_or_default())
    }
}

// Requests
impl GiteaApi {
    async fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<Value, ApiError> {
        let response = self
            .http
            .get(format!("{}/api/v1{path}", self.base_url))
            .header(AUTHORIZATION, format!("token {}", self.token))
            .header(ACCEPT, "application/json")
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::from_status(status.as_u16(), &body));
        }
        Ok(response.json::<Value>().await?)
    }

    async fn list_repo_pulls(&self, repo: &RepoId, page: u32) -> Result<Vec<PullSummary>, ApiError> {
        let pulls = self
            .client
            .pulls(&repo.owner, &repo.name)
            .list()
            .limit(PAGE_SIZE as i64)
            .page(page as i64)
            .state(State::All)
            .send(&self.client)
            .await
            .map_err(sdk_error)?;

        pulls
            .iter()
            .map(|pull| {
                Ok(PullSummary {
                    repo: repo.clone(),
                    number: pull.number as u64,
                    author: pull.user.login.clone(),
                    merged_at: parse_time(pull.merged_at.as_deref())?,
                })
            })
            .collect()
    }

    /// Cross-repository search. Gitea's `reviewed` filter applies to the
    /// token's user, so reviewed listings are confirmed per pull afterwards.
    async fn search_pulls(&self, query: &PullQuery, page: u32) -> Result<Vec<PullSummary>, ApiError> {
        let since = query.window.start.and_time(NaiveTime::MIN).and_utc();
        let mut params = page_params(page);
        params.push(("type", "pulls".to_string()));
        params.push(("state", "closed".to_string()));
        params.push(("since", since.to_rfc3339()));
        match query.role {
            PullRole::Authored => params.push(("created_by", query.author.clone())),
            PullRole::Reviewed => params.push(("reviewed", "true".to_string())),
        }

        let json = self.get_json("/repos/issues/search", &params).await?;
        json.as_array()
            .ok_or_else(|| ApiError::Malformed("issue search: expected an array".into()))?
            .iter()
            .map(summary_from_issue_json)
            .collect()
    }

    async fn fetch_reviews(&self, repo: &RepoId, number: u64) -> Result<Vec<GiteaPullReview>, ApiError> {
        self.client
            .pulls(&repo.owner, &repo.name)
            .reviews()
            .get(number as i64)
            .send(&self.client)
            .await
            .map_err(sdk_error)
    }

    async fn reviewed_by(&self, summary: &PullSummary, login: &str) -> Result<bool, ApiError> {
        let reviews = self.fetch_reviews(&summary.repo, summary.number).await?;
        Ok(reviews
            .iter()
            .filter_map(review_verdict)
            .any(|(reviewer, _)| reviewer == login))
    }
}

fn sdk_error(err: impl Display) -> ApiError {
    ApiError::classify(err.to_string())
}

fn page_params(page: u32) -> Vec<(&'static str, String)> {
    vec![("page", page.to_string()), ("limit", PAGE_SIZE.to_string())]
}

fn parse_time(value: Option<&str>) -> Result<Option<DateTime<Utc>>, ApiError> {
    value
        .filter(|s| !s.is_empty())
        .map(|s| {
            DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|err| ApiError::Malformed(format!("timestamp `{s}`: {err}")))
        })
        .transpose()
}

fn str_at<'a>(json: &'a Value, pointer: &str) -> Option<&'a str> {
    json.pointer(pointer).and_then(Value::as_str)
}

fn required_str<'a>(json: &'a Value, pointer: &str) -> Result<&'a str, ApiError> {
    str_at(json, pointer).ok_or_else(|| ApiError::Malformed(format!("missing `{pointer}`")))
}

fn record_from_json(repo: &RepoId, json: &Value) -> Result<PullRequestRecord, ApiError> {
    let number = json
        .get("number")
        .and_then(Value::as_u64)
        .ok_or_else(|| ApiError::Malformed("missing `/number`".into()))?;
    let author = required_str(json, "/user/login")?.to_string();
    let merged_at = parse_time(str_at(json, "/merged_at"))?
        .ok_or_else(|| ApiError::Malformed(format!("{repo}#{number} is not merged")))?;
    let merged_by = str_at(json, "/merged_by/login").map(str::to_string);
    let count = |key: &str| json.get(key).and_then(Value::as_u64).unwrap_or(0);
    let labels = json
        .get("labels")
        .and_then(Value::as_array)
        .map(|labels| {
            labels
                .iter()
                .filter_map(|label| label.get("name").and_then(Value::as_str))
                .map(str::to_string)
                .collect::<BTreeSet<_>>()
        })
        .unwrap_or_default();

    Ok(PullRequestRecord {
        repo: repo.clone(),
        number,
        url: str_at(json, "/html_url").unwrap_or_default().to_string(),
        is_self_merged: merged_by.as_deref() == Some(author.as_str()),
        author,
        title: str_at(json, "/title").unwrap_or_default().to_string(),
        description: str_at(json, "/body").unwrap_or_default().to_string(),
        merged_at,
        merged_by,
        merge_commit_sha: str_at(json, "/merge_commit_sha")
            .filter(|sha| !sha.is_empty())
            .map(str::to_string),
        additions: count("additions"),
        deletions: count("deletions"),
        changed_files_count: count("changed_files"),
        changed_file_paths: Vec::new(),
        reviewer_approvals: 0,
        review_count: 0,
        labels,
        linked_ticket_refs: BTreeSet::new(),
        post_merge_ci_status: CiStatus::Unknown,
        has_test_files: false,
        has_testing_section: false,
        caveats: Vec::new(),
    })
}

fn summary_from_issue_json(json: &Value) -> Result<PullSummary, ApiError> {
    let repo = RepoId::new(
        required_str(json, "/repository/owner")?,
        required_str(json, "/repository/name")?,
    );
    let number = json
        .get("number")
        .and_then(Value::as_u64)
        .ok_or_else(|| ApiError::Malformed("missing `/number`".into()))?;
    let merged = json
        .pointer("/pull_request/merged")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let merged_at = if merged {
        parse_time(str_at(json, "/pull_request/merged_at"))?
    } else {
        None
    };
    Ok(PullSummary {
        repo,
        number,
        author: required_str(json, "/user/login")?.to_string(),
        merged_at,
    })
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
enum Verdict {
    Approved,
    ChangesRequested,
    Commented,
}

fn review_verdict(review: &GiteaPullReview) -> Option<(String, Verdict)> {
    let user = review.user.as_ref()?;
    let verdict = match review.state {
        ReviewStateType::Approved => Verdict::Approved,
        ReviewStateType::RequestChanges => Verdict::ChangesRequested,
        ReviewStateType::Comment => Verdict::Commented,
        ReviewStateType::Pending => return None,
        ReviewStateType::RequestReview => return None,
        ReviewStateType::Unknown => return None,
    };
    Some((user.login.clone(), verdict))
}

/// Returns `(approvals, reviewers)` over distinct reviewers other than the
/// author. A reviewer's latest approve/request-changes verdict wins; plain
/// comments never revoke an approval.
fn tally_reviews(author: &str, verdicts: impl IntoIterator<Item = (String, Verdict)>) -> (u32, u32) {
    let mut latest: BTreeMap<String, Option<Verdict>> = BTreeMap::new();
    for (reviewer, verdict) in verdicts {
        if reviewer == author {
            continue;
        }
        let entry = latest.entry(reviewer).or_insert(None);
        if verdict != Verdict::Commented {
            *entry = Some(verdict);
        }
    }
    let approvals = latest
        .values()
        .filter(|verdict| **verdict == Some(Verdict::Approved))
        .count();
    (approvals as u32, latest.len() as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn billing() -> RepoId {
        RepoId::new("platform", "billing")
    }

    #[test]
    fn builds_record_from_pull_json() {
        let json = json!({
            "number": 42,
            "html_url": "https://git.example.com/platform/billing/pulls/42",
            "user": { "login": "alice" },
            "title": "BILL-7 retry failed invoices",
            "body": "## Summary\nRetries invoices.",
            "merged_at": "2025-09-01T10:00:00+02:00",
            "merged_by": { "login": "bob" },
            "merge_commit_sha": "abc123",
            "additions": 40,
            "deletions": 5,
            "changed_files": 3,
            "labels": [{ "name": "bug" }, { "name": "billing" }]
        });

        let record = record_from_json(&billing(), &json).unwrap();
        assert_eq!(record.number, 42);
        assert_eq!(record.author, "alice");
        assert_eq!(record.merged_by.as_deref(), Some("bob"));
        assert!(!record.is_self_merged);
        assert_eq!(record.merged_at.to_rfc3339(), "2025-09-01T08:00:00+00:00");
        assert_eq!(record.changed_lines(), 45);
        assert_eq!(record.changed_files_count, 3);
        assert_eq!(
            record.labels.into_iter().collect::<Vec<_>>(),
            vec!["billing".to_string(), "bug".to_string()]
        );
    }

    #[test]
    fn null_body_and_self_merge() {
        let json = json!({
            "number": 3,
            "user": { "login": "alice" },
            "body": null,
            "merged_at": "2025-09-01T10:00:00Z",
            "merged_by": { "login": "alice" }
        });
        let record = record_from_json(&billing(), &json).unwrap();
        assert_eq!(record.description, "");
        assert!(record.is_self_merged);
        assert_eq!(record.merge_commit_sha, None);
    }

    #[test]
    fn unmerged_detail_is_malformed() {
        let json = json!({ "number": 3, "user": { "login": "alice" }, "merged_at": null });
        assert!(matches!(
            record_from_json(&billing(), &json),
            Err(ApiError::Malformed(_))
        ));
    }

    #[test]
    fn search_results_carry_repository_and_merge_time() {
        let merged = json!({
            "number": 9,
            "user": { "login": "alice" },
            "repository": { "owner": "platform", "name": "auth" },
            "pull_request": { "merged": true, "merged_at": "2025-08-01T00:00:00Z" }
        });
        let summary = summary_from_issue_json(&merged).unwrap();
        assert_eq!(summary.repo, RepoId::new("platform", "auth"));
        assert!(summary.merged_at.is_some());

        let closed = json!({
            "number": 10,
            "user": { "login": "alice" },
            "repository": { "owner": "platform", "name": "auth" },
            "pull_request": { "merged": false, "merged_at": null }
        });
        assert_eq!(summary_from_issue_json(&closed).unwrap().merged_at, None);
    }

    #[test]
    fn latest_verdict_per_reviewer_counts() {
        let verdicts = vec![
            ("bob".to_string(), Verdict::ChangesRequested),
            ("bob".to_string(), Verdict::Approved),
            ("carol".to_string(), Verdict::Approved),
            ("carol".to_string(), Verdict::Commented),
            ("dave".to_string(), Verdict::Commented),
            ("alice".to_string(), Verdict::Approved),
        ];
        assert_eq!(tally_reviews("alice", verdicts), (2, 3));
    }

    #[test]
    fn revoked_approval_is_not_counted() {
        let verdicts = vec![
            ("bob".to_string(), Verdict::Approved),
            ("bob".to_string(), Verdict::ChangesRequested),
        ];
        assert_eq!(tally_reviews("alice", verdicts), (0, 1));
    }
}
