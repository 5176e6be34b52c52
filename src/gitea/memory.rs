use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use crate::error::ApiError;
use crate::gitea::{PageResult, PullQuery, PullRole, PullSummary, RateLimitState, SourceControlApi};
use crate::model::{CiStatus, PrKey, PullRequestRecord, RepoId};

/// In-memory backend serving seeded pull requests, used by the test suites.
///
/// Seeded records hold the full truth (changed paths, CI status); the detail
/// call hands them back with the diff-derived evidence reset, the way a
/// real server would.
pub struct InMemoryApi {
    page_size: usize,
    pulls: Vec<PullRequestRecord>,
    unmerged: Vec<PullSummary>,
    reviewers: BTreeMap<PrKey, BTreeSet<String>>,
    diff_errors: BTreeMap<PrKey, ApiError>,
    status_errors: BTreeMap<PrKey, ApiError>,
    list_error: Option<ApiError>,
    transient_list_failures: Mutex<u32>,
    rate_limit: Option<RateLimitState>,
    calls: Mutex<BTreeMap<&'static str, u32>>,
}

impl Default for InMemoryApi {
    fn default() -> Self {
        Self {
            page_size: 2,
            pulls: vec![],
            unmerged: vec![],
            reviewers: BTreeMap::new(),
            diff_errors: BTreeMap::new(),
            status_errors: BTreeMap::new(),
            list_error: None,
            transient_list_failures: Mutex::new(0),
            rate_limit: None,
            calls: Mutex::new(BTreeMap::new()),
        }
    }
}

// Create
impl InMemoryApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_pull(mut self, record: PullRequestRecord) -> Self {
        self.pulls.push(record);
        self
    }

    pub fn with_unmerged(mut self, repo: RepoId, number: u64, author: &str) -> Self {
        self.unmerged.push(PullSummary {
            repo,
            number,
            author: author.to_string(),
            merged_at: None,
        });
        self
    }

    pub fn with_reviewer(mut self, key: PrKey, reviewer: &str) -> Self {
        self.reviewers
            .entry(key)
            .or_default()
            .insert(reviewer.to_string());
        self
    }

    pub fn failing_diff(mut self, key: PrKey, err: ApiError) -> Self {
        self.diff_errors.insert(key, err);
        self
    }

    pub fn failing_status(mut self, key: PrKey, err: ApiError) -> Self {
        self.status_errors.insert(key, err);
        self
    }

    pub fn failing_list(mut self, err: ApiError) -> Self {
        self.list_error = Some(err);
        self
    }

    /// The next `count` listing calls answer with a rate-limit error.
    pub fn rate_limited_lists(self, count: u32) -> Self {
        if let Ok(mut remaining) = self.transient_list_failures.lock() {
            *remaining = count;
        }
        self
    }

    pub fn with_rate_limit(mut self, state: RateLimitState) -> Self {
        self.rate_limit = Some(state);
        self
    }

    pub fn calls(&self, method: &str) -> u32 {
        self.calls
            .lock()
            .ok()
            .and_then(|calls| calls.get(method).copied())
            .unwrap_or(0)
    }
}

impl InMemoryApi {
    fn record_call(&self, method: &'static str) {
        if let Ok(mut calls) = self.calls.lock() {
            *calls.entry(method).or_insert(0) += 1;
        }
    }

    fn find(&self, repo: &RepoId, number: u64) -> Result<&PullRequestRecord, ApiError> {
        self.pulls
            .iter()
            .find(|pr| &pr.repo == repo && pr.number == number)
            .ok_or_else(|| ApiError::Request(format!("HTTP 404: {repo}#{number} not found")))
    }

    fn paginate<T: Clone>(&self, items: &[T], page: u32) -> PageResult<T> {
        let start = (page.max(1) as usize - 1) * self.page_size;
        let end = (start + self.page_size).min(items.len());
        PageResult {
            items: items.get(start..end).map(<[T]>::to_vec).unwrap_or_default(),
            has_next: end < items.len(),
        }
    }
}

impl SourceControlApi for InMemoryApi {
    async fn list_pull_requests(
        &self,
        query: &PullQuery,
        page: u32,
    ) -> Result<PageResult<PullSummary>, ApiError> {
        self.record_call("list_pull_requests");
        if let Some(err) = &self.list_error {
            return Err(err.clone());
        }
        if let Ok(mut remaining) = self.transient_list_failures.lock() {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(ApiError::RateLimited("HTTP 429: slow down".into()));
            }
        }

        let merged = self.pulls.iter().map(|pr| PullSummary {
            repo: pr.repo.clone(),
            number: pr.number,
            author: pr.author.clone(),
            merged_at: Some(pr.merged_at),
        });
        let mut summaries = merged
            .chain(self.unmerged.iter().cloned())
            .filter(|summary| query.scope.contains(&summary.repo))
            .filter(|summary| match query.role {
                PullRole::Authored => summary.author == query.author,
                PullRole::Reviewed => {
                    let key = PrKey {
                        repo: summary.repo.clone(),
                        number: summary.number,
                    };
                    summary.author != query.author
                        && self
                            .reviewers
                            .get(&key)
                            .is_some_and(|reviewers| reviewers.contains(&query.author))
                }
            })
            .collect::<Vec<_>>();
        summaries.sort_by(|a, b| (&a.repo, a.number).cmp(&(&b.repo, b.number)));
        Ok(self.paginate(&summaries, page))
    }

    async fn get_pull_request_detail(
        &self,
        repo: &RepoId,
        number: u64,
    ) -> Result<PullRequestRecord, ApiError> {
        self.record_call("get_pull_request_detail");
        let mut record = self.find(repo, number)?.clone();
        record.changed_file_paths.clear();
        record.has_test_files = false;
        record.has_testing_section = false;
        record.post_merge_ci_status = CiStatus::Unknown;
        record.caveats.clear();
        Ok(record)
    }

    async fn get_pull_request_diff(
        &self,
        repo: &RepoId,
        number: u64,
        page: u32,
    ) -> Result<PageResult<String>, ApiError> {
        self.record_call("get_pull_request_diff");
        let record = self.find(repo, number)?;
        if let Some(err) = self.diff_errors.get(&record.key()) {
            return Err(err.clone());
        }
        Ok(self.paginate(&record.changed_file_paths, page))
    }

    async fn get_post_merge_status(
        &self,
        repo: &RepoId,
        commit_sha: &str,
    ) -> Result<CiStatus, ApiError> {
        self.record_call("get_post_merge_status");
        let record = self
            .pulls
            .iter()
            .find(|pr| &pr.repo == repo && pr.merge_commit_sha.as_deref() == Some(commit_sha))
            .ok_or_else(|| ApiError::Request(format!("HTTP 404: commit {commit_sha} not found")))?;
        if let Some(err) = self.status_errors.get(&record.key()) {
            return Err(err.clone());
        }
        Ok(record.post_merge_ci_status)
    }

    async fn get_rate_limit_state(&self) -> Result<Option<RateLimitState>, ApiError> {
        self.record_call("get_rate_limit_state");
        Ok(self.rate_limit.clone())
    }
}
