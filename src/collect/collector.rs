use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::client::{RateLimitedClient, Sleeper, TokioSleeper};
use crate::collect::CancellationFlag;
use crate::error::FatalError;
use crate::gitea::{PullQuery, PullRole, PullSummary, SourceControlApi};
use crate::model::{Caveat, CiStatus, DateWindow, PrKey, PullRequestRecord, RepoScope};

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum CollectStep {
    /// About to request this listing page (from 1).
    Page(u32),
    /// About to fetch the detail of PR `done + 1` of `total`.
    Detail { done: usize, total: usize },
}

pub type CollectProgress<'a> = Box<dyn FnMut(CollectStep) + 'a>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Collected {
    /// Ordered by merge time, then repository and number.
    pub records: Vec<PullRequestRecord>,
    pub cancelled: bool,
}

/// Pages through the remote listing and turns every merged PR of the window
/// into a [`PullRequestRecord`].
pub struct PrCollector<'a, A, S = TokioSleeper> {
    api: &'a A,
    client: &'a RateLimitedClient<S>,
    cancel: CancellationFlag,
}

impl<'a, A: SourceControlApi, S: Sleeper> PrCollector<'a, A, S> {
    pub fn new(api: &'a A, client: &'a RateLimitedClient<S>, cancel: CancellationFlag) -> Self {
        Self {
            api,
            client,
            cancel,
        }
    }

    /// The advisory quota is only logged; a failure to read it is not fatal.
    pub async fn log_rate_limit(&self) {
        match self
            .client
            .call("rate limit", || self.api.get_rate_limit_state())
            .await
        {
            Ok(Some(state)) => info!(
                remaining = state.remaining,
                reset_at = ?state.reset_at,
                "remote rate limit"
            ),
            Ok(None) => debug!("remote does not report a rate limit"),
            Err(err) => warn!("rate limit state unavailable: {err}"),
        }
    }

    pub async fn collect(
        &self,
        author: &str,
        scope: &RepoScope,
        window: &DateWindow,
        mut progress: CollectProgress<'_>,
    ) -> Result<Collected, FatalError> {
        let query = PullQuery {
            author: author.to_string(),
            scope: scope.clone(),
            role: PullRole::Authored,
            window: window.clone(),
        };
        let (summaries, mut cancelled) = self
            .list_merged(&query, &mut |page| progress(CollectStep::Page(page)))
            .await?;

        let total = summaries.len();
        let mut records = Vec::with_capacity(total);
        for (done, summary) in summaries.iter().enumerate() {
            progress(CollectStep::Detail { done, total });
            if self.cancel.is_cancelled() {
                cancelled = true;
                break;
            }
            let label = format!("pull request {}/{}#{}", summary.repo.owner, summary.repo.name, summary.number);
            let record = self
                .client
                .call(&label, || {
                    self.api
                        .get_pull_request_detail(&summary.repo, summary.number)
                })
                .await?;
            records.push(self.with_ci_status(record).await?);
        }

        info!(author, collected = records.len(), cancelled, "collected merged pull requests");
        Ok(Collected { records, cancelled })
    }

    /// Merged PRs in the window opened by someone else and reviewed by
    /// `author`.
    pub async fn count_reviewed(
        &self,
        author: &str,
        scope: &RepoScope,
        window: &DateWindow,
    ) -> Result<u64, FatalError> {
        let query = PullQuery {
            author: author.to_string(),
            scope: scope.clone(),
            role: PullRole::Reviewed,
            window: window.clone(),
        };
        let (summaries, _) = self.list_merged(&query, &mut |_| {}).await?;
        info!(author, reviewed = summaries.len(), "counted reviewed pull requests");
        Ok(summaries.len() as u64)
    }

    /// Drains every listing page, keeping merged PRs inside the window once
    /// each. Ordering of the remote listing is not relied upon.
    async fn list_merged(
        &self,
        query: &PullQuery,
        on_page: &mut dyn FnMut(u32),
    ) -> Result<(Vec<PullSummary>, bool), FatalError> {
        let mut merged: BTreeMap<PrKey, PullSummary> = BTreeMap::new();
        let mut page = 1;
        let mut cancelled = false;

        loop {
            if self.cancel.is_cancelled() {
                cancelled = true;
                break;
            }
            on_page(page);
            let label = format!("pull request list page {page}");
            let result = self
                .client
                .call(&label, || self.api.list_pull_requests(query, page))
                .await?;
            debug!(page, listed = result.items.len(), has_next = result.has_next, "listing page");

            for summary in result.items {
                let Some(merged_at) = summary.merged_at else {
                    continue;
                };
                if !query.window.contains(&merged_at) || !query.scope.contains(&summary.repo) {
                    continue;
                }
                let key = PrKey {
                    repo: summary.repo.clone(),
                    number: summary.number,
                };
                merged.entry(key).or_insert(summary);
            }

            if !result.has_next {
                break;
            }
            page += 1;
        }

        let mut summaries = merged.into_values().collect::<Vec<_>>();
        summaries.sort_by(|a, b| {
            (a.merged_at, &a.repo, a.number).cmp(&(b.merged_at, &b.repo, b.number))
        });
        Ok((summaries, cancelled))
    }

    async fn with_ci_status(
        &self,
        mut record: PullRequestRecord,
    ) -> Result<PullRequestRecord, FatalError> {
        let Some(sha) = record.merge_commit_sha.clone() else {
            record.post_merge_ci_status = CiStatus::Unknown;
            record
                .caveats
                .push(Caveat::CiStatusUnavailable("no merge commit".into()));
            return Ok(record);
        };

        let label = format!("CI status {}", sha.chars().take(10).collect::<String>());
        let status = self
            .client
            .call(&label, || self.api.get_post_merge_status(&record.repo, &sha))
            .await;
        match status {
            Ok(status) => record.post_merge_ci_status = status,
            Err(err) if !err.is_recoverable() => return Err(err),
            Err(err) => {
                warn!(pr = %record.key(), "CI status unavailable: {err}");
                record.post_merge_ci_status = CiStatus::Unknown;
                record
                    .caveats
                    .push(Caveat::CiStatusUnavailable(err.to_string()));
            }
        }
        Ok(record)
    }
}
