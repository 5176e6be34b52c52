//! Remote source-control capabilities and the Gitea backend implementing them.

pub mod memory;
pub mod pull_request;

pub use memory::InMemoryApi;
pub use pull_request::GiteaApi;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::model::{CiStatus, DateWindow, PullRequestRecord, RepoId, RepoScope};

/// Whose pull requests a listing returns.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum PullRole {
    /// Opened by the author.
    Authored,
    /// Opened by someone else and reviewed by the author.
    Reviewed,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct PullQuery {
    pub author: String,
    pub scope: RepoScope,
    pub role: PullRole,
    /// Lets a backend narrow its server-side search. Callers still filter
    /// on the merge timestamp themselves.
    pub window: DateWindow,
}

/// Listing entry; just enough to decide whether the full detail is needed.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct PullSummary {
    pub repo: RepoId,
    pub number: u64,
    pub author: String,
    /// `None` for pull requests that were closed without merging.
    pub merged_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct PageResult<T> {
    pub items: Vec<T>,
    pub has_next: bool,
}

impl<T> PageResult<T> {
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            has_next: false,
        }
    }
}

/// Advisory quota information.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct RateLimitState {
    pub remaining: u64,
    pub reset_at: Option<DateTime<Utc>>,
}

/// A single request per call; retrying and serialization are the caller's
/// business (see [`crate::client::RateLimitedClient`]).
#[allow(async_fn_in_trait)]
pub trait SourceControlApi {
    /// Pages are numbered from 1.
    async fn list_pull_requests(
        &self,
        query: &PullQuery,
        page: u32,
    ) -> Result<PageResult<PullSummary>, ApiError>;

    /// Everything except the diff-derived evidence, which is left at its
    /// defaults.
    async fn get_pull_request_detail(
        &self,
        repo: &RepoId,
        number: u64,
    ) -> Result<PullRequestRecord, ApiError>;

    /// Changed file paths, one page at a time.
    async fn get_pull_request_diff(
        &self,
        repo: &RepoId,
        number: u64,
        page: u32,
    ) -> Result<PageResult<String>, ApiError>;

    async fn get_post_merge_status(
        &self,
        repo: &RepoId,
        commit_sha: &str,
    ) -> Result<CiStatus, ApiError>;

    async fn get_rate_limit_state(&self) -> Result<Option<RateLimitState>, ApiError> {
        Ok(None)
    }
}
