use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::model::RepoId;

/// CI outcome reported for a merge commit.
#[derive(Debug, Clone, Copy, Default, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CiStatus {
    Success,
    Failure,
    Pending,
    #[default]
    Unknown,
}

impl CiStatus {
    pub const ALL: [CiStatus; 4] = [
        CiStatus::Success,
        CiStatus::Failure,
        CiStatus::Pending,
        CiStatus::Unknown,
    ];

    /// Maps a combined commit-status string from the remote API.
    pub fn from_state(state: &str) -> Self {
        match state.to_ascii_lowercase().as_str() {
            "success" => CiStatus::Success,
            "failure" | "error" | "cancelled" | "timed_out" | "action_required" => {
                CiStatus::Failure
            }
            "pending" | "running" | "queued" | "in_progress" => CiStatus::Pending,
            _ => CiStatus::Unknown,
        }
    }
}

impl fmt::Display for CiStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            CiStatus::Success => "success",
            CiStatus::Failure => "failure",
            CiStatus::Pending => "pending",
            CiStatus::Unknown => "unknown",
        };
        f.pad(text)
    }
}

/// Evidence that could not be gathered for one PR. Caveats never carry a
/// severity and never change a score.
#[derive(Debug, Clone, Eq, Hash, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(tag = "kind", content = "reason", rename_all = "snake_case")]
pub enum Caveat {
    DiffUnavailable(String),
    CiStatusUnavailable(String),
}

impl Caveat {
    /// Stable text used for frequency counting.
    pub fn summary(&self) -> &'static str {
        match self {
            Caveat::DiffUnavailable(_) => "Changed files unavailable",
            Caveat::CiStatusUnavailable(_) => "Post-merge CI status unavailable",
        }
    }
}

/// `(repo, number)` identity used for deduplication and ordering.
#[derive(Debug, Clone, Eq, Hash, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct PrKey {
    pub repo: RepoId,
    pub number: u64,
}

impl fmt::Display for PrKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.repo, self.number)
    }
}

/// A merged pull request as collected from the remote API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullRequestRecord {
    pub repo: RepoId,
    pub number: u64,
    pub url: String,
    pub author: String,
    pub title: String,
    pub description: String,
    pub merged_at: DateTime<Utc>,
    pub merged_by: Option<String>,
    pub merge_commit_sha: Option<String>,
    pub additions: u64,
    pub deletions: u64,
    pub changed_files_count: u64,
    pub changed_file_paths: Vec<String>,
    pub is_self_merged: bool,
    /// Distinct non-author reviewers whose latest verdict is an approval.
    pub reviewer_approvals: u32,
    /// Distinct non-author reviewers who left any review.
    pub review_count: u32,
    pub labels: BTreeSet<String>,
    pub linked_ticket_refs: BTreeSet<String>,
    pub post_merge_ci_status: CiStatus,
    pub has_test_files: bool,
    pub has_testing_section: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub caveats: Vec<Caveat>,
}

impl PullRequestRecord {
    pub fn key(&self) -> PrKey {
        PrKey {
            repo: self.repo.clone(),
            number: self.number,
        }
    }

    pub fn changed_lines(&self) -> u64 {
        self.additions + self.deletions
    }

    pub fn diff_unavailable(&self) -> bool {
        self.caveats
            .iter()
            .any(|caveat| matches!(caveat, Caveat::DiffUnavailable(_)))
    }
}
