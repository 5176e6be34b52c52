pub mod aggregate;
pub mod patterns;
pub mod scoring;
pub mod severity;

pub use aggregate::{AggregateReport, ReportAggregator, ScopeMetadata, DEFAULT_THRESHOLD};
pub use patterns::{FileClassifier, FileKind, Heuristics, PatternSet};
pub use scoring::ScoringEngine;
pub use severity::SeverityClassifier;

use crate::model::{ConfigError, ScoringConfig};

/// Builds the scoring engine and the text heuristics from one config.
pub fn build(config: &ScoringConfig) -> Result<(ScoringEngine, Heuristics), ConfigError> {
    config.validate()?;
    let heuristics = Heuristics::from_config(config)?;
    let severity = SeverityClassifier::new(config.clone(), heuristics.files.clone());
    Ok((ScoringEngine::new(config.clone(), severity), heuristics))
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeSet;

    use crate::model::{
        Category, CategoryScore, CiStatus, Grade, Issue, PullRequestRecord, RepoId, ScoredPR,
    };

    /// Reviewed, small, CI-green PR by `alice` with a plain 74-character
    /// description, no tests, no labels and no ticket.
    pub fn record() -> PullRequestRecord {
        PullRequestRecord {
            repo: RepoId::new("platform", "billing"),
            number: 1,
            url: "https://git.example.com/platform/billing/pulls/1".into(),
            author: "alice".into(),
            title: "Retry failed invoices".into(),
            description: "Retries invoice delivery when the mail gateway times out on the first try."
                .into(),
            merged_at: Utc.with_ymd_and_hms(2025, 9, 1, 12, 0, 0).unwrap(),
            merged_by: Some("bob".into()),
            merge_commit_sha: Some("abc123".into()),
            additions: 10,
            deletions: 2,
            changed_files_count: 2,
            changed_file_paths: vec!["src/lib.rs".into(), "src/billing.rs".into()],
            is_self_merged: false,
            reviewer_approvals: 1,
            review_count: 1,
            labels: BTreeSet::new(),
            linked_ticket_refs: BTreeSet::new(),
            post_merge_ci_status: CiStatus::Success,
            has_test_files: false,
            has_testing_section: false,
            caveats: vec![],
        }
    }

    /// A scored PR with every category at the composite value.
    pub fn scored(number: u64, composite: f64, issues: Vec<Issue>) -> ScoredPR {
        let mut record = record();
        record.number = number;
        ScoredPR {
            record,
            category_scores: Category::ALL
                .iter()
                .map(|&c| CategoryScore::new(c, composite as u32))
                .collect(),
            composite_score: composite,
            grade: Grade::from_score(composite),
            issues,
            caveats: vec![],
        }
    }
}
