use crate::analyze::scoring::{changed_files, size_tier};
use crate::analyze::FileClassifier;
use crate::model::{Category, CiStatus, Issue, PullRequestRecord, ScoringConfig, Severity};

pub const EMPTY_DESCRIPTION: &str = "Empty PR description";
pub const NO_TEST_EVIDENCE: &str = "Source changes without test evidence";
pub const SELF_MERGED_UNAPPROVED: &str = "Self-merged without approval";
pub const POST_MERGE_CI_FAILURE: &str = "Post-merge CI failure";
pub const PARTIAL_TESTING: &str = "Testing described but no test files changed";
pub const OVERSIZED: &str = "Oversized PR";
pub const MERGED_UNAPPROVED: &str = "Merged without approval";
pub const MISSING_TICKET: &str = "No linked ticket reference";
pub const MISSING_LABELS: &str = "No labels";
pub const BRIEF_DESCRIPTION: &str = "Brief PR description";
pub const LARGE_PR: &str = "Large PR";

/// Derives issues from raw record fields. Every condition is checked on its
/// own; one record can raise several issues in the same category.
#[derive(Debug, Clone)]
pub struct SeverityClassifier {
    config: ScoringConfig,
    files: FileClassifier,
}

impl SeverityClassifier {
    pub fn new(config: ScoringConfig, files: FileClassifier) -> Self {
        Self { config, files }
    }

    pub fn classify(&self, record: &PullRequestRecord) -> Vec<Issue> {
        let mut issues = vec![];
        let description_len = record.description.trim().chars().count();
        let diff_known = !record.diff_unavailable();
        let tier = size_tier(&self.config.size_breakpoints, record);
        let size_detail = format!(
            "{} changed lines, {} files",
            record.changed_lines(),
            changed_files(record)
        );

        // CRITICAL
        if description_len == 0 {
            issues.push(Issue::new(Severity::Critical, Category::Description, EMPTY_DESCRIPTION));
        }
        if diff_known
            && !record.has_test_files
            && !record.has_testing_section
            && self.files.touches_source(&record.changed_file_paths)
        {
            issues.push(Issue::new(Severity::Critical, Category::Testing, NO_TEST_EVIDENCE));
        }
        if record.is_self_merged && record.reviewer_approvals == 0 {
            issues.push(Issue::new(Severity::Critical, Category::Review, SELF_MERGED_UNAPPROVED));
        }
        if record.post_merge_ci_status == CiStatus::Failure {
            let issue = Issue::new(Severity::Critical, Category::Testing, POST_MERGE_CI_FAILURE);
            issues.push(match &record.merge_commit_sha {
                Some(sha) => issue.with_detail(format!("merge commit {sha}")),
                None => issue,
            });
        }

        // MODERATE
        if diff_known && !record.has_test_files && record.has_testing_section {
            issues.push(Issue::new(Severity::Moderate, Category::Testing, PARTIAL_TESTING));
        }
        if tier.is_none() {
            issues.push(
                Issue::new(Severity::Moderate, Category::Size, OVERSIZED).with_detail(&size_detail),
            );
        }
        if !record.is_self_merged && record.reviewer_approvals == 0 {
            let issue = Issue::new(Severity::Moderate, Category::Review, MERGED_UNAPPROVED);
            issues.push(match &record.merged_by {
                Some(merger) => issue.with_detail(format!("merged by {merger}")),
                None => issue,
            });
        }

        // MINOR
        if record.linked_ticket_refs.is_empty() {
            issues.push(Issue::new(Severity::Minor, Category::Traceability, MISSING_TICKET));
        }
        if record.labels.is_empty() {
            issues.push(Issue::new(Severity::Minor, Category::Traceability, MISSING_LABELS));
        }
        if description_len > 0 && description_len < self.config.brief_description_chars {
            issues.push(
                Issue::new(Severity::Minor, Category::Description, BRIEF_DESCRIPTION)
                    .with_detail(format!("{description_len} characters")),
            );
        }
        let last_tier = self.config.size_breakpoints.len().checked_sub(1);
        if tier.is_some() && tier == last_tier && last_tier > Some(0) {
            issues.push(Issue::new(Severity::Minor, Category::Size, LARGE_PR).with_detail(size_detail));
        }

        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyze::test_support::record;
    use crate::analyze::Heuristics;
    use crate::model::Caveat;
    use pretty_assertions::assert_eq;

    fn classifier() -> SeverityClassifier {
        let config = ScoringConfig::default();
        let files = Heuristics::from_config(&config).unwrap().files;
        SeverityClassifier::new(config, files)
    }

    fn descriptions(issues: &[Issue]) -> Vec<&str> {
        issues.iter().map(|i| i.description.as_str()).collect()
    }

    #[test]
    fn clean_pr_only_misses_traceability() {
        let mut pr = record();
        pr.has_test_files = true;
        let issues = classifier().classify(&pr);
        assert_eq!(descriptions(&issues), vec![MISSING_TICKET, MISSING_LABELS]);
        assert!(issues.iter().all(|i| i.severity == Severity::Minor));
    }

    #[test]
    fn fully_traceable_tested_pr_has_no_issues() {
        let mut pr = record();
        pr.has_test_files = true;
        pr.labels.insert("feature".into());
        pr.linked_ticket_refs.insert("BILL-1".into());
        assert!(classifier().classify(&pr).is_empty());
    }

    #[test]
    fn conditions_are_evaluated_independently() {
        let mut pr = record();
        pr.description = String::new();
        pr.is_self_merged = true;
        pr.reviewer_approvals = 0;
        pr.post_merge_ci_status = CiStatus::Failure;
        pr.merge_commit_sha = Some("abc123".into());

        let issues = classifier().classify(&pr);
        let critical = issues
            .iter()
            .filter(|i| i.is_critical())
            .map(|i| i.description.as_str())
            .collect::<Vec<_>>();
        assert_eq!(
            critical,
            vec![EMPTY_DESCRIPTION, NO_TEST_EVIDENCE, SELF_MERGED_UNAPPROVED, POST_MERGE_CI_FAILURE]
        );
        assert!(!descriptions(&issues).contains(&BRIEF_DESCRIPTION));
    }

    #[test]
    fn docs_only_change_is_not_flagged_for_tests() {
        let mut pr = record();
        pr.changed_file_paths = vec!["README.md".into(), "docs/setup.md".into()];
        assert!(!descriptions(&classifier().classify(&pr)).contains(&NO_TEST_EVIDENCE));
    }

    #[test]
    fn unavailable_diff_suppresses_test_findings() {
        let mut pr = record();
        pr.changed_file_paths.clear();
        pr.has_testing_section = true;
        pr.caveats.push(Caveat::DiffUnavailable("HTTP 500".into()));
        let issues = classifier().classify(&pr);
        assert!(!descriptions(&issues).contains(&NO_TEST_EVIDENCE));
        assert!(!descriptions(&issues).contains(&PARTIAL_TESTING));
    }

    #[test]
    fn testing_section_without_files_is_moderate() {
        let mut pr = record();
        pr.has_testing_section = true;
        let issues = classifier().classify(&pr);
        let partial = issues.iter().find(|i| i.description == PARTIAL_TESTING).unwrap();
        assert_eq!(partial.severity, Severity::Moderate);
        assert!(!descriptions(&issues).contains(&NO_TEST_EVIDENCE));
    }

    #[test]
    fn size_findings_by_tier() {
        let mut pr = record();
        pr.additions = 450;
        let issues = classifier().classify(&pr);
        assert!(descriptions(&issues).contains(&LARGE_PR));
        assert!(!descriptions(&issues).contains(&OVERSIZED));

        pr.additions = 2_000;
        let issues = classifier().classify(&pr);
        let oversized = issues.iter().find(|i| i.description == OVERSIZED).unwrap();
        assert_eq!(oversized.severity, Severity::Moderate);
        assert_eq!(oversized.detail.as_deref(), Some("2002 changed lines, 2 files"));
        assert!(!descriptions(&issues).contains(&LARGE_PR));
    }

    #[test]
    fn merge_by_other_without_approval_is_moderate() {
        let mut pr = record();
        pr.reviewer_approvals = 0;
        let issues = classifier().classify(&pr);
        let issue = issues.iter().find(|i| i.description == MERGED_UNAPPROVED).unwrap();
        assert_eq!(issue.severity, Severity::Moderate);
        assert_eq!(issue.detail.as_deref(), Some("merged by bob"));
    }

    #[test]
    fn short_description_is_minor() {
        let mut pr = record();
        pr.description = "Fix retry".into();
        let issue = classifier()
            .classify(&pr)
            .into_iter()
            .find(|i| i.description == BRIEF_DESCRIPTION)
            .unwrap();
        assert_eq!(issue.severity, Severity::Minor);
        assert_eq!(issue.detail.as_deref(), Some("9 characters"));
    }
}
