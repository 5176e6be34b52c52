use regex::Regex;
use std::sync::OnceLock;

use crate::analyze::SeverityClassifier;
use crate::model::{
    composite_score, Category, CategoryScore, Grade, PullRequestRecord, ScoredPR, ScoringConfig,
    SizeBreakpoint,
};

/// Turns an enriched record into its immutable [`ScoredPR`]. Scoring is a
/// pure function of the record and the config.
#[derive(Debug, Clone)]
pub struct ScoringEngine {
    config: ScoringConfig,
    severity: SeverityClassifier,
}

impl ScoringEngine {
    pub fn new(config: ScoringConfig, severity: SeverityClassifier) -> Self {
        Self { config, severity }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    pub fn score(&self, record: PullRequestRecord) -> ScoredPR {
        let category_scores = Category::ALL
            .iter()
            .map(|&category| CategoryScore::new(category, self.raw_score(category, &record)))
            .collect::<Vec<_>>();
        let composite = composite_score(&category_scores);
        let issues = self.severity.classify(&record);
        let caveats = record.caveats.clone();

        ScoredPR {
            record,
            category_scores,
            composite_score: composite,
            grade: Grade::from_score(composite),
            issues,
            caveats,
        }
    }

    fn raw_score(&self, category: Category, record: &PullRequestRecord) -> u32 {
        match category {
            Category::Description => description_score(&record.description),
            Category::Testing => testing_score(record),
            Category::Size => size_score(
                &self.config.size_breakpoints,
                self.config.size_floor,
                record,
            ),
            Category::Review => review_score(record, self.config.min_reviewers),
            Category::Traceability => traceability_score(record),
        }
    }
}

pub fn description_score(description: &str) -> u32 {
    let trimmed = description.trim();
    if trimmed.is_empty() {
        return 0;
    }
    let base = match trimmed.chars().count() {
        0..=49 => 30,
        50..=99 => 60,
        100..=199 => 80,
        _ => 100,
    };
    if is_structured(trimmed) {
        (base + 10).min(100)
    } else {
        base
    }
}

/// Headings, bullets or numbered lists.
pub fn is_structured(text: &str) -> bool {
    static STRUCTURE: OnceLock<Regex> = OnceLock::new();
    STRUCTURE
        .get_or_init(|| {
            Regex::new(r"(?m)^\s{0,3}(#{1,6}\s+\S|[-*+]\s+\S|[0-9]+[.)]\s+\S)")
                .expect("valid structure regex")
        })
        .is_match(text)
}

pub fn testing_score(record: &PullRequestRecord) -> u32 {
    if record.has_test_files {
        100
    } else if record.has_testing_section {
        60
    } else {
        0
    }
}

/// Files changed, preferring the API's count and falling back to the
/// fetched path list.
pub fn changed_files(record: &PullRequestRecord) -> u64 {
    record
        .changed_files_count
        .max(record.changed_file_paths.len() as u64)
}

/// Index of the first tier the PR fits into, `None` beyond the last one.
pub fn size_tier(breakpoints: &[SizeBreakpoint], record: &PullRequestRecord) -> Option<usize> {
    let (lines, files) = (record.changed_lines(), changed_files(record));
    breakpoints
        .iter()
        .position(|bp| lines <= bp.max_lines && files <= bp.max_files)
}

pub fn size_score(breakpoints: &[SizeBreakpoint], floor: u32, record: &PullRequestRecord) -> u32 {
    size_tier(breakpoints, record)
        .map(|tier| breakpoints[tier].score)
        .unwrap_or(floor)
}

pub fn review_score(record: &PullRequestRecord, min_reviewers: u32) -> u32 {
    let approvals = record.reviewer_approvals;
    if record.is_self_merged && approvals == 0 {
        0
    } else if approvals >= min_reviewers.max(1) {
        100
    } else if approvals > 0 {
        80
    } else if record.review_count > 0 {
        60
    } else {
        30
    }
}

pub fn traceability_score(record: &PullRequestRecord) -> u32 {
    match (
        !record.linked_ticket_refs.is_empty(),
        !record.labels.is_empty(),
    ) {
        (true, true) => 100,
        (true, false) => 85,
        (false, true) => 50,
        (false, false) => 25,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyze::test_support::record;
    use crate::analyze::Heuristics;
    use crate::model::{Severity, DEFAULT_SIZE_BREAKPOINTS, DEFAULT_SIZE_FLOOR};
    use pretty_assertions::assert_eq;

    fn engine() -> ScoringEngine {
        let config = ScoringConfig::default();
        let heuristics = Heuristics::from_config(&config).unwrap();
        ScoringEngine::new(config.clone(), SeverityClassifier::new(config, heuristics.files))
    }

    #[test]
    fn description_length_bands() {
        assert_eq!(description_score(""), 0);
        assert_eq!(description_score("   \n\t "), 0);
        assert_eq!(description_score(&"a".repeat(49)), 30);
        assert_eq!(description_score(&"a".repeat(50)), 60);
        assert_eq!(description_score(&"a".repeat(199)), 80);
        assert_eq!(description_score(&"a".repeat(200)), 100);
    }

    #[test]
    fn structure_adds_ten_capped_at_one_hundred() {
        assert_eq!(description_score("## Summary\nFix"), 40);
        assert_eq!(description_score(&format!("- {}", "a".repeat(300))), 100);
        assert_eq!(description_score("#hashtag without space"), 30);
    }

    #[test]
    fn size_tiers_use_lines_and_files() {
        let mut pr = record();
        pr.additions = 40;
        pr.deletions = 10;
        pr.changed_files_count = 3;
        assert_eq!(size_score(&DEFAULT_SIZE_BREAKPOINTS, DEFAULT_SIZE_FLOOR, &pr), 100);

        pr.changed_files_count = 4;
        assert_eq!(size_score(&DEFAULT_SIZE_BREAKPOINTS, DEFAULT_SIZE_FLOOR, &pr), 90);

        pr.additions = 480;
        assert_eq!(size_score(&DEFAULT_SIZE_BREAKPOINTS, DEFAULT_SIZE_FLOOR, &pr), 70);

        pr.additions = 1_000;
        assert_eq!(size_score(&DEFAULT_SIZE_BREAKPOINTS, DEFAULT_SIZE_FLOOR, &pr), 40);
        assert_eq!(size_tier(&DEFAULT_SIZE_BREAKPOINTS, &pr), None);
    }

    #[test]
    fn review_ladder() {
        let mut pr = record();
        pr.is_self_merged = true;
        pr.reviewer_approvals = 0;
        assert_eq!(review_score(&pr, 1), 0);

        pr.reviewer_approvals = 1;
        assert_eq!(review_score(&pr, 1), 100);
        assert_eq!(review_score(&pr, 2), 80);

        pr.is_self_merged = false;
        pr.reviewer_approvals = 0;
        pr.review_count = 2;
        assert_eq!(review_score(&pr, 1), 60);

        pr.review_count = 0;
        assert_eq!(review_score(&pr, 1), 30);
    }

    #[test]
    fn traceability_combinations() {
        let mut pr = record();
        assert_eq!(traceability_score(&pr), 25);
        pr.labels.insert("bug".into());
        assert_eq!(traceability_score(&pr), 50);
        pr.linked_ticket_refs.insert("BILL-1".into());
        assert_eq!(traceability_score(&pr), 100);
        pr.labels.clear();
        assert_eq!(traceability_score(&pr), 85);
    }

    #[test]
    fn empty_description_scores_zero_with_critical_issue() {
        let mut pr = record();
        pr.description = "  ".into();
        let scored = engine().score(pr);
        assert_eq!(scored.raw_score(Category::Description), 0);
        assert!(scored
            .issues
            .iter()
            .any(|i| i.severity == Severity::Critical && i.category == Category::Description));
    }

    #[test]
    fn self_merge_without_approval_scores_zero_with_critical_issue() {
        let mut pr = record();
        pr.is_self_merged = true;
        pr.reviewer_approvals = 0;
        let scored = engine().score(pr);
        assert_eq!(scored.raw_score(Category::Review), 0);
        assert!(scored
            .issues
            .iter()
            .any(|i| i.severity == Severity::Critical && i.category == Category::Review));
    }

    #[test]
    fn scoring_is_deterministic() {
        let engine = engine();
        assert_eq!(engine.score(record()), engine.score(record()));
    }

    #[test]
    fn composite_matches_weighted_sum() {
        let scored = engine().score(record());
        let expected: u32 = scored
            .category_scores
            .iter()
            .map(|s| s.raw_score * s.weight)
            .sum();
        assert_eq!(scored.composite_score, f64::from(expected) / 100.0);
        assert_eq!(scored.grade, Grade::from_score(scored.composite_score));
    }
}
