use indexmap::IndexMap;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::hash::Hash;

use crate::model::{Category, CiStatus, DateWindow, Grade, RepoScope, ScoredPR};

pub const DEFAULT_THRESHOLD: f64 = 70.0;

/// What the run was asked for, plus the counts that do not come from the
/// scored PRs themselves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopeMetadata {
    pub author: String,
    pub window: DateWindow,
    pub scope: RepoScope,
    pub threshold: f64,
    pub total_prs_merged: u64,
    pub total_prs_reviewed: u64,
    pub partial: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateReport {
    pub author: String,
    pub window: DateWindow,
    pub scope: RepoScope,
    pub threshold: f64,
    pub total_prs_merged: u64,
    pub total_prs_reviewed: u64,
    pub prs_analyzed: usize,
    pub average_quality_score: f64,
    pub prs_below_threshold: usize,
    /// Total CRITICAL issues across all PRs.
    pub critical_issue_count: usize,
    pub prs_with_critical_issues: usize,
    pub post_merge_failure_count: usize,
    pub grade_distribution: IndexMap<Grade, usize>,
    pub category_averages: IndexMap<Category, f64>,
    /// Grade of each category average.
    pub category_grades: IndexMap<Category, Grade>,
    /// Per category, how many PRs scored in each grade band.
    pub category_grade_distribution: IndexMap<Category, IndexMap<Grade, usize>>,
    pub ci_status_counts: IndexMap<CiStatus, usize>,
    /// Most frequent first.
    pub issue_frequency: IndexMap<String, usize>,
    pub caveat_frequency: IndexMap<String, usize>,
    pub partial: bool,
    /// Worst first.
    pub prs: Vec<ScoredPR>,
}

pub struct ReportAggregator;

impl ReportAggregator {
    /// Pure fold: the same set of PRs yields the same report in any input
    /// order.
    pub fn aggregate(metadata: ScopeMetadata, mut prs: Vec<ScoredPR>) -> AggregateReport {
        prs.sort_by_key(ScoredPR::key);
        let analyzed = prs.len();

        // Composite scores carry at most two decimals; sum them as integers.
        let total_hundredths: u64 = prs
            .iter()
            .map(|pr| (pr.composite_score * 100.0).round() as u64)
            .sum();
        let average = if analyzed == 0 {
            0.0
        } else {
            total_hundredths as f64 / 100.0 / analyzed as f64
        };

        let grade_distribution = if analyzed == 0 {
            IndexMap::new()
        } else {
            in_order(&Grade::ALL, &prs.iter().counts_by(|pr| pr.grade))
        };

        let category_averages: IndexMap<Category, f64> = if analyzed == 0 {
            IndexMap::new()
        } else {
            Category::ALL
                .iter()
                .map(|&category| {
                    let total: u64 = prs.iter().map(|pr| u64::from(pr.raw_score(category))).sum();
                    (category, total as f64 / analyzed as f64)
                })
                .collect()
        };

        let category_grades = category_averages
            .iter()
            .map(|(&category, &average)| (category, Grade::from_score(average)))
            .collect();

        let category_grade_distribution = if analyzed == 0 {
            IndexMap::new()
        } else {
            Category::ALL
                .iter()
                .map(|&category| {
                    let counts = prs
                        .iter()
                        .counts_by(|pr| Grade::from_score(f64::from(pr.raw_score(category))));
                    (category, in_order(&Grade::ALL, &counts))
                })
                .collect()
        };

        let ci_status_counts = if analyzed == 0 {
            IndexMap::new()
        } else {
            let counts = prs.iter().counts_by(|pr| pr.record.post_merge_ci_status);
            in_order(&CiStatus::ALL, &counts)
        };

        let issue_frequency = frequency(
            prs.iter()
                .flat_map(|pr| pr.issues.iter().map(|issue| issue.description.clone())),
        );
        let caveat_frequency = frequency(
            prs.iter()
                .flat_map(|pr| pr.caveats.iter().map(|caveat| caveat.summary().to_string())),
        );

        let critical_issue_count = prs
            .iter()
            .flat_map(|pr| &pr.issues)
            .filter(|issue| issue.is_critical())
            .count();
        let prs_with_critical_issues = prs.iter().filter(|pr| pr.has_critical_issue()).count();
        let post_merge_failure_count = prs
            .iter()
            .filter(|pr| pr.record.post_merge_ci_status == CiStatus::Failure)
            .count();
        let prs_below_threshold = prs
            .iter()
            .filter(|pr| pr.composite_score < metadata.threshold)
            .count();

        prs.sort_by(|a, b| {
            a.composite_score
                .partial_cmp(&b.composite_score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.key().cmp(&b.key()))
        });

        AggregateReport {
            author: metadata.author,
            window: metadata.window,
            scope: metadata.scope,
            threshold: metadata.threshold,
            total_prs_merged: metadata.total_prs_merged,
            total_prs_reviewed: metadata.total_prs_reviewed,
            prs_analyzed: analyzed,
            average_quality_score: average,
            prs_below_threshold,
            critical_issue_count,
            prs_with_critical_issues,
            post_merge_failure_count,
            grade_distribution,
            category_averages,
            category_grades,
            category_grade_distribution,
            ci_status_counts,
            issue_frequency,
            caveat_frequency,
            partial: metadata.partial,
            prs,
        }
    }
}

/// Every key of `order`, zero-filled.
fn in_order<K: Copy + Eq + Hash>(order: &[K], counts: &HashMap<K, usize>) -> IndexMap<K, usize> {
    order
        .iter()
        .map(|key| (*key, counts.get(key).copied().unwrap_or(0)))
        .collect()
}

fn frequency(items: impl Iterator<Item = String>) -> IndexMap<String, usize> {
    items
        .counts()
        .into_iter()
        .sorted_by(|(a, a_count), (b, b_count)| b_count.cmp(a_count).then_with(|| a.cmp(b)))
        .collect()
}
