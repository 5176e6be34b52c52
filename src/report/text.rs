use itertools::Itertools;
use std::fmt::Write;

use crate::analyze::AggregateReport;
use crate::report::format_score;

const BAR_WIDTH: usize = 30;

pub trait TextReport {
    fn to_text(&self) -> String;
}

impl TextReport for AggregateReport {
    fn to_text(&self) -> String {
        let mut out = String::new();
        // Writing into a String never fails.
        let _ = write_report(&mut out, self);
        out
    }
}

fn write_report(out: &mut String, report: &AggregateReport) -> std::fmt::Result {
    writeln!(out, "PR quality report for {}", report.author)?;
    writeln!(out, "Window: {} ({})", report.window, report.window.label)?;
    writeln!(out, "Scope:  {}", report.scope)?;
    if report.partial {
        writeln!(out, "PARTIAL: the run was cancelled before every PR was scored")?;
    }
    writeln!(out)?;

    writeln!(out, "PRs merged:            {}", report.total_prs_merged)?;
    writeln!(out, "PRs reviewed:          {}", report.total_prs_reviewed)?;
    writeln!(out, "PRs analyzed:          {}", report.prs_analyzed)?;
    writeln!(
        out,
        "Average quality score: {}",
        format_score(report.average_quality_score)
    )?;
    writeln!(
        out,
        "Below threshold ({}):  {}",
        format_score(report.threshold),
        report.prs_below_threshold
    )?;
    writeln!(
        out,
        "Critical issues:       {} (in {} PRs)",
        report.critical_issue_count, report.prs_with_critical_issues
    )?;
    writeln!(out, "Post-merge CI failures: {}", report.post_merge_failure_count)?;

    if !report.grade_distribution.is_empty() {
        writeln!(out)?;
        writeln!(out, "Grades")?;
        let analyzed = report.prs_analyzed.max(1) as f64;
        for (grade, count) in &report.grade_distribution {
            writeln!(
                out,
                "  {grade} {:>7} {} {count}",
                grade.range(),
                bar(*count as f64 / analyzed)
            )?;
        }
    }

    if !report.category_averages.is_empty() {
        writeln!(out)?;
        writeln!(out, "Category averages")?;
        for (category, average) in &report.category_averages {
            let grade = report
                .category_grades
                .get(category)
                .map(|grade| grade.to_string())
                .unwrap_or_default();
            let spread = report
                .category_grade_distribution
                .get(category)
                .map(|counts| {
                    counts
                        .iter()
                        .map(|(grade, count)| format!("{grade}:{count}"))
                        .join(" ")
                })
                .unwrap_or_default();
            writeln!(
                out,
                "  {:<13} {} {:>6} {grade}  {spread}",
                category.name(),
                bar(average / 100.0),
                format_score(*average)
            )?;
        }
    }

    if !report.ci_status_counts.is_empty() {
        writeln!(out)?;
        writeln!(out, "Post-merge CI status")?;
        for (status, count) in &report.ci_status_counts {
            writeln!(out, "  {status:<8} {count}")?;
        }
    }

    if !report.issue_frequency.is_empty() {
        writeln!(out)?;
        writeln!(out, "Most frequent issues")?;
        for (issue, count) in &report.issue_frequency {
            writeln!(out, "  {count:>4}  {issue}")?;
        }
    }

    if !report.caveat_frequency.is_empty() {
        writeln!(out)?;
        writeln!(out, "Caveats")?;
        for (caveat, count) in &report.caveat_frequency {
            writeln!(out, "  {count:>4}  {caveat}")?;
        }
    }

    if !report.prs.is_empty() {
        writeln!(out)?;
        writeln!(out, "Pull requests (worst first)")?;
        for pr in &report.prs {
            writeln!(
                out,
                "  {:>6} {} {}  {}",
                format_score(pr.composite_score),
                pr.grade,
                pr.key(),
                pr.record.title
            )?;
            for issue in &pr.issues {
                writeln!(out, "           - {issue}")?;
            }
        }
    }
    Ok(())
}

/// Proportional bar for a ratio in `0.0..=1.0`.
fn bar(ratio: f64) -> String {
    let filled = (ratio.clamp(0.0, 1.0) * BAR_WIDTH as f64).round() as usize;
    format!("{}{}", "█".repeat(filled), "░".repeat(BAR_WIDTH - filled))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::fixture;
    use pretty_assertions::assert_eq;

    #[test]
    fn bars_are_proportional() {
        assert_eq!(bar(0.0), "░".repeat(BAR_WIDTH));
        assert_eq!(bar(1.0), "█".repeat(BAR_WIDTH));
        assert_eq!(bar(0.5).chars().filter(|c| *c == '█').count(), BAR_WIDTH / 2);
        assert_eq!(bar(3.0), "█".repeat(BAR_WIDTH));
    }

    #[test]
    fn renders_summary_and_worst_pr_first() {
        let text = fixture::report().to_text();
        assert!(text.starts_with("PR quality report for alice\n"));
        assert!(text.contains("Average quality score: 67.25"));
        assert!(text.contains("Critical issues:       1 (in 1 PRs)"));

        let weak = text.find("platform/billing#2").unwrap();
        let strong = text.find("platform/billing#1").unwrap();
        assert!(weak < strong);
        assert!(!text.contains("PARTIAL"));
    }

    #[test]
    fn renders_category_grades_and_ci_breakdown() {
        let text = fixture::report().to_text();
        let testing = text
            .lines()
            .find(|line| line.trim_start().starts_with("testing"))
            .unwrap();
        assert!(testing.contains("67 D"), "{testing}");
        assert!(testing.ends_with("A:1 B:0 C:0 D:0 F:1"), "{testing}");

        let ci = text.find("Post-merge CI status").unwrap();
        assert!(text[ci..].contains("success  2"));
        assert!(text[ci..].contains("unknown  0"));
    }
}
