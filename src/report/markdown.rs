use itertools::Itertools;
use markdown_builder::Markdown;
use markdown_table::{Heading, HeadingAlignment, MarkdownTable};

use crate::analyze::AggregateReport;
use crate::model::Grade;
use crate::report::{format_score, ReportError};

pub trait MarkdownReport {
    fn to_markdown(&self) -> Result<String, ReportError>;
}

impl MarkdownReport for AggregateReport {
    fn to_markdown(&self) -> Result<String, ReportError> {
        let mut doc = Markdown::new();

        doc.header1("PR quality report");
        doc.add_summary(self)?;
        if !self.grade_distribution.is_empty() {
            doc.add_grades(self)?;
            doc.add_categories(self)?;
            doc.add_ci_statuses(self)?;
        }
        if !self.issue_frequency.is_empty() || !self.caveat_frequency.is_empty() {
            doc.add_frequencies(self)?;
        }
        if !self.prs.is_empty() {
            doc.add_pull_requests(self)?;
        }

        Ok(doc.render())
    }
}

trait MarkdownExt {
    fn add_summary(&mut self, report: &AggregateReport) -> Result<(), ReportError>;
    fn add_grades(&mut self, report: &AggregateReport) -> Result<(), ReportError>;
    fn add_categories(&mut self, report: &AggregateReport) -> Result<(), ReportError>;
    fn add_ci_statuses(&mut self, report: &AggregateReport) -> Result<(), ReportError>;
    fn add_frequencies(&mut self, report: &AggregateReport) -> Result<(), ReportError>;
    fn add_pull_requests(&mut self, report: &AggregateReport) -> Result<(), ReportError>;
}

impl MarkdownExt for Markdown {
    fn add_summary(&mut self, report: &AggregateReport) -> Result<(), ReportError> {
        self.header2(format!(
            "{} ({}, {} to {})",
            report.author,
            report.window.label,
            report.window.start.format("%d.%m.%Y"),
            report.window.end.format("%d.%m.%Y"),
        ));
        if report.partial {
            self.paragraph("**Partial report:** the run was cancelled before every PR was scored.".to_string());
        }

        let rows = vec![
            vec!["Scope".to_string(), report.scope.to_string()],
            vec!["PRs merged".to_string(), report.total_prs_merged.to_string()],
            vec!["PRs reviewed".to_string(), report.total_prs_reviewed.to_string()],
            vec!["PRs analyzed".to_string(), report.prs_analyzed.to_string()],
            vec![
                "Average quality score".to_string(),
                format!("**{}**", format_score(report.average_quality_score)),
            ],
            vec![
                format!("Below threshold ({})", format_score(report.threshold)),
                report.prs_below_threshold.to_string(),
            ],
            vec![
                "Critical issues".to_string(),
                format!(
                    "{} (in {} PRs)",
                    report.critical_issue_count, report.prs_with_critical_issues
                ),
            ],
            vec![
                "Post-merge CI failures".to_string(),
                report.post_merge_failure_count.to_string(),
            ],
        ];
        self.paragraph(table(&["Metric", "Value"], rows)?);
        Ok(())
    }

    fn add_grades(&mut self, report: &AggregateReport) -> Result<(), ReportError> {
        self.header2("Grade distribution".to_string());
        let rows = report
            .grade_distribution
            .iter()
            .map(|(grade, count)| {
                vec![
                    format!("**{grade}**"),
                    grade.range().to_string(),
                    count.to_string(),
                ]
            })
            .collect::<Vec<_>>();
        self.paragraph(table(&["Grade", "Score", "PRs"], rows)?);
        Ok(())
    }

    fn add_categories(&mut self, report: &AggregateReport) -> Result<(), ReportError> {
        self.header2("Category scores".to_string());
        let rows = report
            .category_averages
            .iter()
            .map(|(category, average)| {
                let grade = report
                    .category_grades
                    .get(category)
                    .map(|grade| format!("**{grade}**"))
                    .unwrap_or_default();
                let counts = report
                    .category_grade_distribution
                    .get(category)
                    .map(|counts| counts.values().map(|count| count.to_string()).collect_vec())
                    .unwrap_or_default();
                [
                    vec![category.name().to_string(), format_score(*average), grade],
                    counts,
                ]
                .concat()
            })
            .collect::<Vec<_>>();
        let grade_names = Grade::ALL.map(|grade| grade.to_string());
        let headings = ["Category", "Average", "Grade"]
            .into_iter()
            .chain(grade_names.iter().map(String::as_str))
            .collect::<Vec<_>>();
        self.paragraph(table(&headings, rows)?);
        Ok(())
    }

    fn add_ci_statuses(&mut self, report: &AggregateReport) -> Result<(), ReportError> {
        self.header2("Post-merge CI status".to_string());
        let rows = report
            .ci_status_counts
            .iter()
            .map(|(status, count)| vec![status.to_string(), count.to_string()])
            .collect::<Vec<_>>();
        self.paragraph(table(&["Status", "PRs"], rows)?);
        Ok(())
    }

    fn add_frequencies(&mut self, report: &AggregateReport) -> Result<(), ReportError> {
        self.header2("Most frequent issues".to_string());
        let rows = report
            .issue_frequency
            .iter()
            .map(|(issue, count)| vec![escape(issue), count.to_string()])
            .chain(
                report
                    .caveat_frequency
                    .iter()
                    .map(|(caveat, count)| vec![format!("*{}*", escape(caveat)), count.to_string()]),
            )
            .collect::<Vec<_>>();
        self.paragraph(table(&["Issue", "PRs"], rows)?);
        Ok(())
    }

    fn add_pull_requests(&mut self, report: &AggregateReport) -> Result<(), ReportError> {
        self.header2("Pull requests".to_string());
        let rows = report
            .prs
            .iter()
            .map(|pr| {
                let link = if pr.record.url.is_empty() {
                    pr.key().to_string()
                } else {
                    format!("[{}]({})", pr.key(), pr.record.url)
                };
                let issues = pr
                    .issues
                    .iter()
                    .map(|issue| escape(&issue.to_string()))
                    .join("<br>");
                vec![
                    link,
                    escape(&pr.record.title),
                    format!("**{}**", format_score(pr.composite_score)),
                    pr.grade.to_string(),
                    issues,
                ]
            })
            .collect::<Vec<_>>();
        self.paragraph(table(&["PR", "Title", "Score", "Grade", "Issues"], rows)?);
        Ok(())
    }
}

fn table(headings: &[&str], rows: Vec<Vec<String>>) -> Result<String, ReportError> {
    let header = headings
        .iter()
        .enumerate()
        .map(|(index, heading)| {
            let alignment = (index > 0).then_some(HeadingAlignment::Center);
            Heading::new(heading.to_string(), alignment)
        })
        .collect::<Vec<_>>();

    let mut md_table = MarkdownTable::new(rows);
    md_table.with_headings(header);
    md_table
        .as_markdown()
        .map_err(|err| ReportError::Table(format!("{err:?}")))
}

fn escape(text: &str) -> String {
    text.replace('|', "\\|")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::fixture;

    #[test]
    fn renders_sections_in_order() {
        let markdown = fixture::report().to_markdown().unwrap();
        let summary = markdown.find("alice (FY26, 01.07.2025 to 30.06.2026)").unwrap();
        let grades = markdown.find("Grade distribution").unwrap();
        let issues = markdown.find("Most frequent issues").unwrap();
        let prs = markdown.find("Pull requests").unwrap();
        assert!(summary < grades && grades < issues && issues < prs);
        assert!(markdown.contains("Self-merged without approval"));
    }

    #[test]
    fn renders_category_grades_and_ci_breakdown() {
        let markdown = fixture::report().to_markdown().unwrap();
        let grades = markdown.find("Grade distribution").unwrap();
        let categories = markdown.find("Category scores").unwrap();
        let ci = markdown.find("Post-merge CI status").unwrap();
        assert!(grades < categories && categories < ci);

        let testing = markdown
            .lines()
            .find(|line| line.starts_with("| testing"))
            .unwrap();
        let cells = testing.split('|').map(str::trim).collect::<Vec<_>>();
        assert_eq!(cells[1..9], ["testing", "67", "**D**", "1", "0", "0", "0", "1"]);
    }

    #[test]
    fn escapes_table_separators() {
        assert_eq!(escape("a | b"), "a \\| b");
    }
}
