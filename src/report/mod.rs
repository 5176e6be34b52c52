pub mod json;
pub mod markdown;
pub mod text;

pub use json::JsonReport;
pub use markdown::MarkdownReport;
pub use text::TextReport;

use clap::ValueEnum;
use thiserror::Error;

use crate::analyze::AggregateReport;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to build markdown table: {0}")]
    Table(String),
}

#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, ValueEnum)]
pub enum ReportFormat {
    Json,
    #[default]
    Text,
    Markdown,
}

/// Every renderer reads the finished report and computes nothing new.
pub fn render(report: &AggregateReport, format: ReportFormat) -> Result<String, ReportError> {
    match format {
        ReportFormat::Json => report.to_json(),
        ReportFormat::Text => Ok(report.to_text()),
        ReportFormat::Markdown => report.to_markdown(),
    }
}

/// `1.5` stays `1.5`, `80.0` becomes `80`.
pub(crate) fn format_score(score: f64) -> String {
    let rounded = (score * 100.0).round() / 100.0;
    if rounded.fract() == 0.0 {
        format!("{rounded:.0}")
    } else {
        format!("{rounded:.2}")
            .trim_end_matches('0')
            .to_string()
    }
}

#[cfg(test)]
pub(crate) mod fixture {
    use chrono::NaiveDate;

    use crate::analyze::test_support::scored;
    use crate::analyze::{AggregateReport, ReportAggregator, ScopeMetadata, DEFAULT_THRESHOLD};
    use crate::model::{Caveat, Category, DateWindowResolver, Issue, RepoScope, Severity};

    pub fn report() -> AggregateReport {
        let mut weak = scored(
            2,
            42.5,
            vec![Issue::new(Severity::Critical, Category::Review, "Self-merged without approval")],
        );
        weak.caveats = vec![Caveat::DiffUnavailable("HTTP 502".into())];
        let strong = scored(
            1,
            92.0,
            vec![Issue::new(Severity::Minor, Category::Traceability, "No labels")],
        );
        ReportAggregator::aggregate(
            ScopeMetadata {
                author: "alice".into(),
                window: DateWindowResolver::fiscal_year(
                    NaiveDate::from_ymd_opt(2025, 10, 16).unwrap_or_default(),
                ),
                scope: RepoScope::All,
                threshold: DEFAULT_THRESHOLD,
                total_prs_merged: 2,
                total_prs_reviewed: 5,
                partial: false,
            },
            vec![strong, weak],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn scores_drop_trailing_zeros() {
        assert_eq!(format_score(80.0), "80");
        assert_eq!(format_score(80.5), "80.5");
        assert_eq!(format_score(67.25), "67.25");
        assert_eq!(format_score(100.0 / 3.0), "33.33");
    }

    #[test]
    fn all_formats_render() {
        let report = fixture::report();
        for format in [ReportFormat::Json, ReportFormat::Text, ReportFormat::Markdown] {
            let rendered = render(&report, format).unwrap();
            assert!(rendered.contains("alice"), "{format:?} lacks the author");
        }
    }
}
