//! Scores a developer's merged pull requests against a fixed quality rubric
//! and folds the results into one reproducible report.
//!
//! The stages run in order: [`collect::PrCollector`] pages through the
//! remote listing, [`collect::DiffEvidenceExtractor`] adds changed-file
//! evidence, [`analyze::ScoringEngine`] and [`analyze::SeverityClassifier`]
//! score each PR, and [`analyze::ReportAggregator`] builds the report. Every
//! remote call goes through one shared [`client::RateLimitedClient`].

pub mod analyze;
pub mod client;
pub mod collect;
pub mod error;
pub mod git;
pub mod gitea;
pub mod model;
pub mod pipeline;
pub mod report;
pub mod utils;
