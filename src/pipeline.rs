//! The batch run: collect, enrich, score, aggregate.

use std::fs;
use std::io::Write;
use std::path::Path;
use thiserror::Error;
use tracing::info;

use crate::analyze::{AggregateReport, Heuristics, ReportAggregator, ScopeMetadata, ScoringEngine};
use crate::client::{RateLimitedClient, Sleeper};
use crate::collect::{
    CancellationFlag, CollectProgress, CollectStep, DiffEvidenceExtractor, PrCollector,
};
use crate::error::FatalError;
use crate::gitea::SourceControlApi;
use crate::git::OriginError;
use crate::model::{ConfigError, DateWindow, PrKey, RepoScope};
use crate::report::{render, ReportError, ReportFormat};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Api(#[from] FatalError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Origin(#[from] OriginError),

    #[error(transparent)]
    Report(#[from] ReportError),

    #[error("failed to write report to `{}`: {source}", .path.display())]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunRequest {
    pub author: String,
    pub scope: RepoScope,
    pub window: DateWindow,
    pub threshold: f64,
}

pub type ScoreProgress<'a> = Box<dyn FnMut(usize, usize, &PrKey) + 'a>;

/// Stage callbacks; both default to doing nothing.
pub struct Progress<'a> {
    pub collect: CollectProgress<'a>,
    pub score: ScoreProgress<'a>,
}

impl Default for Progress<'_> {
    fn default() -> Self {
        Self {
            collect: Box::new(|_: CollectStep| {}),
            score: Box::new(|_: usize, _: usize, _: &PrKey| {}),
        }
    }
}

pub struct Pipeline<'a, A, S> {
    api: &'a A,
    client: &'a RateLimitedClient<S>,
    engine: &'a ScoringEngine,
    heuristics: &'a Heuristics,
    cancel: CancellationFlag,
}

impl<'a, A: SourceControlApi, S: Sleeper> Pipeline<'a, A, S> {
    pub fn new(
        api: &'a A,
        client: &'a RateLimitedClient<S>,
        engine: &'a ScoringEngine,
        heuristics: &'a Heuristics,
        cancel: CancellationFlag,
    ) -> Self {
        Self {
            api,
            client,
            engine,
            heuristics,
            cancel,
        }
    }

    /// Runs every stage. Cancellation yields a report with `partial` set
    /// over the PRs scored so far; any [`FatalError`] aborts with no report.
    pub async fn run(
        &self,
        request: &RunRequest,
        progress: Progress<'_>,
    ) -> Result<AggregateReport, PipelineError> {
        let Progress {
            collect: collect_progress,
            score: mut score_progress,
        } = progress;
        let collector = PrCollector::new(self.api, self.client, self.cancel.clone());
        let extractor = DiffEvidenceExtractor::new(self.api, self.client, self.heuristics);

        info!(
            author = %request.author,
            scope = %request.scope,
            window = %request.window,
            "starting PR quality run"
        );
        collector.log_rate_limit().await;

        // Both share the client, so they still take turns on the remote.
        let (collected, reviewed) = futures::join!(
            collector.collect(&request.author, &request.scope, &request.window, collect_progress),
            collector.count_reviewed(&request.author, &request.scope, &request.window),
        );
        let collected = collected?;
        let reviewed = reviewed?;
        let total_merged = collected.records.len() as u64;

        let total = collected.records.len();
        let mut scored = Vec::with_capacity(total);
        for (done, record) in collected.records.into_iter().enumerate() {
            if self.cancel.is_cancelled() {
                break;
            }
            score_progress(done, total, &record.key());
            let enriched = extractor.enrich(record).await?;
            scored.push(self.engine.score(enriched));
        }

        let partial = collected.cancelled || self.cancel.is_cancelled();
        let stats = self.client.stats();
        info!(
            scored = scored.len(),
            partial,
            requests = stats.requests,
            retries = stats.retries,
            waited_secs = stats.waited.as_secs(),
            "finished PR quality run"
        );

        Ok(ReportAggregator::aggregate(
            ScopeMetadata {
                author: request.author.clone(),
                window: request.window.clone(),
                scope: request.scope.clone(),
                threshold: request.threshold,
                total_prs_merged: total_merged,
                total_prs_reviewed: reviewed,
                partial,
            },
            scored,
        ))
    }
}

/// Renders `report` and writes it to `output`, or to stdout when no path is
/// given.
pub fn write_report(
    report: &AggregateReport,
    format: ReportFormat,
    output: Option<&Path>,
) -> Result<(), PipelineError> {
    let rendered = render(report, format)?;
    match output {
        Some(path) => fs::write(path, rendered).map_err(|source| PipelineError::Io {
            path: path.to_path_buf(),
            source,
        }),
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout
                .write_all(rendered.as_bytes())
                .and_then(|_| stdout.write_all(b"\n"))
                .map_err(|source| PipelineError::Io {
                    path: "<stdout>".into(),
                    source,
                })
        }
    }
}
