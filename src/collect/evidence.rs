use tracing::{debug, warn};

use crate::analyze::Heuristics;
use crate::client::{RateLimitedClient, Sleeper, TokioSleeper};
use crate::error::FatalError;
use crate::gitea::SourceControlApi;
use crate::model::{Caveat, PullRequestRecord};

/// Fills in the evidence that needs the changed-file list or text
/// heuristics: test files, testing section and ticket references.
pub struct DiffEvidenceExtractor<'a, A, S = TokioSleeper> {
    api: &'a A,
    client: &'a RateLimitedClient<S>,
    heuristics: &'a Heuristics,
}

impl<'a, A: SourceControlApi, S: Sleeper> DiffEvidenceExtractor<'a, A, S> {
    pub fn new(api: &'a A, client: &'a RateLimitedClient<S>, heuristics: &'a Heuristics) -> Self {
        Self {
            api,
            client,
            heuristics,
        }
    }

    /// A diff that cannot be fetched leaves `has_test_files` false and adds
    /// a [`Caveat::DiffUnavailable`]. Authentication failures and a spent retry
    /// budget abort.
    pub async fn enrich(
        &self,
        mut record: PullRequestRecord,
    ) -> Result<PullRequestRecord, FatalError> {
        record.has_testing_section = self.heuristics.has_testing_section(&record.description);
        let refs = self
            .heuristics
            .ticket_refs(&record.title, &record.description);
        record.linked_ticket_refs.extend(refs);

        match self.changed_paths(&record).await {
            Ok(paths) => {
                record.has_test_files = self.heuristics.files.has_test_files(&paths);
                debug!(
                    pr = %record.key(),
                    files = paths.len(),
                    has_test_files = record.has_test_files,
                    "diff evidence"
                );
                record.changed_file_paths = paths;
            }
            Err(err) if !err.is_recoverable() => return Err(err),
            Err(err) => {
                warn!(pr = %record.key(), "changed files unavailable: {err}");
                record.has_test_files = false;
                record.changed_file_paths.clear();
                record.caveats.push(Caveat::DiffUnavailable(err.to_string()));
            }
        }
        Ok(record)
    }

    async fn changed_paths(&self, record: &PullRequestRecord) -> Result<Vec<String>, FatalError> {
        let mut paths = vec![];
        let mut page = 1;
        loop {
            let label = format!("changed files {} page {page}", record.key());
            let result = self
                .client
                .call(&label, || {
                    self.api
                        .get_pull_request_diff(&record.repo, record.number, page)
                })
                .await?;
            paths.extend(result.items);
            if !result.has_next {
                return Ok(paths);
            }
            page += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyze::test_support::record;
    use crate::client::{BackoffPolicy, RecordingSleeper};
    use crate::error::ApiError;
    use crate::gitea::InMemoryApi;
    use crate::model::ScoringConfig;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    fn client() -> RateLimitedClient<RecordingSleeper> {
        RateLimitedClient::with_sleeper(BackoffPolicy::default(), RecordingSleeper::default())
    }

    fn heuristics() -> Heuristics {
        Heuristics::from_config(&ScoringConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn collects_paths_across_pages_and_detects_tests() {
        let mut seeded = record();
        seeded.changed_file_paths = vec![
            "src/lib.rs".into(),
            "src/invoice.rs".into(),
            "README.md".into(),
            "tests/invoice.rs".into(),
            "Cargo.toml".into(),
        ];
        let api = InMemoryApi::new().with_pull(seeded.clone());
        let (client, heuristics) = (client(), heuristics());
        let extractor = DiffEvidenceExtractor::new(&api, &client, &heuristics);

        let mut input = seeded.clone();
        input.changed_file_paths.clear();
        let enriched = extractor.enrich(input).await.unwrap();

        assert_eq!(enriched.changed_file_paths, seeded.changed_file_paths);
        assert!(enriched.has_test_files);
        assert!(enriched.caveats.is_empty());
        assert_eq!(api.calls("get_pull_request_diff"), 3);
    }

    #[tokio::test]
    async fn reads_testing_section_and_tickets_from_text() {
        let mut seeded = record();
        seeded.title = "BILL-12 retry invoices".into();
        seeded.description = indoc! {"
            ## Summary
            Retries invoice delivery.

            ## Testing
            Ran the billing suite against staging.
        "}
        .into();
        let api = InMemoryApi::new().with_pull(seeded.clone());
        let (client, heuristics) = (client(), heuristics());
        let extractor = DiffEvidenceExtractor::new(&api, &client, &heuristics);

        let enriched = extractor.enrich(seeded).await.unwrap();
        assert!(enriched.has_testing_section);
        assert!(!enriched.has_test_files);
        assert!(enriched.linked_ticket_refs.contains("BILL-12"));
    }

    #[tokio::test]
    async fn diff_failure_becomes_caveat() {
        let seeded = record();
        let api = InMemoryApi::new()
            .with_pull(seeded.clone())
            .failing_diff(seeded.key(), ApiError::Request("HTTP 422: too large".into()));
        let (client, heuristics) = (client(), heuristics());
        let extractor = DiffEvidenceExtractor::new(&api, &client, &heuristics);

        let enriched = extractor.enrich(seeded).await.unwrap();
        assert!(!enriched.has_test_files);
        assert!(enriched.changed_file_paths.is_empty());
        assert!(enriched.diff_unavailable());
    }

    #[tokio::test]
    async fn diff_auth_failure_aborts() {
        let seeded = record();
        let api = InMemoryApi::new()
            .with_pull(seeded.clone())
            .failing_diff(seeded.key(), ApiError::Auth("HTTP 403: forbidden".into()));
        let (client, heuristics) = (client(), heuristics());
        let extractor = DiffEvidenceExtractor::new(&api, &client, &heuristics);

        assert!(extractor.enrich(seeded).await.unwrap_err().is_auth());
    }

    #[tokio::test]
    async fn exhausted_diff_budget_aborts() {
        let seeded = record();
        let api = InMemoryApi::new()
            .with_pull(seeded.clone())
            .failing_diff(seeded.key(), ApiError::RateLimited("HTTP 429".into()));
        let (client, heuristics) = (client(), heuristics());
        let extractor = DiffEvidenceExtractor::new(&api, &client, &heuristics);

        let err = extractor.enrich(seeded).await.unwrap_err();
        assert!(matches!(err, FatalError::Exhausted { attempts: 20, .. }));
        assert_eq!(api.calls("get_pull_request_diff"), 20);
        assert_eq!(client.sleeper().slept().len(), 19);
    }
}
