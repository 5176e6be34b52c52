use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{ArgAction, Parser};
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget};
use pr_quality_metrics::analyze::{self, DEFAULT_THRESHOLD};
use pr_quality_metrics::client::{BackoffPolicy, RateLimitedClient};
use pr_quality_metrics::collect::{CancellationFlag, CollectStep};
use pr_quality_metrics::git::repo_from_git;
use pr_quality_metrics::gitea::GiteaApi;
use pr_quality_metrics::model::{
    parse_date, DateWindowResolver, PrKey, RepoId, RepoScope, ScoringConfig,
};
use pr_quality_metrics::pipeline::{write_report, Pipeline, Progress, RunRequest};
use pr_quality_metrics::report::ReportFormat;
use pr_quality_metrics::utils::{MultiProgressNew, ProgressStyleTemplate};
use std::path::PathBuf;
use tracing::warn;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Scores a developer's merged pull requests and reports on their quality.
#[derive(Parser, Debug, Clone)]
#[command(version, about)]
struct Args {
    /// Login of the developer whose merged pull requests are scored
    author: String,
    /// Limit the run to one repository (OWNER/NAME); all visible repositories otherwise
    #[arg(long, conflicts_with = "repo_from_git")]
    repo: Option<RepoId>,
    /// Take OWNER/NAME from the `origin` remote of the clone at PATH
    #[arg(long = "repo-from-git", value_name = "PATH")]
    repo_from_git: Option<PathBuf>,
    /// First day of the window (YYYY-MM-DD); defaults to the fiscal year start
    #[arg(long, value_parser = parse_date)]
    start: Option<NaiveDate>,
    /// Last day of the window (YYYY-MM-DD); defaults to the fiscal year end
    #[arg(long, value_parser = parse_date)]
    end: Option<NaiveDate>,
    /// PRs scoring below this count as below threshold
    #[arg(long, default_value_t = DEFAULT_THRESHOLD)]
    threshold: f64,
    #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
    format: ReportFormat,
    /// Write the report here instead of stdout
    #[arg(long, short)]
    output: Option<PathBuf>,
    /// JSON file overriding scoring knobs
    #[arg(long = "config", value_name = "FILE")]
    config_path: Option<PathBuf>,
    #[arg(long = "gitea-url", env = "GITEA_URL")]
    gitea_url: String,
    #[arg(long = "gitea-token", env = "GITEA_TOKEN", hide_env_values = true)]
    gitea_token: String,
    /// Hide progress bars
    #[arg(long, short)]
    quiet: bool,
    /// -v for info, -vv for debug logs (RUST_LOG wins when set)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);
    run(&args).await
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

async fn run(args: &Args) -> Result<()> {
    let config = match &args.config_path {
        Some(path) => ScoringConfig::from_config(path)?,
        None => ScoringConfig::default(),
    };
    let (engine, heuristics) = analyze::build(&config)?;
    let scope = match (&args.repo, &args.repo_from_git) {
        (Some(repo), _) => RepoScope::Single(repo.clone()),
        (None, Some(path)) => RepoScope::Single(
            repo_from_git(path)
                .with_context(|| format!("cannot detect repository from `{}`", path.display()))?,
        ),
        (None, None) => RepoScope::All,
    };
    let request = RunRequest {
        author: args.author.clone(),
        scope,
        window: DateWindowResolver::resolve_now(args.start, args.end)?,
        threshold: args.threshold,
    };

    let multi_progress = MultiProgress::new();
    if args.quiet {
        multi_progress.set_draw_target(ProgressDrawTarget::hidden());
    }
    let collect_pb = multi_progress.add_spinner(ProgressStyleTemplate::only_message(), "Waiting Gitea");
    let score_pb = multi_progress.add_with_style(
        ProgressBar::no_length(),
        ProgressStyleTemplate::number_bar(),
    );
    score_pb.set_message("Waiting pull requests");
    let backoff_pb = multi_progress.add_spinner(ProgressStyleTemplate::backoff(), "");

    let backoff_progress = backoff_pb.clone();
    let client = RateLimitedClient::new(BackoffPolicy::default()).on_backoff(move |event| {
        backoff_progress.suspend(|| warn!("{event}"));
        backoff_progress.set_message(format!("⏳ {event}"));
    });
    let api = GiteaApi::new(&args.gitea_url, &args.gitea_token);
    let cancel = CancellationFlag::new();
    listen_for_interrupt(cancel.clone());

    let progress = Progress {
        collect: Box::new(|step: CollectStep| match step {
            CollectStep::Page(page) => {
                collect_pb.set_message(format!("Fetch pull requests (#{page} page) ..."))
            }
            CollectStep::Detail { done, total } => collect_pb.set_message(format!(
                "Fetch pull request details ({}/{total}) ...",
                done + 1
            )),
        }),
        score: Box::new(|done: usize, total: usize, key: &PrKey| {
            score_pb.set_length(total as u64);
            score_pb.set_position(done as u64);
            score_pb.set_message(key.to_string());
        }),
    };

    let pipeline = Pipeline::new(&api, &client, &engine, &heuristics, cancel);
    let report = pipeline
        .run(&request, progress)
        .await
        .context("PR quality run failed")?;

    backoff_pb.finish_and_clear();
    collect_pb.finish_with_message(format!(
        "✅ Completed fetch pull requests (find {} merged, {} reviewed)",
        report.total_prs_merged, report.total_prs_reviewed
    ));
    score_pb.finish_with_message(format!("✅ Scored {} pull requests", report.prs_analyzed));
    if report.partial {
        warn!("run was interrupted; the report only covers the pull requests scored so far");
    }

    write_report(&report, args.format, args.output.as_deref())?;
    Ok(())
}

/// First Ctrl-C asks the pipeline to stop and report what it has; a second
/// one exits immediately.
fn listen_for_interrupt(cancel: CancellationFlag) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        warn!("interrupted, finishing with a partial report (Ctrl-C again to abort)");
        cancel.cancel();
        if tokio::signal::ctrl_c().await.is_ok() {
            std::process::exit(130);
        }
    });
}
