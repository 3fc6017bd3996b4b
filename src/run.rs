// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

/// One collection run: configuration, fetch, aggregation and export.
///
/// A manifest failure aborts the run because no instrumentation metrics can
/// be produced. A repository failure only drops that repository's
/// observations unless [`Config::fail_on_repository_error`] is set. A
/// benchmark failure only drops that test type.
use tracing::{error, info};

use crate::{
    benchmark::{BenchmarkCollection, BenchmarkFailure, collect_benchmarks},
    collector::{Collection, RepositoryFailure, collect_repositories},
    config::{Config, Settings},
    error::Error,
    export::MetricSink,
    fetch::GitHubSource,
    manifest::{InstrumentationSummary, analyze_manifest},
    observation::MetricObservation,
};

/// What a completed run produced.
#[derive(Debug,)]
pub struct RunReport
{
    /// Manifest counts.
    pub summary:             InstrumentationSummary,
    /// Every observation handed to the sink.
    pub observations:        Vec<MetricObservation,>,
    /// Repositories that were skipped.
    pub failed_repositories: Vec<RepositoryFailure,>,
    /// Benchmark test types that were skipped.
    pub failed_benchmarks:   Vec<BenchmarkFailure,>,
}

impl RunReport
{
    /// Returns `true` when every repository and benchmark test type was
    /// collected.
    pub fn is_complete(&self,) -> bool
    {
        self.failed_repositories.is_empty() && self.failed_benchmarks.is_empty()
    }
}

/// Validates settings, builds the collaborators and performs one run.
///
/// `connect` is only invoked once the configuration is valid, so an invalid
/// configuration never reaches the network.
///
/// # Errors
///
/// Returns [`Error::Configuration`] for invalid settings and propagates the
/// errors of `connect` and [`run`].
pub async fn execute<S, K, F,>(settings: &Settings, connect: F,) -> Result<RunReport, Error,>
where
    S: GitHubSource,
    K: MetricSink,
    F: FnOnce(&Config,) -> Result<(S, K,), Error,>,
{
    let config = Config::from_settings(settings,)?;
    info!("Loaded configuration: {:?}", config);

    let (source, sink,) = connect(&config,)?;
    run(&config, &source, &sink,).await
}

/// Performs one run with already built collaborators.
///
/// # Errors
///
/// Returns manifest fetch and parse errors, the first repository error when
/// [`Config::fail_on_repository_error`] is set, and export errors. Benchmark
/// errors are never fatal.
pub async fn run<S, K,>(config: &Config, source: &S, sink: &K,) -> Result<RunReport, Error,>
where
    S: GitHubSource,
    K: MetricSink,
{
    let manifest = source.manifest().await?;
    let summary = analyze_manifest(&manifest,)?;
    info!(
        "Instrumentation libraries: total={}, with_description={}, with_javaagent={}, with_library={}, with_telemetry={}",
        summary.total_count,
        summary.with_description_count,
        summary.with_javaagent_count,
        summary.with_library_count,
        summary.with_telemetry_count
    );

    let Collection {
        metrics,
        failures,
    } = collect_repositories(source, &config.repositories,).await;

    let failed_repositories = if config.fail_on_repository_error {
        if let Some(failure,) = failures.into_iter().next() {
            error!("Aborting run: {} could not be collected", failure.repository);
            return Err(failure.error,);
        }
        Vec::new()
    } else {
        failures
    };

    let BenchmarkCollection {
        reports,
        failures: failed_benchmarks,
    } = collect_benchmarks(source, &config.benchmark_test_types,).await;

    let mut observations = summary.observations();
    for repository in &metrics {
        observations.extend(repository.observations(),);
    }
    for report in &reports {
        observations.extend(report.observations(),);
    }

    sink.export(&observations,).await?;

    info!(
        "Run finished: {} observations exported, {} repositories and {} benchmark test types skipped",
        observations.len(),
        failed_repositories.len(),
        failed_benchmarks.len()
    );

    let report = RunReport {
        summary,
        observations,
        failed_repositories,
        failed_benchmarks,
    };

    Ok(report,)
}

#[cfg(test)]
mod tests
{
    use std::sync::Mutex;

    use super::*;
    use crate::{
        collector::tests::FakeSource,
        config::tests::settings,
        fetch::IssueKind,
    };

    const BENCHMARK_SUMMARY: &str = "----------------------------------------------------------
 Run at Wed Oct 22 05:21:03 UTC 2025
----------------------------------------------------------
Agent               :      none      latest
Startup time (ms)   :     16214       19144
";

    const MANIFEST: &str =
        r#"[{description: "x", target_versions: ["javaagent"]}, {target_versions: ["library"]}, {}]"#;

    /// Records every batch instead of delivering it.
    #[derive(Debug, Default,)]
    struct RecordingSink
    {
        batches: Mutex<Vec<Vec<MetricObservation,>,>,>,
        fail:    bool,
    }

    impl RecordingSink
    {
        fn batches(&self,) -> Vec<Vec<MetricObservation,>,>
        {
            self.batches.lock().expect("sink lock",).clone()
        }
    }

    impl MetricSink for RecordingSink
    {
        async fn export(&self, batch: &[MetricObservation],) -> Result<(), Error,>
        {
            if self.fail {
                return Err(Error::export("connection refused",),);
            }
            self.batches.lock().expect("sink lock",).push(batch.to_vec(),);
            Ok((),)
        }
    }

    fn config_for(repositories: &[&str],) -> Config
    {
        let mut raw = settings();
        raw.repositories = repositories.iter().map(|r| (*r).to_owned(),).collect();
        raw.benchmark_test_types = Vec::new();
        Config::from_settings(&raw,).expect("valid settings",)
    }

    fn repo_names(observations: &[MetricObservation],) -> Vec<String,>
    {
        let mut names: Vec<String,> = observations
            .iter()
            .filter_map(|obs| obs.attributes.get("repo",).cloned(),)
            .collect();
        names.dedup();
        names
    }

    #[tokio::test]
    async fn exports_manifest_and_repository_observations_once()
    {
        let config = config_for(&["a/one"],);
        let source = FakeSource::default()
            .with_manifest(MANIFEST,)
            .with_repository("a/one", vec![IssueKind::Issue, IssueKind::PullRequest], 9,);
        let sink = RecordingSink::default();

        let report = run(&config, &source, &sink,).await.expect("run succeeds",);

        let batches = sink.batches();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0], report.observations);
        assert_eq!(report.observations.len(), 8);
        assert_eq!(report.summary.total_count, 3);
        assert!(report.is_complete());
    }

    #[tokio::test]
    async fn failing_repository_is_skipped()
    {
        let config = config_for(&["a/one", "b/missing", "c/three"],);
        let source = FakeSource::default()
            .with_manifest(MANIFEST,)
            .with_repository("a/one", vec![IssueKind::Issue], 1,)
            .with_repository("c/three", vec![IssueKind::PullRequest], 3,);
        let sink = RecordingSink::default();

        let report = run(&config, &source, &sink,).await.expect("run succeeds",);

        assert_eq!(repo_names(&sink.batches()[0],), vec!["one", "three"]);
        assert_eq!(report.failed_repositories.len(), 1);
        assert_eq!(report.failed_repositories[0].repository.to_string(), "b/missing");
    }

    #[tokio::test]
    async fn benchmark_observations_join_the_batch()
    {
        let mut config = config_for(&["a/one"],);
        config.benchmark_test_types = vec!["release".to_owned(), "snapshot".to_owned()];
        let source = FakeSource::default()
            .with_manifest(MANIFEST,)
            .with_repository("a/one", vec![IssueKind::Issue], 1,)
            .with_benchmark("release", BENCHMARK_SUMMARY,);
        let sink = RecordingSink::default();

        let report = run(&config, &source, &sink,).await.expect("run succeeds",);

        let benchmarks: Vec<&MetricObservation,> =
            report.observations.iter().filter(|obs| obs.name.starts_with("benchmark.",),).collect();
        assert_eq!(benchmarks.len(), 2);
        assert!(benchmarks.iter().all(|obs| obs.attributes["test_type"] == "release"));
        assert_eq!(sink.batches()[0].len(), 10);
        assert_eq!(report.failed_benchmarks.len(), 1);
        assert_eq!(report.failed_benchmarks[0].test_type, "snapshot");
        assert!(report.failed_repositories.is_empty());
        assert!(!report.is_complete());
    }

    #[tokio::test]
    async fn failing_repository_aborts_when_configured()
    {
        let mut config = config_for(&["a/one", "b/missing"],);
        config.fail_on_repository_error = true;
        let source = FakeSource::default()
            .with_manifest(MANIFEST,)
            .with_repository("a/one", vec![], 1,);
        let sink = RecordingSink::default();

        let error = run(&config, &source, &sink,).await.unwrap_err();

        assert!(matches!(error, Error::Fetch { .. }));
        assert!(sink.batches().is_empty());
    }

    #[tokio::test]
    async fn manifest_failure_is_fatal()
    {
        let config = config_for(&["a/one"],);
        let source = FakeSource::default().with_repository("a/one", vec![], 1,);
        let sink = RecordingSink::default();

        let error = run(&config, &source, &sink,).await.unwrap_err();

        assert!(matches!(error, Error::Fetch { .. }));
        assert!(sink.batches().is_empty());
    }

    #[tokio::test]
    async fn malformed_manifest_is_fatal()
    {
        let config = config_for(&["a/one"],);
        let source = FakeSource::default()
            .with_manifest("libraries: 5",)
            .with_repository("a/one", vec![], 1,);
        let sink = RecordingSink::default();

        let error = run(&config, &source, &sink,).await.unwrap_err();

        assert!(matches!(error, Error::ManifestShape { .. }));
        assert!(sink.batches().is_empty());
    }

    #[tokio::test]
    async fn export_failure_is_fatal()
    {
        let config = config_for(&["a/one"],);
        let source = FakeSource::default()
            .with_manifest(MANIFEST,)
            .with_repository("a/one", vec![], 1,);
        let sink = RecordingSink {
            fail: true, ..RecordingSink::default()
        };

        let error = run(&config, &source, &sink,).await.unwrap_err();
        assert!(matches!(error, Error::Export { .. }));
    }

    #[tokio::test]
    async fn missing_endpoint_aborts_before_any_request()
    {
        let mut raw = settings();
        raw.otlp_endpoint = None;
        let source = FakeSource::default().with_manifest(MANIFEST,);
        let mut connected = false;

        let result = execute(&raw, |_config| {
            connected = true;
            Ok((&source, RecordingSink::default(),),)
        },)
        .await;

        assert!(matches!(result, Err(Error::Configuration { .. })));
        assert!(!connected);
        assert_eq!(source.call_count(), 0);
    }

    #[tokio::test]
    async fn execute_runs_with_connected_collaborators()
    {
        let mut raw = settings();
        raw.repositories = vec!["a/one".to_owned()];
        let source = FakeSource::default()
            .with_manifest(MANIFEST,)
            .with_repository("a/one", vec![IssueKind::Issue], 2,);

        let report = execute(&raw, |_config| Ok((&source, RecordingSink::default(),),),)
            .await
            .expect("run succeeds",);

        assert_eq!(report.observations.len(), 8);
        assert!(source.call_count() > 0);
    }
}
