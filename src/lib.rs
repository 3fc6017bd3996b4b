//! Scheduled collection of GitHub repository and instrumentation metadata
//! metrics, exported over OTLP.
//!
//! A run fetches the OpenTelemetry Java instrumentation manifest, the open
//! issue, pull request and star counts of the configured repositories and the
//! published benchmark overhead reports, maps them onto named gauges and hands
//! the batch to an OTLP backend exactly once.
//! [`execute`] is the entry point; [`GitHubSource`] and [`MetricSink`] are the
//! seams to the network.

mod benchmark;
mod collector;
mod config;
mod error;
mod export;
mod fetch;
mod manifest;
pub mod observation;
mod repository;
pub mod retry;
mod run;

pub use benchmark::{
    BenchmarkCollection, BenchmarkFailure, BenchmarkReport, DEFAULT_BENCHMARK_TEST_TYPES,
    collect_benchmark, collect_benchmarks, parse_report, parse_test_types,
};
pub use collector::{
    Collection, RepositoryFailure, RepositoryMetrics, collect_repositories, collect_repository,
    count_issue_kinds,
};
pub use config::{
    Config, DEFAULT_BENCHMARK_RESULTS_URL, DEFAULT_MANIFEST_URL, DEFAULT_SERVICE_NAME, DEFAULT_TIMEOUT_SECS, ExportTarget,
    OtlpProtocol, OtlpSettings, Settings, metrics_endpoint, parse_headers,
};
pub use error::Error;
pub use export::{METER_NAME, MetricSink, OtlpExporter, Sink, StdoutSink, write_observations};
pub use fetch::{GitHubClient, GitHubSource, IssueKind};
pub use manifest::{
    InstrumentationEntry, InstrumentationSummary, TARGET_JAVAAGENT, TARGET_LIBRARY,
    analyze_manifest, parse_manifest,
};
pub use observation::{MetricObservation, MetricValue};
pub use repository::{DEFAULT_REPOSITORIES, RepositoryId, parse_repository_list};
pub use run::{RunReport, execute, run};
