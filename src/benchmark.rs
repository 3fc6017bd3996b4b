// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
//
// SPDX-License-Identifier: MIT

//! Benchmark overhead results published on the `gh-pages` branch of the
//! OpenTelemetry Java instrumentation project.
//!
//! Every test type has a plain-text `summary.txt` laid out as dash-separated
//! sections: a preamble with the `Run at` timestamp, then a table whose
//! header row names the benchmarked agents (entities) and whose remaining
//! rows hold one measurement per entity:
//!
//! ```text
//! ----------------------------------------------------------
//!  Run at Wed Oct 22 05:21:03 UTC 2025
//! ----------------------------------------------------------
//! Agent               :              none            latest
//! Run duration        :          00:02:14          00:02:26
//! Startup time (ms)   :             16214             19144
//! ```
//!
//! Each test type is collected independently; a missing or malformed report
//! only drops that test type.

use std::collections::BTreeMap;

use regex::Regex;
use tracing::{debug, info, warn};

use crate::{
    error::Error,
    fetch::GitHubSource,
    observation::{ATTRIBUTE_ENTITY, ATTRIBUTE_TEST_TYPE, BENCHMARK_PREFIX, MetricObservation},
};

/// Test types published by the benchmark workflow.
pub const DEFAULT_BENCHMARK_TEST_TYPES: [&str; 3] = ["release", "snapshot", "snapshot-regression"];

const SECTION_SEPARATOR: &str = "----------------------------------------------------------\n";
const RUN_AT_MARKER: &str = "Run at";
const HEADER_LABEL: &str = "Agent";
/// Garbage value the benchmark harness occasionally writes instead of a
/// measurement.
const MALFORMED_SENTINEL: &str = "8796093022208";

/// Parsed `summary.txt` of one test type.
#[derive(Debug, Clone, PartialEq,)]
pub struct BenchmarkReport
{
    /// Test type the report belongs to, e.g. `snapshot`.
    pub test_type: String,
    /// Timestamp text following `Run at`, kept verbatim.
    pub run_at:    String,
    /// Measurements keyed by entity, then by normalized metric name.
    pub entities:  BTreeMap<String, BTreeMap<String, f64,>,>,
}

impl BenchmarkReport
{
    /// Maps every measurement onto a `benchmark.<metric>` gauge tagged with
    /// its entity and test type.
    pub fn observations(&self,) -> Vec<MetricObservation,>
    {
        self.entities
            .iter()
            .flat_map(|(entity, metrics,)| {
                metrics.iter().map(move |(metric, value,)| {
                    MetricObservation::measurement(format!("{BENCHMARK_PREFIX}.{metric}"), *value,)
                        .with_attribute(ATTRIBUTE_ENTITY, entity.as_str(),)
                        .with_attribute(ATTRIBUTE_TEST_TYPE, self.test_type.as_str(),)
                },)
            },)
            .collect()
    }

    /// Number of measurements across all entities.
    pub fn measurement_count(&self,) -> usize
    {
        self.entities.values().map(BTreeMap::len,).sum()
    }
}

/// A test type whose report could not be collected.
#[derive(Debug,)]
pub struct BenchmarkFailure
{
    /// Test type that failed.
    pub test_type: String,
    /// Cause of the failure.
    pub error:     Error,
}

/// Outcome of collecting every configured test type.
#[derive(Debug, Default,)]
pub struct BenchmarkCollection
{
    /// Reports parsed successfully, in configuration order.
    pub reports:  Vec<BenchmarkReport,>,
    /// Test types that failed, in configuration order.
    pub failures: Vec<BenchmarkFailure,>,
}

/// Compiled patterns shared by every row of a report.
struct ReportParser
{
    columns:     Regex,
    punctuation: Regex,
    whitespace:  Regex,
}

impl ReportParser
{
    fn new() -> Result<Self, Error,>
    {
        let compile = |pattern: &str| {
            Regex::new(pattern,)
                .map_err(|e| Error::benchmark_report(format!("invalid pattern '{pattern}': {e}"),),)
        };

        Ok(Self {
            columns:     compile(r"\s{2,}",)?,
            punctuation: compile(r"[^\w\s]",)?,
            whitespace:  compile(r"\s+",)?,
        },)
    }

    /// Splits on runs of two or more whitespace characters, so single spaces
    /// inside a cell are kept.
    fn split_columns<'a,>(&self, text: &'a str,) -> Vec<&'a str,>
    {
        self.columns
            .split(text.trim(),)
            .map(str::trim,)
            .filter(|cell| !cell.is_empty(),)
            .collect()
    }

    /// `Startup time (ms)` becomes `startup_time_ms`.
    fn normalize_metric_name(&self, label: &str,) -> String
    {
        let lowered = label.to_lowercase();
        let stripped = self.punctuation.replace_all(&lowered, "",);
        let joined = self.whitespace.replace_all(&stripped, "_",);
        joined.trim_matches('_',).to_owned()
    }

    fn parse(&self, test_type: &str, summary: &str,) -> Result<BenchmarkReport, Error,>
    {
        let summary = summary.replace("\r\n", "\n",);
        let sections: Vec<&str,> = summary.split(SECTION_SEPARATOR,).collect();
        if sections.len() < 3 {
            return Err(Error::benchmark_report("missing sections",),);
        }

        let run_at = sections[1]
            .lines()
            .find_map(|line| line.split_once(RUN_AT_MARKER,),)
            .map(|(_, date,)| date.trim(),)
            .filter(|date| !date.is_empty(),)
            .ok_or_else(|| Error::benchmark_report("no 'Run at' timestamp",),)?;

        let mut lines = sections[2].trim().lines();
        let (_, header,) = lines
            .next()
            .and_then(|line| line.split_once(':',),)
            .ok_or_else(|| Error::benchmark_report("table header has no entity columns",),)?;
        let entity_names = self.split_columns(header,);

        let mut entities: BTreeMap<String, BTreeMap<String, f64,>,> =
            entity_names.iter().map(|name| ((*name).to_owned(), BTreeMap::new(),),).collect();

        for line in lines {
            let Some((label, cells,),) = line.split_once(':',)
            else {
                continue;
            };
            let label = label.trim();
            if label.is_empty() || label == HEADER_LABEL {
                continue;
            }

            let metric = self.normalize_metric_name(label,);
            for (entity, cell,) in entity_names.iter().zip(self.split_columns(cells,),) {
                match parse_value(cell,) {
                    Some(value,) => {
                        if let Some(metrics,) = entities.get_mut(*entity,) {
                            metrics.insert(metric.clone(), round_to_hundredths(value,),);
                        }
                    }
                    None => debug!("{}: dropping {} = '{}' for {}", test_type, metric, cell, entity),
                }
            }
        }

        Ok(BenchmarkReport {
            test_type: test_type.to_owned(),
            run_at: run_at.to_owned(),
            entities,
        },)
    }
}

/// Parses the `summary.txt` of one test type.
///
/// # Errors
///
/// Returns [`Error::BenchmarkReport`] when the sections, the `Run at`
/// timestamp or the table header are missing. Individual cells that cannot
/// be read are dropped instead.
pub fn parse_report(test_type: &str, summary: &str,) -> Result<BenchmarkReport, Error,>
{
    ReportParser::new()?.parse(test_type, summary,)
}

/// Reads one table cell: `HH:MM:SS` durations become seconds, anything else
/// must be a finite number.
fn parse_value(cell: &str,) -> Option<f64,>
{
    let cell = cell.trim();
    if cell.contains(MALFORMED_SENTINEL,) {
        return None;
    }

    let parts: Vec<&str,> = cell.split(':',).collect();
    if parts.len() == 3 {
        let mut seconds: u64 = 0;
        for part in parts {
            seconds = seconds.checked_mul(60,)?.checked_add(part.parse::<u64>().ok()?,)?;
        }
        return Some(seconds as f64,);
    }

    cell.parse::<f64>().ok().filter(|value| value.is_finite(),)
}

fn round_to_hundredths(value: f64,) -> f64
{
    (value * 100.0).round() / 100.0
}

/// Collects and parses the report of a single test type.
///
/// # Errors
///
/// Returns the fetch error or the report layout error for this test type.
pub async fn collect_benchmark<S,>(source: &S, test_type: &str,) -> Result<BenchmarkReport, Error,>
where
    S: GitHubSource,
{
    let summary = source.benchmark_summary(test_type,).await?;
    let report = parse_report(test_type, &summary,)?;

    info!(
        "{} benchmarks run at {}: {} entities, {} measurements",
        test_type,
        report.run_at,
        report.entities.len(),
        report.measurement_count()
    );

    Ok(report,)
}

/// Collects every test type sequentially, isolating failures.
pub async fn collect_benchmarks<S,>(source: &S, test_types: &[String],) -> BenchmarkCollection
where
    S: GitHubSource,
{
    let mut collection = BenchmarkCollection::default();

    for test_type in test_types {
        match collect_benchmark(source, test_type,).await {
            Ok(report,) => collection.reports.push(report,),
            Err(error,) => {
                warn!("Skipping {} benchmarks: {}", test_type, error);
                collection.failures.push(BenchmarkFailure {
                    test_type: test_type.clone(),
                    error,
                },);
            }
        }
    }

    collection
}

/// Validates configured test types; an empty result disables benchmark
/// collection.
///
/// Blank entries are ignored and duplicates dropped, keeping the first
/// occurrence.
///
/// # Errors
///
/// Returns [`Error::Configuration`] for an entry that is not a single path
/// segment.
pub fn parse_test_types<S,>(entries: &[S],) -> Result<Vec<String,>, Error,>
where
    S: AsRef<str,>,
{
    let mut test_types: Vec<String,> = Vec::with_capacity(entries.len(),);

    for entry in entries.iter().map(|entry| entry.as_ref().trim(),).filter(|entry| !entry.is_empty(),) {
        if entry == "." || entry == ".." || entry.chars().any(|c| c.is_whitespace() || c == '/',) {
            return Err(Error::configuration(format!(
                "benchmark test type '{entry}' must be a single path segment"
            ),),);
        }
        if !test_types.iter().any(|known| known == entry,) {
            test_types.push(entry.to_owned(),);
        }
    }

    Ok(test_types,)
}
