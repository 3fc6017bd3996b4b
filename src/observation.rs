// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
//
// SPDX-License-Identifier: MIT

//! Named metric observations handed from the collectors to the exporter.
//!
//! Metric names are the external contract dashboards depend on. Repository
//! and instrumentation names are declared once here; benchmark names are
//! [`BENCHMARK_PREFIX`] followed by the normalized row label of the report.

use std::collections::BTreeMap;

use serde::Serialize;

/// Open issues per repository, pull requests excluded.
pub const REPO_ISSUES_OPEN: &str = "repo.issues.open";
/// Open pull requests per repository.
pub const REPO_PRS_OPEN: &str = "repo.prs.open";
/// Stargazers per repository.
pub const REPO_STARS: &str = "repo.stars";
/// Number of instrumentation entries in the manifest.
pub const LIBRARIES_TOTAL: &str = "instrumentation.libraries.total";
/// Entries with a non-empty description.
pub const LIBRARIES_WITH_DESCRIPTION: &str = "instrumentation.libraries.with_description";
/// Entries targeting the Java agent.
pub const LIBRARIES_WITH_JAVAAGENT: &str = "instrumentation.libraries.with_javaagent";
/// Entries targeting standalone library instrumentation.
pub const LIBRARIES_WITH_LIBRARY: &str = "instrumentation.libraries.with_library";
/// Entries declaring telemetry configuration.
pub const LIBRARIES_WITH_TELEMETRY_CONFIG: &str =
    "instrumentation.libraries.with_telemetry_config";

/// Prefix of every benchmark overhead gauge.
pub const BENCHMARK_PREFIX: &str = "benchmark";

/// Attribute carrying the repository owner.
pub const ATTRIBUTE_OWNER: &str = "owner";
/// Attribute carrying the repository name.
pub const ATTRIBUTE_REPO: &str = "repo";
/// Attribute carrying the benchmarked agent, e.g. `none` or `latest`.
pub const ATTRIBUTE_ENTITY: &str = "entity";
/// Attribute carrying the benchmark suite, e.g. `release`.
pub const ATTRIBUTE_TEST_TYPE: &str = "test_type";

/// Returns the instrument description for a known metric name.
pub fn describe(name: &str,) -> Option<&'static str,>
{
    let description = match name {
        REPO_ISSUES_OPEN => "Open issues excluding pull requests",
        REPO_PRS_OPEN => "Open pull requests",
        REPO_STARS => "Repository stargazers",
        LIBRARIES_TOTAL => "Instrumentation libraries listed in the manifest",
        LIBRARIES_WITH_DESCRIPTION => "Instrumentation libraries with a description",
        LIBRARIES_WITH_JAVAAGENT => "Instrumentation libraries targeting the Java agent",
        LIBRARIES_WITH_LIBRARY => "Instrumentation libraries with standalone library support",
        LIBRARIES_WITH_TELEMETRY_CONFIG => "Instrumentation libraries declaring telemetry",
        _ => return None,
    };
    Some(description,)
}

/// Gauge value: integer counts or fractional measurements.
#[derive(Debug, Clone, Copy, PartialEq, Serialize,)]
#[serde(untagged)]
pub enum MetricValue
{
    /// Recorded on a `u64` gauge.
    Count(u64,),
    /// Recorded on an `f64` gauge.
    Measurement(f64,),
}

/// A single gauge reading with its attributes.
#[derive(Debug, Clone, PartialEq, Serialize,)]
pub struct MetricObservation
{
    /// Instrument name.
    pub name:       String,
    /// Point-in-time value.
    pub value:      MetricValue,
    /// Attributes attached to the measurement, ordered by key.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String,>,
}

impl MetricObservation
{
    /// Creates a count observation without attributes.
    pub fn new(name: impl Into<String,>, value: u64,) -> Self
    {
        Self::with_value(name, MetricValue::Count(value,),)
    }

    /// Creates a fractional observation without attributes.
    pub fn measurement(name: impl Into<String,>, value: f64,) -> Self
    {
        Self::with_value(name, MetricValue::Measurement(value,),)
    }

    fn with_value(name: impl Into<String,>, value: MetricValue,) -> Self
    {
        Self {
            name: name.into(), value, attributes: BTreeMap::new(),
        }
    }

    /// Adds an attribute, replacing any previous value for the key.
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String,>, value: impl Into<String,>,) -> Self
    {
        self.attributes.insert(key.into(), value.into(),);
        self
    }
}
