// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
//
// SPDX-License-Identifier: MIT

//! Run configuration.
//!
//! [`Settings`] mirrors the raw command-line and environment inputs; it is
//! parsed by clap once at process start. [`Config::from_settings`] validates
//! those inputs into the typed [`Config`] that is passed by reference to every
//! component, so no business logic reads the environment.

use std::{collections::HashMap, fmt, str::FromStr, time::Duration};

use clap::{ArgAction, Args, builder::BoolishValueParser};
use reqwest::Url;

use crate::{
    benchmark::{DEFAULT_BENCHMARK_TEST_TYPES, parse_test_types},
    error::Error,
    repository::{RepositoryId, parse_repository_list},
    retry::RetryConfig,
};

/// Raw manifest of the OpenTelemetry Java instrumentation project.
pub const DEFAULT_MANIFEST_URL: &str = "https://raw.githubusercontent.com/open-telemetry/opentelemetry-java-instrumentation/main/docs/instrumentation-list.yaml";
/// Root of the benchmark overhead results on the `gh-pages` branch.
pub const DEFAULT_BENCHMARK_RESULTS_URL: &str = "https://raw.githubusercontent.com/open-telemetry/opentelemetry-java-instrumentation/gh-pages/benchmark-overhead/results";
/// Resource `service.name` attached to exported metrics.
pub const DEFAULT_SERVICE_NAME: &str = "github-metrics";
/// Per-request timeout applied to every HTTP call.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
/// Path appended to the base OTLP endpoint for metric export.
const METRICS_PATH: &str = "/v1/metrics";

/// Raw inputs, read from flags or the documented environment variables.
#[derive(Debug, Clone, Args,)]
pub struct Settings
{
    /// Token used to authenticate against the GitHub API.
    #[arg(long = "github-token", env = "GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: Option<String,>,

    /// Repositories to collect, as comma separated owner/name pairs.
    #[arg(long = "repositories", env = "GITHUB_REPOSITORIES", value_delimiter = ',')]
    pub repositories: Vec<String,>,

    /// URL of the raw instrumentation manifest.
    #[arg(long = "manifest-url", env = "INSTRUMENTATION_MANIFEST_URL", default_value = DEFAULT_MANIFEST_URL)]
    pub manifest_url: String,

    /// Root URL below which `<test type>/summary.txt` benchmark reports live.
    #[arg(
        long = "benchmark-results-url",
        env = "BENCHMARK_RESULTS_URL",
        default_value = DEFAULT_BENCHMARK_RESULTS_URL
    )]
    pub benchmark_results_url: String,

    /// Benchmark test types to collect, comma separated; empty disables them.
    #[arg(
        long = "benchmark-test-types",
        env = "BENCHMARK_TEST_TYPES",
        value_delimiter = ',',
        default_values = DEFAULT_BENCHMARK_TEST_TYPES
    )]
    pub benchmark_test_types: Vec<String,>,

    /// Base URL of the OTLP metrics backend.
    #[arg(long = "otlp-endpoint", env = "OTEL_EXPORTER_OTLP_ENDPOINT")]
    pub otlp_endpoint: Option<String,>,

    /// Header list in `key=value[,key=value]` form, e.g. `Authorization=Basic <base64>`.
    #[arg(long = "otlp-headers", env = "OTEL_EXPORTER_OTLP_HEADERS", hide_env_values = true)]
    pub otlp_headers: Option<String,>,

    /// Wire protocol: `http/protobuf` or `http/json`.
    #[arg(long = "otlp-protocol", env = "OTEL_EXPORTER_OTLP_PROTOCOL")]
    pub otlp_protocol: Option<String,>,

    /// Resource `service.name` attached to exported metrics.
    #[arg(long = "service-name", env = "OTEL_SERVICE_NAME", default_value = DEFAULT_SERVICE_NAME)]
    pub service_name: String,

    /// Timeout in seconds applied to every HTTP request.
    #[arg(long = "timeout-secs", env = "HTTP_TIMEOUT_SECS", default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout_secs: u64,

    /// Abort the run when any single repository cannot be collected.
    #[arg(
        long = "fail-on-repository-error",
        env = "FAIL_ON_REPOSITORY_ERROR",
        action = ArgAction::SetTrue,
        value_parser = BoolishValueParser::new()
    )]
    pub fail_on_repository_error: bool,

    /// Print observations as JSON instead of exporting them.
    #[arg(long = "dry-run", action = ArgAction::SetTrue)]
    pub dry_run: bool,
}

/// Wire protocols supported by the OTLP exporter.
#[derive(Debug, Clone, Copy, PartialEq, Eq,)]
pub enum OtlpProtocol
{
    /// Protobuf over HTTP (`http/protobuf`).
    HttpProtobuf,
    /// JSON over HTTP (`http/json`).
    HttpJson,
}

impl FromStr for OtlpProtocol
{
    type Err = Error;

    fn from_str(input: &str,) -> Result<Self, Self::Err,>
    {
        match input.trim().to_ascii_lowercase().as_str() {
            "http/protobuf" => Ok(Self::HttpProtobuf,),
            "http/json" => Ok(Self::HttpJson,),
            other => Err(Error::configuration(format!(
                "unsupported OTEL_EXPORTER_OTLP_PROTOCOL '{other}', expected http/protobuf or http/json"
            ),),),
        }
    }
}

impl fmt::Display for OtlpProtocol
{
    fn fmt(&self, f: &mut fmt::Formatter<'_,>,) -> fmt::Result
    {
        match self {
            Self::HttpProtobuf => f.write_str("http/protobuf",),
            Self::HttpJson => f.write_str("http/json",),
        }
    }
}

/// Validated OTLP exporter settings.
#[derive(Clone, PartialEq,)]
pub struct OtlpSettings
{
    /// Full metrics URL, including the `/v1/metrics` path.
    pub endpoint:     String,
    /// Static headers sent with every export request.
    pub headers:      HashMap<String, String,>,
    /// Wire protocol.
    pub protocol:     OtlpProtocol,
    /// Resource `service.name`.
    pub service_name: String,
    /// Export request timeout.
    pub timeout:      Duration,
}

impl fmt::Debug for OtlpSettings
{
    fn fmt(&self, f: &mut fmt::Formatter<'_,>,) -> fmt::Result
    {
        let mut header_names: Vec<&str,> = self.headers.keys().map(String::as_str,).collect();
        header_names.sort_unstable();

        f.debug_struct("OtlpSettings",)
            .field("endpoint", &self.endpoint,)
            .field("headers", &header_names,)
            .field("protocol", &self.protocol,)
            .field("service_name", &self.service_name,)
            .field("timeout", &self.timeout,)
            .finish()
    }
}

/// Destination of the observations collected in a run.
#[derive(Debug, Clone, PartialEq,)]
pub enum ExportTarget
{
    /// Deliver to an OTLP backend.
    Otlp(OtlpSettings,),
    /// Print to standard output.
    DryRun,
}

/// Validated configuration for a single run.
#[derive(Clone,)]
pub struct Config
{
    /// GitHub API token.
    pub github_token:             String,
    /// Repositories to collect, without duplicates.
    pub repositories:             Vec<RepositoryId,>,
    /// Raw manifest location.
    pub manifest_url:             Url,
    /// Root of the benchmark reports.
    pub benchmark_results_url:    Url,
    /// Benchmark test types to collect; empty when disabled.
    pub benchmark_test_types:     Vec<String,>,
    /// Per-request timeout.
    pub timeout:                  Duration,
    /// Retry policy for idempotent reads.
    pub retry:                    RetryConfig,
    /// Whether one failed repository aborts the run.
    pub fail_on_repository_error: bool,
    /// Where observations go.
    pub export:                   ExportTarget,
}

impl fmt::Debug for Config
{
    fn fmt(&self, f: &mut fmt::Formatter<'_,>,) -> fmt::Result
    {
        f.debug_struct("Config",)
            .field("github_token", &"<redacted>",)
            .field("repositories", &self.repositories,)
            .field("manifest_url", &self.manifest_url.as_str(),)
            .field("benchmark_results_url", &self.benchmark_results_url.as_str(),)
            .field("benchmark_test_types", &self.benchmark_test_types,)
            .field("timeout", &self.timeout,)
            .field("retry", &self.retry,)
            .field("fail_on_repository_error", &self.fail_on_repository_error,)
            .field("export", &self.export,)
            .finish()
    }
}

impl Config
{
    /// Validates raw settings.
    ///
    /// The GitHub token is checked first, followed by the exporter settings,
    /// so a missing credential is reported before anything else.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] when a required value is missing or
    /// any value is malformed.
    pub fn from_settings(settings: &Settings,) -> Result<Self, Error,>
    {
        let github_token = required(settings.github_token.as_deref(), "GITHUB_TOKEN",)?.to_owned();

        if settings.timeout_secs == 0 {
            return Err(Error::configuration("HTTP_TIMEOUT_SECS must be greater than zero",),);
        }
        let timeout = Duration::from_secs(settings.timeout_secs,);

        let export = if settings.dry_run {
            ExportTarget::DryRun
        } else {
            ExportTarget::Otlp(otlp_settings(settings, timeout,)?,)
        };

        let repositories = parse_repository_list(&settings.repositories,)?;

        let manifest_url = Url::parse(settings.manifest_url.trim(),).map_err(|e| {
            Error::configuration(format!("invalid INSTRUMENTATION_MANIFEST_URL: {e}"),)
        },)?;

        let benchmark_results_url = Url::parse(settings.benchmark_results_url.trim(),)
            .map_err(|e| Error::configuration(format!("invalid BENCHMARK_RESULTS_URL: {e}"),),)?;
        let benchmark_test_types = parse_test_types(&settings.benchmark_test_types,)?;

        Ok(Self {
            github_token,
            repositories,
            manifest_url,
            benchmark_results_url,
            benchmark_test_types,
            timeout,
            retry: RetryConfig::default(),
            fail_on_repository_error: settings.fail_on_repository_error,
            export,
        },)
    }
}

fn otlp_settings(settings: &Settings, timeout: Duration,) -> Result<OtlpSettings, Error,>
{
    let endpoint = required(settings.otlp_endpoint.as_deref(), "OTEL_EXPORTER_OTLP_ENDPOINT",)?;
    let headers = required(settings.otlp_headers.as_deref(), "OTEL_EXPORTER_OTLP_HEADERS",)?;
    let protocol = required(settings.otlp_protocol.as_deref(), "OTEL_EXPORTER_OTLP_PROTOCOL",)?;

    let service_name = settings.service_name.trim();
    if service_name.is_empty() {
        return Err(Error::configuration("OTEL_SERVICE_NAME cannot be empty",),);
    }

    Ok(OtlpSettings {
        endpoint: metrics_endpoint(endpoint,)?,
        headers: parse_headers(headers,)?,
        protocol: protocol.parse()?,
        service_name: service_name.to_owned(),
        timeout,
    },)
}

fn required<'a,>(value: Option<&'a str,>, name: &str,) -> Result<&'a str, Error,>
{
    value
        .map(str::trim,)
        .filter(|value| !value.is_empty(),)
        .ok_or_else(|| Error::configuration(format!("{name} is not set"),),)
}

/// Resolves the metrics URL from a base OTLP endpoint.
///
/// # Errors
///
/// Returns [`Error::Configuration`] when the endpoint is not an absolute
/// `http` or `https` URL.
pub fn metrics_endpoint(base: &str,) -> Result<String, Error,>
{
    let url = Url::parse(base.trim(),).map_err(|e| {
        Error::configuration(format!("invalid OTEL_EXPORTER_OTLP_ENDPOINT '{base}': {e}"),)
    },)?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(Error::configuration(format!(
            "OTEL_EXPORTER_OTLP_ENDPOINT must use http or https, got '{}'",
            url.scheme()
        ),),);
    }

    let trimmed = url.as_str().trim_end_matches('/',);
    if trimmed.ends_with(METRICS_PATH,) {
        Ok(trimmed.to_owned(),)
    } else {
        Ok(format!("{trimmed}{METRICS_PATH}"),)
    }
}

/// Parses an OTLP header list in `key=value[,key=value]` form.
///
/// Keys and values are trimmed and `%20` in values is decoded to a space, so
/// both `Authorization=Basic abc` and `Authorization=Basic%20abc` work.
///
/// # Errors
///
/// Returns [`Error::Configuration`] for entries without `=` or with an empty
/// key.
///
/// # Examples
///
/// ```
/// use github_metrics::parse_headers;
///
/// let headers = parse_headers("Authorization=Basic%20dXNlcjpwYXNz",)?;
/// assert_eq!(headers["Authorization"], "Basic dXNlcjpwYXNz");
/// # Ok::<(), github_metrics::Error>(())
/// ```
pub fn parse_headers(input: &str,) -> Result<HashMap<String, String,>, Error,>
{
    let mut headers = HashMap::new();

    for entry in input.split(',',).map(str::trim,).filter(|entry| !entry.is_empty(),) {
        let (key, value,) = entry.split_once('=',).ok_or_else(|| {
            Error::configuration("OTEL_EXPORTER_OTLP_HEADERS entries must use key=value",)
        },)?;

        let key = key.trim();
        if key.is_empty() {
            return Err(Error::configuration("OTEL_EXPORTER_OTLP_HEADERS contains an empty key",),);
        }

        headers.insert(key.to_owned(), value.trim().replace("%20", " ",),);
    }

    if headers.is_empty() {
        return Err(Error::configuration("OTEL_EXPORTER_OTLP_HEADERS is not set",),);
    }

    Ok(headers,)
}

#[cfg(test)]
pub(crate) mod tests
{
    use super::*;

    pub(crate) fn settings() -> Settings
    {
        Settings {
            github_token:             Some("ghp_test".to_owned(),),
            repositories:             Vec::new(),
            manifest_url:             DEFAULT_MANIFEST_URL.to_owned(),
            benchmark_results_url:    DEFAULT_BENCHMARK_RESULTS_URL.to_owned(),
            benchmark_test_types:     DEFAULT_BENCHMARK_TEST_TYPES.map(str::to_owned,).to_vec(),
            otlp_endpoint:            Some("https://otlp.example.com/otlp".to_owned(),),
            otlp_headers:             Some("Authorization=Basic dXNlcjpwYXNz".to_owned(),),
            otlp_protocol:            Some("http/protobuf".to_owned(),),
            service_name:             DEFAULT_SERVICE_NAME.to_owned(),
            timeout_secs:             DEFAULT_TIMEOUT_SECS,
            fail_on_repository_error: false,
            dry_run:                  false,
        }
    }

    #[test]
    fn complete_settings_produce_otlp_config()
    {
        let config = Config::from_settings(&settings(),).expect("valid settings",);

        assert_eq!(config.github_token, "ghp_test");
        assert_eq!(config.repositories.len(), 2);
        assert_eq!(config.timeout, Duration::from_secs(30,));
        match config.export {
            ExportTarget::Otlp(otlp,) => {
                assert_eq!(otlp.endpoint, "https://otlp.example.com/otlp/v1/metrics");
                assert_eq!(otlp.protocol, OtlpProtocol::HttpProtobuf);
                assert_eq!(otlp.headers["Authorization"], "Basic dXNlcjpwYXNz");
                assert_eq!(otlp.service_name, "github-metrics");
            }
            ExportTarget::DryRun => panic!("expected OTLP export target"),
        }
    }

    #[test]
    fn missing_token_is_reported_first()
    {
        let mut raw = settings();
        raw.github_token = Some("   ".to_owned(),);
        raw.otlp_endpoint = None;

        let error = Config::from_settings(&raw,).unwrap_err();
        assert_eq!(error.to_string(), "invalid configuration: GITHUB_TOKEN is not set");
    }

    #[test]
    fn each_exporter_variable_is_required()
    {
        let cases: [(fn(&mut Settings,), &str,); 3] = [
            (|raw| raw.otlp_endpoint = None, "OTEL_EXPORTER_OTLP_ENDPOINT",),
            (|raw| raw.otlp_headers = None, "OTEL_EXPORTER_OTLP_HEADERS",),
            (|raw| raw.otlp_protocol = Some(String::new(),), "OTEL_EXPORTER_OTLP_PROTOCOL",),
        ];

        for (mutate, name,) in cases {
            let mut raw = settings();
            mutate(&mut raw,);
            let error = Config::from_settings(&raw,).unwrap_err();
            assert!(matches!(error, Error::Configuration { .. }));
            assert!(error.to_string().contains(name), "expected {name} in '{error}'");
        }
    }

    #[test]
    fn dry_run_does_not_require_exporter_settings()
    {
        let mut raw = settings();
        raw.dry_run = true;
        raw.otlp_endpoint = None;
        raw.otlp_headers = None;
        raw.otlp_protocol = None;

        let config = Config::from_settings(&raw,).expect("dry run settings",);
        assert_eq!(config.export, ExportTarget::DryRun);
    }

    #[test]
    fn benchmark_settings_are_validated()
    {
        let config = Config::from_settings(&settings(),).expect("valid settings",);
        assert_eq!(config.benchmark_test_types, DEFAULT_BENCHMARK_TEST_TYPES);
        assert_eq!(config.benchmark_results_url.as_str(), DEFAULT_BENCHMARK_RESULTS_URL);

        let mut raw = settings();
        raw.benchmark_test_types = vec![String::new()];
        let config = Config::from_settings(&raw,).expect("disabled benchmarks",);
        assert!(config.benchmark_test_types.is_empty());

        raw.benchmark_test_types = vec!["release/../x".to_owned()];
        assert!(Config::from_settings(&raw,).is_err());

        let mut raw = settings();
        raw.benchmark_results_url = "not a url".to_owned();
        let error = Config::from_settings(&raw,).unwrap_err();
        assert!(error.to_string().contains("BENCHMARK_RESULTS_URL"));
    }

    #[test]
    fn zero_timeout_is_rejected()
    {
        let mut raw = settings();
        raw.timeout_secs = 0;
        assert!(Config::from_settings(&raw,).is_err());
    }

    #[test]
    fn grpc_protocol_is_rejected()
    {
        let error = "grpc".parse::<OtlpProtocol>().unwrap_err();
        assert!(error.to_string().contains("grpc"));
        assert_eq!(" HTTP/JSON ".parse::<OtlpProtocol>().expect("json",), OtlpProtocol::HttpJson);
    }

    #[test]
    fn metrics_endpoint_appends_path_once()
    {
        assert_eq!(
            metrics_endpoint("http://localhost:4318",).expect("valid",),
            "http://localhost:4318/v1/metrics"
        );
        assert_eq!(
            metrics_endpoint("http://localhost:4318/v1/metrics/",).expect("valid",),
            "http://localhost:4318/v1/metrics"
        );
        assert!(metrics_endpoint("localhost:4318",).is_err());
        assert!(metrics_endpoint("ftp://example.com",).is_err());
    }

    #[test]
    fn headers_are_split_and_decoded()
    {
        let headers = parse_headers(" Authorization=Basic%20abc== , X-Scope-OrgID = tenant ",)
            .expect("valid headers",);
        assert_eq!(headers.len(), 2);
        assert_eq!(headers["Authorization"], "Basic abc==");
        assert_eq!(headers["X-Scope-OrgID"], "tenant");
    }

    #[test]
    fn malformed_headers_are_rejected()
    {
        assert!(parse_headers("Authorization",).is_err());
        assert!(parse_headers("=value",).is_err());
        assert!(parse_headers(" , ",).is_err());
    }

    #[test]
    fn debug_output_redacts_secrets()
    {
        let config = Config::from_settings(&settings(),).expect("valid settings",);
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("ghp_test"));
        assert!(!rendered.contains("dXNlcjpwYXNz"));
        assert!(rendered.contains("Authorization"));
    }
}
