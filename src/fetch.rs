// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

/// Read-only access to GitHub and the raw manifest endpoint.
///
/// [`GitHubSource`] is the seam the collectors and orchestrator depend on;
/// [`GitHubClient`] implements it with octocrab for the REST API and reqwest
/// for raw files. Server errors, timeouts and rate limits are retried; any
/// other client error is returned as [`Error::Rejected`] right away.
use std::{fmt, time::Duration};

use octocrab::{Octocrab, params};
use reqwest::Url;
use tracing::{debug, info};

use crate::{
    config::Config,
    error::Error,
    repository::RepositoryId,
    retry::{RetryConfig, retry_with_backoff_if},
};

/// Page size used when listing open issues.
const ISSUE_PAGE_SIZE: u8 = 100;
const SUMMARY_FILE: &str = "summary.txt";
const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Kind of an item returned by the combined issues endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq,)]
pub enum IssueKind
{
    /// A plain issue.
    Issue,
    /// A pull request, marked by the `pull_request` field.
    PullRequest,
}

/// Remote data needed for one collection run.
///
/// Implementations must be read-only; every method may be retried.
#[allow(async_fn_in_trait)]
pub trait GitHubSource
{
    /// Lists the kinds of every open item of the combined issues endpoint.
    async fn open_issue_kinds(&self, repository: &RepositoryId,) -> Result<Vec<IssueKind,>, Error,>;

    /// Returns the stargazer count of the repository.
    async fn star_count(&self, repository: &RepositoryId,) -> Result<u64, Error,>;

    /// Downloads the raw instrumentation manifest.
    async fn manifest(&self,) -> Result<String, Error,>;

    /// Downloads the benchmark `summary.txt` of one test type.
    async fn benchmark_summary(&self, test_type: &str,) -> Result<String, Error,>;
}

impl<T,> GitHubSource for &T
where
    T: GitHubSource + ?Sized,
{
    async fn open_issue_kinds(&self, repository: &RepositoryId,) -> Result<Vec<IssueKind,>, Error,>
    {
        (**self).open_issue_kinds(repository,).await
    }

    async fn star_count(&self, repository: &RepositoryId,) -> Result<u64, Error,>
    {
        (**self).star_count(repository,).await
    }

    async fn manifest(&self,) -> Result<String, Error,>
    {
        (**self).manifest().await
    }

    async fn benchmark_summary(&self, test_type: &str,) -> Result<String, Error,>
    {
        (**self).benchmark_summary(test_type,).await
    }
}

/// Authenticated GitHub client backed by octocrab and reqwest.
#[derive(Clone,)]
pub struct GitHubClient
{
    octocrab:              Octocrab,
    http:                  reqwest::Client,
    manifest_url:          Url,
    benchmark_results_url: Url,
    retry:                 RetryConfig,
}

impl GitHubClient
{
    /// Builds a client from the run configuration.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] when either HTTP client cannot be
    /// constructed.
    pub fn new(config: &Config,) -> Result<Self, Error,>
    {
        let octocrab = Octocrab::builder()
            .personal_token(config.github_token.clone(),)
            .set_connect_timeout(Some(config.timeout,),)
            .set_read_timeout(Some(config.timeout,),)
            .set_write_timeout(Some(config.timeout,),)
            .build()
            .map_err(|e| Error::configuration(format!("failed to initialize GitHub client: {e}"),),)?;

        let http = build_http_client(config.timeout,)?;

        Ok(Self {
            octocrab,
            http,
            manifest_url: config.manifest_url.clone(),
            benchmark_results_url: config.benchmark_results_url.clone(),
            retry: config.retry.clone(),
        },)
    }
}

impl fmt::Debug for GitHubClient
{
    fn fmt(&self, f: &mut fmt::Formatter<'_,>,) -> fmt::Result
    {
        f.debug_struct("GitHubClient",)
            .field("manifest_url", &self.manifest_url.as_str(),)
            .field("benchmark_results_url", &self.benchmark_results_url.as_str(),)
            .field("retry", &self.retry,)
            .finish_non_exhaustive()
    }
}

fn build_http_client(timeout: Duration,) -> Result<reqwest::Client, Error,>
{
    reqwest::Client::builder()
        .user_agent(USER_AGENT,)
        .timeout(timeout,)
        .build()
        .map_err(|e| Error::configuration(format!("failed to initialize HTTP client: {e}"),),)
}

/// Location of the benchmark summary of `test_type` below the results root.
fn benchmark_summary_url(results: &Url, test_type: &str,) -> Result<Url, Error,>
{
    let raw = format!("{}/{test_type}/{SUMMARY_FILE}", results.as_str().trim_end_matches('/'));
    Url::parse(&raw,).map_err(|e| Error::configuration(format!("invalid benchmark URL '{raw}': {e}"),),)
}

/// Client errors other than rate limiting will fail the same way again.
fn is_permanent(status: u16, message: &str,) -> bool
{
    let rate_limited = status == 429 || (status == 403 && message.to_ascii_lowercase().contains("rate limit",));
    (400..500).contains(&status,) && !rate_limited
}

/// Builds a retryable [`Error::Fetch`] or a final [`Error::Rejected`].
fn classify(resource: impl Into<String,>, status: Option<u16,>, message: String,) -> Error
{
    match status {
        Some(status,) if is_permanent(status, &message,) => Error::rejected(resource, status, message,),
        _ => Error::fetch(resource, message,),
    }
}

fn github_error(repository: &RepositoryId, error: octocrab::Error,) -> Error
{
    match &error {
        octocrab::Error::GitHub {
            source, ..
        } => classify(repository.to_string(), Some(source.status_code.as_u16(),), source.message.clone(),),
        _ => classify(repository.to_string(), None, error.to_string(),),
    }
}

fn http_error(url: &Url, error: reqwest::Error,) -> Error
{
    classify(url.as_str(), error.status().map(|status| status.as_u16(),), error.to_string(),)
}

impl GitHubClient
{
    async fn download(&self, label: &str, url: &Url,) -> Result<String, Error,>
    {
        let body = retry_with_backoff_if(&self.retry, label, Error::is_transient, || {
            let request = self.http.get(url.clone(),);
            async move {
                let response = request
                    .send()
                    .await
                    .and_then(reqwest::Response::error_for_status,)
                    .map_err(|e| http_error(url, e,),)?;

                response.text().await.map_err(|e| http_error(url, e,),)
            }
        },)
        .await?;

        debug!("{} is {} bytes", label, body.len());

        Ok(body,)
    }
}

impl GitHubSource for GitHubClient
{
    async fn open_issue_kinds(&self, repository: &RepositoryId,) -> Result<Vec<IssueKind,>, Error,>
    {
        debug!("Listing open issues and pull requests for {}", repository);

        let label = format!("open issues for {repository}");
        let issues = retry_with_backoff_if(&self.retry, &label, Error::is_transient, || {
            let octocrab = self.octocrab.clone();
            async move {
                let first = octocrab
                    .issues(repository.owner(), repository.name(),)
                    .list()
                    .state(params::State::Open,)
                    .per_page(ISSUE_PAGE_SIZE,)
                    .send()
                    .await
                    .map_err(|e| github_error(repository, e,),)?;

                octocrab.all_pages(first,).await.map_err(|e| github_error(repository, e,),)
            }
        },)
        .await?;

        let kinds: Vec<IssueKind,> = issues
            .iter()
            .map(|issue| {
                if issue.pull_request.is_some() { IssueKind::PullRequest } else { IssueKind::Issue }
            },)
            .collect();

        debug!("Fetched {} open items for {}", kinds.len(), repository);

        Ok(kinds,)
    }

    async fn star_count(&self, repository: &RepositoryId,) -> Result<u64, Error,>
    {
        let label = format!("repository {repository}");
        let details = retry_with_backoff_if(&self.retry, &label, Error::is_transient, || {
            let octocrab = self.octocrab.clone();
            async move {
                octocrab
                    .repos(repository.owner(), repository.name(),)
                    .get()
                    .await
                    .map_err(|e| github_error(repository, e,),)
            }
        },)
        .await?;

        Ok(details.stargazers_count.map_or(0, u64::from,),)
    }

    async fn manifest(&self,) -> Result<String, Error,>
    {
        info!("Downloading instrumentation manifest from {}", self.manifest_url);
        self.download("instrumentation manifest", &self.manifest_url,).await
    }

    async fn benchmark_summary(&self, test_type: &str,) -> Result<String, Error,>
    {
        let url = benchmark_summary_url(&self.benchmark_results_url, test_type,)?;
        info!("Downloading {} benchmark summary from {}", test_type, url);
        self.download(&format!("{test_type} benchmark summary"), &url,).await
    }
}
