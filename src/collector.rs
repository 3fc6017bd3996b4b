// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

/// Per-repository metric collection.
///
/// Each repository is collected independently: a failure is recorded against
/// that repository and the remaining repositories are still collected.
use serde::Serialize;
use tracing::{info, warn};

use crate::{
    error::Error,
    fetch::{GitHubSource, IssueKind},
    observation::{ATTRIBUTE_OWNER, ATTRIBUTE_REPO, MetricObservation, REPO_ISSUES_OPEN, REPO_PRS_OPEN, REPO_STARS},
    repository::RepositoryId,
};

/// Counts collected for one repository in one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize,)]
pub struct RepositoryMetrics
{
    /// Repository the counts belong to.
    pub repository:       RepositoryId,
    /// Open issues, pull requests excluded.
    pub open_issue_count: u64,
    /// Open pull requests.
    pub open_pr_count:    u64,
    /// Stargazers.
    pub star_count:       u64,
}

impl RepositoryMetrics
{
    /// Maps the counts onto the per-repository gauges.
    pub fn observations(&self,) -> Vec<MetricObservation,>
    {
        [
            (REPO_ISSUES_OPEN, self.open_issue_count,),
            (REPO_PRS_OPEN, self.open_pr_count,),
            (REPO_STARS, self.star_count,),
        ]
        .into_iter()
        .map(|(name, value,)| {
            MetricObservation::new(name, value,)
                .with_attribute(ATTRIBUTE_OWNER, self.repository.owner(),)
                .with_attribute(ATTRIBUTE_REPO, self.repository.name(),)
        },)
        .collect()
    }
}

/// A repository that could not be collected.
#[derive(Debug,)]
pub struct RepositoryFailure
{
    /// Repository that failed.
    pub repository: RepositoryId,
    /// Cause of the failure.
    pub error:      Error,
}

/// Outcome of collecting every configured repository.
#[derive(Debug, Default,)]
pub struct Collection
{
    /// Repositories collected successfully, in configuration order.
    pub metrics:  Vec<RepositoryMetrics,>,
    /// Repositories that failed, in configuration order.
    pub failures: Vec<RepositoryFailure,>,
}

/// Splits open items by their pull request marker into `(issues, pulls)`.
pub fn count_issue_kinds(kinds: &[IssueKind],) -> (u64, u64,)
{
    kinds.iter().fold((0, 0,), |(issues, pulls,), kind| match kind {
        IssueKind::Issue => (issues + 1, pulls,),
        IssueKind::PullRequest => (issues, pulls + 1,),
    },)
}

/// Collects the metric set of a single repository.
///
/// # Errors
///
/// Returns the first fetch error for this repository.
pub async fn collect_repository<S,>(source: &S, repository: &RepositoryId,) -> Result<RepositoryMetrics, Error,>
where
    S: GitHubSource,
{
    let kinds = source.open_issue_kinds(repository,).await?;
    let (open_issue_count, open_pr_count,) = count_issue_kinds(&kinds,);
    let star_count = source.star_count(repository,).await?;

    info!(
        "{}: issues={}, prs={}, stars={}",
        repository, open_issue_count, open_pr_count, star_count
    );

    Ok(RepositoryMetrics {
        repository: repository.clone(),
        open_issue_count,
        open_pr_count,
        star_count,
    },)
}

/// Collects every repository sequentially, isolating failures.
pub async fn collect_repositories<S,>(source: &S, repositories: &[RepositoryId],) -> Collection
where
    S: GitHubSource,
{
    let mut collection = Collection {
        metrics: Vec::with_capacity(repositories.len(),), failures: Vec::new(),
    };

    for repository in repositories {
        match collect_repository(source, repository,).await {
            Ok(metrics,) => collection.metrics.push(metrics,),
            Err(error,) => {
                warn!("Skipping {}: {}", repository, error);
                collection.failures.push(RepositoryFailure {
                    repository: repository.clone(),
                    error,
                },);
            }
        }
    }

    collection
}
