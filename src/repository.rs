// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
//
// SPDX-License-Identifier: MIT

//! Repository identifiers supplied through configuration.
//!
//! Identifiers are parsed from the `owner/name` form used across the GitHub
//! API. Leading and trailing whitespace is trimmed; both halves must be
//! non-empty and free of whitespace and additional separators.

use std::{fmt, str::FromStr};

use serde::Serialize;

use crate::error::Error;

/// Repositories collected when no explicit list is configured.
pub const DEFAULT_REPOSITORIES: &[&str] = &[
    "open-telemetry/opentelemetry-java-instrumentation",
    "open-telemetry/opentelemetry-java",
];

/// Immutable `(owner, name)` pair identifying a GitHub repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize,)]
pub struct RepositoryId
{
    owner: String,
    name:  String,
}

impl RepositoryId
{
    /// Creates an identifier from already validated parts.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] when either part is empty or contains
    /// whitespace or `/`.
    pub fn new(owner: &str, name: &str,) -> Result<Self, Error,>
    {
        Ok(Self {
            owner: normalize_part(owner, "owner",)?, name: normalize_part(name, "name",)?,
        },)
    }

    /// Account or organization that owns the repository.
    pub fn owner(&self,) -> &str
    {
        &self.owner
    }

    /// Repository name without the owner prefix.
    pub fn name(&self,) -> &str
    {
        &self.name
    }
}

impl FromStr for RepositoryId
{
    type Err = Error;

    /// Parses `owner/name`.
    ///
    /// # Examples
    ///
    /// ```
    /// use github_metrics::RepositoryId;
    ///
    /// let id: RepositoryId = " open-telemetry/opentelemetry-java ".parse()?;
    /// assert_eq!(id.owner(), "open-telemetry");
    /// assert_eq!(id.name(), "opentelemetry-java");
    /// # Ok::<(), github_metrics::Error>(())
    /// ```
    fn from_str(input: &str,) -> Result<Self, Self::Err,>
    {
        let trimmed = input.trim();
        let (owner, name,) = trimmed.split_once('/',).ok_or_else(|| {
            Error::configuration(format!("repository '{trimmed}' must use the owner/name form"),)
        },)?;

        Self::new(owner, name,)
    }
}

impl fmt::Display for RepositoryId
{
    fn fmt(&self, f: &mut fmt::Formatter<'_,>,) -> fmt::Result
    {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Parses a list of `owner/name` strings, falling back to
/// [`DEFAULT_REPOSITORIES`] when every entry is blank.
///
/// Duplicates are dropped while preserving the first occurrence, so a
/// repository is never collected twice in one run.
///
/// # Errors
///
/// Returns [`Error::Configuration`] for the first malformed entry.
pub fn parse_repository_list<S,>(entries: &[S],) -> Result<Vec<RepositoryId,>, Error,>
where
    S: AsRef<str,>,
{
    let mut repositories: Vec<RepositoryId,> = Vec::with_capacity(entries.len(),);

    for entry in entries.iter().map(AsRef::as_ref,).filter(|entry| !entry.trim().is_empty(),) {
        let repository = entry.parse::<RepositoryId>()?;
        if !repositories.contains(&repository,) {
            repositories.push(repository,);
        }
    }

    if repositories.is_empty() {
        return DEFAULT_REPOSITORIES.iter().map(|entry| entry.parse(),).collect();
    }

    Ok(repositories,)
}

fn normalize_part(input: &str, label: &str,) -> Result<String, Error,>
{
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(Error::configuration(format!("repository {label} cannot be empty"),),);
    }

    if trimmed.chars().any(|c| c.is_whitespace() || c == '/',) {
        return Err(Error::configuration(format!(
            "repository {label} '{trimmed}' must not contain whitespace or '/'"
        ),),);
    }

    Ok(trimmed.to_owned(),)
}
