#![allow(non_shorthand_field_patterns)]
#![doc = "Error taxonomy shared by the collector, analyzer and exporter."]
// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
//
// SPDX-License-Identifier: MIT

//! The derive emitted by [`masterror::Error`] expands pattern matches that
//! trigger the `non_shorthand_field_patterns` lint, so the lint is disabled
//! for this module.
//!
//! Variants map onto the failure classes of a single run: configuration
//! problems abort before any network call, fetch failures are reported per
//! resource and only retried while transient, parse failures abort the manifest source and export failures lose
//! the whole batch.

/// Unified error type returned by every stage of a collection run.
#[derive(Debug, masterror::Error)]
pub enum Error {
    /// A required setting is absent or malformed.
    #[error("invalid configuration: {message}")]
    Configuration {
        /// Human readable description of the offending setting.
        message: String
    },
    /// A remote resource could not be retrieved.
    #[error("failed to fetch {resource}: {message}")]
    Fetch {
        /// Resource that was being fetched, e.g. `owner/name` or a URL.
        resource: String,
        /// Transport or API error reported by the client.
        message:  String
    },
    /// The server refused the request and repeating it cannot help.
    #[error("request for {resource} was rejected with HTTP {status}: {message}")]
    Rejected {
        /// Resource that was being fetched.
        resource: String,
        /// HTTP status code of the response.
        status:   u16,
        /// Error message returned by the server.
        message:  String
    },
    /// The manifest is not valid YAML.
    #[error("failed to parse manifest: {source}")]
    Parse {
        /// Source decoding error from serde_yaml.
        source: serde_yaml::Error
    },
    /// The manifest is valid YAML but does not have the expected structure.
    #[error("unexpected manifest structure: {message}")]
    ManifestShape {
        /// Description of the structural mismatch.
        message: String
    },
    /// A benchmark summary does not have the expected layout.
    #[error("invalid benchmark report: {message}")]
    BenchmarkReport {
        /// Description of the layout problem.
        message: String
    },
    /// Telemetry delivery failed.
    #[error("failed to export metrics: {message}")]
    Export {
        /// Error reported by the telemetry pipeline.
        message: String
    },
    /// Observations could not be serialized for dry-run output.
    #[error("failed to serialize observations: {source}")]
    Serialize {
        /// Underlying serialization error.
        source: serde_json::Error
    }
}

impl Error {
    /// Constructs a configuration error.
    ///
    /// # Parameters
    ///
    /// * `message` - Human-readable description of the invalid setting.
    pub fn configuration<M>(message: M) -> Self
    where
        M: Into<String>
    {
        Self::Configuration {
            message: message.into()
        }
    }

    /// Constructs a fetch error for the named resource.
    ///
    /// # Parameters
    ///
    /// * `resource` - Repository identifier or URL that failed.
    /// * `message` - Error reported by the transport.
    pub fn fetch<R, M>(resource: R, message: M) -> Self
    where
        R: Into<String>,
        M: Into<String>
    {
        Self::Fetch {
            resource: resource.into(),
            message:  message.into()
        }
    }

    /// Constructs an error for a request the server permanently refused.
    pub fn rejected<R, M>(resource: R, status: u16, message: M) -> Self
    where
        R: Into<String>,
        M: Into<String>
    {
        Self::Rejected {
            resource: resource.into(),
            status,
            message: message.into()
        }
    }

    /// Returns `true` for failures that may succeed when retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Fetch { .. })
    }

    /// Constructs a manifest shape error.
    pub fn manifest_shape<M>(message: M) -> Self
    where
        M: Into<String>
    {
        Self::ManifestShape {
            message: message.into()
        }
    }

    /// Constructs a benchmark report error.
    pub fn benchmark_report<M>(message: M) -> Self
    where
        M: Into<String>
    {
        Self::BenchmarkReport {
            message: message.into()
        }
    }

    /// Constructs an export error.
    pub fn export<M>(message: M) -> Self
    where
        M: Into<String>
    {
        Self::Export {
            message: message.into()
        }
    }

    /// Formats the error for diagnostics without the variant name.
    ///
    /// The returned string matches the [`std::fmt::Display`] implementation
    /// and is what the binary prints before exiting.
    pub fn to_display_string(&self) -> String {
        format!("{self}")
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(source: serde_yaml::Error) -> Self {
        Self::Parse {
            source
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(source: serde_json::Error) -> Self {
        Self::Serialize {
            source
        }
    }
}
