//! Error handling for the rendering pipeline.
//!
//! The error system follows two principles:
//! 1. **Typed kinds** ([`GokError`]) for every failure mode the pipeline can
//!    produce, so callers can match on what went wrong.
//! 2. **User-facing presentation** ([`ErrorContext`]) that turns an error
//!    chain into a colored message with an actionable suggestion where one
//!    exists.
//!
//! Most functions in this crate return [`anyhow::Result`] and attach context
//! with `.with_context(...)`; the typed variants below are constructed at
//! the point where the failure is first classified and survive downcasting
//! at the CLI boundary.

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// All failure kinds the render/diff/apply pipeline can report.
#[derive(Error, Debug)]
pub enum GokError {
    /// The manifest file could not be parsed.
    #[error("invalid manifest {file}: {reason}")]
    ManifestParse {
        /// Path of the manifest that failed to parse.
        file: String,
        /// Parser diagnostics, including location information.
        reason: String,
    },

    /// A template manifest (`gok-template.yaml`) could not be parsed.
    #[error("invalid template manifest {file}: {reason}")]
    TemplateManifestParse {
        /// Path of the template manifest.
        file: String,
        /// Parser diagnostics.
        reason: String,
    },

    /// A deletions file (`gok-deletions.yaml`) could not be parsed.
    #[error("invalid deletions file {file}: {reason}")]
    DeletionsParse {
        /// Path of the deletions file.
        file: String,
        /// Parser diagnostics.
        reason: String,
    },

    /// A rendered artifact specification was invalid.
    #[error("invalid artifact spec for {path}: {reason}")]
    ArtifactSpecParse {
        /// Destination path the spec was registered for.
        path: String,
        /// Validation or parser diagnostics.
        reason: String,
    },

    /// A lock file could not be parsed.
    #[error("invalid lock file {file}: {reason}")]
    LockfileParse {
        /// Path of the lock file.
        file: String,
        /// Parser diagnostics.
        reason: String,
    },

    /// A versioned document declared a version this build does not support.
    #[error("unsupported {kind} version {found} (expected {expected})")]
    UnsupportedVersion {
        /// Document kind, e.g. "manifest" or "lock file".
        kind: &'static str,
        /// Version found in the document.
        found: u32,
        /// Version this build supports.
        expected: u32,
    },

    /// An absolute path was supplied where a relative one is required.
    #[error("path must be relative: {path}")]
    InvalidPath {
        /// The offending path.
        path: String,
    },

    /// A resolved path escaped its pinned base directory.
    #[error("path {path} escapes base directory {base}")]
    PathEscape {
        /// The pinned base directory.
        base: String,
        /// The escaping path.
        path: String,
    },

    /// A template declared a required import that no value source provides.
    #[error("required value {key:?} not found for template {template:?}")]
    RequiredValueMissing {
        /// Dotted key of the missing import.
        key: String,
        /// Template that declared the import.
        template: String,
    },

    /// A dotted-path assignment hit an existing non-mapping segment.
    #[error("cannot set nested value at {path:?}: segment {segment:?} is not a mapping")]
    NonMapSegment {
        /// Full dotted path of the assignment.
        path: String,
        /// Prefix that resolved to a non-mapping.
        segment: String,
    },

    /// Template inheritance revisited a template already on the chain.
    #[error("template inheritance cycle detected: {chain}")]
    InheritanceCycle {
        /// The chain, rendered as `a -> b -> a`.
        chain: String,
    },

    /// Rendering a text template failed (parse or strict missing-key).
    #[error("rendering template {name}: {reason}")]
    TemplateRender {
        /// Source file of the template.
        name: String,
        /// Flattened engine error chain.
        reason: String,
    },

    /// A file strategy failed to produce its destination file.
    #[error("strategy {strategy:?} failed for {path}: {reason}")]
    StrategyApply {
        /// Name of the strategy that failed.
        strategy: String,
        /// Destination path.
        path: String,
        /// Underlying failure.
        reason: String,
    },

    /// An artifact download failed (transport error or non-2xx status).
    #[error("fetching {url}: {reason}")]
    FetchError {
        /// Requested URL.
        url: String,
        /// Transport or status diagnostics.
        reason: String,
    },

    /// Downloaded artifact bytes did not hash to the declared checksum.
    #[error("checksum mismatch for {path}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// Destination path of the artifact.
        path: String,
        /// Checksum declared in the spec.
        expected: String,
        /// Checksum computed from the downloaded bytes.
        actual: String,
    },

    /// Conflicts were detected and `--force` was not given.
    #[error("conflicts detected, refusing to apply without --force")]
    ConflictsPresent,

    /// The operation was cancelled.
    #[error("operation cancelled")]
    Cancelled,

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// An error plus optional presentation hints for the CLI.
///
/// Wraps the original error chain so the full cause list can be displayed,
/// and attaches a suggestion when the failure has a well-known remedy.
#[derive(Debug)]
pub struct ErrorContext {
    /// The wrapped error chain.
    pub error: anyhow::Error,
    /// Actionable advice, shown in green.
    pub suggestion: Option<String>,
}

impl ErrorContext {
    /// Wrap an error without any suggestion.
    pub fn new(error: anyhow::Error) -> Self {
        Self {
            error,
            suggestion: None,
        }
    }

    /// Attach a suggestion for resolving the error.
    #[must_use]
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Print the error (and its cause chain) to stderr with colors.
    ///
    /// The output passes through the global redactor so secrets that leaked
    /// into an error message are masked like any other log line.
    pub fn display(&self) {
        let mut out = format!("{}: {:#}", "error".red().bold(), self.error);
        if let Some(suggestion) = &self.suggestion {
            out.push_str(&format!("\n{}: {}", "suggestion".green(), suggestion));
        }
        let redacted = crate::logging::Redactor::global().redact(out.as_bytes());
        eprintln!("{}", String::from_utf8_lossy(&redacted));
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#}", self.error)?;
        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }
        Ok(())
    }
}

/// Convert any error into an [`ErrorContext`] with a suggestion where the
/// failure kind has a well-known remedy.
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    let suggestion = match error.downcast_ref::<GokError>() {
        Some(GokError::ConflictsPresent) => Some(
            "Files in the destination were modified outside the pipeline. \
             Inspect the conflicting paths, then re-run with --force to overwrite them"
                .to_string(),
        ),
        Some(GokError::ChecksumMismatch { .. }) => Some(
            "The downloaded artifact does not match its declared checksum. \
             Verify the URL and the checksum in the *.artifact.yaml spec"
                .to_string(),
        ),
        Some(GokError::UnsupportedVersion { kind, expected, .. }) => Some(format!(
            "Update the {kind} to version {expected} or use a build that supports its version"
        )),
        Some(GokError::RequiredValueMissing { key, .. }) => Some(format!(
            "Provide {key:?} in the manifest, a target, a values file (-f) or a -v flag"
        )),
        Some(GokError::PathEscape { .. }) => Some(
            "Paths in manifests and templates must stay within their base directory; \
             remove any '..' segments"
                .to_string(),
        ),
        _ => None,
    };

    ErrorContext { error, suggestion }
}
