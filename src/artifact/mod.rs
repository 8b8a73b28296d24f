//! Artifacts: content-addressed binary fetches registered during rendering.
//!
//! A template contributes an artifact by shipping a `*.artifact.yaml` file.
//! The render engine runs the spec through the template engine, strips the
//! suffix from the destination path and registers the spec here; no file
//! strategy ever touches artifact content. After **all** targets have
//! rendered, [`ArtifactSet::process_all`] resolves each registration
//! sequentially through the [`Processor`], so artifact placement never races
//! with template rendering.

mod processor;

pub use processor::Processor;

use anyhow::Result;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::constants::ARTIFACT_SPEC_VERSION;
use crate::core::{Cancellation, GokError};

/// A parsed and validated `*.artifact.yaml` document.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArtifactSpec {
    /// Format version; must equal [`ARTIFACT_SPEC_VERSION`].
    pub version: u32,

    /// Checksum algorithm; only `sha256` is supported.
    pub algorithm: String,

    /// Expected lowercase hex digest of the artifact bytes.
    pub checksum: String,

    /// Where to fetch the artifact from.
    pub source: ArtifactSource,
}

/// Artifact source; only HTTP is supported.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArtifactSource {
    /// HTTP source details.
    #[serde(default)]
    pub http: Option<HttpSource>,
}

/// An HTTP GET with optional request headers.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HttpSource {
    /// URL to fetch.
    pub url: String,

    /// Headers set on the request.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl ArtifactSpec {
    fn validate(&mut self) -> Result<(), String> {
        if self.version != ARTIFACT_SPEC_VERSION {
            return Err(format!("unsupported artifact spec version: {}", self.version));
        }
        if self.algorithm != "sha256" {
            return Err(format!("unsupported checksum algorithm: {}", self.algorithm));
        }
        if self.checksum.is_empty() {
            return Err("checksum is required".to_string());
        }
        self.checksum = self.checksum.to_lowercase();
        match self.http() {
            None => Err("unsupported source type: only http is supported".to_string()),
            Some(http) if http.url.is_empty() => Err("http source url is required".to_string()),
            Some(_) => Ok(()),
        }
    }

    /// The HTTP source, if declared.
    #[must_use]
    pub fn http(&self) -> Option<&HttpSource> {
        self.source.http.as_ref()
    }
}

/// Artifact registrations collected during a render pass.
#[derive(Debug, Default)]
pub struct ArtifactSet {
    artifacts: BTreeMap<PathBuf, ArtifactSpec>,
}

impl ArtifactSet {
    /// Create an empty registration set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a rendered spec document and store it for later processing at
    /// `dest_path`.
    pub fn register(&mut self, dest_path: PathBuf, rendered_spec: &[u8]) -> Result<()> {
        let parse_error = |reason: String| GokError::ArtifactSpecParse {
            path: dest_path.display().to_string(),
            reason,
        };

        let mut spec: ArtifactSpec =
            serde_yaml::from_slice(rendered_spec).map_err(|e| parse_error(e.to_string()))?;
        spec.validate().map_err(parse_error)?;

        debug!("registered artifact for {}", dest_path.display());
        self.artifacts.insert(dest_path, spec);
        Ok(())
    }

    /// Number of registered artifacts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    /// Whether no artifacts are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    /// Registered destination paths, in sorted order.
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.artifacts.keys().map(PathBuf::as_path)
    }

    /// Resolve every registered artifact sequentially: fetch (or reuse the
    /// cache) and place the verified file at its destination.
    pub async fn process_all(&self, cancel: &Cancellation, processor: &Processor) -> Result<()> {
        if self.artifacts.is_empty() {
            debug!("no artifacts to process");
            return Ok(());
        }

        for (dest_path, spec) in &self.artifacts {
            cancel.check()?;
            let url = spec.http().map(|h| h.url.as_str()).unwrap_or_default();
            info!("processing artifact {} from {url}", dest_path.display());
            processor.process(cancel, dest_path, spec).await?;
        }

        info!("all {} artifacts processed", self.artifacts.len());
        Ok(())
    }
}
