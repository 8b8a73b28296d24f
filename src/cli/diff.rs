//! The `diff` subcommand: a safe, read-only preview of what `apply` would
//! change, including drift detection.

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use tracing::{info, warn};

use crate::archive;
use crate::core::{Cancellation, GokError};
use crate::diff::Comparer;

/// Compare a rendered artifact with an existing output directory.
///
/// Performs the same three-way comparison as `apply` (desired state from
/// the artifact, last known state from the directory's lock file, actual
/// files on disk) without modifying anything. Exits non-zero when conflicts
/// are present.
#[derive(Debug, Args)]
pub struct DiffCommand {
    /// Rendered artifact (.tar or .tar.gz).
    pub artifact: PathBuf,

    /// Live directory to compare against.
    pub current_dir: PathBuf,
}

impl DiffCommand {
    /// Extract the artifact to a temporary directory, compare, report.
    pub async fn execute(self, cancel: &Cancellation) -> Result<()> {
        info!("reading desired state from artifact {}", self.artifact.display());
        let desired = tempfile::Builder::new()
            .prefix("gok-diff-desired-")
            .tempdir()
            .context("creating temp dir")?;

        archive::extract(&self.artifact, desired.path()).context("extracting artifact")?;

        let report = Comparer::new(&self.current_dir, desired.path())
            .compare(cancel)
            .context("comparing states")?;

        report.print();

        if report.has_conflicts() {
            warn!("conflicts detected, resolve them before applying");
            return Err(GokError::ConflictsPresent.into());
        }
        if report.has_changes() {
            info!("changes detected, run 'gok apply' to apply them");
        } else {
            info!("no changes detected, current state matches desired state");
        }

        Ok(())
    }
}
