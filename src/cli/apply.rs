//! The `apply` subcommand.

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use tracing::info;

use crate::apply::{self, ApplyOptions};
use crate::archive;
use crate::core::Cancellation;

/// Apply a rendered artifact to a destination directory.
///
/// Performs the same comparison as `diff` first. When files in the
/// destination were modified outside the pipeline (conflicts), the command
/// aborts unless `--force` is given.
#[derive(Debug, Args)]
pub struct ApplyCommand {
    /// Rendered artifact (.tar or .tar.gz).
    pub artifact: PathBuf,

    /// Destination directory to reconcile.
    #[arg(short = 'd', long = "destination", required = true)]
    pub destination: PathBuf,

    /// Preview the changes without applying them.
    #[arg(short = 'n', long = "dry-run")]
    pub dry_run: bool,

    /// Apply even when conflicts are detected, overwriting drifted files.
    #[arg(short = 'f', long = "force")]
    pub force: bool,
}

impl ApplyCommand {
    /// Extract the artifact, diff against the destination and reconcile.
    pub async fn execute(self, cancel: &Cancellation) -> Result<()> {
        info!("reading desired state from artifact {}", self.artifact.display());
        let desired = tempfile::Builder::new()
            .prefix("gok-apply-desired-")
            .tempdir()
            .context("create temp dir for desired state")?;

        archive::extract(&self.artifact, desired.path())
            .with_context(|| format!("extract artifact {}", self.artifact.display()))?;

        apply::run(
            cancel,
            desired.path(),
            &self.destination,
            ApplyOptions {
                dry_run: self.dry_run,
                force: self.force,
            },
        )?;

        Ok(())
    }
}
