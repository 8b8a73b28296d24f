//! The apply executor: reconcile a destination directory with a desired
//! state tree.
//!
//! Consumes a diff [`Report`] and performs the file operations on the
//! destination: created/modified/conflicting files are copied from the
//! desired tree, removed files are deleted, and finally the desired lock
//! file is installed to commit the new state.
//!
//! A failure mid-apply leaves the destination partially updated; the next
//! diff classifies the residual drift. This is documented behavior, not a
//! transaction.

use anyhow::{Context, Result};
use std::path::Path;
use tracing::{info, warn};

use crate::constants::LOCK_FILE_NAME;
use crate::core::{Cancellation, GokError};
use crate::diff::{ChangeKind, Comparer, Report};
use crate::lockfile::entry_path;
use crate::utils::fs::copy_file;

/// Flags controlling an apply run.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApplyOptions {
    /// Print the report and stop before touching the destination.
    pub dry_run: bool,
    /// Proceed even when conflicts are present, overwriting drifted files.
    pub force: bool,
}

/// Diff `desired_dir` against `destination`, print the report, and apply the
/// changes unless `dry_run` is set.
///
/// Fails with [`GokError::ConflictsPresent`] when conflicts exist and
/// `force` is not set.
pub fn run(
    cancel: &Cancellation,
    desired_dir: &Path,
    destination: &Path,
    opts: ApplyOptions,
) -> Result<Report> {
    let report = Comparer::new(destination, desired_dir)
        .compare(cancel)
        .context("compare desired and current state")?;

    report.print();

    if opts.dry_run {
        info!("dry-run mode enabled, no changes will be applied");
        return Ok(report);
    }

    if report.has_conflicts() && !opts.force {
        return Err(GokError::ConflictsPresent.into());
    }

    if !report.has_changes() {
        info!("no changes detected, nothing to apply");
        return Ok(report);
    }

    execute(cancel, &report, desired_dir, destination)?;
    Ok(report)
}

/// Perform the file operations for an already-computed report.
pub fn execute(
    cancel: &Cancellation,
    report: &Report,
    desired_dir: &Path,
    destination: &Path,
) -> Result<()> {
    info!("applying changes to {}", destination.display());

    for path in report.sorted_paths() {
        cancel.check()?;
        let change = report.get(path).expect("sorted_paths come from the report");

        let src = entry_path(desired_dir, path);
        let dst = entry_path(destination, path);

        match change.kind {
            ChangeKind::Created | ChangeKind::Modified | ChangeKind::Conflict => {
                info!("copy {path}");
                copy_file(&src, &dst).with_context(|| format!("copy {path}"))?;
            }
            ChangeKind::Removed => {
                info!("remove {path}");
                match std::fs::remove_file(&dst) {
                    Ok(()) => {}
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                        warn!("file {path} already removed");
                    }
                    Err(e) => {
                        return Err(anyhow::Error::new(e).context(format!("remove {path}")))
                    }
                }
            }
            ChangeKind::Unchanged => {}
        }
    }

    // install the new lock file to commit the state transition
    copy_file(
        &desired_dir.join(LOCK_FILE_NAME),
        &destination.join(LOCK_FILE_NAME),
    )
    .context("update lock file in destination")?;

    info!("apply completed");
    Ok(())
}
