//! Three-way diff between desired, last-known and actual state.
//!
//! The comparer reads two lock files: the one in the live destination (last
//! known state, may be absent) and the one in the freshly extracted desired
//! tree (must exist). For every path in either lock file it hashes the file
//! currently on disk and classifies the change:
//!
//! - in both lock files: disk differs from last known → **Conflict** (manual
//!   drift); hashes differ between lock files → **Modified**; otherwise
//!   **Unchanged**.
//! - only in the new lock file → **Created**.
//! - only in the old lock file: still on disk but edited → **Conflict**,
//!   otherwise **Removed**.
//!
//! Files created on disk that appear in neither lock file are invisible by
//! design.

use anyhow::{Context, Result};
use colored::Colorize;
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::core::Cancellation;
use crate::lockfile;

/// Classification of a single file's state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// Same content in old lock, new lock and on disk.
    Unchanged,
    /// Present in the desired state only.
    Created,
    /// Desired content differs from the (un-drifted) last known content.
    Modified,
    /// Present in the last known state only, disk matches it (or is gone).
    Removed,
    /// Disk content differs from the last known state: manual drift.
    Conflict,
}

/// The state change for a single file.
#[derive(Debug, Clone)]
pub struct Change {
    /// Classification.
    pub kind: ChangeKind,
    /// Forward-slashed relative path.
    pub path: String,
    /// Hash recorded in the last-known lock file, empty if absent.
    pub old_hash: String,
    /// Hash recorded in the desired lock file, empty if absent.
    pub new_hash: String,
}

/// Aggregated diff result.
#[derive(Debug, Default)]
pub struct Report {
    changes: BTreeMap<String, Change>,
    has_changes: bool,
    has_conflicts: bool,
}

impl Report {
    /// Whether any file was created, modified, removed or conflicted.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        self.has_changes
    }

    /// Whether any conflict (manual drift) was detected.
    #[must_use]
    pub fn has_conflicts(&self) -> bool {
        self.has_conflicts
    }

    /// All recorded changes, keyed and iterated in path order.
    #[must_use]
    pub fn changes(&self) -> &BTreeMap<String, Change> {
        &self.changes
    }

    /// Paths of all recorded changes, sorted ascending.
    #[must_use]
    pub fn sorted_paths(&self) -> Vec<&str> {
        self.changes.keys().map(String::as_str).collect()
    }

    /// Print the report to stdout, one line per change.
    pub fn print(&self) {
        for change in self.changes.values() {
            match change.kind {
                ChangeKind::Created => println!("{}", format!("+ {}", change.path).green()),
                ChangeKind::Modified => println!("{}", format!("~ {}", change.path).yellow()),
                ChangeKind::Removed => println!("{}", format!("- {}", change.path).red()),
                ChangeKind::Conflict => {
                    println!("{}", format!("! {} (conflict)", change.path).bright_red());
                }
                ChangeKind::Unchanged => {}
            }
        }
    }

    fn add(&mut self, kind: ChangeKind, path: &str, old_hash: &str, new_hash: &str) {
        if kind == ChangeKind::Unchanged {
            return;
        }
        self.changes.insert(
            path.to_string(),
            Change {
                kind,
                path: path.to_string(),
                old_hash: old_hash.to_string(),
                new_hash: new_hash.to_string(),
            },
        );
        self.has_changes = true;
        if kind == ChangeKind::Conflict {
            self.has_conflicts = true;
        }
    }
}

/// Performs the comparison between the live destination and a desired tree.
pub struct Comparer {
    current_dir: PathBuf,
    desired_dir: PathBuf,
}

impl Comparer {
    /// `current_dir` is the live destination; `desired_dir` holds the
    /// freshly extracted desired state including its lock file.
    pub fn new(current_dir: impl Into<PathBuf>, desired_dir: impl Into<PathBuf>) -> Self {
        Self {
            current_dir: current_dir.into(),
            desired_dir: desired_dir.into(),
        }
    }

    /// Run the three-way comparison.
    pub fn compare(&self, cancel: &Cancellation) -> Result<Report> {
        let old_lock = lockfile::read(&self.current_dir)
            .with_context(|| format!("reading lock file in {}", self.current_dir.display()))?;
        let new_lock = lockfile::read_required(&self.desired_dir)
            .context("reading desired state lock file")?;

        let mut report = Report::default();

        let mut all_paths: Vec<&String> = old_lock.files.keys().collect();
        all_paths.extend(new_lock.files.keys());
        all_paths.sort();
        all_paths.dedup();

        for path in all_paths {
            cancel.check()?;

            let old_entry = old_lock.files.get(path);
            let new_entry = new_lock.files.get(path);
            let actual_hash = self.actual_hash(path)?;

            match (old_entry, new_entry) {
                (Some(old), Some(new)) => {
                    if old.hash != actual_hash {
                        report.add(ChangeKind::Conflict, path, &old.hash, &new.hash);
                    } else if old.hash != new.hash {
                        report.add(ChangeKind::Modified, path, &old.hash, &new.hash);
                    } else {
                        report.add(ChangeKind::Unchanged, path, &old.hash, &new.hash);
                    }
                }
                (None, Some(new)) => report.add(ChangeKind::Created, path, "", &new.hash),
                (Some(old), None) => {
                    if !actual_hash.is_empty() && old.hash != actual_hash {
                        report.add(ChangeKind::Conflict, path, &old.hash, "");
                    } else {
                        report.add(ChangeKind::Removed, path, &old.hash, "");
                    }
                }
                (None, None) => unreachable!("path came from one of the lock files"),
            }
        }

        Ok(report)
    }

    /// Hash of the file currently on disk, or empty when it does not exist.
    fn actual_hash(&self, path: &str) -> Result<String> {
        let on_disk = lockfile::entry_path(&self.current_dir, path);
        if !on_disk.exists() {
            return Ok(String::new());
        }
        lockfile::file_sha256(&on_disk)
    }
}

/// Convenience accessor used by tests and the apply executor.
impl Report {
    /// Look up a change by path.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&Change> {
        self.changes.get(path)
    }
}
