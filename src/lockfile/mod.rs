//! The lock file: a record of the rendered tree.
//!
//! `gok-lock.yaml` maps every regular file of a rendered work tree (except
//! the lock file itself) to its SHA-256 hash, modification time and size.
//! The differ uses it as the "last known" and "desired" states of a
//! three-way comparison, so a file listed here is by definition one the
//! renderer produced; files outside the lock file are invisible to
//! reconciliation.
//!
//! Keys are forward-slashed relative paths, emitted in lexicographic order.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::constants::{LOCK_FILE_NAME, LOCK_FILE_VERSION};
use crate::core::{Cancellation, GokError};
use crate::utils::fs::atomic_write;

/// The lock file document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockFile {
    /// Format version; must equal [`LOCK_FILE_VERSION`].
    pub version: u32,

    /// UTC timestamp of lock file generation.
    #[serde(rename = "generatedAt")]
    pub generated_at: DateTime<Utc>,

    /// Forward-slashed relative path to file metadata, sorted by key.
    #[serde(default)]
    pub files: BTreeMap<String, LockEntry>,
}

/// Metadata recorded for a single file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockEntry {
    /// Lowercase hex SHA-256 of the file contents.
    pub hash: String,
    /// Modification time, UTC.
    pub mtime: DateTime<Utc>,
    /// Size in bytes.
    pub size: u64,
}

impl LockFile {
    /// An empty lock file (no recorded files).
    #[must_use]
    pub fn empty() -> Self {
        Self {
            version: LOCK_FILE_VERSION,
            generated_at: Utc::now(),
            files: BTreeMap::new(),
        }
    }
}

/// Walk `root_dir`, hash every regular file and write `gok-lock.yaml` at the
/// root. Returns the written lock file.
pub fn create(cancel: &Cancellation, root_dir: &Path) -> Result<LockFile> {
    info!("creating lock file for {}", root_dir.display());

    let mut lock = LockFile::empty();

    for entry in WalkDir::new(root_dir).sort_by_file_name() {
        let entry = entry.with_context(|| format!("walk {}", root_dir.display()))?;
        if !entry.file_type().is_file() || entry.file_name() == LOCK_FILE_NAME {
            continue;
        }
        cancel.check()?;

        let path = entry.path();
        let rel = path
            .strip_prefix(root_dir)
            .expect("walked entries live under the walk root");

        let metadata = entry
            .metadata()
            .with_context(|| format!("metadata for {}", path.display()))?;
        let hash = file_sha256(path)?;
        let mtime: DateTime<Utc> = metadata
            .modified()
            .with_context(|| format!("mtime for {}", path.display()))?
            .into();

        lock.files.insert(
            to_slash(rel),
            LockEntry {
                hash,
                mtime,
                size: metadata.len(),
            },
        );
    }

    let lock_path = root_dir.join(LOCK_FILE_NAME);
    let encoded = serde_yaml::to_string(&lock).context("encode lock file")?;
    atomic_write(&lock_path, encoded.as_bytes())
        .with_context(|| format!("write lock file {}", lock_path.display()))?;

    debug!("lock file records {} files", lock.files.len());
    Ok(lock)
}

/// Read the lock file from a directory. An absent file yields an empty lock
/// file; unknown versions and parse failures are errors.
pub fn read(root_dir: &Path) -> Result<LockFile> {
    match try_read(root_dir)? {
        Some(lock) => Ok(lock),
        None => Ok(LockFile::empty()),
    }
}

/// Read the lock file from a directory, failing when it does not exist.
pub fn read_required(root_dir: &Path) -> Result<LockFile> {
    try_read(root_dir)?.with_context(|| {
        format!(
            "no {} found in {}",
            LOCK_FILE_NAME,
            root_dir.display()
        )
    })
}

fn try_read(root_dir: &Path) -> Result<Option<LockFile>> {
    let lock_path = root_dir.join(LOCK_FILE_NAME);
    let file = match File::open(&lock_path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(
                anyhow::Error::new(e).context(format!("open lock file {}", lock_path.display()))
            )
        }
    };

    let lock: LockFile = serde_yaml::from_reader(file).map_err(|e| GokError::LockfileParse {
        file: lock_path.display().to_string(),
        reason: e.to_string(),
    })?;

    if lock.version != LOCK_FILE_VERSION {
        return Err(GokError::UnsupportedVersion {
            kind: "lock file",
            found: lock.version,
            expected: LOCK_FILE_VERSION,
        }
        .into());
    }

    Ok(Some(lock))
}

/// SHA-256 of a file's contents as lowercase hex.
pub fn file_sha256(path: &Path) -> Result<String> {
    let mut file =
        File::open(path).with_context(|| format!("open {} for hashing", path.display()))?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)
        .with_context(|| format!("hash {}", path.display()))?;
    Ok(hex::encode(hasher.finalize()))
}

fn to_slash(path: &Path) -> String {
    let parts: Vec<String> = path
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    parts.join("/")
}

/// Relative path of a lock file key inside a directory.
#[must_use]
pub fn entry_path(dir: &Path, key: &str) -> PathBuf {
    let mut out = dir.to_path_buf();
    for part in key.split('/') {
        out.push(part);
    }
    out
}
