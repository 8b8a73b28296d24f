//! Explicit deletions: `gok-deletions.yaml`.
//!
//! A template may remove files that an earlier layer (often an inherited
//! base) placed into the target output. Deletions run before the template's
//! own files are written.

use anyhow::Result;
use serde::Deserialize;
use std::fs::File;
use std::path::Path;

use crate::constants::{DELETIONS_FILE_NAME, DELETIONS_VERSION};
use crate::core::GokError;

/// Deletions document.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeletionsFile {
    /// Format version; must equal [`DELETIONS_VERSION`].
    pub version: u32,

    /// Paths to remove, relative to the target's output root.
    #[serde(default)]
    pub deletions: Vec<Deletion>,
}

/// One deletion entry.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Deletion {
    /// Path relative to the target output root.
    pub path: String,

    /// Remove a whole directory tree instead of a single file.
    #[serde(default)]
    pub recursive: bool,
}

/// Find and parse `gok-deletions.yaml` in a template directory.
///
/// A missing file is not an error.
pub fn read_deletions(dir: &Path) -> Result<Option<DeletionsFile>> {
    let path = dir.join(DELETIONS_FILE_NAME);
    let file = match File::open(&path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(
                anyhow::Error::new(e).context(format!("open deletions file {}", path.display()))
            )
        }
    };

    let deletions: DeletionsFile =
        serde_yaml::from_reader(file).map_err(|e| GokError::DeletionsParse {
            file: path.display().to_string(),
            reason: e.to_string(),
        })?;

    if deletions.version != DELETIONS_VERSION {
        return Err(GokError::UnsupportedVersion {
            kind: "deletions file",
            found: deletions.version,
            expected: DELETIONS_VERSION,
        }
        .into());
    }

    Ok(Some(deletions))
}
