//! Filesystem primitives used throughout the pipeline.
//!
//! Writes that must never be observed half-done (lock files, artifact cache
//! inserts) go through [`atomic_write`], a write-then-rename so readers see
//! either the old content or the new content, never a partial file.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Ensure a directory exists, creating it and all parents if necessary.
///
/// Returns an error if the path exists but is not a directory.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)
            .with_context(|| format!("failed to create directory {}", path.display()))?;
    } else if !path.is_dir() {
        anyhow::bail!("path exists but is not a directory: {}", path.display());
    }
    Ok(())
}

/// Ensure the parent directory of `path` exists.
pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    Ok(())
}

/// Atomically write `content` to `path` using a temp-file-then-rename.
///
/// The temporary file lives next to the destination so the rename stays on
/// one filesystem. Parent directories are created as needed.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    use std::io::Write;

    ensure_parent_dir(path)?;

    let temp_path = path.with_extension("tmp");
    {
        let mut file = fs::File::create(&temp_path)
            .with_context(|| format!("failed to create temp file {}", temp_path.display()))?;
        file.write_all(content)
            .with_context(|| format!("failed to write temp file {}", temp_path.display()))?;
        file.sync_all().context("failed to sync file to disk")?;
    }

    fs::rename(&temp_path, path)
        .with_context(|| format!("failed to rename temp file to {}", path.display()))?;
    Ok(())
}

/// Copy a regular file, creating parent directories for the destination.
pub fn copy_file(src: &Path, dst: &Path) -> Result<()> {
    ensure_parent_dir(dst)?;
    fs::copy(src, dst)
        .with_context(|| format!("failed to copy {} to {}", src.display(), dst.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_ensure_dir_nested() {
        let temp = tempdir().unwrap();
        let dir = temp.path().join("a").join("b").join("c");
        ensure_dir(&dir).unwrap();
        assert!(dir.is_dir());
        // idempotent
        ensure_dir(&dir).unwrap();
    }

    #[test]
    fn test_ensure_dir_rejects_file() {
        let temp = tempdir().unwrap();
        let file = temp.path().join("file.txt");
        fs::write(&file, "x").unwrap();
        assert!(ensure_dir(&file).is_err());
    }

    #[test]
    fn test_atomic_write_creates_parents_and_overwrites() {
        let temp = tempdir().unwrap();
        let file = temp.path().join("deep").join("lock.yaml");

        atomic_write(&file, b"first").unwrap();
        assert_eq!(fs::read_to_string(&file).unwrap(), "first");

        atomic_write(&file, b"second").unwrap();
        assert_eq!(fs::read_to_string(&file).unwrap(), "second");

        // no stray temp file left behind
        assert!(!file.with_extension("tmp").exists());
    }

    #[test]
    fn test_copy_file_creates_parents() {
        let temp = tempdir().unwrap();
        let src = temp.path().join("src.txt");
        fs::write(&src, "content").unwrap();

        let dst = temp.path().join("sub").join("dst.txt");
        copy_file(&src, &dst).unwrap();
        assert_eq!(fs::read_to_string(&dst).unwrap(), "content");
    }
}
