//! Verbatim copy strategy, the registry fallback.

use anyhow::{Context, Result};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, warn};

use crate::core::Cancellation;
use crate::strategy::FileStrategy;
use crate::utils::fs::ensure_parent_dir;

/// Streams bytes verbatim to the destination.
///
/// When the destination exists and overwriting is disabled, the file is
/// skipped with a warning rather than failing the render.
pub struct CopyStrategy {
    overwrite: bool,
}

impl CopyStrategy {
    /// Create a copy strategy; `overwrite` controls whether existing
    /// destinations are replaced.
    #[must_use]
    pub fn new(overwrite: bool) -> Self {
        Self { overwrite }
    }
}

impl FileStrategy for CopyStrategy {
    fn name(&self) -> &'static str {
        "copy-only"
    }

    fn apply(&self, cancel: &Cancellation, src: &mut dyn Read, dst: &Path) -> Result<()> {
        cancel.check()?;
        debug!("[copy-only] copying to {}", dst.display());

        ensure_parent_dir(dst)?;

        if dst.exists() && !self.overwrite {
            warn!("destination exists, skipping: {}", dst.display());
            return Ok(());
        }

        let mut file =
            File::create(dst).with_context(|| format!("create {}", dst.display()))?;
        std::io::copy(src, &mut file)
            .with_context(|| format!("copy to {}", dst.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Cursor;
    use tempfile::tempdir;

    #[test]
    fn test_copy_creates_file_and_parents() {
        let temp = tempdir().unwrap();
        let dst = temp.path().join("sub").join("file.txt");

        CopyStrategy::new(false)
            .apply(&Cancellation::new(), &mut Cursor::new(b"payload"), &dst)
            .unwrap();
        assert_eq!(fs::read_to_string(&dst).unwrap(), "payload");
    }

    #[test]
    fn test_copy_skips_existing_without_overwrite() {
        let temp = tempdir().unwrap();
        let dst = temp.path().join("file.txt");
        fs::write(&dst, "original").unwrap();

        CopyStrategy::new(false)
            .apply(&Cancellation::new(), &mut Cursor::new(b"new"), &dst)
            .unwrap();
        assert_eq!(fs::read_to_string(&dst).unwrap(), "original");
    }

    #[test]
    fn test_copy_overwrites_when_enabled() {
        let temp = tempdir().unwrap();
        let dst = temp.path().join("file.txt");
        fs::write(&dst, "original").unwrap();

        CopyStrategy::new(true)
            .apply(&Cancellation::new(), &mut Cursor::new(b"new"), &dst)
            .unwrap();
        assert_eq!(fs::read_to_string(&dst).unwrap(), "new");
    }

    #[test]
    fn test_copy_honors_cancellation() {
        let temp = tempdir().unwrap();
        let dst = temp.path().join("file.txt");

        let cancel = Cancellation::new();
        cancel.cancel();
        let err = CopyStrategy::new(false)
            .apply(&cancel, &mut Cursor::new(b"x"), &dst)
            .unwrap_err();
        assert!(err.to_string().contains("cancelled"));
        assert!(!dst.exists());
    }
}
