//! Path resolution pinned to a base directory.
//!
//! Every path coming out of a manifest or template is untrusted. The
//! resolver joins it onto a pinned absolute base, lexically cleans the
//! result and rejects anything that is absolute on input or escapes the
//! base after cleaning. The escape check compares whole path components, so
//! `/work/ab` is never mistaken for a child of `/work/a`.

use std::path::{Component, Path, PathBuf};

use crate::core::GokError;

/// Resolves relative paths within a pinned base directory.
#[derive(Debug, Clone)]
pub struct PathResolver {
    base: PathBuf,
}

impl PathResolver {
    /// Pin a resolver to an absolute base directory.
    pub fn new(base: impl Into<PathBuf>) -> Result<Self, GokError> {
        let base = base.into();
        if !base.is_absolute() {
            return Err(GokError::InvalidPath {
                path: base.display().to_string(),
            });
        }
        Ok(Self { base: clean(&base) })
    }

    /// The pinned base directory.
    #[must_use]
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Resolve a relative path to an absolute path inside the base.
    ///
    /// Fails with [`GokError::InvalidPath`] for absolute inputs and with
    /// [`GokError::PathEscape`] when the cleaned result is neither the base
    /// itself nor a strict descendant.
    pub fn resolve(&self, rel: impl AsRef<Path>) -> Result<PathBuf, GokError> {
        let rel = rel.as_ref();
        if rel.is_absolute() {
            return Err(GokError::InvalidPath {
                path: rel.display().to_string(),
            });
        }

        let joined = clean(&self.base.join(rel));
        if joined != self.base && !joined.starts_with(&self.base) {
            return Err(GokError::PathEscape {
                base: self.base.display().to_string(),
                path: joined.display().to_string(),
            });
        }
        Ok(joined)
    }

    /// Join a relative path onto the base without the containment check.
    ///
    /// Template *inputs* resolve against the manifest directory but may
    /// legitimately step outside it (an inherited base template next to the
    /// manifest tree); only *output* paths are confined. Absolute inputs are
    /// still rejected.
    pub fn join(&self, rel: impl AsRef<Path>) -> Result<PathBuf, GokError> {
        let rel = rel.as_ref();
        if rel.is_absolute() {
            return Err(GokError::InvalidPath {
                path: rel.display().to_string(),
            });
        }
        Ok(clean(&self.base.join(rel)))
    }

    /// Inverse of [`resolve`](Self::resolve): the path of `abs` relative to
    /// the base. The same escape rules apply.
    pub fn relative(&self, abs: impl AsRef<Path>) -> Result<PathBuf, GokError> {
        let abs = abs.as_ref();
        if !abs.is_absolute() {
            return Err(GokError::InvalidPath {
                path: abs.display().to_string(),
            });
        }

        let cleaned = clean(abs);
        cleaned
            .strip_prefix(&self.base)
            .map(Path::to_path_buf)
            .map_err(|_| GokError::PathEscape {
                base: self.base.display().to_string(),
                path: cleaned.display().to_string(),
            })
    }
}

/// Lexically clean a path: drop `.` components and resolve `..` against the
/// preceding component. A `..` at the root is dropped, matching the usual
/// lexical-clean semantics for absolute paths.
fn clean(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let ends_with_normal =
                    matches!(out.components().next_back(), Some(Component::Normal(_)));
                if ends_with_normal {
                    out.pop();
                } else if !out.has_root() {
                    // cannot resolve below a relative start, keep the component
                    out.push("..");
                }
                // a ".." at the root is dropped
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
