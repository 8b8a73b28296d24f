//! Reserved file names and on-disk format versions.
//!
//! Every versioned document the renderer reads or writes is pinned here so
//! that version checks and file-name matching stay in one place.

/// Manifest file name expected next to the template tree (`gok-manifest.yaml`).
pub const MANIFEST_FILE_NAME: &str = "gok-manifest.yaml";
/// Supported manifest format version.
pub const MANIFEST_VERSION: u32 = 1;

/// Optional per-template metadata file.
pub const TEMPLATE_MANIFEST_FILE_NAME: &str = "gok-template.yaml";
/// Supported template manifest format version.
pub const TEMPLATE_MANIFEST_VERSION: u32 = 1;

/// Optional per-template deletions file.
pub const DELETIONS_FILE_NAME: &str = "gok-deletions.yaml";
/// Supported deletions file format version.
pub const DELETIONS_VERSION: u32 = 1;

/// Lock file written at the root of a rendered work tree.
pub const LOCK_FILE_NAME: &str = "gok-lock.yaml";
/// Supported lock file format version.
pub const LOCK_FILE_VERSION: u32 = 1;

/// Supported version for `-f` value override files.
pub const OVERRIDES_FILE_VERSION: u32 = 1;

/// Supported artifact specification version.
pub const ARTIFACT_SPEC_VERSION: u32 = 1;

/// Marker inside a file name that routes the file through the template
/// engine. The first occurrence is stripped from the destination name:
/// `server.templ.properties` renders to `server.properties`.
pub const TEMPLATE_INFIX: &str = ".templ";

/// Suffix identifying artifact specification files. The suffix is stripped
/// from the destination path; the artifact is placed there after rendering.
pub const ARTIFACT_SUFFIX: &str = ".artifact.yaml";

/// Environment variable prefix for configuration overrides.
pub const ENV_PREFIX: &str = "GOK";
