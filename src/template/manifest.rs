//! Per-template metadata: `gok-template.yaml`.
//!
//! The template manifest declares how a template presents itself in
//! diagnostics (name, description, maintainers), which values it imports,
//! and which templates it inherits from.
//!
//! Imports are **scoped**: values, secrets and read-only handles are
//! declared in separate sections, and only declared keys become visible to
//! the template's files. An older flat dialect (`imports: { key: ... }`)
//! exists in the wild; it is rejected with a parse error rather than
//! silently coerced.

use anyhow::Result;
use serde::Deserialize;
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;

use crate::constants::{TEMPLATE_MANIFEST_FILE_NAME, TEMPLATE_MANIFEST_VERSION};
use crate::core::GokError;
use crate::values::Values;

/// Template metadata document.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TemplateManifest {
    /// Format version; must equal [`TEMPLATE_MANIFEST_VERSION`].
    pub version: u32,

    /// Human-readable template name for diagnostics.
    #[serde(default)]
    pub name: String,

    /// One-line description, logged while rendering.
    #[serde(default)]
    pub description: String,

    /// People responsible for this template.
    #[serde(default)]
    pub maintainers: Vec<Maintainer>,

    /// The sole contract by which values enter the template.
    #[serde(default)]
    pub imports: Imports,

    /// Parent templates applied before this one.
    #[serde(default)]
    pub inherits: Vec<InheritSpec>,
}

/// A template maintainer.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Maintainer {
    /// Maintainer name.
    pub name: String,
    /// Contact email, optional.
    #[serde(default)]
    pub email: Option<String>,
}

/// Scoped import declarations.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Imports {
    /// Dotted value keys resolved against the effective value chain.
    #[serde(default)]
    pub values: BTreeMap<String, ImportRequirement>,

    /// Dotted keys resolved against the secrets tree only.
    #[serde(default)]
    pub secrets: BTreeMap<String, ImportRequirement>,

    /// Request a read-only handle to the current target's record.
    #[serde(default)]
    pub target: Option<HandleRequest>,

    /// Whitelisted read-only access to other targets' resolved values.
    #[serde(default)]
    pub targets: BTreeMap<String, TargetAccess>,

    /// Older dialect: request a handle to the whole manifest.
    #[serde(default)]
    pub manifest: Option<HandleRequest>,
}

/// Declaration of a single imported key.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImportRequirement {
    /// Why the template needs this key; shown when the import fails.
    #[serde(default)]
    pub description: String,

    /// When true, rendering fails if no value source provides the key.
    #[serde(default)]
    pub required: bool,

    /// Fallback for non-required imports. May be null.
    #[serde(default)]
    pub default: Option<Value>,
}

/// A bare "give me this handle" request with a description.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HandleRequest {
    /// Why the template needs the handle.
    #[serde(default)]
    pub description: String,
}

/// Declaration of cross-target value access.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetAccess {
    /// Why the template reads this target.
    #[serde(default)]
    pub description: String,

    /// Per-key documentation of what is read. Informational.
    #[serde(default)]
    pub values: BTreeMap<String, ImportRequirement>,
}

/// A parent template to apply before this one.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InheritSpec {
    /// Parent template directory, relative to this template's directory.
    pub path: String,

    /// Values passed to the parent, merged over this application's values.
    #[serde(default)]
    pub values: Values,

    /// Apply the parent at most once per target, even if several templates
    /// inherit it.
    #[serde(default)]
    pub single: bool,
}

impl TemplateManifest {
    /// The template's display name, falling back to the directory name.
    #[must_use]
    pub fn name_or_default(&self, dir: &Path) -> String {
        if self.name.is_empty() {
            dir.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| dir.display().to_string())
        } else {
            self.name.clone()
        }
    }

    /// Maintainers as a single `name <email>, name` line.
    #[must_use]
    pub fn maintainer_string(&self) -> String {
        self.maintainers
            .iter()
            .map(|m| match &m.email {
                Some(email) => format!("{} <{}>", m.name, email),
                None => m.name.clone(),
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Find and parse `gok-template.yaml` in a template directory.
///
/// A missing file is not an error: most templates carry no manifest.
pub fn read_template_manifest(dir: &Path) -> Result<Option<TemplateManifest>> {
    let path = dir.join(TEMPLATE_MANIFEST_FILE_NAME);
    let file = match File::open(&path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(anyhow::Error::new(e)
                .context(format!("open template manifest {}", path.display())))
        }
    };

    let manifest: TemplateManifest = serde_yaml::from_reader(file).map_err(|e| {
        let mut reason = e.to_string();
        // the flat dialect shows up as unknown fields inside `imports`
        if reason.contains("unknown field") && reason.contains("secrets") {
            reason.push_str(
                "; imports must use the scoped form (values, secrets, target, targets, manifest)",
            );
        }
        GokError::TemplateManifestParse {
            file: path.display().to_string(),
            reason,
        }
    })?;

    if manifest.version != TEMPLATE_MANIFEST_VERSION {
        return Err(GokError::UnsupportedVersion {
            kind: "template manifest",
            found: manifest.version,
            expected: TEMPLATE_MANIFEST_VERSION,
        }
        .into());
    }

    Ok(Some(manifest))
}
