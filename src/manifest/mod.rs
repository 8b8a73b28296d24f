//! Manifest parsing, validation and target selection.
//!
//! The manifest (`gok-manifest.yaml`) is the entry point of a render run: it
//! declares global values and a set of named targets, each with an output
//! subdirectory and an ordered list of template layers.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use crate::constants::MANIFEST_VERSION;
use crate::core::GokError;
use crate::values::Values;

/// Top-level manifest document.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    /// Manifest format version; must equal [`MANIFEST_VERSION`].
    pub version: u32,

    /// Global values, lowest precedence. Targets and templates may override.
    #[serde(default)]
    pub values: Values,

    /// Named targets, keyed by target id. A `BTreeMap` keeps iteration
    /// deterministic for `-A` selection and diagnostics.
    pub targets: BTreeMap<String, Target>,
}

/// One renderable output.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Target {
    /// Target id, copied from the map key after parsing. Not encoded.
    #[serde(skip)]
    pub id: String,

    /// Subdirectory of the work tree that receives this target's files.
    /// Required, relative.
    pub output: String,

    /// Labels used for `--tags` selection.
    #[serde(default)]
    pub tags: Vec<String>,

    /// Values scoped to this target.
    #[serde(default)]
    pub values: Values,

    /// Template layers, applied in order. Later layers patch earlier ones.
    #[serde(default)]
    pub templates: Vec<TemplateSpec>,
}

/// One template application within a target.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TemplateSpec {
    /// Template directory, relative to the manifest directory.
    pub path: String,

    /// Values scoped to this template application.
    #[serde(default)]
    pub values: Values,
}

impl Target {
    fn validate(&self) -> Result<()> {
        if self.output.trim().is_empty() {
            anyhow::bail!("output is required");
        }
        if self.templates.is_empty() {
            anyhow::bail!("at least one template is required");
        }
        for (i, template) in self.templates.iter().enumerate() {
            if template.path.trim().is_empty() {
                anyhow::bail!("template[{}]: path is required", i + 1);
            }
        }
        Ok(())
    }
}

/// Read and validate a manifest file. Returns the manifest together with
/// the directory that contains it (template paths resolve against it).
pub fn read_manifest(path: &Path) -> Result<(Manifest, PathBuf)> {
    let file =
        File::open(path).with_context(|| format!("open manifest {}", path.display()))?;

    let mut manifest: Manifest =
        serde_yaml::from_reader(file).map_err(|e| GokError::ManifestParse {
            file: path.display().to_string(),
            reason: e.to_string(),
        })?;

    if manifest.version != MANIFEST_VERSION {
        return Err(GokError::UnsupportedVersion {
            kind: "manifest",
            found: manifest.version,
            expected: MANIFEST_VERSION,
        }
        .into());
    }

    if manifest.targets.is_empty() {
        anyhow::bail!("manifest has no targets");
    }
    for (id, target) in &mut manifest.targets {
        target.id = id.clone();
        target
            .validate()
            .with_context(|| format!("target {id:?}"))?;
    }

    let manifest_dir = path
        .parent()
        .map(Path::to_path_buf)
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from("."));
    Ok((manifest, manifest_dir))
}

/// Select targets by name, by tag, or all of them.
///
/// Selection order is stable: named targets first (in the order given),
/// then tag matches (in manifest order), deduplicated.
pub fn select_targets<'a>(
    manifest: &'a Manifest,
    all: bool,
    names: &[String],
    tags: &[String],
) -> Result<Vec<&'a Target>> {
    if all {
        return Ok(manifest.targets.values().collect());
    }

    let mut selected: Vec<&Target> = Vec::new();
    let mut seen: Vec<&str> = Vec::new();

    for name in names {
        let target = manifest
            .targets
            .get(name)
            .with_context(|| format!("target {name:?} not found in manifest"))?;
        if !seen.contains(&target.id.as_str()) {
            seen.push(&target.id);
            selected.push(target);
        }
    }

    for tag in tags {
        for target in manifest.targets.values() {
            if target.tags.iter().any(|t| t == tag) && !seen.contains(&target.id.as_str()) {
                seen.push(&target.id);
                selected.push(target);
            }
        }
    }

    Ok(selected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const BASIC: &str = "\
version: 1
values:
  motd: global
targets:
  proxy:
    output: proxy
    tags: [network, production]
    templates:
      - path: templates/velocity
  survival:
    output: servers/survival
    tags: [game, production]
    values:
      motd: survival
    templates:
      - path: templates/paper
        values:
          motd: layered
";

    fn write_manifest(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_read_manifest_fills_target_ids() {
        let file = write_manifest(BASIC);
        let (manifest, dir) = read_manifest(file.path()).unwrap();
        assert_eq!(manifest.targets["proxy"].id, "proxy");
        assert_eq!(manifest.targets["survival"].id, "survival");
        assert_eq!(manifest.targets["survival"].output, "servers/survival");
        assert_eq!(dir, file.path().parent().unwrap());
    }

    #[test]
    fn test_read_manifest_rejects_unknown_version() {
        let file = write_manifest("version: 3\ntargets:\n  a:\n    output: a\n    templates: [{path: t}]\n");
        let err = read_manifest(file.path()).unwrap_err();
        assert!(err.to_string().contains("version 3"));
    }

    #[test]
    fn test_read_manifest_requires_targets() {
        let file = write_manifest("version: 1\ntargets: {}\n");
        let err = read_manifest(file.path()).unwrap_err();
        assert!(err.to_string().contains("no targets"));
    }

    #[test]
    fn test_read_manifest_requires_output_and_templates() {
        let file = write_manifest("version: 1\ntargets:\n  a:\n    output: ''\n    templates: [{path: t}]\n");
        assert!(read_manifest(file.path()).is_err());

        let file = write_manifest("version: 1\ntargets:\n  a:\n    output: a\n");
        let err = read_manifest(file.path()).unwrap_err();
        assert!(format!("{err:#}").contains("at least one template"));
    }

    #[test]
    fn test_read_manifest_rejects_unknown_fields() {
        let file = write_manifest("version: 1\nbogus: true\ntargets:\n  a:\n    output: a\n    templates: [{path: t}]\n");
        assert!(read_manifest(file.path()).is_err());
    }

    #[test]
    fn test_select_targets_by_name_dedupes() {
        let file = write_manifest(BASIC);
        let (manifest, _) = read_manifest(file.path()).unwrap();
        let selected = select_targets(
            &manifest,
            false,
            &["proxy".into(), "proxy".into()],
            &[],
        )
        .unwrap();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].id, "proxy");
    }

    #[test]
    fn test_select_targets_by_tag() {
        let file = write_manifest(BASIC);
        let (manifest, _) = read_manifest(file.path()).unwrap();
        let selected =
            select_targets(&manifest, false, &[], &["production".into()]).unwrap();
        assert_eq!(selected.len(), 2);

        let selected = select_targets(&manifest, false, &[], &["game".into()]).unwrap();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].id, "survival");
    }

    #[test]
    fn test_select_targets_all() {
        let file = write_manifest(BASIC);
        let (manifest, _) = read_manifest(file.path()).unwrap();
        let selected = select_targets(&manifest, true, &[], &[]).unwrap();
        assert_eq!(selected.len(), 2);
    }

    #[test]
    fn test_select_targets_unknown_name_fails() {
        let file = write_manifest(BASIC);
        let (manifest, _) = read_manifest(file.path()).unwrap();
        assert!(select_targets(&manifest, false, &["nope".into()], &[]).is_err());
    }
}
