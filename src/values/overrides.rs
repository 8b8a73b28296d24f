//! External value overrides.
//!
//! Two override channels exist on top of the manifest-declared values:
//!
//! - **Override files** (`-f`): versioned YAML documents with a global
//!   `values` section and optional per-target sections. Multiple files merge
//!   left to right.
//! - **Flag overrides** (`-v key=value`): dotted keys set on the command
//!   line. A `@<target>.` prefix scopes the assignment to one target.
//!
//! Both channels keep global and per-target values separate; the per-target
//! part is merged over the global part when a target asks for its effective
//! overrides ([`ValueOverrides::values_for_target`]).

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::constants::OVERRIDES_FILE_VERSION;
use crate::core::GokError;
use crate::values::{deep_merge, set_nested, Values};

/// On-disk shape of a `-f` override file.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct OverridesFile {
    version: u32,
    #[serde(default)]
    values: Values,
    #[serde(default)]
    targets: BTreeMap<String, TargetOverridesSection>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TargetOverridesSection {
    #[serde(default)]
    values: Values,
}

/// Merged override values from one channel (files or flags).
#[derive(Debug, Clone, Default)]
pub struct ValueOverrides {
    /// Global overrides, applied to every target.
    pub values: Values,
    /// Target-scoped overrides, applied on top of the global ones.
    pub targets: BTreeMap<String, Values>,
}

impl ValueOverrides {
    /// Parse and merge a list of override files, left to right.
    pub fn load_files<P: AsRef<Path>>(paths: &[P]) -> Result<Self> {
        let mut result = Self::default();
        for path in paths {
            let path = path.as_ref();
            let file = File::open(path)
                .with_context(|| format!("open values file {}", path.display()))?;
            let parsed: OverridesFile = serde_yaml::from_reader(file)
                .map_err(|e| anyhow::anyhow!("invalid values file {}: {e}", path.display()))?;
            if parsed.version != OVERRIDES_FILE_VERSION {
                return Err(GokError::UnsupportedVersion {
                    kind: "values file",
                    found: parsed.version,
                    expected: OVERRIDES_FILE_VERSION,
                }
                .into());
            }

            result.values = deep_merge([&result.values, &parsed.values]);
            for (target, section) in parsed.targets {
                let merged = match result.targets.get(&target) {
                    Some(existing) => deep_merge([existing, &section.values]),
                    None => section.values,
                };
                result.targets.insert(target, merged);
            }
        }
        Ok(result)
    }

    /// Parse `-v` assignments.
    ///
    /// Accepted shapes: `key=value`, `nested.key=value` and
    /// `@target.nested.key=value`. The value is kept as a string; templates
    /// and patch files decide how to interpret it.
    pub fn from_flags<S: AsRef<str>>(pairs: &[S]) -> Result<Self> {
        let mut result = Self::default();
        for pair in pairs {
            let pair = pair.as_ref();
            let (key, value) = pair
                .split_once('=')
                .with_context(|| format!("invalid -v assignment {pair:?}, expected key=value"))?;

            if let Some(rest) = key.strip_prefix('@') {
                let (target, key) = rest.split_once('.').with_context(|| {
                    format!("invalid target-scoped assignment {pair:?}, expected @target.key=value")
                })?;
                let section = result.targets.entry(target.to_string()).or_default();
                set_nested(section, key, Value::from(value))
                    .with_context(|| format!("setting target value {key:?}"))?;
            } else {
                set_nested(&mut result.values, key, Value::from(value))
                    .with_context(|| format!("setting global value {key:?}"))?;
            }
        }
        Ok(result)
    }

    /// Effective overrides for one target: global values with the target's
    /// own section merged on top.
    #[must_use]
    pub fn values_for_target(&self, target_id: &str) -> Values {
        match self.targets.get(target_id) {
            Some(section) => deep_merge([&self.values, section]),
            None => self.values.clone(),
        }
    }
}

/// Load a plain values document (no version envelope), e.g. the secrets
/// file. `-` reads from stdin.
pub fn load_values_file(path: &str) -> Result<Values> {
    let mut content = String::new();
    if path == "-" {
        std::io::stdin()
            .read_to_string(&mut content)
            .context("read values from stdin")?;
    } else {
        File::open(path)
            .and_then(|mut f| f.read_to_string(&mut content))
            .with_context(|| format!("open values file {path}"))?;
    }

    if content.trim().is_empty() {
        return Ok(Values::new());
    }
    serde_yaml::from_str(&content).with_context(|| format!("decode values file {path}"))
}

/// Load and merge several plain values documents, left to right.
pub fn load_values_files(paths: &[String]) -> Result<Values> {
    let mut merged = Values::new();
    for path in paths {
        let values = load_values_file(path)?;
        merged = deep_merge([&merged, &values]);
    }
    Ok(merged)
}
