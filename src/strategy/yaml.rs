//! YAML merge strategy.
//!
//! Merge-patch is not comment-preserving: the destination is decoded,
//! merged and canonically re-encoded, which may reorder keys.

use anyhow::{Context, Result};
use serde_yaml::Value;
use std::fs;
use std::io::Read;
use std::path::Path;
use tracing::debug;

use crate::core::Cancellation;
use crate::strategy::FileStrategy;
use crate::utils::fs::ensure_parent_dir;
use crate::values::{deep_merge, Values};

/// Deep-merges a YAML source document into a YAML destination; source wins.
pub struct YamlPatchStrategy;

impl FileStrategy for YamlPatchStrategy {
    fn name(&self) -> &'static str {
        "yaml-patch"
    }

    fn apply(&self, cancel: &Cancellation, src: &mut dyn Read, dst: &Path) -> Result<()> {
        cancel.check()?;
        debug!("[yaml-patch] applying to {}", dst.display());

        let mut source_text = String::new();
        src.read_to_string(&mut source_text).context("read source YAML")?;
        let source = decode(&source_text)
            .with_context(|| format!("decode source YAML for {}", dst.display()))?;

        ensure_parent_dir(dst)?;

        let target = match fs::read_to_string(dst) {
            Ok(text) => {
                decode(&text).with_context(|| format!("decode target YAML {}", dst.display()))?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Values::new(),
            Err(e) => {
                return Err(
                    anyhow::Error::new(e).context(format!("read target YAML {}", dst.display()))
                )
            }
        };

        let merged = deep_merge([&target, &source]);
        let encoded =
            serde_yaml::to_string(&Value::Mapping(merged)).context("encode merged YAML")?;

        fs::write(dst, encoded)
            .with_context(|| format!("write merged YAML to {}", dst.display()))?;
        Ok(())
    }
}

fn decode(text: &str) -> Result<Values> {
    if text.trim().is_empty() {
        return Ok(Values::new());
    }
    match serde_yaml::from_str::<Value>(text)? {
        Value::Mapping(map) => Ok(map),
        Value::Null => Ok(Values::new()),
        _ => anyhow::bail!("document is not a YAML mapping"),
    }
}
