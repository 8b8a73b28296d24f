//! JSON merge strategy.

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

/// Deep-merges a JSON source document into a JSON destination; source wins.
pub struct JsonPatchStrategy;

impl FileStrategy for JsonPatchStrategy {
    fn name(&self) -> &'static str {
        "json-patch"
    }

    fn apply(&self, cancel: &Cancellation, src: &mut dyn Read, dst: &Path) -> Result<()> {
        cancel.check()?;
        debug!("[json-patch] applying to {}", dst.display());

        let mut source_text = String::new();
        src.read_to_string(&mut source_text).context("read source JSON")?;
        let source = decode(&source_text)
            .with_context(|| format!("decode source JSON for {}", dst.display()))?;

        ensure_parent_dir(dst)?;

        let target = match fs::read_to_string(dst) {
            Ok(text) => {
                decode(&text).with_context(|| format!("decode target JSON {}", dst.display()))?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Values::new(),
            Err(e) => {
                return Err(
                    anyhow::Error::new(e).context(format!("read target JSON {}", dst.display()))
                )
            }
        };

        let merged = deep_merge([&target, &source]);
        let mut encoded = serde_json::to_string_pretty(&Value::Mapping(merged))
            .context("encode merged JSON")?;
        encoded.push('\n');

        fs::write(dst, encoded)
            .with_context(|| format!("write merged JSON to {}", dst.display()))?;
        Ok(())
    }
}

fn decode(text: &str) -> Result<Values> {
    let json: serde_json::Value = serde_json::from_str(text)?;
    match serde_yaml::to_value(&json)? {
        Value::Mapping(map) => Ok(map),
        _ => anyhow::bail!("document is not a JSON object"),
    }
}
