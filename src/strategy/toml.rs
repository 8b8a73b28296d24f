//! TOML merge strategy.

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

/// Deep-merges a TOML source document into a TOML destination; source wins.
pub struct TomlPatchStrategy;

impl FileStrategy for TomlPatchStrategy {
    fn name(&self) -> &'static str {
        "toml-patch"
    }

    fn apply(&self, cancel: &Cancellation, src: &mut dyn Read, dst: &Path) -> Result<()> {
        cancel.check()?;
        debug!("[toml-patch] applying to {}", dst.display());

        let mut source_text = String::new();
        src.read_to_string(&mut source_text).context("read source TOML")?;
        let source = decode(&source_text)
            .with_context(|| format!("decode source TOML for {}", dst.display()))?;

        ensure_parent_dir(dst)?;

        let target = match fs::read_to_string(dst) {
            Ok(text) => {
                decode(&text).with_context(|| format!("decode target TOML {}", dst.display()))?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Values::new(),
            Err(e) => {
                return Err(
                    anyhow::Error::new(e).context(format!("read target TOML {}", dst.display()))
                )
            }
        };

        let merged = deep_merge([&target, &source]);
        let toml_value = toml::Value::try_from(&Value::Mapping(merged))
            .context("convert merged document to TOML")?;
        let encoded = toml::to_string_pretty(&toml_value).context("encode merged TOML")?;

        fs::write(dst, encoded)
            .with_context(|| format!("write merged TOML to {}", dst.display()))?;
        Ok(())
    }
}

fn decode(text: &str) -> Result<Values> {
    let table: toml::Table = toml::from_str(text)?;
    match serde_yaml::to_value(&table)? {
        Value::Mapping(map) => Ok(map),
        _ => anyhow::bail!("document is not a TOML table"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::tempdir;

    #[test]
    fn test_toml_patch_merges_tables() {
        let temp = tempdir().unwrap();
        let dst = temp.path().join("config.toml");
        fs::write(&dst, "title = \"app\"\n\n[server]\nport = 1\nmotd = \"keep\"\n").unwrap();

        TomlPatchStrategy
            .apply(
                &Cancellation::new(),
                &mut Cursor::new(b"[server]\nport = 2\n".to_vec()),
                &dst,
            )
            .unwrap();

        let merged: toml::Table = toml::from_str(&fs::read_to_string(&dst).unwrap()).unwrap();
        assert_eq!(merged["title"].as_str(), Some("app"));
        assert_eq!(merged["server"]["port"].as_integer(), Some(2));
        assert_eq!(merged["server"]["motd"].as_str(), Some("keep"));
    }

    #[test]
    fn test_toml_patch_missing_destination_is_empty() {
        let temp = tempdir().unwrap();
        let dst = temp.path().join("new.toml");

        TomlPatchStrategy
            .apply(
                &Cancellation::new(),
                &mut Cursor::new(b"a = 1\n".to_vec()),
                &dst,
            )
            .unwrap();

        let merged: toml::Table = toml::from_str(&fs::read_to_string(&dst).unwrap()).unwrap();
        assert_eq!(merged["a"].as_integer(), Some(1));
    }

    #[test]
    fn test_toml_patch_empty_patch_is_identity() {
        let temp = tempdir().unwrap();
        let dst = temp.path().join("config.toml");
        fs::write(&dst, "keep = [1, 2]\n").unwrap();

        TomlPatchStrategy
            .apply(&Cancellation::new(), &mut Cursor::new(Vec::new()), &dst)
            .unwrap();

        let merged: toml::Table = toml::from_str(&fs::read_to_string(&dst).unwrap()).unwrap();
        assert_eq!(
            merged["keep"],
            toml::Value::Array(vec![toml::Value::Integer(1), toml::Value::Integer(2)])
        );
    }

    #[test]
    fn test_toml_patch_rejects_invalid_source() {
        let temp = tempdir().unwrap();
        let dst = temp.path().join("x.toml");
        assert!(TomlPatchStrategy
            .apply(
                &Cancellation::new(),
                &mut Cursor::new(b"not [ valid toml".to_vec()),
                &dst,
            )
            .is_err());
    }
}
