//! Properties merge strategy and the key=value codec behind it.
//!
//! No crate in this project's ecosystem covers Java-style `.properties`
//! files, so the strategy carries its own minimal codec: UTF-8 lines of
//! `key=value`, `#`/`!` comments, blank lines ignored. Output is emitted in
//! sorted key order; callers must not rely on a particular ordering.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fs;
use std::io::Read;
use std::path::Path;
use tracing::debug;

use crate::core::Cancellation;
use crate::strategy::FileStrategy;
use crate::utils::fs::ensure_parent_dir;

/// Merges key=value property files; source keys win on collision.
pub struct PropertiesPatchStrategy;

impl FileStrategy for PropertiesPatchStrategy {
    fn name(&self) -> &'static str {
        "properties-patch"
    }

    fn apply(&self, cancel: &Cancellation, src: &mut dyn Read, dst: &Path) -> Result<()> {
        cancel.check()?;
        debug!("[properties-patch] merging into {}", dst.display());

        let mut source_text = String::new();
        src.read_to_string(&mut source_text)
            .context("read source properties")?;
        let source = parse_properties(&source_text);

        ensure_parent_dir(dst)?;

        // missing destination is treated as empty
        let mut target = match fs::read_to_string(dst) {
            Ok(text) => parse_properties(&text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                return Err(anyhow::Error::new(e)
                    .context(format!("read target properties {}", dst.display())))
            }
        };

        target.extend(source);

        fs::write(dst, write_properties(&target))
            .with_context(|| format!("write merged properties to {}", dst.display()))?;
        Ok(())
    }
}

/// Parse UTF-8 `key=value` lines. Comment lines start with `#` or `!`.
/// Lines without `=` are ignored.
pub(crate) fn parse_properties(text: &str) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            out.insert(key.trim().to_string(), value.trim().to_string());
        }
    }
    out
}

/// Emit properties in sorted key order, one `key=value` per line.
pub(crate) fn write_properties(map: &BTreeMap<String, String>) -> String {
    let mut out = String::new();
    for (key, value) in map {
        out.push_str(key);
        out.push('=');
        out.push_str(value);
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::tempdir;

    #[test]
    fn test_parse_skips_comments_and_blanks() {
        let parsed = parse_properties("# header\n\nmotd=hello world\n! note\nport = 25565\nnoequals\n");
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed["motd"], "hello world");
        assert_eq!(parsed["port"], "25565");
    }

    #[test]
    fn test_merge_source_wins_on_collision() {
        let temp = tempdir().unwrap();
        let dst = temp.path().join("server.properties");
        fs::write(&dst, "motd=old\nkeep=yes\n").unwrap();

        PropertiesPatchStrategy
            .apply(
                &Cancellation::new(),
                &mut Cursor::new(b"motd=new\nadded=1\n".to_vec()),
                &dst,
            )
            .unwrap();

        let merged = parse_properties(&fs::read_to_string(&dst).unwrap());
        assert_eq!(merged["motd"], "new");
        assert_eq!(merged["keep"], "yes");
        assert_eq!(merged["added"], "1");
    }

    #[test]
    fn test_missing_destination_treated_as_empty() {
        let temp = tempdir().unwrap();
        let dst = temp.path().join("fresh").join("app.properties");

        PropertiesPatchStrategy
            .apply(&Cancellation::new(), &mut Cursor::new(b"a=1\n".to_vec()), &dst)
            .unwrap();

        let merged = parse_properties(&fs::read_to_string(&dst).unwrap());
        assert_eq!(merged["a"], "1");
    }

    #[test]
    fn test_empty_patch_is_identity_modulo_reencoding() {
        let temp = tempdir().unwrap();
        let dst = temp.path().join("app.properties");
        fs::write(&dst, "b=2\na=1\n").unwrap();

        PropertiesPatchStrategy
            .apply(&Cancellation::new(), &mut Cursor::new(Vec::new()), &dst)
            .unwrap();

        let merged = parse_properties(&fs::read_to_string(&dst).unwrap());
        assert_eq!(merged.len(), 2);
        assert_eq!(merged["a"], "1");
        assert_eq!(merged["b"], "2");
    }
}
