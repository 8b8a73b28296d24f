//! File strategies: per-file policies for combining a source byte stream
//! with an existing destination.
//!
//! The render engine classifies every template file and hands its content to
//! a [`FileStrategy`]. Five strategies exist: verbatim copy and structured
//! merges for properties, JSON, YAML and TOML. The [`Registry`] maps file
//! extensions to strategies and always holds a fallback; the engine only
//! consults the extension mapping when the destination file already exists,
//! so first-time creation is always a plain copy.

mod copy;
mod json;
mod properties;
mod toml;
mod yaml;

pub use copy::CopyStrategy;
pub use json::JsonPatchStrategy;
pub use properties::PropertiesPatchStrategy;
pub use toml::TomlPatchStrategy;
pub use yaml::YamlPatchStrategy;

use anyhow::Result;
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use crate::core::Cancellation;

/// A per-file policy applying source content onto a destination path.
///
/// Implementations must create parent directories as needed and leave
/// exactly one regular file at `dst` on success.
pub trait FileStrategy: Send + Sync {
    /// Human-friendly strategy name for logging.
    fn name(&self) -> &'static str;

    /// Apply the content read from `src` to `dst`.
    fn apply(&self, cancel: &Cancellation, src: &mut dyn Read, dst: &Path) -> Result<()>;
}

/// Maps lowercase file extensions (including the leading `.`) to strategies.
pub struct Registry {
    by_extension: HashMap<String, Arc<dyn FileStrategy>>,
    fallback: Arc<dyn FileStrategy>,
}

impl Registry {
    /// Construct a registry with a mandatory fallback.
    ///
    /// Extension keys must be non-empty, lowercase and start with `.`.
    pub fn new(
        fallback: Arc<dyn FileStrategy>,
        mappings: HashMap<String, Arc<dyn FileStrategy>>,
    ) -> Result<Self> {
        let mut by_extension = HashMap::new();
        for (ext, strategy) in mappings {
            let ext = ext.trim().to_lowercase();
            if ext.is_empty() || !ext.starts_with('.') {
                anyhow::bail!("invalid extension key for strategy: {ext:?}");
            }
            by_extension.insert(ext, strategy);
        }
        Ok(Self {
            by_extension,
            fallback,
        })
    }

    /// Registry with the standard mapping: properties/JSON/YAML/TOML patch
    /// strategies behind a copy fallback.
    pub fn standard(overwrite: bool) -> Self {
        let mut mappings: HashMap<String, Arc<dyn FileStrategy>> = HashMap::new();
        mappings.insert(".properties".into(), Arc::new(PropertiesPatchStrategy));
        mappings.insert(".json".into(), Arc::new(JsonPatchStrategy));
        mappings.insert(".yaml".into(), Arc::new(YamlPatchStrategy));
        mappings.insert(".yml".into(), Arc::new(YamlPatchStrategy));
        mappings.insert(".toml".into(), Arc::new(TomlPatchStrategy));
        Self::new(Arc::new(CopyStrategy::new(overwrite)), mappings)
            .expect("standard mapping uses valid extensions")
    }

    /// The strategy for a file name, and whether the extension matched.
    /// Falls back when the extension is unknown.
    #[must_use]
    pub fn for_path(&self, filename: &Path) -> (Arc<dyn FileStrategy>, bool) {
        let ext = filename
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()));
        if let Some(strategy) = ext.and_then(|e| self.by_extension.get(&e)) {
            (Arc::clone(strategy), true)
        } else {
            (Arc::clone(&self.fallback), false)
        }
    }

    /// The mandatory fallback strategy.
    #[must_use]
    pub fn fallback(&self) -> Arc<dyn FileStrategy> {
        Arc::clone(&self.fallback)
    }
}
