//! Content-keyed cache of parsed text templates.
//!
//! Template sources are parsed once per distinct source string; re-rendering
//! the same file for another target reuses the parsed program. Rendering is
//! strict: referencing a key that is absent from the context is an error,
//! never an empty string.

use dashmap::DashMap;
use sha2::{Digest, Sha256};
use std::sync::RwLock;
use tera::Tera;

use crate::core::GokError;

/// Parse-once template cache.
///
/// Templates are registered under a name derived from the SHA-256 of their
/// verbatim source, so a concurrent race to insert the same source is
/// harmless: both writers register identical content under the same name.
pub struct TemplateCache {
    engine: RwLock<Tera>,
    names: DashMap<String, String>,
}

impl TemplateCache {
    /// Create an empty cache. Auto-escaping is disabled; the engine renders
    /// configuration files, not HTML.
    #[must_use]
    pub fn new() -> Self {
        let mut engine = Tera::default();
        engine.autoescape_on(vec![]);
        Self {
            engine: RwLock::new(engine),
            names: DashMap::new(),
        }
    }

    /// Render `source` with `context`, parsing at most once per distinct
    /// source string.
    ///
    /// `origin` names the file the source came from and only appears in
    /// diagnostics.
    pub fn render(
        &self,
        origin: &str,
        source: &str,
        context: &tera::Context,
    ) -> Result<String, GokError> {
        let name = self.name_for(origin, source)?;
        let engine = self.engine.read().expect("template cache lock poisoned");
        engine
            .render(&name, context)
            .map_err(|e| GokError::TemplateRender {
                name: origin.to_string(),
                reason: flatten_error(&e),
            })
    }

    /// Number of distinct parsed sources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether the cache holds no parsed sources.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    fn name_for(&self, origin: &str, source: &str) -> Result<String, GokError> {
        if let Some(name) = self.names.get(source) {
            return Ok(name.clone());
        }

        let digest = Sha256::digest(source.as_bytes());
        let name = format!("tpl-{}", hex::encode(&digest[..8]));

        let mut engine = self.engine.write().expect("template cache lock poisoned");
        engine
            .add_raw_template(&name, source)
            .map_err(|e| GokError::TemplateRender {
                name: origin.to_string(),
                reason: flatten_error(&e),
            })?;
        drop(engine);

        self.names.insert(source.to_string(), name.clone());
        Ok(name)
    }
}

impl Default for TemplateCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Tera errors carry the useful part in their source chain; flatten it into
/// one line for the error taxonomy.
fn flatten_error(error: &tera::Error) -> String {
    let mut parts = vec![error.to_string()];
    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        parts.push(cause.to_string());
        source = cause.source();
    }
    parts.join(": ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context_with(key: &str, value: &str) -> tera::Context {
        let mut ctx = tera::Context::new();
        ctx.insert(key, value);
        ctx
    }

    #[test]
    fn test_render_substitutes_values() {
        let cache = TemplateCache::new();
        let out = cache
            .render("motd.templ.txt", "motd={{ motd }}", &context_with("motd", "hello"))
            .unwrap();
        assert_eq!(out, "motd=hello");
    }

    #[test]
    fn test_render_missing_key_is_an_error() {
        let cache = TemplateCache::new();
        let err = cache
            .render("motd.templ.txt", "motd={{ missing }}", &tera::Context::new())
            .unwrap_err();
        match err {
            GokError::TemplateRender { reason, .. } => {
                assert!(reason.contains("missing"), "unhelpful reason: {reason}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_render_parse_error_names_origin() {
        let cache = TemplateCache::new();
        let err = cache
            .render("broken.templ", "{{ unclosed", &tera::Context::new())
            .unwrap_err();
        assert!(err.to_string().contains("broken.templ"));
    }

    #[test]
    fn test_cache_parses_each_source_once() {
        let cache = TemplateCache::new();
        let ctx = context_with("x", "1");
        cache.render("a", "x={{ x }}", &ctx).unwrap();
        cache.render("b", "x={{ x }}", &ctx).unwrap();
        cache.render("c", "y={{ x }}", &ctx).unwrap();
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_render_plain_text_passthrough() {
        let cache = TemplateCache::new();
        let out = cache
            .render("plain", "no placeholders here", &tera::Context::new())
            .unwrap();
        assert_eq!(out, "no placeholders here");
    }
}
