//! Per-target rendering.

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::fs::File;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::artifact::ArtifactSet;
use crate::constants::{
    ARTIFACT_SUFFIX, DELETIONS_FILE_NAME, TEMPLATE_INFIX, TEMPLATE_MANIFEST_FILE_NAME,
};
use crate::core::{Cancellation, GokError};
use crate::manifest::{Manifest, Target, TemplateSpec};
use crate::render::context::{build_context, build_frame, FrameValues};
use crate::render::path::PathResolver;
use crate::strategy::Registry;
use crate::template::{read_deletions, read_template_manifest, TemplateCache};
use crate::utils::fs::ensure_dir;
use crate::values::{deep_merge, Values};

/// The value sources feeding a render run, in precedence order (lowest
/// first): manifest globals, per-target values, template-spec values, then
/// the `external` file overrides and the `flags` overrides.
pub struct RenderSources<'a> {
    /// Parsed manifest (globals + targets).
    pub manifest: &'a Manifest,
    /// Decrypted secret values, looked up by `imports.secrets` only.
    pub secrets: &'a Values,
    /// `-f` file overrides.
    pub external: &'a crate::values::overrides::ValueOverrides,
    /// `-v` flag overrides.
    pub flags: &'a crate::values::overrides::ValueOverrides,
}

/// Renders manifest targets into a work directory.
pub struct Engine<'a> {
    manifest_resolver: PathResolver,
    work_resolver: PathResolver,
    templates: &'a TemplateCache,
    registry: &'a Registry,
    artifacts: ArtifactSet,
}

impl<'a> Engine<'a> {
    /// Create an engine for one render run. Relative directories are pinned
    /// against the current working directory.
    pub fn new(
        manifest_dir: &Path,
        work_dir: &Path,
        templates: &'a TemplateCache,
        registry: &'a Registry,
    ) -> Result<Self> {
        Ok(Self {
            manifest_resolver: PathResolver::new(absolute(manifest_dir)?)?,
            work_resolver: PathResolver::new(absolute(work_dir)?)?,
            templates,
            registry,
            artifacts: ArtifactSet::new(),
        })
    }

    /// Render all selected targets.
    ///
    /// Rendering is best-effort across targets: a failure is recorded and
    /// the remaining targets still render; the joined failures are returned
    /// at the end. Cancellation short-circuits immediately.
    pub fn render_targets(
        &mut self,
        cancel: &Cancellation,
        sources: &RenderSources<'_>,
        targets: &[&Target],
    ) -> Result<()> {
        let mut failures: Vec<String> = Vec::new();

        for target in targets {
            cancel.check()?;
            match self.render_target(cancel, sources, target) {
                Ok(()) => info!("successfully rendered target {}", target.id),
                Err(e) => {
                    if matches!(e.downcast_ref::<GokError>(), Some(GokError::Cancelled)) {
                        return Err(e);
                    }
                    error!("failed to render target {}: {e:#}", target.id);
                    failures.push(format!("target {}: {e:#}", target.id));
                }
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            anyhow::bail!(
                "failed to render {} target(s): {}",
                failures.len(),
                failures.join("; ")
            )
        }
    }

    /// Render a single target into `<work>/<target.output>`.
    pub fn render_target(
        &mut self,
        cancel: &Cancellation,
        sources: &RenderSources<'_>,
        target: &Target,
    ) -> Result<()> {
        let output_dir = self
            .work_resolver
            .resolve(&target.output)
            .with_context(|| format!("resolve output dir {:?}", target.output))?;
        ensure_dir(&output_dir)?;
        debug!("prepared output directory for {}: {}", target.id, output_dir.display());

        let out_resolver = PathResolver::new(&output_dir)?;

        // absolute paths of every template applied for this target, used by
        // the `single: true` inheritance guard
        let mut visited: HashSet<PathBuf> = HashSet::new();

        for spec in &target.templates {
            self.apply_template_tree(
                cancel,
                sources,
                target,
                spec,
                &out_resolver,
                &[],
                &mut visited,
                None,
            )
            .with_context(|| format!("processing template spec {:?}", spec.path))?;
        }

        Ok(())
    }

    /// Hand over the artifacts registered while rendering.
    #[must_use]
    pub fn into_artifacts(self) -> ArtifactSet {
        self.artifacts
    }

    #[allow(clippy::too_many_arguments)]
    fn apply_template_tree(
        &mut self,
        cancel: &Cancellation,
        sources: &RenderSources<'_>,
        target: &Target,
        spec: &TemplateSpec,
        out_resolver: &PathResolver,
        inheritance_path: &[PathBuf],
        visited: &mut HashSet<PathBuf>,
        inherited: Option<&FrameValues>,
    ) -> Result<()> {
        cancel.check()?;

        let src_root = self
            .manifest_resolver
            .join(&spec.path)
            .with_context(|| format!("resolve template input {:?}", spec.path))?;

        if inheritance_path.contains(&src_root) {
            let mut chain: Vec<String> = inheritance_path
                .iter()
                .map(|p| p.display().to_string())
                .collect();
            chain.push(src_root.display().to_string());
            let chain = chain.join(" -> ");
            warn!("template inheritance cycle detected: {chain}");
            return Err(GokError::InheritanceCycle { chain }.into());
        }
        visited.insert(src_root.clone());

        let template_manifest = read_template_manifest(&src_root)
            .with_context(|| format!("read template manifest in {}", src_root.display()))?;

        let template_name = template_manifest
            .as_ref()
            .map(|m| m.name_or_default(&src_root))
            .unwrap_or_else(|| spec.path.clone());
        info!("processing template {template_name}");

        if let Some(manifest) = &template_manifest {
            if !manifest.description.is_empty() {
                info!(" ? {}", manifest.description);
            }
            if !manifest.maintainers.is_empty() {
                info!(" ~ maintained by: {}", manifest.maintainer_string());
            }
        }

        let frame = build_frame(
            sources,
            target,
            template_manifest.as_ref(),
            &spec.values,
            &template_name,
            inherited,
        )?;

        if let Some(manifest) = &template_manifest {
            let mut new_path = inheritance_path.to_vec();
            new_path.push(src_root.clone());

            for inherit in &manifest.inherits {
                info!("-> inheriting from {:?}", inherit.path);

                let child_path = Path::new(&spec.path)
                    .join(&inherit.path)
                    .to_string_lossy()
                    .into_owned();
                let child_abs = self
                    .manifest_resolver
                    .join(&child_path)
                    .with_context(|| format!("resolve inherited template {:?}", inherit.path))?;

                if inherit.single && visited.contains(&child_abs) {
                    info!("skipping already applied single-use template {:?}", inherit.path);
                    continue;
                }

                // values passed downward: this application's values with the
                // inherit spec's values on top
                let child_spec = TemplateSpec {
                    path: child_path,
                    values: deep_merge([&spec.values, &inherit.values]),
                };

                self.apply_template_tree(
                    cancel,
                    sources,
                    target,
                    &child_spec,
                    out_resolver,
                    &new_path,
                    visited,
                    Some(&frame),
                )
                .with_context(|| format!("processing inherited template {:?}", inherit.path))?;

                info!("<- returned from inherited template {:?}", inherit.path);
            }
        }

        let metadata = std::fs::metadata(&src_root)
            .with_context(|| format!("stat template input {}", src_root.display()))?;
        if !metadata.is_dir() {
            warn!("template path {} is not a directory, skipping", src_root.display());
            return Ok(());
        }

        self.apply_deletions(cancel, &src_root, out_resolver)
            .with_context(|| format!("apply deletions for {}", src_root.display()))?;

        let context = build_context(sources, target, template_manifest.as_ref(), &frame)?;
        self.apply_dir(cancel, &src_root, out_resolver, &context)
            .with_context(|| format!("apply template dir {}", src_root.display()))?;

        Ok(())
    }

    fn apply_deletions(
        &self,
        cancel: &Cancellation,
        src_root: &Path,
        out_resolver: &PathResolver,
    ) -> Result<()> {
        let Some(deletions) = read_deletions(src_root)? else {
            return Ok(());
        };

        info!(
            "applying {} deletions from {DELETIONS_FILE_NAME}",
            deletions.deletions.len()
        );
        for deletion in &deletions.deletions {
            cancel.check()?;

            let abs = match out_resolver.resolve(&deletion.path) {
                Ok(abs) => abs,
                Err(e) => {
                    warn!("could not resolve deletion path {:?}: {e}", deletion.path);
                    continue;
                }
            };

            let result = if deletion.recursive {
                std::fs::remove_dir_all(&abs)
            } else {
                std::fs::remove_file(&abs)
            };

            match result {
                Ok(()) => info!("deleted path {}", abs.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    warn!("file to delete does not exist, skipping: {}", abs.display());
                }
                Err(e) => warn!("failed to delete path {}: {e}", abs.display()),
            }
        }

        Ok(())
    }

    fn apply_dir(
        &mut self,
        cancel: &Cancellation,
        src_root: &Path,
        out_resolver: &PathResolver,
        context: &tera::Context,
    ) -> Result<()> {
        for entry in WalkDir::new(src_root).sort_by_file_name() {
            let entry = entry.with_context(|| format!("walk {}", src_root.display()))?;

            let name = entry.file_name().to_string_lossy();
            if name == TEMPLATE_MANIFEST_FILE_NAME || name == DELETIONS_FILE_NAME {
                continue;
            }
            if !entry.file_type().is_file() {
                if !entry.file_type().is_dir() {
                    debug!("skipping non-regular file {}", entry.path().display());
                }
                continue;
            }
            cancel.check()?;

            let rel = entry
                .path()
                .strip_prefix(src_root)
                .expect("walked entries live under the walk root");
            let dst = out_resolver
                .resolve(rel)
                .with_context(|| format!("resolve destination for {}", rel.display()))?;

            self.apply_file(cancel, entry.path(), dst, context)?;
        }
        Ok(())
    }

    fn apply_file(
        &mut self,
        cancel: &Cancellation,
        src: &Path,
        dst: PathBuf,
        context: &tera::Context,
    ) -> Result<()> {
        let file_name = src
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let origin = src.display().to_string();

        // artifact specs are rendered and registered, never written here
        if let Some(stripped) = file_name.strip_suffix(ARTIFACT_SUFFIX) {
            if stripped.is_empty() {
                anyhow::bail!("artifact spec {} has no destination name", src.display());
            }
            let content = std::fs::read_to_string(src)
                .with_context(|| format!("read artifact spec {}", src.display()))?;
            let rendered = self.templates.render(&origin, &content, context)?;
            let dest = dst.with_file_name(stripped);
            debug!("registering artifact {}", dest.display());
            return self.artifacts.register(dest, rendered.as_bytes());
        }

        let (final_dst, mut reader): (PathBuf, Box<dyn Read>) =
            if file_name.contains(TEMPLATE_INFIX) {
                debug!("rendering template file {}", src.display());
                let content = std::fs::read_to_string(src)
                    .with_context(|| format!("read template file {}", src.display()))?;
                let rendered = self.templates.render(&origin, &content, context)?;
                let final_name = file_name.replacen(TEMPLATE_INFIX, "", 1);
                (
                    dst.with_file_name(final_name),
                    Box::new(Cursor::new(rendered.into_bytes())),
                )
            } else {
                let file =
                    File::open(src).with_context(|| format!("open src {}", src.display()))?;
                (dst, Box::new(file))
            };

        // first-time creation always copies; the extension mapping only
        // applies once a destination exists to merge into
        let strategy = if final_dst.exists() {
            let (strategy, matched) = self.registry.for_path(&final_dst);
            if matched {
                debug!("using strategy {:?} for {}", strategy.name(), final_dst.display());
            } else {
                debug!("no strategy for {}, using fallback", final_dst.display());
            }
            strategy
        } else {
            self.registry.fallback()
        };

        strategy
            .apply(cancel, &mut *reader, &final_dst)
            .map_err(|e| {
                if e.downcast_ref::<GokError>()
                    .is_some_and(|g| matches!(g, GokError::Cancelled))
                {
                    return e;
                }
                GokError::StrategyApply {
                    strategy: strategy.name().to_string(),
                    path: final_dst.display().to_string(),
                    reason: format!("{e:#}"),
                }
                .into()
            })
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()
            .context("determine current directory")?
            .join(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::values::lookup_nested;
    use crate::values::overrides::ValueOverrides;
    use serde_yaml::Value;
    use std::fs;
    use tempfile::tempdir;

    struct Fixture {
        root: tempfile::TempDir,
        work: tempfile::TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                root: tempdir().unwrap(),
                work: tempdir().unwrap(),
            }
        }

        fn write(&self, rel: &str, content: &str) {
            let path = self.root.path().join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }

        fn manifest(&self, yaml: &str) -> Manifest {
            let mut manifest: Manifest = serde_yaml::from_str(yaml).unwrap();
            for (id, target) in &mut manifest.targets {
                target.id = id.clone();
            }
            manifest
        }

        fn render(&self, manifest: &Manifest) -> Result<ArtifactSet> {
            self.render_with(manifest, &ValueOverrides::default(), &ValueOverrides::default())
        }

        fn render_with(
            &self,
            manifest: &Manifest,
            external: &ValueOverrides,
            flags: &ValueOverrides,
        ) -> Result<ArtifactSet> {
            let cache = TemplateCache::new();
            let registry = Registry::standard(false);
            let secrets: Values =
                serde_yaml::from_str("db:\n  password: sup3r-secret\n").unwrap();
            let sources = RenderSources {
                manifest,
                secrets: &secrets,
                external,
                flags,
            };

            let mut engine =
                Engine::new(self.root.path(), self.work.path(), &cache, &registry)?;
            let targets: Vec<&Target> = manifest.targets.values().collect();
            engine.render_targets(&Cancellation::new(), &sources, &targets)?;
            Ok(engine.into_artifacts())
        }

        fn output(&self, rel: &str) -> String {
            fs::read_to_string(self.work.path().join(rel)).unwrap()
        }
    }

    const SINGLE_TARGET: &str = "\
version: 1
values:
  motd: global-motd
targets:
  web:
    output: web
    templates:
      - path: templates/base
";

    #[test]
    fn test_render_copies_plain_files() {
        let fx = Fixture::new();
        fx.write("templates/base/static.txt", "static content");
        fx.write("templates/base/conf/nested.txt", "nested");

        let manifest = fx.manifest(SINGLE_TARGET);
        fx.render(&manifest).unwrap();

        assert_eq!(fx.output("web/static.txt"), "static content");
        assert_eq!(fx.output("web/conf/nested.txt"), "nested");
    }

    #[test]
    fn test_render_templ_files_strip_infix_and_substitute() {
        let fx = Fixture::new();
        fx.write(
            "templates/base/gok-template.yaml",
            "version: 1\nimports:\n  values:\n    motd: {required: true}\n",
        );
        fx.write("templates/base/server.templ.properties", "motd={{ values.motd }}\n");

        let manifest = fx.manifest(SINGLE_TARGET);
        fx.render(&manifest).unwrap();

        assert_eq!(fx.output("web/server.properties"), "motd=global-motd\n");
        assert!(!fx.work.path().join("web/server.templ.properties").exists());
    }

    #[test]
    fn test_render_skips_reserved_files() {
        let fx = Fixture::new();
        fx.write("templates/base/gok-template.yaml", "version: 1\n");
        fx.write("templates/base/gok-deletions.yaml", "version: 1\ndeletions: []\n");
        fx.write("templates/base/kept.txt", "kept");

        let manifest = fx.manifest(SINGLE_TARGET);
        fx.render(&manifest).unwrap();

        assert!(!fx.work.path().join("web/gok-template.yaml").exists());
        assert!(!fx.work.path().join("web/gok-deletions.yaml").exists());
        assert!(fx.work.path().join("web/kept.txt").exists());
    }

    #[test]
    fn test_layering_patches_properties() {
        let fx = Fixture::new();
        fx.write("templates/base/server.properties", "a=base\nb=base\n");
        fx.write("templates/overlay/server.properties", "b=overlay\nc=overlay\n");

        let manifest = fx.manifest(
            "version: 1\ntargets:\n  web:\n    output: web\n    templates:\n      - path: templates/base\n      - path: templates/overlay\n",
        );
        fx.render(&manifest).unwrap();

        let merged = fx.output("web/server.properties");
        assert!(merged.contains("a=base"));
        assert!(merged.contains("b=overlay"));
        assert!(merged.contains("c=overlay"));
    }

    #[test]
    fn test_layering_unknown_extension_keeps_first_layer() {
        // no overwrite: copy fallback skips existing destinations
        let fx = Fixture::new();
        fx.write("templates/base/binary.dat", "first");
        fx.write("templates/overlay/binary.dat", "second");

        let manifest = fx.manifest(
            "version: 1\ntargets:\n  web:\n    output: web\n    templates:\n      - path: templates/base\n      - path: templates/overlay\n",
        );
        fx.render(&manifest).unwrap();

        assert_eq!(fx.output("web/binary.dat"), "first");
    }

    #[test]
    fn test_deletions_remove_earlier_layer_files() {
        let fx = Fixture::new();
        fx.write("templates/base/remove-me.txt", "x");
        fx.write("templates/base/cache/one.txt", "1");
        fx.write("templates/base/keep.txt", "keep");
        fx.write(
            "templates/overlay/gok-deletions.yaml",
            "version: 1\ndeletions:\n  - path: remove-me.txt\n  - path: cache\n    recursive: true\n  - path: never-existed.txt\n",
        );
        fx.write("templates/overlay/added.txt", "added");

        let manifest = fx.manifest(
            "version: 1\ntargets:\n  web:\n    output: web\n    templates:\n      - path: templates/base\n      - path: templates/overlay\n",
        );
        fx.render(&manifest).unwrap();

        assert!(!fx.work.path().join("web/remove-me.txt").exists());
        assert!(!fx.work.path().join("web/cache").exists());
        assert!(fx.work.path().join("web/keep.txt").exists());
        assert!(fx.work.path().join("web/added.txt").exists());
    }

    #[test]
    fn test_inheritance_applies_base_first() {
        let fx = Fixture::new();
        fx.write(
            "templates/child/gok-template.yaml",
            "version: 1\ninherits:\n  - path: ../base\n",
        );
        fx.write("templates/child/own.txt", "child");
        fx.write("templates/base/from-base.txt", "base");

        let manifest = fx.manifest(
            "version: 1\ntargets:\n  web:\n    output: web\n    templates:\n      - path: templates/child\n",
        );
        fx.render(&manifest).unwrap();

        assert_eq!(fx.output("web/from-base.txt"), "base");
        assert_eq!(fx.output("web/own.txt"), "child");
    }

    #[test]
    fn test_inheritance_cycle_is_detected() {
        let fx = Fixture::new();
        fx.write(
            "templates/a/gok-template.yaml",
            "version: 1\ninherits:\n  - path: ../b\n",
        );
        fx.write(
            "templates/b/gok-template.yaml",
            "version: 1\ninherits:\n  - path: ../a\n",
        );

        let manifest = fx.manifest(
            "version: 1\ntargets:\n  web:\n    output: web\n    templates:\n      - path: templates/a\n",
        );
        let err = fx.render(&manifest).unwrap_err();
        assert!(format!("{err:#}").contains("cycle"));
    }

    #[test]
    fn test_single_inherit_applies_once() {
        let fx = Fixture::new();
        // both children inherit the same base with single: true; the base
        // writes a counter file through properties-merge so a second
        // application would change it
        fx.write(
            "templates/child-one/gok-template.yaml",
            "version: 1\ninherits:\n  - path: ../base\n    single: true\n",
        );
        fx.write("templates/child-one/one.txt", "1");
        fx.write(
            "templates/child-two/gok-template.yaml",
            "version: 1\ninherits:\n  - path: ../base\n    single: true\n",
        );
        fx.write("templates/child-two/two.txt", "2");
        fx.write("templates/base/base.txt", "base");

        let manifest = fx.manifest(
            "version: 1\ntargets:\n  web:\n    output: web\n    templates:\n      - path: templates/child-one\n      - path: templates/child-two\n",
        );
        // must not fail, and base applied (at least and at most) once
        fx.render(&manifest).unwrap();
        assert_eq!(fx.output("web/base.txt"), "base");
        assert!(fx.work.path().join("web/one.txt").exists());
        assert!(fx.work.path().join("web/two.txt").exists());
    }

    #[test]
    fn test_inherited_values_flow_to_base_template() {
        let fx = Fixture::new();
        fx.write(
            "templates/child/gok-template.yaml",
            "version: 1\nimports:\n  values:\n    flavor: {required: true}\ninherits:\n  - path: ../base\n    values:\n      flavor: from-inherit\n",
        );
        fx.write(
            "templates/base/gok-template.yaml",
            "version: 1\nimports:\n  values:\n    flavor: {required: true}\n",
        );
        fx.write("templates/base/flavor.templ.txt", "{{ values.flavor }}");

        let manifest = fx.manifest(
            "version: 1\nvalues:\n  flavor: global\ntargets:\n  web:\n    output: web\n    templates:\n      - path: templates/child\n",
        );
        fx.render(&manifest).unwrap();

        // the inherit spec's values take precedence for the base template
        assert_eq!(fx.output("web/flavor.txt"), "from-inherit");
    }

    #[test]
    fn test_secret_import_renders() {
        let fx = Fixture::new();
        fx.write(
            "templates/base/gok-template.yaml",
            "version: 1\nimports:\n  secrets:\n    db.password: {required: true}\n",
        );
        fx.write("templates/base/creds.templ.txt", "pw={{ secrets.db.password }}");

        let manifest = fx.manifest(SINGLE_TARGET);
        fx.render(&manifest).unwrap();
        assert_eq!(fx.output("web/creds.txt"), "pw=sup3r-secret");
    }

    #[test]
    fn test_artifact_specs_are_registered_not_written() {
        let fx = Fixture::new();
        fx.write(
            "templates/base/plugins/tool.jar.artifact.yaml",
            "version: 1\nalgorithm: sha256\nchecksum: abcd\nsource:\n  http:\n    url: https://example.org/tool.jar\n",
        );

        let manifest = fx.manifest(SINGLE_TARGET);
        let artifacts = fx.render(&manifest).unwrap();

        assert_eq!(artifacts.len(), 1);
        let registered: Vec<_> = artifacts.paths().collect();
        assert!(registered[0].ends_with("web/plugins/tool.jar"));
        assert!(!fx.work.path().join("web/plugins/tool.jar.artifact.yaml").exists());
        assert!(!fx.work.path().join("web/plugins/tool.jar").exists());
    }

    #[test]
    fn test_missing_required_value_fails_target() {
        let fx = Fixture::new();
        fx.write(
            "templates/base/gok-template.yaml",
            "version: 1\nimports:\n  values:\n    not.there: {required: true}\n",
        );
        fx.write("templates/base/file.txt", "x");

        let manifest = fx.manifest(SINGLE_TARGET);
        let err = fx.render(&manifest).unwrap_err();
        assert!(format!("{err:#}").contains("not.there"));
    }

    #[test]
    fn test_strict_missing_key_in_template_fails() {
        let fx = Fixture::new();
        fx.write("templates/base/bad.templ.txt", "{{ values.nobody.declared }}");

        let manifest = fx.manifest(SINGLE_TARGET);
        assert!(fx.render(&manifest).is_err());
    }

    #[test]
    fn test_failing_target_does_not_stop_others() {
        let fx = Fixture::new();
        fx.write("templates/good/fine.txt", "fine");
        fx.write(
            "templates/bad/gok-template.yaml",
            "version: 1\nimports:\n  values:\n    missing: {required: true}\n",
        );
        fx.write("templates/bad/file.txt", "x");

        let manifest = fx.manifest(
            "version: 1\ntargets:\n  bad:\n    output: bad\n    templates:\n      - path: templates/bad\n  good:\n    output: good\n    templates:\n      - path: templates/good\n",
        );
        let err = fx.render(&manifest).unwrap_err();
        // the good target still rendered
        assert_eq!(fx.output("good/fine.txt"), "fine");
        assert!(format!("{err:#}").contains("target bad"));
    }

    #[test]
    fn test_value_precedence_end_to_end() {
        let fx = Fixture::new();
        fx.write(
            "templates/base/gok-template.yaml",
            "version: 1\nimports:\n  values:\n    my_value: {required: true}\n",
        );
        fx.write("templates/base/value.templ.txt", "{{ values.my_value }}");

        let manifest = fx.manifest(
            "version: 1\nvalues:\n  my_value: '1'\ntargets:\n  web:\n    output: web\n    values:\n      my_value: '2'\n    templates:\n      - path: templates/base\n        values:\n          my_value: '3'\n",
        );

        let external = ValueOverrides::from_flags(&["my_value=4"]).unwrap();
        let flags = ValueOverrides::from_flags(&["my_value=5"]).unwrap();
        fx.render_with(&manifest, &external, &flags).unwrap();

        assert_eq!(fx.output("web/value.txt"), "5");
    }

    #[test]
    fn test_output_escape_is_rejected() {
        let fx = Fixture::new();
        fx.write("templates/base/file.txt", "x");
        let manifest = fx.manifest(
            "version: 1\ntargets:\n  bad:\n    output: ../outside\n    templates:\n      - path: templates/base\n",
        );
        let err = fx.render(&manifest).unwrap_err();
        assert!(format!("{err:#}").contains("escape"));
    }

    #[test]
    fn test_lookup_sanity_on_rendered_values() {
        // guard: the fixture secrets tree parses the way the tests assume
        let secrets: Values = serde_yaml::from_str("db:\n  password: sup3r-secret\n").unwrap();
        assert_eq!(
            lookup_nested(&secrets, "db.password"),
            Some(&Value::from("sup3r-secret"))
        );
    }
}
