//! The `render` subcommand.

use anyhow::{Context, Result};
use clap::Args;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::archive;
use crate::artifact::Processor;
use crate::constants::MANIFEST_FILE_NAME;
use crate::core::Cancellation;
use crate::logging::Redactor;
use crate::lockfile;
use crate::manifest::{read_manifest, select_targets};
use crate::render::{Engine, RenderSources};
use crate::strategy::Registry;
use crate::template::TemplateCache;
use crate::values::overrides::{load_values_file, ValueOverrides};
use crate::values::{collect_strings, Values};

/// Render targets from a manifest by applying a series of template layers.
#[derive(Debug, Args)]
#[command(group(
    clap::ArgGroup::new("selection")
        .required(true)
        .multiple(true)
        .args(["targets", "tags", "all_targets"]),
))]
pub struct RenderCommand {
    /// Path to the manifest file.
    #[arg(short = 'm', long = "manifest", default_value = MANIFEST_FILE_NAME)]
    pub manifest: PathBuf,

    /// Targets to render, by name. Repeatable.
    #[arg(short = 't', long = "targets", conflicts_with = "all_targets")]
    pub targets: Vec<String>,

    /// Render all targets carrying one of these tags. Repeatable.
    #[arg(long = "tags", conflicts_with = "all_targets")]
    pub tags: Vec<String>,

    /// Render every target in the manifest.
    #[arg(short = 'A', long = "all-targets")]
    pub all_targets: bool,

    /// Additional values files, merged over manifest values. Repeatable.
    #[arg(short = 'f', long = "values")]
    pub values_files: Vec<PathBuf>,

    /// Secrets file; use '-' to read from stdin.
    #[arg(short = 's', long = "secrets")]
    pub secrets_file: Option<String>,

    /// Value overrides: key=value or @target.key=value. Repeatable.
    #[arg(short = 'v', long = "set")]
    pub set: Vec<String>,

    /// Output path. Ends in .tar/.tar.gz: pack an archive there; otherwise
    /// a directory that must not yet exist. Default: temporary directory.
    #[arg(short = 'o', long = "out")]
    pub out: Option<PathBuf>,

    /// Keep the temporary working directory (for debugging).
    #[arg(long = "no-delete")]
    pub no_delete: bool,

    /// Overwrite existing files instead of skipping them.
    #[arg(long = "overwrite")]
    pub overwrite: bool,
}

/// How the rendered tree leaves the work directory.
enum OutputMode {
    /// Work directory is the final output.
    Directory,
    /// Pack the work directory into a tar archive, gzipped or not.
    Archive { path: PathBuf, gzip: bool },
}

impl RenderCommand {
    /// Run the full render pipeline: select targets, render layers, resolve
    /// artifacts, write the lock file and materialize the output.
    pub async fn execute(self, cancel: &Cancellation) -> Result<()> {
        if self.targets.is_empty() && self.tags.is_empty() && !self.all_targets {
            anyhow::bail!("select targets with -t, --tags or -A");
        }

        let (manifest, manifest_dir) =
            read_manifest(&self.manifest).context("reading manifest")?;

        let targets = select_targets(&manifest, self.all_targets, &self.targets, &self.tags)
            .context("selecting targets")?;
        if targets.is_empty() {
            anyhow::bail!("no targets matched the selection criteria");
        }
        for target in &targets {
            info!("selected render target: {}", target.id);
        }

        let external =
            ValueOverrides::load_files(&self.values_files).context("loading values files")?;
        let flags = ValueOverrides::from_flags(&self.set).context("parsing -v overrides")?;

        let secrets: Values = match &self.secrets_file {
            Some(path) => {
                let secrets = load_values_file(path).context("loading secrets")?;
                // every string leaf is masked in log output from here on
                Redactor::global()
                    .add_secrets(collect_strings(&serde_yaml::Value::Mapping(secrets.clone())));
                secrets
            }
            None => Values::new(),
        };

        let (work_dir, temp_dir, output_mode) = self.prepare_work_dir()?;

        let result = render_pipeline(
            cancel,
            &manifest_dir,
            &work_dir,
            &manifest,
            &secrets,
            &external,
            &flags,
            &targets,
            self.overwrite,
            &output_mode,
        )
        .await;

        match temp_dir {
            Some(dir) if self.no_delete => {
                let kept = dir.into_path();
                info!("keeping working directory: {}", kept.display());
            }
            Some(dir) => {
                debug!("removing working directory: {}", dir.path().display());
                drop(dir);
            }
            None => {}
        }

        result?;
        info!("rendered {} target(s)", targets.len());
        Ok(())
    }

    /// Work directory and output mode for this invocation.
    fn prepare_work_dir(&self) -> Result<(PathBuf, Option<tempfile::TempDir>, OutputMode)> {
        match &self.out {
            Some(out) => {
                let name = out.to_string_lossy();
                if name.ends_with(".tar.gz") || name.ends_with(".tgz") || name.ends_with(".tar") {
                    let temp = tempfile::Builder::new()
                        .prefix("gok-workdir-")
                        .tempdir()
                        .context("creating working directory")?;
                    let work = temp.path().to_path_buf();
                    let gzip = !name.ends_with(".tar");
                    Ok((
                        work,
                        Some(temp),
                        OutputMode::Archive {
                            path: out.clone(),
                            gzip,
                        },
                    ))
                } else {
                    if out.exists() {
                        anyhow::bail!("output path {} already exists", out.display());
                    }
                    debug!("using specified output directory: {}", out.display());
                    Ok((out.clone(), None, OutputMode::Directory))
                }
            }
            None => {
                let temp = tempfile::Builder::new()
                    .prefix("gok-workdir-")
                    .tempdir()
                    .context("creating working directory")?;
                let work = temp.path().to_path_buf();
                debug!("created temporary working directory: {}", work.display());
                Ok((work, Some(temp), OutputMode::Directory))
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn render_pipeline(
    cancel: &Cancellation,
    manifest_dir: &Path,
    work_dir: &Path,
    manifest: &crate::manifest::Manifest,
    secrets: &Values,
    external: &ValueOverrides,
    flags: &ValueOverrides,
    targets: &[&crate::manifest::Target],
    overwrite: bool,
    output_mode: &OutputMode,
) -> Result<()> {
    let templates = TemplateCache::new();
    let registry = Registry::standard(overwrite);
    let sources = RenderSources {
        manifest,
        secrets,
        external,
        flags,
    };

    let mut engine = Engine::new(manifest_dir, work_dir, &templates, &registry)
        .context("creating render engine")?;
    engine
        .render_targets(cancel, &sources, targets)
        .context("rendering targets")?;

    // artifacts resolve only after every target has rendered
    let artifacts = engine.into_artifacts();
    if !artifacts.is_empty() {
        let processor = Processor::new().context("creating artifact processor")?;
        artifacts
            .process_all(cancel, &processor)
            .await
            .context("processing artifacts")?;
    }

    lockfile::create(cancel, work_dir).context("writing lock file")?;

    if let OutputMode::Archive { path, gzip } = output_mode {
        archive::create(work_dir, path, *gzip)
            .with_context(|| format!("packing archive {}", path.display()))?;
        info!("packed archive: {}", path.display());
    }

    Ok(())
}
