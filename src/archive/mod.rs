//! Archive adapter: pack a directory into a tar / tar.gz, extract one back.
//!
//! Entry names inside archives use forward slashes. Directory entries are
//! omitted when packing; parents are recreated on extract. Entry types other
//! than regular files and directories are skipped with a warning.

use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Component, Path};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::utils::fs::{ensure_dir, ensure_parent_dir};

/// Pack the contents of `src_dir` into a tar archive at `dst_path`,
/// gzip-compressed when `compress` is set.
pub fn create(src_dir: &Path, dst_path: &Path, compress: bool) -> Result<()> {
    ensure_parent_dir(dst_path)?;
    let file = File::create(dst_path)
        .with_context(|| format!("create archive {}", dst_path.display()))?;

    if compress {
        let encoder = GzEncoder::new(file, Compression::default());
        let mut builder = tar::Builder::new(encoder);
        pack_into(src_dir, &mut builder)?;
        let encoder = builder.into_inner().context("finish tar stream")?;
        encoder.finish().context("finish gzip stream")?;
    } else {
        let mut builder = tar::Builder::new(file);
        pack_into(src_dir, &mut builder)?;
        builder.into_inner().context("finish tar stream")?;
    }
    Ok(())
}

fn pack_into<W: Write>(src_dir: &Path, builder: &mut tar::Builder<W>) -> Result<()> {
    for entry in WalkDir::new(src_dir).sort_by_file_name() {
        let entry = entry.with_context(|| format!("walk {}", src_dir.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let rel = entry
            .path()
            .strip_prefix(src_dir)
            .expect("walked entries live under the walk root");
        let name = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");

        builder
            .append_path_with_name(entry.path(), &name)
            .with_context(|| format!("add {name} to archive"))?;
        debug!("added file to archive: {name}");
    }
    Ok(())
}

/// Extract a tar / tar.gz archive into `dst_dir`. Gzip is detected from the
/// `.gz` file name suffix.
pub fn extract(src_path: &Path, dst_dir: &Path) -> Result<()> {
    let file =
        File::open(src_path).with_context(|| format!("open archive {}", src_path.display()))?;

    let gzipped = src_path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("gz"));
    if gzipped {
        unpack(tar::Archive::new(GzDecoder::new(file)), dst_dir)
    } else {
        unpack(tar::Archive::new(file), dst_dir)
    }
}

fn unpack<R: Read>(mut archive: tar::Archive<R>, dst_dir: &Path) -> Result<()> {
    ensure_dir(dst_dir)?;

    for entry in archive.entries().context("read tar entries")? {
        let mut entry = entry.context("read tar header")?;
        let name = entry.path().context("read entry path")?.into_owned();

        if name
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)))
        {
            warn!("skipping entry with unsafe path: {}", name.display());
            continue;
        }
        let target = dst_dir.join(&name);

        match entry.header().entry_type() {
            tar::EntryType::Directory => {
                ensure_dir(&target)?;
            }
            tar::EntryType::Regular => {
                ensure_parent_dir(&target)?;
                let mut out = File::create(&target)
                    .with_context(|| format!("create {}", target.display()))?;
                std::io::copy(&mut entry, &mut out)
                    .with_context(|| format!("extract {}", target.display()))?;

                #[cfg(unix)]
                if let Ok(mode) = entry.header().mode() {
                    use std::os::unix::fs::PermissionsExt;
                    std::fs::set_permissions(&target, std::fs::Permissions::from_mode(mode))
                        .with_context(|| format!("set permissions on {}", target.display()))?;
                }
                debug!("extracted file: {}", target.display());
            }
            other => {
                warn!(
                    "unsupported tar entry type {:?} for {}, skipping",
                    other,
                    name.display()
                );
            }
        }
    }
    Ok(())
}
