//! Fetching, verification and caching of artifacts.
//!
//! Artifacts are cached content-addressed under
//! `<user cache>/gok/artifacts/<algorithm>/<checksum>`. A cache hit places
//! the file without touching the network. On a miss the body is streamed
//! into a temp file inside the cache directory while a SHA-256 digest is
//! computed on the fly; only bytes whose digest matches the declared
//! checksum are renamed into the cache. The cache is shared across
//! processes; the temp-then-rename insert keeps concurrent writers safe.
//!
//! The processor makes no retries. The download path is the natural seam for
//! a retrying or concurrent implementation later.

use anyhow::{Context, Result};
use futures::StreamExt;
use sha2::{Digest, Sha256};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::artifact::ArtifactSpec;
use crate::core::{Cancellation, GokError};
use crate::utils::fs::{copy_file, ensure_dir, ensure_parent_dir};

/// Resolves artifact specs against the content-addressed cache.
pub struct Processor {
    cache_dir: PathBuf,
    client: reqwest::Client,
}

impl Processor {
    /// Processor backed by the per-user cache directory
    /// (`GOK_CACHE_DIR` overrides the platform default).
    pub fn new() -> Result<Self> {
        let cache_dir = match std::env::var_os("GOK_CACHE_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => dirs::cache_dir()
                .context("determining user cache directory")?
                .join("gok")
                .join("artifacts"),
        };
        Self::with_cache_dir(cache_dir)
    }

    /// Processor backed by an explicit cache directory.
    pub fn with_cache_dir(cache_dir: impl Into<PathBuf>) -> Result<Self> {
        let cache_dir = cache_dir.into();
        ensure_dir(&cache_dir)?;
        Ok(Self {
            cache_dir,
            client: reqwest::Client::new(),
        })
    }

    /// The cache location used by this processor.
    #[must_use]
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Ensure the artifact described by `spec` exists at `dest_path`,
    /// downloading it into the cache first when necessary.
    pub async fn process(
        &self,
        cancel: &Cancellation,
        dest_path: &Path,
        spec: &ArtifactSpec,
    ) -> Result<()> {
        let cache_path = self.cache_dir.join(&spec.algorithm).join(&spec.checksum);

        if cache_path.exists() {
            info!("artifact found in cache: {}", cache_path.display());
            return self.place_file(&cache_path, dest_path);
        }

        debug!("artifact not cached, downloading to {}", cache_path.display());
        self.download(cancel, &cache_path, dest_path, spec).await?;
        self.place_file(&cache_path, dest_path)
    }

    fn place_file(&self, cache_path: &Path, dest_path: &Path) -> Result<()> {
        copy_file(cache_path, dest_path)
            .with_context(|| format!("place artifact at {}", dest_path.display()))?;
        info!("artifact placed at {}", dest_path.display());
        Ok(())
    }

    async fn download(
        &self,
        cancel: &Cancellation,
        cache_path: &Path,
        dest_path: &Path,
        spec: &ArtifactSpec,
    ) -> Result<()> {
        let http = spec
            .http()
            .expect("validated specs always carry an http source");
        let fetch_error = |reason: String| GokError::FetchError {
            url: http.url.clone(),
            reason,
        };

        let mut request = self.client.get(&http.url);
        for (name, value) in &http.headers {
            request = request.header(name, value);
        }

        let response = request
            .send()
            .await
            .map_err(|e| fetch_error(e.to_string()))?;
        if !response.status().is_success() {
            return Err(fetch_error(format!("unexpected http status: {}", response.status())).into());
        }

        // stream into a temp file next to the final cache location while
        // hashing; the temp file is unlinked on any failure path
        let mut temp = tempfile::Builder::new()
            .prefix("download-")
            .tempfile_in(&self.cache_dir)
            .context("create temp file for download")?;
        let mut hasher = Sha256::new();

        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            cancel.check()?;
            let chunk = chunk.map_err(|e| fetch_error(e.to_string()))?;
            hasher.update(&chunk);
            temp.write_all(&chunk).context("write download chunk")?;
        }
        temp.flush().context("flush downloaded artifact")?;

        let actual = hex::encode(hasher.finalize());
        if actual != spec.checksum {
            return Err(GokError::ChecksumMismatch {
                path: dest_path.display().to_string(),
                expected: spec.checksum.clone(),
                actual,
            }
            .into());
        }

        ensure_parent_dir(cache_path)?;
        temp.persist(cache_path)
            .with_context(|| format!("move artifact into cache {}", cache_path.display()))?;

        info!("artifact downloaded and cached: {}", cache_path.display());
        Ok(())
    }
}
