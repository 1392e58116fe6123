//! Offline cache for static assets (gallery images)
//!
//! Cache-then-network: a stored file is served without touching the
//! network, otherwise the asset is downloaded once and kept on disk.
//! Search and detail pages are never cached; they always go to the network.

use anyhow::{Context, Result};
use std::hash::{Hash, Hasher};
use std::path::PathBuf;
use std::time::{Duration, SystemTime};
use tracing::{debug, info};
use url::Url;

use crate::fetch::Fetcher;

/// Extensions treated as static assets
const STATIC_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "webp", "bmp", "svg", "ico", "css", "js", "woff", "woff2",
];

/// Where a served asset came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetSource {
    Cache,
    Network,
}

#[derive(Debug, Clone)]
pub struct CachedAsset {
    pub path: PathBuf,
    pub source: AssetSource,
}

/// Disk cache keyed by request URL
#[derive(Debug, Clone)]
pub struct AssetCache {
    dir: PathBuf,
    /// URL prefixes that must always go to the network
    network_only: Vec<String>,
    max_age: Duration,
}

impl AssetCache {
    /// Create the cache directory
    pub fn new(dir: PathBuf, network_only: Vec<String>, max_age_days: u64) -> Result<Self> {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create asset cache directory {}", dir.display()))?;

        Ok(Self {
            dir,
            network_only,
            max_age: Duration::from_secs(max_age_days.saturating_mul(86_400)),
        })
    }

    /// Whether `url` may be served from the cache
    pub fn is_cacheable(&self, url: &str) -> bool {
        if self.network_only.iter().any(|prefix| url.starts_with(prefix.as_str())) {
            return false;
        }

        Url::parse(url)
            .ok()
            .and_then(|u| asset_extension(&u))
            .is_some()
    }

    /// Serve `url` from disk, downloading it through `fetcher` on a miss
    pub async fn fetch(&self, fetcher: &dyn Fetcher, url: &str) -> Result<CachedAsset> {
        if !self.is_cacheable(url) {
            anyhow::bail!("Not a cacheable static asset: {}", url);
        }

        let path = self.dir.join(url_to_filename(url));
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            debug!(url, path = %path.display(), "asset served from cache");
            return Ok(CachedAsset {
                path,
                source: AssetSource::Cache,
            });
        }

        let bytes = fetcher
            .fetch_bytes(url)
            .await
            .with_context(|| format!("Failed to download {}", url))?;

        // Write to a temporary name first so a partial file is never served
        let partial = path.with_extension("partial");
        tokio::fs::write(&partial, &bytes)
            .await
            .context("Failed to write cached asset")?;
        tokio::fs::rename(&partial, &path)
            .await
            .context("Failed to finalize cached asset")?;

        debug!(url, bytes = bytes.len(), "asset cached");
        Ok(CachedAsset {
            path,
            source: AssetSource::Network,
        })
    }

    /// Remove cached files older than the configured max age
    pub async fn cleanup_old_files(&self) -> Result<usize> {
        let now = SystemTime::now();
        let mut removed = 0;

        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .with_context(|| format!("Failed to read {}", self.dir.display()))?;

        while let Some(entry) = entries.next_entry().await? {
            let Ok(metadata) = entry.metadata().await else {
                continue;
            };
            if !metadata.is_file() {
                continue;
            }
            let expired = metadata
                .modified()
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .is_some_and(|age| age > self.max_age);
            if expired && tokio::fs::remove_file(entry.path()).await.is_ok() {
                removed += 1;
            }
        }

        if removed > 0 {
            info!(removed, "evicted old cached assets");
        }
        Ok(removed)
    }

    #[cfg(test)]
    pub fn dir(&self) -> &std::path::Path {
        &self.dir
    }
}

fn asset_extension(url: &Url) -> Option<String> {
    let last = url.path_segments()?.next_back()?;
    let (_, ext) = last.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    STATIC_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

/// Generate deterministic filename from URL
///
/// Format: {host}_{hash}.{ext}
/// Example: irc_fda_gov_ir_a3f8d912c0ffee11.jpg
fn url_to_filename(url: &str) -> String {
    let parsed = Url::parse(url).ok();

    let host = parsed
        .as_ref()
        .and_then(|u| u.host_str().map(String::from))
        .unwrap_or_else(|| "unknown".to_string());
    let clean_host = host.trim_start_matches("www.").replace('.', "_");

    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    url.hash(&mut hasher);
    let hash = format!("{:016x}", hasher.finish());

    let ext = parsed
        .as_ref()
        .and_then(asset_extension)
        .unwrap_or_else(|| "bin".to_string());

    format!("{}_{}.{}", clean_host, hash, ext)
}
