//! Card image fetching for catalog products.
//!
//! The engine only asks for bytes when the catalog has no asset registered
//! for a source URL yet. Fetched images can be kept in a local file cache so
//! rebuilding a catalog does not download everything again.

use crate::error::CatalogError;
use std::path::{Path, PathBuf};

pub const DEFAULT_USER_AGENT: &str = "tcg_sync/1.0";

/// Source of image bytes for a URL
pub trait AssetFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, CatalogError>;
}

impl<T: AssetFetcher + ?Sized> AssetFetcher for &T {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, CatalogError> {
        (**self).fetch(url)
    }
}

impl<T: AssetFetcher + ?Sized> AssetFetcher for Box<T> {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, CatalogError> {
        (**self).fetch(url)
    }
}

/// Blocking HTTP fetcher
pub struct HttpAssetFetcher {
    client: reqwest::blocking::Client,
    user_agent: String,
}

impl HttpAssetFetcher {
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
            user_agent: user_agent.into(),
        }
    }
}

impl Default for HttpAssetFetcher {
    fn default() -> Self {
        Self::new(DEFAULT_USER_AGENT)
    }
}

impl AssetFetcher for HttpAssetFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, CatalogError> {
        log::debug!("Fetching image from URL: {}", url);
        let fail = |reason: String| CatalogError::AssetFetch {
            url: url.to_string(),
            reason,
        };

        let response = self
            .client
            .get(url)
            .header("User-Agent", &self.user_agent)
            .send()
            .map_err(|e| fail(e.to_string()))?;

        if !response.status().is_success() {
            return Err(fail(format!("HTTP {}", response.status())));
        }
        let bytes = response.bytes().map_err(|e| fail(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

/// Never fetches; used when the catalog runs offline
pub struct NoAssetFetcher;

impl AssetFetcher for NoAssetFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, CatalogError> {
        Err(CatalogError::AssetFetch {
            url: url.to_string(),
            reason: "image fetching is disabled".to_string(),
        })
    }
}

/// File cache in front of another fetcher, keyed by the URL
pub struct CachedAssetFetcher<F> {
    cache_dir: PathBuf,
    inner: F,
}

impl<F: AssetFetcher> CachedAssetFetcher<F> {
    pub fn new(cache_dir: &Path, inner: F) -> Self {
        if let Err(e) = std::fs::create_dir_all(cache_dir) {
            log::warn!("Failed to create image cache directory: {}", e);
        } else {
            log::info!("Image cache directory: {:?}", cache_dir);
        }
        Self {
            cache_dir: cache_dir.to_path_buf(),
            inner,
        }
    }

    fn cache_path(&self, url: &str) -> PathBuf {
        self.cache_dir.join(cache_file_name(url))
    }

    pub fn contains(&self, url: &str) -> bool {
        self.cache_path(url).exists()
    }
}

impl<F: AssetFetcher> AssetFetcher for CachedAssetFetcher<F> {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, CatalogError> {
        let path = self.cache_path(url);
        if let Ok(bytes) = std::fs::read(&path) {
            log::debug!("Image cache hit for {}", url);
            return Ok(bytes);
        }

        log::info!("Image cache miss for {}, fetching", url);
        let bytes = self.inner.fetch(url)?;
        if let Err(e) = std::fs::write(&path, &bytes) {
            log::warn!("Failed to cache image {}: {}", url, e);
        }
        Ok(bytes)
    }
}

/// Flatten a URL into a file name: host and path with every non-alphanumeric
/// character (other than `.`) replaced by `_`.
fn cache_file_name(url: &str) -> String {
    let without_scheme = url.split_once("://").map_or(url, |(_, rest)| rest);
    let name: String = without_scheme
        .trim_end_matches('/')
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' { c } else { '_' })
        .collect();
    if name.is_empty() {
        "_".to_string()
    } else {
        name
    }
}
