//! Image enrichment service.
//!
//! Searches a stock image provider, downloads the best hit into the LRU
//! cache and reports attribution. Also stores user uploads.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::cache::{CacheEntry, CacheStats, CacheStore, EvictionReport, ImageCache, JsonFileStore};
use crate::config::{DaemonConfig, ImageConfig};
use crate::error::{DaemonError, Result};
use crate::types::ImageMetadata;

use super::provider::{cache_key, ImageHit, ImageProvider};

/// Timeout for provider search calls.
const SEARCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for downloading the image itself.
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// Searches providers and manages cached and uploaded images.
pub struct ImageService<S: CacheStore = JsonFileStore> {
    cache: ImageCache<S>,
    uploads_dir: PathBuf,
    keys: ImageConfig,
    client: reqwest::blocking::Client,
    api_base: Option<String>,
}

impl ImageService<JsonFileStore> {
    /// Opens the persistent cache and upload directory from configuration.
    pub fn from_config(config: &DaemonConfig) -> Result<Self> {
        let store = JsonFileStore::open(config.image_cache_index())?;
        let cache = ImageCache::new(
            store,
            config.image_cache_dir(),
            config.images.max_cache_bytes,
            chrono::Duration::try_days(config.images.cache_expiry_days).ok_or_else(|| {
                DaemonError::store_failed(format!(
                    "Image cache expiry of {} days is out of range",
                    config.images.cache_expiry_days
                ))
            })?,
        )?;

        info!(
            cache_dir = %config.image_cache_dir().display(),
            uploads_dir = %config.image_uploads_dir().display(),
            "Initializing image service"
        );
        Self::new(cache, config.image_uploads_dir(), config.images.clone())
    }
}

impl<S: CacheStore> ImageService<S> {
    /// Creates a service over `cache`, storing uploads under `uploads_dir`.
    pub fn new(
        cache: ImageCache<S>,
        uploads_dir: impl Into<PathBuf>,
        keys: ImageConfig,
    ) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("anki-media-daemon/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                DaemonError::provider_failed("http", format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            cache,
            uploads_dir: uploads_dir.into(),
            keys,
            client,
            api_base: None,
        })
    }

    /// Sends every provider search to `base_url` instead of the public API.
    pub fn with_api_base(mut self, base_url: impl Into<String>) -> Self {
        self.api_base = Some(base_url.into());
        self
    }

    pub fn cache(&self) -> &ImageCache<S> {
        &self.cache
    }

    pub fn uploads_dir(&self) -> &Path {
        &self.uploads_dir
    }

    /// Finds an image for `query`, preferring a fresh cached copy.
    ///
    /// Returns `Ok(None)` when the provider has no API key configured or
    /// no results. Unknown provider names, provider failures and download
    /// failures are errors.
    pub fn search_image(&mut self, query: &str, provider: &str) -> Result<Option<ImageMetadata>> {
        let provider =
            ImageProvider::parse(provider).ok_or_else(|| DaemonError::unknown_provider(provider))?;
        let key = cache_key(query, provider);
        let now = Utc::now();

        if let Some(entry) = self.cache.get_at(&key, now)? {
            if !entry.is_expired_at(now) && entry.path.exists() {
                info!(query, provider = %provider, "Using cached image");
                return Ok(Some(metadata_from_entry(&entry, provider)));
            }
            debug!(key = %key, "Cached image is stale, refetching");
        }

        let Some(api_key) = self.api_key(provider) else {
            warn!(provider = %provider, "API key not configured");
            return Ok(None);
        };

        let Some(hit) = self.search_provider(provider, query.trim(), &api_key)? else {
            warn!(provider = %provider, query, "No results");
            return Ok(None);
        };

        let bytes = self.download(&hit.image_url)?;
        let entry = self
            .cache
            .put_at(&key, &bytes, provider.as_str(), &hit.attribution, now)?;
        if !entry.path.exists() {
            return Ok(None);
        }

        Ok(Some(ImageMetadata {
            url: hit.image_url,
            source: provider.as_str().to_string(),
            license: Some(provider.license().to_string()),
            attribution_text: hit.attribution,
            cached_path: entry.path.to_string_lossy().into_owned(),
            cache_expiry: Some(entry.expires_at),
        }))
    }

    /// Saves an uploaded image and returns where it was written.
    pub fn save_uploaded_image(&self, content: &[u8], filename: &str) -> Result<PathBuf> {
        fs::create_dir_all(&self.uploads_dir).map_err(|e| {
            DaemonError::cache_io(
                format!("Failed to create uploads directory {}", self.uploads_dir.display()),
                e,
            )
        })?;

        let path = self.uploads_dir.join(upload_file_name(filename, Utc::now()));
        fs::write(&path, content).map_err(|e| {
            DaemonError::cache_io(format!("Failed to save upload {}", path.display()), e)
        })?;

        info!(path = %path.display(), bytes = content.len(), "Saved uploaded image");
        Ok(path)
    }

    /// Removes expired cache entries and their files.
    pub fn cleanup_expired_cache(&mut self) -> Result<EvictionReport> {
        self.cache.sweep_expired()
    }

    pub fn stats(&self) -> Result<CacheStats> {
        self.cache.stats()
    }

    fn api_key(&self, provider: ImageProvider) -> Option<String> {
        match provider {
            ImageProvider::Unsplash => self.keys.unsplash_key.clone(),
            ImageProvider::Pexels => self.keys.pexels_key.clone(),
            ImageProvider::Pixabay => self.keys.pixabay_key.clone(),
        }
    }

    fn search_provider(
        &self,
        provider: ImageProvider,
        query: &str,
        api_key: &str,
    ) -> Result<Option<ImageHit>> {
        let base = self
            .api_base
            .as_deref()
            .unwrap_or_else(|| provider.default_base_url());
        let request = provider.search_request(base, query, api_key);

        let mut builder = self
            .client
            .get(&request.url)
            .query(&request.params)
            .timeout(SEARCH_TIMEOUT);
        if let Some(auth) = &request.authorization {
            builder = builder.header(reqwest::header::AUTHORIZATION, auth.as_str());
        }

        let response = builder
            .send()
            .map_err(|e| DaemonError::provider_failed(provider.as_str(), e.to_string()))?;
        if !response.status().is_success() {
            return Err(DaemonError::provider_failed(
                provider.as_str(),
                format!("HTTP {}", response.status()),
            ));
        }

        let body: Value = response
            .json()
            .map_err(|e| {
                DaemonError::provider_failed(provider.as_str(), format!("Invalid JSON: {}", e))
            })?;
        provider.parse_search_response(&body)
    }

    fn download(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .timeout(DOWNLOAD_TIMEOUT)
            .send()
            .map_err(|e| DaemonError::download_failed(url, e.to_string()))?;
        if !response.status().is_success() {
            return Err(DaemonError::download_failed(url, format!("HTTP {}", response.status())));
        }

        let bytes = response
            .bytes()
            .map_err(|e| DaemonError::download_failed(url, e.to_string()))?;
        debug!(url, bytes = bytes.len(), "Downloaded image");
        Ok(bytes.to_vec())
    }
}

fn metadata_from_entry(entry: &CacheEntry, provider: ImageProvider) -> ImageMetadata {
    ImageMetadata {
        url: entry.key.clone(),
        source: entry.source.clone(),
        license: Some(provider.license().to_string()),
        attribution_text: entry.attribution.clone(),
        cached_path: entry.path.to_string_lossy().into_owned(),
        cache_expiry: Some(entry.expires_at),
    }
}

/// Builds a safe upload file name: directory components are dropped and a
/// `%Y%m%d_%H%M%S_` UTC timestamp is prefixed.
pub fn upload_file_name(filename: &str, now: DateTime<Utc>) -> String {
    let base = filename
        .rsplit(['/', '\\'])
        .next()
        .map(str::trim)
        .filter(|name| !name.is_empty() && *name != "." && *name != "..")
        .unwrap_or("upload");
    format!("{}_{}", now.format("%Y%m%d_%H%M%S"), base)
}
