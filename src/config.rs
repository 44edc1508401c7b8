//! Daemon configuration module.
//!
//! Contains the runtime configuration for the anki-media-daemon: speech
//! synthesis endpoints and timeouts, media storage paths, cache limits and
//! image provider API keys.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::wyoming::{parse_endpoint, Endpoint, DEFAULT_WYOMING_PORT};

/// Default base URL of the Piper service.
pub const DEFAULT_PIPER_URL: &str = "http://127.0.0.1:10200";

/// Bytes per megabyte, used for the cache ceiling setting.
const MB: u64 = 1024 * 1024;

/// Longest accepted lifetime for cached images and reference audio.
pub const MAX_EXPIRY_DAYS: i64 = 36_500;

/// Speech synthesis settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TtsConfig {
    /// Base URL of the Piper service. Used for HTTP `/api/tts` and as the
    /// primary Wyoming endpoint.
    pub piper_url: String,

    /// Port tried after the configured Wyoming endpoint refuses or times out.
    pub fallback_port: u16,

    /// Bound on each TCP connect attempt.
    pub connect_timeout_secs: u64,

    /// Bound on each socket read once connected.
    pub read_timeout_secs: u64,

    /// Voice used when a request does not name one.
    pub default_voice: String,

    /// Days before generated reference audio counts as expired.
    pub audio_expiry_days: i64,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            piper_url: DEFAULT_PIPER_URL.to_string(),
            fallback_port: DEFAULT_WYOMING_PORT,
            connect_timeout_secs: 6,
            read_timeout_secs: 30,
            default_voice: "nl_NL-rdh-medium".to_string(),
            audio_expiry_days: 30,
        }
    }
}

impl TtsConfig {
    /// Ordered list of Wyoming endpoints: the configured one, then the
    /// fallback port on the same host when it differs.
    pub fn wyoming_endpoints(&self) -> Vec<Endpoint> {
        let primary = parse_endpoint(&self.piper_url);
        let mut endpoints = vec![primary.clone()];
        if primary.port != self.fallback_port {
            endpoints.push(Endpoint::new(primary.host, self.fallback_port));
        }
        endpoints
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }
}

/// Image cache and provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageConfig {
    /// Ceiling for the total size of cached images, in bytes.
    pub max_cache_bytes: u64,

    /// Days a cached image stays fresh.
    pub cache_expiry_days: i64,

    /// Unsplash access key (`UNSPLASH_ACCESS_KEY`).
    #[serde(skip_serializing)]
    pub unsplash_key: Option<String>,

    /// Pexels API key (`PEXELS_API_KEY`).
    #[serde(skip_serializing)]
    pub pexels_key: Option<String>,

    /// Pixabay API key (`PIXABAY_API_KEY`).
    #[serde(skip_serializing)]
    pub pixabay_key: Option<String>,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            max_cache_bytes: 500 * MB,
            cache_expiry_days: 7,
            unsplash_key: None,
            pexels_key: None,
            pixabay_key: None,
        }
    }
}

/// Runtime configuration for the daemon.
///
/// This configuration is typically loaded from environment variables at
/// startup and then adjusted from command-line arguments.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Root directory for generated audio, cached images and uploads.
    /// If None, uses the platform-specific default data location.
    pub data_path: Option<PathBuf>,

    /// Speech synthesis settings.
    pub tts: TtsConfig,

    /// Image cache settings.
    pub images: ImageConfig,
}

impl DaemonConfig {
    /// Creates a new DaemonConfig with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a DaemonConfig from environment variables.
    ///
    /// Reads the following environment variables:
    /// - `PIPER_API_URL` - Piper base URL (HTTP and Wyoming endpoint)
    /// - `ANKI_MEDIA_WYOMING_FALLBACK_PORT` - Second Wyoming port to try
    /// - `ANKI_MEDIA_CONNECT_TIMEOUT_SECS` - TCP connect timeout
    /// - `ANKI_MEDIA_READ_TIMEOUT_SECS` - Socket read timeout
    /// - `ANKI_MEDIA_VOICE` - Default Piper voice
    /// - `ANKI_MEDIA_AUDIO_EXPIRY_DAYS` - Reference audio lifetime
    /// - `ANKI_MEDIA_DATA_PATH` - Root directory for media files
    /// - `ANKI_MEDIA_IMAGE_CACHE_MAX_MB` - Image cache ceiling
    /// - `ANKI_MEDIA_IMAGE_CACHE_DAYS` - Image cache entry lifetime
    /// - `UNSPLASH_ACCESS_KEY`, `PEXELS_API_KEY`, `PIXABAY_API_KEY`
    ///
    /// Falls back to defaults for unset or unparsable variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("PIPER_API_URL") {
            if !url.trim().is_empty() {
                config.tts.piper_url = url.trim().to_string();
            }
        }

        if let Some(port) = env_parse::<u16>("ANKI_MEDIA_WYOMING_FALLBACK_PORT") {
            if port > 0 {
                config.tts.fallback_port = port;
            }
        }

        if let Some(secs) = env_parse::<u64>("ANKI_MEDIA_CONNECT_TIMEOUT_SECS") {
            if secs > 0 {
                config.tts.connect_timeout_secs = secs;
            }
        }

        if let Some(secs) = env_parse::<u64>("ANKI_MEDIA_READ_TIMEOUT_SECS") {
            if secs > 0 {
                config.tts.read_timeout_secs = secs;
            }
        }

        if let Ok(voice) = std::env::var("ANKI_MEDIA_VOICE") {
            if !voice.trim().is_empty() {
                config.tts.default_voice = voice.trim().to_string();
            }
        }

        if let Some(days) = env_parse::<i64>("ANKI_MEDIA_AUDIO_EXPIRY_DAYS") {
            if days > 0 {
                config.tts.audio_expiry_days = days;
            }
        }

        if let Ok(path) = std::env::var("ANKI_MEDIA_DATA_PATH") {
            config.data_path = Some(PathBuf::from(path));
        }

        if let Some(mb) = env_parse::<u64>("ANKI_MEDIA_IMAGE_CACHE_MAX_MB") {
            match mb.checked_mul(MB) {
                Some(bytes) if bytes > 0 => config.images.max_cache_bytes = bytes,
                _ => {}
            }
        }

        if let Some(days) = env_parse::<i64>("ANKI_MEDIA_IMAGE_CACHE_DAYS") {
            if days > 0 {
                config.images.cache_expiry_days = days;
            }
        }

        config.images.unsplash_key = env_key("UNSPLASH_ACCESS_KEY");
        config.images.pexels_key = env_key("PEXELS_API_KEY");
        config.images.pixabay_key = env_key("PIXABAY_API_KEY");

        config
    }

    /// Returns the effective data path, using platform defaults if not specified.
    pub fn effective_data_path(&self) -> PathBuf {
        if let Some(ref path) = self.data_path {
            path.clone()
        } else {
            default_data_path()
        }
    }

    /// Directory holding generated reference audio.
    pub fn audio_dir(&self) -> PathBuf {
        self.effective_data_path().join("audio")
    }

    /// Directory holding cached provider images.
    pub fn image_cache_dir(&self) -> PathBuf {
        self.effective_data_path().join("images").join("cache")
    }

    /// Directory holding user-uploaded images.
    pub fn image_uploads_dir(&self) -> PathBuf {
        self.effective_data_path().join("images").join("uploads")
    }

    /// Path of the persisted image cache index.
    pub fn image_cache_index(&self) -> PathBuf {
        self.image_cache_dir().join("index.json")
    }

    /// Validates the configuration.
    ///
    /// Returns an error message if validation fails, None otherwise.
    pub fn validate(&self) -> Option<String> {
        if self.tts.connect_timeout_secs == 0 {
            return Some("connect timeout must be > 0".to_string());
        }
        if self.tts.read_timeout_secs == 0 {
            return Some("read timeout must be > 0".to_string());
        }
        if self.tts.fallback_port == 0 {
            return Some("fallback port must be > 0".to_string());
        }
        if self.images.max_cache_bytes == 0 {
            return Some("image cache ceiling must be > 0".to_string());
        }
        if self.images.cache_expiry_days <= 0 {
            return Some(format!(
                "image cache expiry must be > 0 days, got {}",
                self.images.cache_expiry_days
            ));
        }
        if self.tts.audio_expiry_days <= 0 {
            return Some(format!(
                "audio expiry must be > 0 days, got {}",
                self.tts.audio_expiry_days
            ));
        }
        if self.images.cache_expiry_days > MAX_EXPIRY_DAYS {
            return Some(format!(
                "image cache expiry must be at most {} days, got {}",
                MAX_EXPIRY_DAYS, self.images.cache_expiry_days
            ));
        }
        if self.tts.audio_expiry_days > MAX_EXPIRY_DAYS {
            return Some(format!(
                "audio expiry must be at most {} days, got {}",
                MAX_EXPIRY_DAYS, self.tts.audio_expiry_days
            ));
        }

        None
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok()?.trim().parse().ok()
}

fn env_key(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Returns the platform-specific default data storage path.
///
/// Uses the `directories` crate to find appropriate locations:
/// - macOS: ~/Library/Application Support/anki-media
/// - Linux: ~/.local/share/anki-media
/// - Windows: C:\Users\<user>\AppData\Roaming\anki-media\data
fn default_data_path() -> PathBuf {
    if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "anki-media") {
        proj_dirs.data_dir().to_path_buf()
    } else {
        // Fallback to current directory
        PathBuf::from("./anki_data")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_service_limits() {
        let config = DaemonConfig::new();
        assert_eq!(config.images.max_cache_bytes, 500 * 1024 * 1024);
        assert_eq!(config.images.cache_expiry_days, 7);
        assert_eq!(config.tts.audio_expiry_days, 30);
        assert_eq!(config.tts.connect_timeout(), Duration::from_secs(6));
    }

    #[test]
    fn config_validation() {
        let mut config = DaemonConfig::new();
        assert!(config.validate().is_none());

        config.tts.read_timeout_secs = 0;
        assert!(config.validate().is_some());

        config.tts.read_timeout_secs = 10;
        config.images.max_cache_bytes = 0;
        assert!(config.validate().is_some());
    }

    #[test]
    fn expiry_days_are_bounded() {
        let mut config = DaemonConfig::new();
        config.images.cache_expiry_days = MAX_EXPIRY_DAYS;
        config.tts.audio_expiry_days = MAX_EXPIRY_DAYS;
        assert!(config.validate().is_none());

        config.images.cache_expiry_days = 200_000_000_000_000;
        let problem = config.validate().unwrap();
        assert!(problem.contains("image cache expiry"));

        config.images.cache_expiry_days = 7;
        config.tts.audio_expiry_days = i64::MAX;
        let problem = config.validate().unwrap();
        assert!(problem.contains("audio expiry"));
    }

    #[test]
    fn oversized_cache_ceiling_keeps_default() {
        std::env::set_var("ANKI_MEDIA_IMAGE_CACHE_MAX_MB", u64::MAX.to_string());
        let config = DaemonConfig::from_env();
        std::env::remove_var("ANKI_MEDIA_IMAGE_CACHE_MAX_MB");
        assert_eq!(config.images.max_cache_bytes, 500 * MB);
    }

    #[test]
    fn wyoming_endpoints_add_fallback_port() {
        let mut config = DaemonConfig::new();
        config.tts.piper_url = "http://piper:5000".to_string();
        let endpoints = config.tts.wyoming_endpoints();
        assert_eq!(
            endpoints,
            vec![Endpoint::new("piper", 5000), Endpoint::new("piper", 10200)]
        );
    }

    #[test]
    fn wyoming_endpoints_skip_duplicate_fallback() {
        let config = DaemonConfig::new();
        let endpoints = config.tts.wyoming_endpoints();
        assert_eq!(endpoints, vec![Endpoint::new("127.0.0.1", 10200)]);
    }

    #[test]
    fn media_directories_share_data_root() {
        let config = DaemonConfig {
            data_path: Some(PathBuf::from("/srv/anki")),
            ..Default::default()
        };
        assert_eq!(config.audio_dir(), PathBuf::from("/srv/anki/audio"));
        assert_eq!(
            config.image_cache_dir(),
            PathBuf::from("/srv/anki/images/cache")
        );
        assert_eq!(
            config.image_uploads_dir(),
            PathBuf::from("/srv/anki/images/uploads")
        );
        assert!(config.image_cache_index().ends_with("cache/index.json"));
    }

    #[test]
    fn effective_data_path_not_empty() {
        let config = DaemonConfig::new();
        assert!(!config.effective_data_path().as_os_str().is_empty());
    }
}
