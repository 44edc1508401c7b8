//! Error types for the anki-media-daemon.
//!
//! Defines all error codes and types used throughout the daemon for
//! consistent error handling and reporting.

use std::fmt;

/// Error codes returned by the daemon in error responses.
///
/// These codes are used in JSON-RPC error responses and allow clients
/// to programmatically handle specific error conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// No synthesis endpoint accepted a connection.
    /// Trigger: Piper/Wyoming daemon down, wrong host or port.
    TtsConnectFailed,

    /// Socket error after the synthesis connection was established.
    /// Trigger: Peer reset, read timeout, broken pipe.
    TtsStreamFailed,

    /// Every synthesizer failed or produced no audio.
    /// Trigger: HTTP endpoint missing and Wyoming returned nothing.
    TtsSynthesisFailed,

    /// Text or identifier supplied for synthesis is unusable.
    /// Trigger: Empty text, card id containing path separators.
    InvalidText,

    /// Image search API call failed.
    /// Trigger: Network error, non-2xx status, unexpected JSON shape.
    ImageProviderFailed,

    /// Downloading the image bytes failed.
    /// Trigger: Network error or non-2xx status from the image URL.
    ImageDownloadFailed,

    /// Provider name not recognised.
    /// Trigger: Provider other than unsplash, pexels or pixabay.
    UnknownProvider,

    /// Filesystem operation on cached media failed.
    /// Trigger: Disk full, permissions, missing directory.
    CacheIoFailed,

    /// Reading or writing the cache entry records failed.
    /// Trigger: Corrupt index file, failed atomic rename.
    CacheStoreFailed,

    /// A model response could not be turned into a CEFR vote.
    /// Trigger: Non-JSON output, unknown level label.
    InvalidVote,
}

impl ErrorCode {
    /// Returns the string representation of the error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::TtsConnectFailed => "TTS_CONNECT_FAILED",
            ErrorCode::TtsStreamFailed => "TTS_STREAM_FAILED",
            ErrorCode::TtsSynthesisFailed => "TTS_SYNTHESIS_FAILED",
            ErrorCode::InvalidText => "INVALID_TEXT",
            ErrorCode::ImageProviderFailed => "IMAGE_PROVIDER_FAILED",
            ErrorCode::ImageDownloadFailed => "IMAGE_DOWNLOAD_FAILED",
            ErrorCode::UnknownProvider => "UNKNOWN_PROVIDER",
            ErrorCode::CacheIoFailed => "CACHE_IO_FAILED",
            ErrorCode::CacheStoreFailed => "CACHE_STORE_FAILED",
            ErrorCode::InvalidVote => "INVALID_VOTE",
        }
    }

    /// Returns a human-readable description of the error.
    pub fn description(&self) -> &'static str {
        match self {
            ErrorCode::TtsConnectFailed => "Could not connect to any speech synthesis endpoint",
            ErrorCode::TtsStreamFailed => "Speech synthesis stream failed after connecting",
            ErrorCode::TtsSynthesisFailed => "No synthesizer produced audio",
            ErrorCode::InvalidText => "Synthesis text or card identifier is invalid",
            ErrorCode::ImageProviderFailed => "Image search request failed",
            ErrorCode::ImageDownloadFailed => "Image download failed",
            ErrorCode::UnknownProvider => "Unknown image provider",
            ErrorCode::CacheIoFailed => "Cache file operation failed",
            ErrorCode::CacheStoreFailed => "Cache record store operation failed",
            ErrorCode::InvalidVote => "Model response is not a valid CEFR vote",
        }
    }

    /// Returns a recovery hint suggesting how to resolve this error.
    pub fn recovery_hint(&self) -> &'static str {
        match self {
            ErrorCode::TtsConnectFailed => {
                "Check that the Piper/Wyoming service is running and that PIPER_API_URL \
                 points at it (Wyoming usually listens on port 10200)"
            }
            ErrorCode::TtsStreamFailed => {
                "Retry the request; if it keeps failing, restart the Piper service or raise \
                 ANKI_MEDIA_READ_TIMEOUT_SECS for long texts"
            }
            ErrorCode::TtsSynthesisFailed => {
                "Verify the requested voice is installed in Piper and that the text is not \
                 only punctuation or whitespace"
            }
            ErrorCode::InvalidText => {
                "Provide non-empty text and a card id made of letters, digits, '-' or '_'"
            }
            ErrorCode::ImageProviderFailed => {
                "Check the provider API key and network access, or try another provider"
            }
            ErrorCode::ImageDownloadFailed => {
                "Check network access; the provider may have removed the image, try again later"
            }
            ErrorCode::UnknownProvider => "Use one of: unsplash, pexels, pixabay",
            ErrorCode::CacheIoFailed => {
                "Check free disk space and permissions of ANKI_MEDIA_DATA_PATH"
            }
            ErrorCode::CacheStoreFailed => {
                "Delete the cache index file to rebuild the cache from scratch"
            }
            ErrorCode::InvalidVote => {
                "Ask the model for JSON with 'level' (A1-C2) and 'confidence' (0.0-1.0) fields"
            }
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Main error type for daemon operations.
#[derive(Debug)]
pub struct DaemonError {
    /// The error code identifying the type of error.
    pub code: ErrorCode,
    /// Human-readable error message with context.
    pub message: String,
    /// Optional underlying cause of the error.
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl DaemonError {
    /// Creates a new DaemonError with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new DaemonError with an underlying cause.
    pub fn with_source(
        code: ErrorCode,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a TTS_CONNECT_FAILED error listing every endpoint tried.
    pub fn connect_failed(endpoints: &[String]) -> Self {
        Self::new(
            ErrorCode::TtsConnectFailed,
            format!(
                "Failed to connect to Wyoming socket on {}",
                endpoints.join(" and ")
            ),
        )
    }

    /// Creates a TTS_STREAM_FAILED error.
    pub fn stream_failed(source: std::io::Error) -> Self {
        Self::with_source(
            ErrorCode::TtsStreamFailed,
            format!("Wyoming stream failed: {}", source),
            source,
        )
    }

    /// Creates a TTS_SYNTHESIS_FAILED error.
    pub fn synthesis_failed(reason: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::TtsSynthesisFailed,
            format!("Failed to generate audio: {}", reason.into()),
        )
    }

    /// Creates an INVALID_TEXT error.
    pub fn invalid_text(reason: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidText, reason)
    }

    /// Creates an IMAGE_PROVIDER_FAILED error.
    pub fn provider_failed(provider: &str, reason: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::ImageProviderFailed,
            format!("Error searching {}: {}", provider, reason.into()),
        )
    }

    /// Creates an IMAGE_DOWNLOAD_FAILED error.
    pub fn download_failed(url: &str, reason: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::ImageDownloadFailed,
            format!("Failed to download {}: {}", url, reason.into()),
        )
    }

    /// Creates an UNKNOWN_PROVIDER error.
    pub fn unknown_provider(name: &str) -> Self {
        Self::new(
            ErrorCode::UnknownProvider,
            format!("Unknown provider: {}", name),
        )
    }

    /// Creates a CACHE_IO_FAILED error.
    pub fn cache_io(context: impl Into<String>, source: std::io::Error) -> Self {
        let context = context.into();
        Self::with_source(
            ErrorCode::CacheIoFailed,
            format!("{}: {}", context, source),
            source,
        )
    }

    /// Creates a CACHE_STORE_FAILED error.
    pub fn store_failed(reason: impl Into<String>) -> Self {
        Self::new(ErrorCode::CacheStoreFailed, reason)
    }

    /// Creates an INVALID_VOTE error.
    pub fn invalid_vote(model_id: &str, reason: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::InvalidVote,
            format!("Invalid vote from {}: {}", model_id, reason.into()),
        )
    }
}

impl fmt::Display for DaemonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}. Recovery: {}",
            self.code,
            self.message,
            self.code.recovery_hint()
        )
    }
}

impl std::error::Error for DaemonError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Result type alias using DaemonError.
pub type Result<T> = std::result::Result<T, DaemonError>;
