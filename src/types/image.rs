//! Image metadata returned to flashcard callers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An image attached to a card, with the attribution its license requires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageMetadata {
    /// Original URL from the provider API, or the cache key for cache hits.
    pub url: String,

    /// Provider label: "unsplash", "pexels", "pixabay" or "upload".
    pub source: String,

    /// License name, when known.
    pub license: Option<String>,

    /// Attribution line to show next to the image.
    pub attribution_text: String,

    /// Local file holding the image bytes.
    pub cached_path: String,

    /// When the cached copy stops being fresh.
    pub cache_expiry: Option<DateTime<Utc>>,
}
