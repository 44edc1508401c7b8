//! Audio types for speech synthesis requests and reference audio.
//!
//! A reference audio file is identified by the card it belongs to and a
//! hash of the text it speaks, so regenerating for unchanged text reuses
//! the file already on disk.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::hash::content_hash;

/// File extension used for reference audio.
pub const AUDIO_EXTENSION: &str = "mp3";

/// A single speech synthesis request. Ephemeral, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioSynthesisRequest {
    /// Text to speak.
    pub text: String,

    /// Voice identifier understood by the synthesis peer.
    /// Example: "nl_NL-rdh-medium"
    pub voice: String,
}

impl AudioSynthesisRequest {
    pub fn new(text: impl Into<String>, voice: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            voice: voice.into(),
        }
    }
}

/// Pronunciation reference attached to a flashcard.
///
/// Only the reference file and its expiry are produced by this daemon;
/// transcriptions, recordings and scores are carried for the host
/// application and stay empty here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioMetadata {
    /// Path to the synthesized reference audio.
    pub reference_path: PathBuf,

    /// When the reference audio should be regenerated.
    pub audio_expires_at: DateTime<Utc>,

    /// IPA for the reference and each recording.
    #[serde(default)]
    pub ipa_transcriptions: Vec<String>,

    /// Paths to user recordings.
    #[serde(default)]
    pub user_recordings: Vec<String>,

    /// Score for each user recording.
    #[serde(default)]
    pub phonetic_scores: Vec<f32>,
}

impl AudioMetadata {
    /// Creates metadata for a freshly generated or reused reference file.
    pub fn new(reference_path: PathBuf, audio_expires_at: DateTime<Utc>) -> Self {
        Self {
            reference_path,
            audio_expires_at,
            ipa_transcriptions: Vec::new(),
            user_recordings: Vec::new(),
            phonetic_scores: Vec::new(),
        }
    }

    /// Returns true once `now` is past the expiry.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.audio_expires_at
    }
}

/// Computes the reference audio file name for a card.
///
/// Format: `{card_id}_{8 hex chars of SHA256(text)}.mp3`
pub fn audio_file_name(card_id: &str, text: &str) -> String {
    format!("{}_{}.{}", card_id, content_hash(text, 8), AUDIO_EXTENSION)
}

/// Checks that a card id is safe to embed in a file name.
///
/// Returns an error message if validation fails, None otherwise.
pub fn validate_card_id(card_id: &str) -> Option<String> {
    if card_id.is_empty() {
        return Some("Card id cannot be empty".to_string());
    }

    if card_id.len() > 128 {
        return Some(format!(
            "Card id too long: {} characters (max 128)",
            card_id.len()
        ));
    }

    let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':' | '.');
    if !card_id.chars().all(allowed) || card_id.starts_with('.') {
        return Some(format!("Card id contains unsupported characters: {:?}", card_id));
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn audio_file_name_is_deterministic() {
        let a = audio_file_name("card1", "de fiets");
        let b = audio_file_name("card1", "de fiets");
        assert_eq!(a, b);
        assert!(a.starts_with("card1_"));
        assert!(a.ends_with(".mp3"));
        // card1_ + 8 hex + .mp3
        assert_eq!(a.len(), "card1_".len() + 8 + 4);
    }

    #[test]
    fn audio_file_name_changes_with_text() {
        assert_ne!(
            audio_file_name("card1", "de fiets"),
            audio_file_name("card1", "het huis")
        );
    }

    #[test]
    fn card_id_validation() {
        assert!(validate_card_id("anki_card:abc-123").is_none());
        assert!(validate_card_id("").is_some());
        assert!(validate_card_id("../etc/passwd").is_some());
        assert!(validate_card_id("a/b").is_some());
        assert!(validate_card_id(".hidden").is_some());
        assert!(validate_card_id(&"x".repeat(129)).is_some());
    }

    #[test]
    fn metadata_expiry() {
        let now = Utc::now();
        let meta = AudioMetadata::new(PathBuf::from("/tmp/a.mp3"), now + Duration::days(30));
        assert!(!meta.is_expired_at(now));
        assert!(meta.is_expired_at(now + Duration::days(31)));
        assert!(meta.ipa_transcriptions.is_empty());
    }
}
