//! Reference audio generation and cleanup.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, error, info, warn};

use crate::config::DaemonConfig;
use crate::error::{DaemonError, Result};
use crate::types::{audio_file_name, validate_card_id, AudioMetadata, AUDIO_EXTENSION};
use crate::wyoming::WyomingClient;

use super::synthesizer::{HttpSynthesizer, Synthesizer, HTTP_TIMEOUT_SECS};

const SECS_PER_DAY: u64 = 24 * 60 * 60;

/// Generates and maintains per-card reference audio files.
pub struct AudioService {
    audio_dir: PathBuf,
    synthesizers: Vec<Box<dyn Synthesizer>>,
    default_voice: String,
    expiry_days: i64,
}

impl AudioService {
    /// Creates a service writing to `audio_dir` and trying `synthesizers` in order.
    pub fn new(
        audio_dir: impl Into<PathBuf>,
        synthesizers: Vec<Box<dyn Synthesizer>>,
        default_voice: impl Into<String>,
        expiry_days: i64,
    ) -> Self {
        Self {
            audio_dir: audio_dir.into(),
            synthesizers,
            default_voice: default_voice.into(),
            expiry_days,
        }
    }

    /// Builds the Piper HTTP then Wyoming chain from configuration.
    pub fn from_config(config: &DaemonConfig) -> Result<Self> {
        let http = HttpSynthesizer::new(
            &config.tts.piper_url,
            Duration::from_secs(HTTP_TIMEOUT_SECS),
        )?;
        let wyoming = WyomingClient::new(
            config.tts.wyoming_endpoints(),
            config.tts.connect_timeout(),
        )
        .with_read_timeout(config.tts.read_timeout());

        info!(
            audio_dir = %config.audio_dir().display(),
            http = http.endpoint(),
            "Initializing audio service"
        );

        let synthesizers: Vec<Box<dyn Synthesizer>> = vec![Box::new(http), Box::new(wyoming)];
        Ok(Self::new(
            config.audio_dir(),
            synthesizers,
            config.tts.default_voice.clone(),
            config.tts.audio_expiry_days,
        ))
    }

    pub fn audio_dir(&self) -> &Path {
        &self.audio_dir
    }

    pub fn default_voice(&self) -> &str {
        &self.default_voice
    }

    /// Runs the synthesizer chain and returns the first non-empty audio.
    pub fn synthesize(&self, text: &str, voice: Option<&str>) -> Result<Vec<u8>> {
        if text.trim().is_empty() {
            return Err(DaemonError::invalid_text("Text to synthesize cannot be empty"));
        }
        let voice = voice.unwrap_or(&self.default_voice);

        let mut failures = Vec::new();
        for synth in &self.synthesizers {
            match synth.synthesize(text, voice) {
                Ok(audio) if !audio.is_empty() => {
                    debug!(synthesizer = synth.name(), bytes = audio.len(), "Synthesis succeeded");
                    return Ok(audio);
                }
                Ok(_) => {
                    debug!(synthesizer = synth.name(), "Synthesizer produced no audio");
                    failures.push(format!("{}: no audio", synth.name()));
                }
                Err(e) => {
                    debug!(synthesizer = synth.name(), error = %e.message, "Synthesizer failed");
                    failures.push(format!("{}: {}", synth.name(), e.message));
                }
            }
        }

        let reason = if failures.is_empty() {
            "no synthesizer configured".to_string()
        } else {
            failures.join("; ")
        };
        error!(reason = %reason, "Piper TTS failed");
        Err(DaemonError::synthesis_failed(reason))
    }

    /// Returns the reference audio for `card_id`, generating it if needed.
    ///
    /// The file name depends on the text, so an unchanged card reuses its
    /// existing file without contacting any synthesizer.
    pub fn generate_reference_audio(
        &self,
        text: &str,
        card_id: &str,
        voice: Option<&str>,
    ) -> Result<AudioMetadata> {
        if text.trim().is_empty() {
            return Err(DaemonError::invalid_text("Text to synthesize cannot be empty"));
        }
        if let Some(msg) = validate_card_id(card_id) {
            return Err(DaemonError::invalid_text(msg));
        }

        let path = self.audio_dir.join(audio_file_name(card_id, text));
        let expires = self.expires_from(Utc::now());

        if path.exists() {
            debug!(path = %path.display(), "Using cached audio");
            return Ok(AudioMetadata::new(path, expires));
        }

        info!(card_id, "Generating reference audio");
        let audio = self.synthesize(text, voice)?;

        fs::create_dir_all(&self.audio_dir).map_err(|e| {
            DaemonError::cache_io(
                format!("Failed to create audio directory {}", self.audio_dir.display()),
                e,
            )
        })?;
        fs::write(&path, &audio).map_err(|e| {
            DaemonError::cache_io(format!("Failed to write audio {}", path.display()), e)
        })?;

        info!(path = %path.display(), bytes = audio.len(), "Reference audio generated");
        Ok(AudioMetadata::new(path, expires))
    }

    /// Expiry stamp for audio generated at `now`, saturating at the latest
    /// representable time.
    fn expires_from(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        TimeDelta::try_days(self.expiry_days)
            .and_then(|age| now.checked_add_signed(age))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Deletes reference audio older than the expiry. Returns the count deleted.
    pub fn cleanup_expired_audio(&self) -> Result<usize> {
        self.cleanup_expired_audio_at(SystemTime::now())
    }

    /// Deletes audio files whose modification time is more than the expiry
    /// before `now`. Files that cannot be inspected or removed are skipped.
    pub fn cleanup_expired_audio_at(&self, now: SystemTime) -> Result<usize> {
        info!(dir = %self.audio_dir.display(), "Cleaning up expired audio files");

        let entries = match fs::read_dir(&self.audio_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => {
                return Err(DaemonError::cache_io(
                    format!("Failed to list {}", self.audio_dir.display()),
                    e,
                ))
            }
        };

        let max_age =
            Duration::from_secs((self.expiry_days.max(0) as u64).saturating_mul(SECS_PER_DAY));
        let mut deleted = 0;

        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(AUDIO_EXTENSION) {
                continue;
            }

            let modified = match entry.metadata().and_then(|m| m.modified()) {
                Ok(t) => t,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Cannot read audio file age");
                    continue;
                }
            };

            let age = now.duration_since(modified).unwrap_or_default();
            if age <= max_age {
                continue;
            }

            match fs::remove_file(&path) {
                Ok(()) => {
                    debug!(path = %path.display(), "Deleted expired audio");
                    deleted += 1;
                }
                Err(e) => {
                    error!(path = %path.display(), error = %e, "Failed to delete expired audio")
                }
            }
        }

        info!(deleted, "Deleted expired audio files");
        Ok(deleted)
    }
}
