//! Core types for the anki-media-daemon.
//!
//! This module re-exports the data types shared across services:
//! - [`AudioSynthesisRequest`]: A text + voice pair sent to a synthesizer
//! - [`AudioMetadata`]: Reference audio attached to a card
//! - [`ImageMetadata`]: A cached or uploaded image with attribution

mod audio;
mod hash;
mod image;

// Re-export all types at the module level
pub use audio::{
    audio_file_name, validate_card_id, AudioMetadata, AudioSynthesisRequest, AUDIO_EXTENSION,
};
pub use hash::content_hash;
pub use image::ImageMetadata;
