//! Text-to-speech module.
//!
//! Produces pronunciation reference audio for flashcards:
//! - [`synthesizer`]: the `Synthesizer` trait with HTTP and Wyoming backends
//! - [`service`]: per-card reference audio generation and expiry cleanup

pub mod service;
pub mod synthesizer;

// Re-export commonly used types
pub use service::AudioService;
pub use synthesizer::{HttpSynthesizer, Synthesizer};
