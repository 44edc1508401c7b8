//! anki-media-daemon: speech and image enrichment for flashcards.
//!
//! This library provides the media side of a flashcard application:
//! pronunciation audio from a local Piper/Wyoming speech service, stock
//! images held in a size-bounded LRU cache, and CEFR level consensus
//! across several model votes.
//!
//! # Modules
//!
//! - [`wyoming`]: Wyoming protocol framing and TCP client
//! - [`tts`]: Synthesizer chain and per-card reference audio
//! - [`cache`]: Size- and age-bounded LRU cache with pluggable record store
//! - [`images`]: Provider search, download into the cache, uploads
//! - [`cefr`]: Confidence-weighted level voting
//! - [`rpc`]: JSON-RPC 2.0 server over stdio
//! - [`types`]: Shared data types (AudioMetadata, ImageMetadata)
//! - [`config`]: Runtime configuration (DaemonConfig)
//! - [`error`]: Error types and codes (DaemonError, ErrorCode)
//!
//! # Example
//!
//! ```rust,ignore
//! use std::time::Duration;
//! use anki_media_daemon::wyoming::{Endpoint, WyomingClient};
//!
//! let client = WyomingClient::new(
//!     vec![Endpoint::new("127.0.0.1", 10200)],
//!     Duration::from_secs(6),
//! );
//! let audio = client.synthesize("de fiets", "nl_NL-rdh-medium")?;
//! ```

pub mod cache;
pub mod cefr;
pub mod cli;
pub mod config;
pub mod error;
pub mod images;
pub mod logging;
pub mod rpc;
pub mod tts;
pub mod types;
pub mod wyoming;

// Re-export commonly used types at crate root for convenience
pub use config::DaemonConfig;
pub use error::{DaemonError, ErrorCode, Result};
pub use types::{AudioMetadata, ImageMetadata};
