//! Image enrichment module.
//!
//! - [`provider`]: Unsplash, Pexels and Pixabay request/response handling
//! - [`service`]: search-with-cache, uploads and expiry cleanup

pub mod provider;
pub mod service;

// Re-export commonly used types
pub use provider::{cache_key, ImageHit, ImageProvider};
pub use service::{upload_file_name, ImageService};
