//! JSON-RPC module for daemon communication.
//!
//! Provides the JSON-RPC 2.0 server implementation for:
//! - `synthesize`: Raw speech synthesis, to a file or inline base64
//! - `reference_audio`: Per-card pronunciation reference
//! - `audio_cleanup`: Delete expired reference audio
//! - `image_search`: Provider search through the image cache
//! - `image_upload`: Store a user-supplied image
//! - `cache_stats` / `cache_sweep`: Inspect and sweep the image cache
//! - `cefr_consensus`: Combine model votes into one CEFR level
//! - `ping`: Health check
//! - `shutdown`: Graceful shutdown

pub mod methods;
pub mod server;
pub mod types;

// Re-export commonly used types
pub use server::{run_server, ServerState};
pub use types::{JsonRpcError, JsonRpcErrorResponse, JsonRpcRequest, JsonRpcResponse, RequestId};
