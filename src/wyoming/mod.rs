//! Wyoming protocol client.
//!
//! Wyoming is the line-delimited JSON-header-plus-binary-payload protocol
//! spoken by local speech daemons such as Piper. This module provides:
//! - [`frame`]: header codec and the response frame reader
//! - [`client`]: the one-connection-per-call synthesis client

pub mod client;
pub mod frame;

// Re-export commonly used types
pub use client::{parse_endpoint, Endpoint, WyomingClient, DEFAULT_WYOMING_PORT};
pub use frame::{read_audio, AudioStream, FrameHeader, FrameType, StreamEnd};
