//! Wyoming frame codec.
//!
//! A Wyoming message is one JSON header line terminated by `\n`, followed
//! by `data_length` bytes of side-channel JSON and then `payload_length`
//! bytes of binary payload. Both lengths are optional and default to 0.

use std::io::{self, BufRead, Read};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::types::AudioSynthesisRequest;

/// Semantic type of a frame, taken from the header's `type` field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameType {
    AudioStart,
    AudioChunk,
    AudioStop,
    Other(String),
}

impl FrameType {
    /// Parses the header `type` value.
    pub fn parse(s: &str) -> Self {
        match s {
            "audio-start" => FrameType::AudioStart,
            "audio-chunk" => FrameType::AudioChunk,
            "audio-stop" => FrameType::AudioStop,
            other => FrameType::Other(other.to_string()),
        }
    }

    /// Returns the wire representation.
    pub fn as_str(&self) -> &str {
        match self {
            FrameType::AudioStart => "audio-start",
            FrameType::AudioChunk => "audio-chunk",
            FrameType::AudioStop => "audio-stop",
            FrameType::Other(s) => s,
        }
    }
}

/// A frame header as it appears on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameHeader {
    /// Message type, e.g. "synthesize" or "audio-chunk".
    #[serde(rename = "type", default)]
    pub kind: String,

    /// Inline data object (request headers only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,

    /// Length of the side-channel JSON that follows the header line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_length: Option<u64>,

    /// Length of the binary payload that follows the data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload_length: Option<u64>,
}

impl FrameHeader {
    /// Builds the single request header for a synthesis call.
    pub fn synthesize(request: &AudioSynthesisRequest) -> Self {
        Self {
            kind: "synthesize".to_string(),
            data: Some(serde_json::json!({
                "text": request.text,
                "voice": request.voice,
            })),
            data_length: None,
            payload_length: None,
        }
    }

    /// Returns the parsed frame type.
    pub fn frame_type(&self) -> FrameType {
        FrameType::parse(&self.kind)
    }

    /// Serializes the header as one `\n`-terminated line.
    ///
    /// JSON string escaping guarantees the line holds no raw newline
    /// before the terminator.
    pub fn to_line(&self) -> serde_json::Result<Vec<u8>> {
        let mut line = serde_json::to_vec(self)?;
        line.push(b'\n');
        Ok(line)
    }
}

/// Result of trying to read one header line.
#[derive(Debug)]
pub enum HeaderRead {
    /// A well-formed header.
    Header(FrameHeader),
    /// Nothing where a header should start: the peer closed the stream.
    Closed,
    /// The line was terminated but is not a valid header.
    Malformed(String),
}

/// Longest header line accepted before the stream is treated as malformed.
pub const MAX_HEADER_BYTES: u64 = 64 * 1024;

/// Reads one header line.
///
/// An empty line counts as a closed stream, matching peers that send a
/// bare newline before hanging up. The header must be a JSON object; a
/// line longer than [`MAX_HEADER_BYTES`] is malformed.
pub fn read_header<R: BufRead>(reader: &mut R) -> io::Result<HeaderRead> {
    let mut line = Vec::new();
    reader
        .by_ref()
        .take(MAX_HEADER_BYTES + 1)
        .read_until(b'\n', &mut line)?;
    if line.last() == Some(&b'\n') {
        line.pop();
    } else if line.len() as u64 > MAX_HEADER_BYTES {
        return Ok(HeaderRead::Malformed(format!(
            "header line exceeds {} bytes",
            MAX_HEADER_BYTES
        )));
    }

    if line.is_empty() {
        return Ok(HeaderRead::Closed);
    }

    let value = match serde_json::from_slice::<serde_json::Value>(&line) {
        Ok(value @ serde_json::Value::Object(_)) => value,
        Ok(other) => {
            return Ok(HeaderRead::Malformed(format!(
                "header is not a JSON object: {}",
                other
            )))
        }
        Err(e) => return Ok(HeaderRead::Malformed(e.to_string())),
    };

    match FrameHeader::deserialize(value) {
        Ok(header) => Ok(HeaderRead::Header(header)),
        Err(e) => Ok(HeaderRead::Malformed(e.to_string())),
    }
}

/// Appends up to `len` bytes to `out`, stopping early at end of stream.
///
/// Returns the number of bytes appended.
pub fn read_payload<R: Read>(reader: &mut R, len: u64, out: &mut Vec<u8>) -> io::Result<u64> {
    let read = reader.by_ref().take(len).read_to_end(out)?;
    Ok(read as u64)
}

/// Reads and drops up to `len` bytes, stopping early at end of stream.
pub fn skip_bytes<R: Read>(reader: &mut R, len: u64) -> io::Result<u64> {
    io::copy(&mut reader.by_ref().take(len), &mut io::sink())
}

/// Why a response stream stopped being read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    /// An `audio-stop` frame arrived.
    AudioStop,
    /// The peer closed the connection at a frame boundary.
    PeerClosed,
    /// A header line failed to parse.
    MalformedHeader,
}

/// Audio collected from a response stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioStream {
    /// Concatenated payload bytes in frame order.
    pub audio: Vec<u8>,
    /// Number of frames consumed.
    pub frames: usize,
    /// How the stream ended.
    pub end: StreamEnd,
}

/// Reads response frames until `audio-stop`, peer close or a malformed
/// header, concatenating every payload in order.
///
/// Side-channel data is consumed and discarded so the reader stays
/// frame-aligned. Only I/O errors are returned as errors; a malformed
/// header yields whatever audio arrived before it.
pub fn read_audio<R: BufRead>(reader: &mut R) -> io::Result<AudioStream> {
    let mut audio = Vec::new();
    let mut frames = 0usize;

    let end = loop {
        let header = match read_header(reader)? {
            HeaderRead::Header(header) => header,
            HeaderRead::Closed => {
                debug!(frames, bytes = audio.len(), "Wyoming peer closed stream");
                break StreamEnd::PeerClosed;
            }
            HeaderRead::Malformed(reason) => {
                warn!(frames, bytes = audio.len(), %reason, "Malformed Wyoming header, stopping");
                break StreamEnd::MalformedHeader;
            }
        };
        frames += 1;

        let data_len = header.data_length.unwrap_or(0);
        if data_len > 0 {
            // Discarded until a caller needs audio-start format info.
            skip_bytes(reader, data_len)?;
        }

        let payload_len = header.payload_length.unwrap_or(0);
        if payload_len > 0 {
            let read = read_payload(reader, payload_len, &mut audio)?;
            if read < payload_len {
                debug!(expected = payload_len, read, "Short Wyoming payload");
            }
        }

        trace!(kind = %header.kind, data_len, payload_len, "Wyoming frame");

        if header.frame_type() == FrameType::AudioStop {
            break StreamEnd::AudioStop;
        }
    };

    Ok(AudioStream { audio, frames, end })
}
