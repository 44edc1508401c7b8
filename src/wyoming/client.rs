//! Wyoming TCP client for speech synthesis.
//!
//! Opens one connection per call, sends a single `synthesize` header and
//! reads audio frames until `audio-stop` or peer close.

use std::fmt;
use std::io::{BufReader, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{DaemonError, Result};
use crate::types::AudioSynthesisRequest;

use super::frame::{read_audio, FrameHeader};

/// Well-known Wyoming port used by Piper.
pub const DEFAULT_WYOMING_PORT: u16 = 10200;

/// Host used when an endpoint URL cannot be parsed.
pub const DEFAULT_WYOMING_HOST: &str = "127.0.0.1";

/// A host/port pair to try connecting to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    fn resolve(&self) -> std::io::Result<Vec<SocketAddr>> {
        Ok((self.host.as_str(), self.port).to_socket_addrs()?.collect())
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Parses `http://host:port` or `host:port` into an endpoint.
///
/// Anything else falls back to `127.0.0.1:10200`.
pub fn parse_endpoint(url: &str) -> Endpoint {
    let trimmed = url.trim();
    let without_scheme = trimmed
        .strip_prefix("http://")
        .or_else(|| trimmed.strip_prefix("tcp://"))
        .unwrap_or(trimmed);
    let authority = without_scheme.trim_end_matches('/');

    let parsed = authority.split_once(':').and_then(|(host, rest)| {
        let port_str = rest.split(':').next().unwrap_or(rest);
        let port = port_str.parse::<u16>().ok()?;
        if host.is_empty() {
            None
        } else {
            Some(Endpoint::new(host, port))
        }
    });

    parsed.unwrap_or_else(|| Endpoint::new(DEFAULT_WYOMING_HOST, DEFAULT_WYOMING_PORT))
}

/// Closes the socket in both directions when dropped.
struct Connection {
    stream: TcpStream,
    endpoint: Endpoint,
}

impl Drop for Connection {
    fn drop(&mut self) {
        // Already-closed sockets report NotConnected; nothing to do then.
        let _ = self.stream.shutdown(Shutdown::Both);
        debug!(endpoint = %self.endpoint, "Closed Wyoming connection");
    }
}

/// Client for a Wyoming speech synthesis peer.
#[derive(Debug, Clone)]
pub struct WyomingClient {
    /// Candidate endpoints, tried in order.
    endpoints: Vec<Endpoint>,
    /// Bound on each connect attempt.
    connect_timeout: Duration,
    /// Bound on each socket read; None blocks indefinitely.
    read_timeout: Option<Duration>,
}

impl WyomingClient {
    /// Creates a client over an explicit, ordered list of endpoints.
    pub fn new(endpoints: Vec<Endpoint>, connect_timeout: Duration) -> Self {
        Self {
            endpoints,
            connect_timeout,
            read_timeout: None,
        }
    }

    /// Creates a client for `url` with the well-known port as fallback.
    pub fn from_url(url: &str, connect_timeout: Duration) -> Self {
        let primary = parse_endpoint(url);
        let mut endpoints = vec![primary.clone()];
        if primary.port != DEFAULT_WYOMING_PORT {
            endpoints.push(Endpoint::new(primary.host, DEFAULT_WYOMING_PORT));
        }
        Self::new(endpoints, connect_timeout)
    }

    /// Sets the per-read timeout applied after connecting.
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    /// Returns the candidate endpoints in connection order.
    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    /// Requests speech for `text` in `voice` and returns the raw audio bytes.
    ///
    /// A stream that closes early or carries a malformed header yields the
    /// audio received so far. Socket errors after connecting are returned
    /// as `TTS_STREAM_FAILED`.
    pub fn synthesize(&self, text: &str, voice: &str) -> Result<Vec<u8>> {
        let request = AudioSynthesisRequest::new(text, voice);
        let conn = self.connect()?;

        conn.stream
            .set_read_timeout(self.read_timeout)
            .map_err(DaemonError::stream_failed)?;

        let line = FrameHeader::synthesize(&request)
            .to_line()
            .map_err(|e| DaemonError::synthesis_failed(format!("Cannot encode request: {}", e)))?;
        (&conn.stream)
            .write_all(&line)
            .map_err(DaemonError::stream_failed)?;

        let mut reader = BufReader::new(&conn.stream);
        let stream = read_audio(&mut reader).map_err(DaemonError::stream_failed)?;

        info!(
            endpoint = %conn.endpoint,
            frames = stream.frames,
            bytes = stream.audio.len(),
            end = ?stream.end,
            "Wyoming synthesis finished"
        );
        Ok(stream.audio)
    }

    /// Connects to the first endpoint that accepts within the timeout.
    fn connect(&self) -> Result<Connection> {
        for endpoint in &self.endpoints {
            debug!(%endpoint, "Connecting to Wyoming peer");
            match self.try_connect(endpoint) {
                Ok(stream) => {
                    return Ok(Connection {
                        stream,
                        endpoint: endpoint.clone(),
                    })
                }
                Err(e) => debug!(%endpoint, error = %e, "Wyoming connect failed"),
            }
        }

        let attempted: Vec<String> = self.endpoints.iter().map(|e| e.to_string()).collect();
        Err(DaemonError::connect_failed(&attempted))
    }

    fn try_connect(&self, endpoint: &Endpoint) -> std::io::Result<TcpStream> {
        let mut last_err = None;
        for addr in endpoint.resolve()? {
            match TcpStream::connect_timeout(&addr, self.connect_timeout) {
                Ok(stream) => return Ok(stream),
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err.unwrap_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, "no addresses resolved")
        }))
    }
}
