//! Speech synthesizer backends.
//!
//! The reference audio service tries each backend in turn:
//! - [`HttpSynthesizer`]: Piper's HTTP `/api/tts` endpoint
//! - [`WyomingClient`]: the raw Wyoming TCP protocol

use std::time::Duration;

use serde_json::json;
use tracing::debug;

use crate::error::{DaemonError, Result};
use crate::wyoming::WyomingClient;

/// Timeout for the whole HTTP synthesis exchange.
pub const HTTP_TIMEOUT_SECS: u64 = 30;

/// A backend that turns text into audio bytes.
pub trait Synthesizer {
    /// Short label used in logs.
    fn name(&self) -> &str;

    /// Synthesizes `text` with `voice` and returns the encoded audio.
    fn synthesize(&self, text: &str, voice: &str) -> Result<Vec<u8>>;
}

impl Synthesizer for WyomingClient {
    fn name(&self) -> &str {
        "wyoming"
    }

    fn synthesize(&self, text: &str, voice: &str) -> Result<Vec<u8>> {
        WyomingClient::synthesize(self, text, voice)
    }
}

/// Piper HTTP API client.
#[derive(Debug, Clone)]
pub struct HttpSynthesizer {
    endpoint: String,
    client: reqwest::blocking::Client,
}

impl HttpSynthesizer {
    /// Creates a client posting to `{base_url}/api/tts`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                DaemonError::synthesis_failed(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            endpoint: format!("{}/api/tts", base_url.trim().trim_end_matches('/')),
            client,
        })
    }

    /// Returns the full URL requests are posted to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl Synthesizer for HttpSynthesizer {
    fn name(&self) -> &str {
        "http"
    }

    fn synthesize(&self, text: &str, voice: &str) -> Result<Vec<u8>> {
        let body = json!({
            "text": text,
            "voice": voice,
            "output_format": "mp3",
        });

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .map_err(|e| {
                DaemonError::synthesis_failed(format!("Piper HTTP request failed: {}", e))
            })?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(DaemonError::synthesis_failed(format!(
                "Piper HTTP returned status {}",
                status
            )));
        }

        let bytes = response.bytes().map_err(|e| {
            DaemonError::synthesis_failed(format!("Failed to read Piper HTTP body: {}", e))
        })?;
        if bytes.is_empty() {
            return Err(DaemonError::synthesis_failed("Piper HTTP returned no audio"));
        }

        debug!(endpoint = %self.endpoint, bytes = bytes.len(), "Generated audio via Piper HTTP");
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::thread;

    /// Serves one HTTP request and returns the request body it received.
    fn serve_once(
        status_line: &'static str,
        body: &'static [u8],
    ) -> (String, thread::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());

        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());

            let mut content_length = 0usize;
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                let line = line.trim_end();
                if line.is_empty() {
                    break;
                }
                if let Some((name, value)) = line.split_once(':') {
                    if name.eq_ignore_ascii_case("content-length") {
                        content_length = value.trim().parse().unwrap();
                    }
                }
            }
            let mut request_body = vec![0u8; content_length];
            reader.read_exact(&mut request_body).unwrap();

            let mut stream = stream;
            write!(
                stream,
                "{}\r\nContent-Type: audio/mpeg\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                status_line,
                body.len()
            )
            .unwrap();
            stream.write_all(body).unwrap();
            stream.flush().unwrap();
            String::from_utf8(request_body).unwrap()
        });

        (base, handle)
    }

    #[test]
    fn endpoint_joins_base_url() {
        let synth = HttpSynthesizer::new("http://piper:5000/", Duration::from_secs(1)).unwrap();
        assert_eq!(synth.endpoint(), "http://piper:5000/api/tts");
    }

    #[test]
    fn posts_text_and_returns_body() {
        let (base, handle) = serve_once("HTTP/1.1 200 OK", b"ID3mp3data");
        let synth = HttpSynthesizer::new(&base, Duration::from_secs(5)).unwrap();

        let audio = synth.synthesize("de fiets", "nl_NL-rdh-medium").unwrap();
        assert_eq!(audio, b"ID3mp3data");

        let sent: serde_json::Value = serde_json::from_str(&handle.join().unwrap()).unwrap();
        assert_eq!(sent["text"], "de fiets");
        assert_eq!(sent["voice"], "nl_NL-rdh-medium");
        assert_eq!(sent["output_format"], "mp3");
    }

    #[test]
    fn non_ok_status_is_error() {
        let (base, handle) = serve_once("HTTP/1.1 404 Not Found", b"no such route");
        let synth = HttpSynthesizer::new(&base, Duration::from_secs(5)).unwrap();

        let err = synth.synthesize("hallo", "nl").unwrap_err();
        assert_eq!(err.code, ErrorCode::TtsSynthesisFailed);
        assert!(err.message.contains("404"));
        handle.join().unwrap();
    }

    #[test]
    fn empty_body_is_error() {
        let (base, handle) = serve_once("HTTP/1.1 200 OK", b"");
        let synth = HttpSynthesizer::new(&base, Duration::from_secs(5)).unwrap();

        let err = synth.synthesize("hallo", "nl").unwrap_err();
        assert_eq!(err.code, ErrorCode::TtsSynthesisFailed);
        handle.join().unwrap();
    }
}
