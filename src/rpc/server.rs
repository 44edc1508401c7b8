//! JSON-RPC server over stdin/stdout.
//!
//! One request per line, one response per line. Requests are handled
//! one at a time, so the services in [`ServerState`] only ever have a
//! single writer.

use std::io::{self, BufRead, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, error, info};

use crate::config::DaemonConfig;
use crate::error::Result;
use crate::images::ImageService;
use crate::tts::AudioService;

use super::methods::handle_request;
use super::types::{JsonRpcError, JsonRpcErrorResponse, JsonRpcRequest, JsonRpcResponse};

/// State shared across all request handlers.
pub struct ServerState {
    /// Reference audio and raw synthesis.
    pub audio: AudioService,
    /// Image search, cache and uploads.
    pub images: ImageService,
    /// Daemon configuration.
    pub config: DaemonConfig,
    /// Flag to signal server shutdown.
    shutdown: Arc<AtomicBool>,
}

impl ServerState {
    /// Creates server state, opening the image cache and building the
    /// synthesizer chain from `config`.
    pub fn new(config: DaemonConfig) -> Result<Self> {
        let audio = AudioService::from_config(&config)?;
        Self::with_audio(config, audio)
    }

    /// Creates server state around an existing audio service.
    pub fn with_audio(config: DaemonConfig, audio: AudioService) -> Result<Self> {
        let images = ImageService::from_config(&config)?;
        Ok(Self {
            audio,
            images,
            config,
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Signals the server to shut down.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    /// Returns true if shutdown has been requested.
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }
}

/// Serves newline-delimited requests from stdin until EOF, a `shutdown`
/// call, or a closed stdout.
pub fn run_server(mut state: ServerState) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout().lock();

    info!("JSON-RPC server started, waiting for requests");

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                error!(error = %e, "Error reading stdin");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        if let Some(response) = process_request(&line, &mut state) {
            if let Err(e) = writeln!(stdout, "{}", response).and_then(|_| stdout.flush()) {
                error!(error = %e, "Client stopped reading responses");
                break;
            }
        }

        if state.is_shutdown() {
            info!("Server shutdown requested");
            break;
        }
    }

    info!("JSON-RPC server stopped");
    Ok(())
}

/// Processes a single JSON-RPC request line.
fn process_request(line: &str, state: &mut ServerState) -> Option<String> {
    let request: JsonRpcRequest = match serde_json::from_str(line) {
        Ok(r) => r,
        Err(e) => {
            let error = JsonRpcErrorResponse::new(
                None,
                JsonRpcError::parse_error(format!("Invalid JSON: {}", e)),
            );
            return Some(serde_json::to_string(&error).unwrap_or_default());
        }
    };

    if request.jsonrpc != "2.0" {
        let error = JsonRpcErrorResponse::new(
            Some(request.id),
            JsonRpcError::invalid_request("Invalid JSON-RPC version (expected 2.0)"),
        );
        return Some(serde_json::to_string(&error).unwrap_or_default());
    }

    debug!(method = %request.method, "Handling request");
    let result = handle_request(&request.method, request.params, state);

    let encoded = match result {
        Ok(value) => serde_json::to_string(&JsonRpcResponse::new(request.id, value)),
        Err(error) => {
            debug!(code = error.code, message = %error.message, "Request failed");
            serde_json::to_string(&JsonRpcErrorResponse::new(Some(request.id), error))
        }
    };
    Some(encoded.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(dir: &std::path::Path) -> DaemonConfig {
        DaemonConfig {
            data_path: Some(dir.to_path_buf()),
            ..Default::default()
        }
    }

    #[test]
    fn server_state_new() {
        let dir = tempfile::tempdir().unwrap();
        let state = ServerState::new(test_config(dir.path())).unwrap();
        assert!(!state.is_shutdown());
        assert!(dir.path().join("images").join("cache").is_dir());
    }

    #[test]
    fn server_state_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let state = ServerState::new(test_config(dir.path())).unwrap();
        state.shutdown();
        assert!(state.is_shutdown());
    }

    #[test]
    fn process_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = ServerState::new(test_config(dir.path())).unwrap();
        let response = process_request("not json", &mut state);
        assert!(response.is_some());
        let response = response.unwrap();
        assert!(response.contains("-32700")); // Parse error
    }

    #[test]
    fn process_invalid_version() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = ServerState::new(test_config(dir.path())).unwrap();
        let request = r#"{"jsonrpc":"1.0","method":"ping","id":1}"#;
        let response = process_request(request, &mut state).unwrap();
        assert!(response.contains("-32600")); // Invalid request
    }

    #[test]
    fn process_unknown_method() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = ServerState::new(test_config(dir.path())).unwrap();
        let request = r#"{"jsonrpc":"2.0","method":"unknown","id":1}"#;
        let response = process_request(request, &mut state).unwrap();
        assert!(response.contains("-32601")); // Method not found
    }

    #[test]
    fn process_ping_echoes_id() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = ServerState::new(test_config(dir.path())).unwrap();
        let request = r#"{"jsonrpc":"2.0","method":"ping","id":"abc"}"#;
        let response: serde_json::Value =
            serde_json::from_str(&process_request(request, &mut state).unwrap()).unwrap();
        assert_eq!(response["id"], "abc");
        assert_eq!(response["result"]["status"], "ok");
    }

    #[test]
    fn process_application_error_carries_code() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = ServerState::new(test_config(dir.path())).unwrap();
        let request = serde_json::json!({
            "jsonrpc": "2.0",
            "method": "image_search",
            "id": 7,
            "params": {"query": "kat", "provider": "flickr"}
        })
        .to_string();
        let response: serde_json::Value =
            serde_json::from_str(&process_request(&request, &mut state).unwrap()).unwrap();
        assert_eq!(response["error"]["code"], -32006);
        assert_eq!(response["error"]["data"]["error_code"], "UNKNOWN_PROVIDER");
    }
}
