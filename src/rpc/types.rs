//! JSON-RPC types for the daemon protocol.
//!
//! Envelopes follow JSON-RPC 2.0. Application errors use codes from
//! -32000 upward with the daemon error code in `data.error_code`.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::cefr::{CefrLevel, CefrVote};
use crate::error::{DaemonError, ErrorCode};

/// JSON-RPC version constant.
pub const JSONRPC_VERSION: &str = "2.0";

/// Longest text accepted for synthesis, in characters.
pub const MAX_TEXT_CHARS: usize = 5000;

/// A JSON-RPC request ID.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum RequestId {
    Integer(i64),
    String(String),
}

impl From<i64> for RequestId {
    fn from(id: i64) -> Self {
        RequestId::Integer(id)
    }
}

impl From<String> for RequestId {
    fn from(id: String) -> Self {
        RequestId::String(id)
    }
}

/// A JSON-RPC request wrapper.
#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    pub id: RequestId,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// A JSON-RPC response wrapper.
#[derive(Debug, Serialize)]
pub struct JsonRpcResponse<T: Serialize> {
    pub jsonrpc: &'static str,
    pub id: RequestId,
    pub result: T,
}

impl<T: Serialize> JsonRpcResponse<T> {
    pub fn new(id: RequestId, result: T) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            result,
        }
    }
}

/// A JSON-RPC error response.
#[derive(Debug, Serialize)]
pub struct JsonRpcErrorResponse {
    pub jsonrpc: &'static str,
    pub id: Option<RequestId>,
    pub error: JsonRpcError,
}

impl JsonRpcErrorResponse {
    pub fn new(id: Option<RequestId>, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            error,
        }
    }
}

/// A JSON-RPC error object.
#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<JsonRpcErrorData>,
}

/// Extended error data for application-specific errors.
#[derive(Debug, Serialize)]
pub struct JsonRpcErrorData {
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recovery_hint: Option<String>,
}

impl JsonRpcError {
    /// Creates a parse error (-32700).
    pub fn parse_error(message: impl Into<String>) -> Self {
        Self {
            code: -32700,
            message: message.into(),
            data: None,
        }
    }

    /// Creates an invalid request error (-32600).
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            code: -32600,
            message: message.into(),
            data: None,
        }
    }

    /// Creates a method not found error (-32601).
    pub fn method_not_found(method: &str) -> Self {
        Self {
            code: -32601,
            message: format!("Method not found: {}", method),
            data: None,
        }
    }

    /// Creates an invalid params error (-32602).
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self {
            code: -32602,
            message: message.into(),
            data: None,
        }
    }

    /// Creates an internal error (-32603).
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self {
            code: -32603,
            message: message.into(),
            data: None,
        }
    }
}

/// Application error code for each daemon error (-32000 to -32009).
pub fn application_code(code: ErrorCode) -> i32 {
    match code {
        ErrorCode::TtsConnectFailed => -32000,
        ErrorCode::TtsStreamFailed => -32001,
        ErrorCode::TtsSynthesisFailed => -32002,
        ErrorCode::InvalidText => -32003,
        ErrorCode::ImageProviderFailed => -32004,
        ErrorCode::ImageDownloadFailed => -32005,
        ErrorCode::UnknownProvider => -32006,
        ErrorCode::CacheIoFailed => -32007,
        ErrorCode::CacheStoreFailed => -32008,
        ErrorCode::InvalidVote => -32009,
    }
}

impl From<DaemonError> for JsonRpcError {
    fn from(err: DaemonError) -> Self {
        Self {
            code: application_code(err.code),
            message: err.code.description().to_string(),
            data: Some(JsonRpcErrorData {
                error_code: err.code.as_str().to_string(),
                details: Some(err.message),
                recovery_hint: Some(err.code.recovery_hint().to_string()),
            }),
        }
    }
}

// ============================================================================
// Speech
// ============================================================================

/// Parameters for `synthesize`.
#[derive(Debug, Deserialize)]
pub struct SynthesizeParams {
    /// Text to speak.
    pub text: String,

    /// Voice; the configured default when absent.
    pub voice: Option<String>,

    /// File to write the audio to. When absent the audio is returned
    /// base64-encoded in the response.
    pub output: Option<PathBuf>,
}

impl SynthesizeParams {
    /// Validates the request parameters.
    pub fn validate(&self) -> Result<(), JsonRpcError> {
        validate_text(&self.text)
    }
}

/// Response for `synthesize`.
#[derive(Debug, Serialize)]
pub struct SynthesizeResult {
    /// Size of the synthesized audio.
    pub bytes: usize,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_base64: Option<String>,
}

/// Parameters for `reference_audio`.
#[derive(Debug, Deserialize)]
pub struct ReferenceAudioParams {
    pub text: String,
    pub card_id: String,
    pub voice: Option<String>,
}

impl ReferenceAudioParams {
    /// Validates the request parameters.
    pub fn validate(&self) -> Result<(), JsonRpcError> {
        validate_text(&self.text)
    }
}

fn validate_text(text: &str) -> Result<(), JsonRpcError> {
    if text.trim().is_empty() {
        return Err(DaemonError::invalid_text("Text cannot be empty").into());
    }
    let chars = text.chars().count();
    if chars > MAX_TEXT_CHARS {
        return Err(DaemonError::invalid_text(format!(
            "Text too long: {} characters (max {})",
            chars, MAX_TEXT_CHARS
        ))
        .into());
    }
    Ok(())
}

// ============================================================================
// Images
// ============================================================================

/// Parameters for `image_search`.
#[derive(Debug, Deserialize)]
pub struct ImageSearchParams {
    pub query: String,

    /// Provider name; "unsplash" when absent.
    #[serde(default = "default_provider")]
    pub provider: String,
}

fn default_provider() -> String {
    "unsplash".to_string()
}

/// Parameters for `image_upload`.
#[derive(Debug, Deserialize)]
pub struct ImageUploadParams {
    /// Original file name; directories are stripped.
    pub filename: String,

    /// File content, base64-encoded.
    pub content_base64: String,
}

/// Response for `image_upload`.
#[derive(Debug, Serialize)]
pub struct ImageUploadResult {
    pub path: String,
    pub bytes: usize,
}

/// Response for `cache_sweep`.
#[derive(Debug, Serialize)]
pub struct SweepResult {
    pub evicted: Vec<String>,
    pub freed_bytes: u64,
    pub remaining_bytes: u64,
}

// ============================================================================
// CEFR
// ============================================================================

/// A raw model answer to be parsed into a vote.
#[derive(Debug, Deserialize)]
pub struct ModelResponse {
    pub model_id: String,
    pub response: String,
}

/// Parameters for `cefr_consensus`. Votes may be given already parsed,
/// as raw model answers, or both.
#[derive(Debug, Default, Deserialize)]
pub struct CefrConsensusParams {
    #[serde(default)]
    pub votes: Vec<CefrVote>,
    #[serde(default)]
    pub responses: Vec<ModelResponse>,
}

/// Response for `cefr_consensus`.
#[derive(Debug, Serialize)]
pub struct CefrConsensusResult {
    pub level: CefrLevel,
    pub confidence: f32,
    /// Every vote that was counted.
    pub votes: Vec<CefrVote>,
    /// Models whose answers could not be parsed.
    pub rejected: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_id_from_int() {
        let id: RequestId = 42.into();
        assert_eq!(id, RequestId::Integer(42));
    }

    #[test]
    fn request_id_from_string() {
        let id: RequestId = "abc".to_string().into();
        assert_eq!(id, RequestId::String("abc".to_string()));
    }

    #[test]
    fn json_rpc_error_codes() {
        assert_eq!(JsonRpcError::parse_error("").code, -32700);
        assert_eq!(JsonRpcError::invalid_request("").code, -32600);
        assert_eq!(JsonRpcError::method_not_found("").code, -32601);
        assert_eq!(JsonRpcError::invalid_params("").code, -32602);
        assert_eq!(JsonRpcError::internal_error("").code, -32603);
        assert_eq!(application_code(ErrorCode::TtsConnectFailed), -32000);
        assert_eq!(application_code(ErrorCode::InvalidVote), -32009);
    }

    #[test]
    fn daemon_error_maps_to_application_error() {
        let err: JsonRpcError = DaemonError::unknown_provider("flickr").into();
        assert_eq!(err.code, -32006);
        let data = err.data.unwrap();
        assert_eq!(data.error_code, "UNKNOWN_PROVIDER");
        assert!(data.details.unwrap().contains("flickr"));
        assert!(data.recovery_hint.is_some());
    }

    #[test]
    fn synthesize_params_validate_empty_text() {
        let params = SynthesizeParams {
            text: "  ".to_string(),
            voice: None,
            output: None,
        };
        let err = params.validate().unwrap_err();
        assert_eq!(err.code, -32003);
    }

    #[test]
    fn synthesize_params_validate_long_text() {
        let params = SynthesizeParams {
            text: "a".repeat(MAX_TEXT_CHARS + 1),
            voice: None,
            output: None,
        };
        assert_eq!(params.validate().unwrap_err().code, -32003);
    }

    #[test]
    fn image_search_defaults_to_unsplash() {
        let params: ImageSearchParams =
            serde_json::from_value(serde_json::json!({"query": "kat"})).unwrap();
        assert_eq!(params.provider, "unsplash");
    }

    #[test]
    fn cefr_params_accept_either_form() {
        let params: CefrConsensusParams = serde_json::from_value(serde_json::json!({
            "responses": [{"model_id": "m1", "response": "{\"level\":\"B1\",\"confidence\":0.5}"}]
        }))
        .unwrap();
        assert!(params.votes.is_empty());
        assert_eq!(params.responses.len(), 1);
    }
}
