//! JSON-RPC method handlers.
//!
//! Implements the handlers for all supported JSON-RPC methods.

use std::fs;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Serialize;
use tracing::warn;

use crate::cefr::{calculate_consensus, parse_vote};
use crate::error::DaemonError;

use super::server::ServerState;
use super::types::{
    CefrConsensusParams, CefrConsensusResult, ImageSearchParams, ImageUploadParams,
    ImageUploadResult, JsonRpcError, ReferenceAudioParams, SweepResult, SynthesizeParams,
    SynthesizeResult,
};

/// Handles a JSON-RPC method call.
pub fn handle_request(
    method: &str,
    params: serde_json::Value,
    state: &mut ServerState,
) -> Result<serde_json::Value, JsonRpcError> {
    match method {
        "synthesize" => handle_synthesize(params, state),
        "reference_audio" => handle_reference_audio(params, state),
        "audio_cleanup" => handle_audio_cleanup(state),
        "image_search" => handle_image_search(params, state),
        "image_upload" => handle_image_upload(params, state),
        "cache_stats" => handle_cache_stats(state),
        "cache_sweep" => handle_cache_sweep(state),
        "cefr_consensus" => handle_cefr_consensus(params),
        "ping" => handle_ping(),
        "shutdown" => handle_shutdown(state),
        _ => Err(JsonRpcError::method_not_found(method)),
    }
}

fn parse_params<T: serde::de::DeserializeOwned>(
    params: serde_json::Value,
) -> Result<T, JsonRpcError> {
    serde_json::from_value(params)
        .map_err(|e| JsonRpcError::invalid_params(format!("Invalid params: {}", e)))
}

fn to_json<T: Serialize>(value: &T) -> Result<serde_json::Value, JsonRpcError> {
    serde_json::to_value(value)
        .map_err(|e| JsonRpcError::internal_error(format!("Failed to encode result: {}", e)))
}

/// Handles the ping method for health checks.
fn handle_ping() -> Result<serde_json::Value, JsonRpcError> {
    Ok(serde_json::json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}

/// Handles the shutdown method.
fn handle_shutdown(state: &mut ServerState) -> Result<serde_json::Value, JsonRpcError> {
    state.shutdown();
    Ok(serde_json::json!({ "status": "shutting_down" }))
}

/// Handles the synthesize method: raw speech, written to a file or returned inline.
fn handle_synthesize(
    params: serde_json::Value,
    state: &mut ServerState,
) -> Result<serde_json::Value, JsonRpcError> {
    let params: SynthesizeParams = parse_params(params)?;
    params.validate()?;

    let audio = state.audio.synthesize(&params.text, params.voice.as_deref())?;

    let result = match params.output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent).map_err(|e| {
                    DaemonError::cache_io(format!("Failed to create {}", parent.display()), e)
                })?;
            }
            fs::write(&path, &audio).map_err(|e| {
                DaemonError::cache_io(format!("Failed to write {}", path.display()), e)
            })?;
            SynthesizeResult {
                bytes: audio.len(),
                path: Some(path.to_string_lossy().into_owned()),
                audio_base64: None,
            }
        }
        None => SynthesizeResult {
            bytes: audio.len(),
            path: None,
            audio_base64: Some(BASE64.encode(&audio)),
        },
    };

    to_json(&result)
}

/// Handles the reference_audio method.
fn handle_reference_audio(
    params: serde_json::Value,
    state: &mut ServerState,
) -> Result<serde_json::Value, JsonRpcError> {
    let params: ReferenceAudioParams = parse_params(params)?;
    params.validate()?;

    let metadata = state
        .audio
        .generate_reference_audio(&params.text, &params.card_id, params.voice.as_deref())?;
    to_json(&metadata)
}

/// Handles the audio_cleanup method.
fn handle_audio_cleanup(state: &mut ServerState) -> Result<serde_json::Value, JsonRpcError> {
    let deleted = state.audio.cleanup_expired_audio()?;
    Ok(serde_json::json!({ "deleted": deleted }))
}

/// Handles the image_search method. The result is null when nothing was found.
fn handle_image_search(
    params: serde_json::Value,
    state: &mut ServerState,
) -> Result<serde_json::Value, JsonRpcError> {
    let params: ImageSearchParams = parse_params(params)?;
    if params.query.trim().is_empty() {
        return Err(JsonRpcError::invalid_params("Query cannot be empty"));
    }

    let image = state.images.search_image(&params.query, &params.provider)?;
    to_json(&image)
}

/// Handles the image_upload method.
fn handle_image_upload(
    params: serde_json::Value,
    state: &mut ServerState,
) -> Result<serde_json::Value, JsonRpcError> {
    let params: ImageUploadParams = parse_params(params)?;
    let content = BASE64
        .decode(params.content_base64.trim())
        .map_err(|e| JsonRpcError::invalid_params(format!("content_base64 is not base64: {}", e)))?;
    if content.is_empty() {
        return Err(JsonRpcError::invalid_params("Upload is empty"));
    }

    let path = state.images.save_uploaded_image(&content, &params.filename)?;
    to_json(&ImageUploadResult {
        path: path.to_string_lossy().into_owned(),
        bytes: content.len(),
    })
}

/// Handles the cache_stats method.
fn handle_cache_stats(state: &mut ServerState) -> Result<serde_json::Value, JsonRpcError> {
    let stats = state.images.stats()?;
    to_json(&stats)
}

/// Handles the cache_sweep method.
fn handle_cache_sweep(state: &mut ServerState) -> Result<serde_json::Value, JsonRpcError> {
    let report = state.images.cleanup_expired_cache()?;
    to_json(&SweepResult {
        evicted: report.evicted,
        freed_bytes: report.freed_bytes,
        remaining_bytes: report.remaining_bytes,
    })
}

/// Handles the cefr_consensus method.
///
/// Raw answers that do not parse are left out of the tally and reported
/// in `rejected`.
fn handle_cefr_consensus(params: serde_json::Value) -> Result<serde_json::Value, JsonRpcError> {
    let params: CefrConsensusParams = parse_params(params)?;

    let mut votes = params.votes;
    for vote in &mut votes {
        vote.clamp_confidence();
    }
    let mut rejected = Vec::new();
    for answer in params.responses {
        match parse_vote(&answer.model_id, &answer.response) {
            Ok(vote) => votes.push(vote),
            Err(e) => {
                warn!(model_id = %answer.model_id, error = %e.message, "Dropping unparsable vote");
                rejected.push(answer.model_id);
            }
        }
    }

    let consensus = calculate_consensus(&votes);
    to_json(&CefrConsensusResult {
        level: consensus.level,
        confidence: consensus.confidence,
        votes,
        rejected,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DaemonConfig;
    use crate::error::Result;
    use crate::tts::{AudioService, Synthesizer};

    struct EchoSynth;

    impl Synthesizer for EchoSynth {
        fn name(&self) -> &str {
            "echo"
        }

        fn synthesize(&self, text: &str, _voice: &str) -> Result<Vec<u8>> {
            Ok(text.as_bytes().to_vec())
        }
    }

    fn test_state(dir: &std::path::Path) -> ServerState {
        let config = DaemonConfig {
            data_path: Some(dir.to_path_buf()),
            ..Default::default()
        };
        let audio = AudioService::new(config.audio_dir(), vec![Box::new(EchoSynth)], "nl", 30);
        ServerState::with_audio(config, audio).unwrap()
    }

    #[test]
    fn handle_ping() {
        let result = super::handle_ping();
        assert!(result.is_ok());
        let value = result.unwrap();
        assert_eq!(value["status"], "ok");
    }

    #[test]
    fn handle_unknown_method() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = test_state(dir.path());
        let result = handle_request("nonexistent", serde_json::Value::Null, &mut state);
        assert_eq!(result.unwrap_err().code, -32601);
    }

    #[test]
    fn handle_synthesize_invalid_params() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = test_state(dir.path());
        let result = handle_request("synthesize", serde_json::json!({}), &mut state);
        assert_eq!(result.unwrap_err().code, -32602);
    }

    #[test]
    fn handle_synthesize_empty_text() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = test_state(dir.path());
        let result = handle_request("synthesize", serde_json::json!({ "text": "" }), &mut state);
        assert_eq!(result.unwrap_err().code, -32003);
    }

    #[test]
    fn handle_synthesize_inline_and_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = test_state(dir.path());

        let value =
            handle_request("synthesize", serde_json::json!({ "text": "hoi" }), &mut state).unwrap();
        assert_eq!(value["bytes"], 3);
        assert_eq!(BASE64.decode(value["audio_base64"].as_str().unwrap()).unwrap(), b"hoi");

        let out = dir.path().join("out").join("hoi.wav");
        let value = handle_request(
            "synthesize",
            serde_json::json!({ "text": "hoi", "output": out }),
            &mut state,
        )
        .unwrap();
        assert!(value.get("audio_base64").is_none());
        assert_eq!(fs::read(&out).unwrap(), b"hoi");
    }

    #[test]
    fn handle_reference_audio_writes_card_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = test_state(dir.path());
        let value = handle_request(
            "reference_audio",
            serde_json::json!({ "text": "de fiets", "card_id": "card1" }),
            &mut state,
        )
        .unwrap();
        let path = value["reference_path"].as_str().unwrap();
        assert!(path.contains("card1_"));
        assert_eq!(fs::read(path).unwrap(), b"de fiets");
    }

    #[test]
    fn handle_image_search_unknown_provider() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = test_state(dir.path());
        let err = handle_request(
            "image_search",
            serde_json::json!({ "query": "kat", "provider": "flickr" }),
            &mut state,
        )
        .unwrap_err();
        assert_eq!(err.code, -32006);
    }

    #[test]
    fn handle_image_upload_and_stats() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = test_state(dir.path());
        let value = handle_request(
            "image_upload",
            serde_json::json!({
                "filename": "../kat.png",
                "content_base64": BASE64.encode(b"png"),
            }),
            &mut state,
        )
        .unwrap();
        assert!(value["path"].as_str().unwrap().ends_with("_kat.png"));

        let err = handle_request(
            "image_upload",
            serde_json::json!({ "filename": "x.png", "content_base64": "***" }),
            &mut state,
        )
        .unwrap_err();
        assert_eq!(err.code, -32602);

        let stats = handle_request("cache_stats", serde_json::Value::Null, &mut state).unwrap();
        assert_eq!(stats["entries"], 0);
        let sweep = handle_request("cache_sweep", serde_json::Value::Null, &mut state).unwrap();
        assert_eq!(sweep["evicted"], serde_json::json!([]));
    }

    #[test]
    fn handle_cefr_consensus_mixes_votes_and_responses() {
        let params = serde_json::json!({
            "votes": [{"model_id": "a", "level": "B2", "confidence": 0.6}],
            "responses": [
                {
                    "model_id": "b",
                    "response": "```json\n{\"level\": \"b2\", \"confidence\": 0.8}\n```"
                },
                {"model_id": "c", "response": "no idea"}
            ]
        });
        let value = handle_cefr_consensus(params).unwrap();
        assert_eq!(value["level"], "B2");
        assert_eq!(value["votes"].as_array().unwrap().len(), 2);
        assert_eq!(value["rejected"], serde_json::json!(["c"]));
    }

    #[test]
    fn handle_cefr_consensus_clamps_supplied_votes() {
        let params = serde_json::json!({
            "votes": [
                {"model_id": "a", "level": "A2", "confidence": 0.8},
                {"model_id": "b", "level": "C1", "confidence": 0.9},
                {"model_id": "c", "level": "C1", "confidence": -3.0}
            ]
        });
        let value = handle_cefr_consensus(params).unwrap();
        assert_eq!(value["level"], "C1");
        assert_eq!(value["votes"][2]["confidence"], 0.0);
        let confidence = value["confidence"].as_f64().unwrap();
        assert!((confidence - 0.3).abs() < 1e-6);

        let params = serde_json::json!({
            "votes": [{"model_id": "a", "level": "B2", "confidence": 5.0}]
        });
        let value = handle_cefr_consensus(params).unwrap();
        assert_eq!(value["votes"][0]["confidence"], 1.0);
        assert_eq!(value["confidence"], 1.0);
    }

    #[test]
    fn handle_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = test_state(dir.path());
        let result = super::handle_shutdown(&mut state);
        assert!(result.is_ok());
        assert!(state.is_shutdown());
    }
}
