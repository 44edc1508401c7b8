//! CEFR level consensus.
//!
//! Several language models each vote on the CEFR level of a text. Votes
//! are weighted by their confidence and reduced to a single level.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{DaemonError, Result};

/// Common European Framework of Reference proficiency levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CefrLevel {
    A1,
    A2,
    B1,
    B2,
    C1,
    C2,
}

impl CefrLevel {
    /// Parses a level label, ignoring case and surrounding whitespace.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "A1" => Some(CefrLevel::A1),
            "A2" => Some(CefrLevel::A2),
            "B1" => Some(CefrLevel::B1),
            "B2" => Some(CefrLevel::B2),
            "C1" => Some(CefrLevel::C1),
            "C2" => Some(CefrLevel::C2),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CefrLevel::A1 => "A1",
            CefrLevel::A2 => "A2",
            CefrLevel::B1 => "B1",
            CefrLevel::B2 => "B2",
            CefrLevel::C1 => "C1",
            CefrLevel::C2 => "C2",
        }
    }
}

impl std::fmt::Display for CefrLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One model's classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CefrVote {
    pub model_id: String,
    pub level: CefrLevel,
    /// In `[0.0, 1.0]`.
    pub confidence: f32,
    #[serde(default)]
    pub reasoning: Option<String>,
}

impl CefrVote {
    /// Pulls the confidence into `[0.0, 1.0]`; a NaN counts as 0.
    pub fn clamp_confidence(&mut self) {
        self.confidence = if self.confidence.is_nan() {
            0.0
        } else {
            self.confidence.clamp(0.0, 1.0)
        };
    }
}

/// Outcome of combining votes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Consensus {
    pub level: CefrLevel,
    pub confidence: f32,
}

/// Level and confidence reported when there are no votes.
pub const NO_VOTES: Consensus = Consensus {
    level: CefrLevel::B1,
    confidence: 0.0,
};

/// Combines votes into a single level.
///
/// Each level's weight is the sum of its votes' confidences and the
/// heaviest level wins; on equal weight the level voted for first wins.
/// The reported confidence is the winners' mean confidence scaled by the
/// share of votes they hold.
pub fn calculate_consensus(votes: &[CefrVote]) -> Consensus {
    if votes.is_empty() {
        return NO_VOTES;
    }

    // (level, weight, count) in order of first vote.
    let mut tallies: Vec<(CefrLevel, f32, usize)> = Vec::new();
    for vote in votes {
        match tallies.iter_mut().find(|(level, _, _)| *level == vote.level) {
            Some(tally) => {
                tally.1 += vote.confidence;
                tally.2 += 1;
            }
            None => tallies.push((vote.level, vote.confidence, 1)),
        }
    }

    let mut winner = tallies[0];
    for tally in &tallies[1..] {
        if tally.1 > winner.1 {
            winner = *tally;
        }
    }

    let (level, weight, count) = winner;
    let mean = weight / count as f32;
    let agreement = count as f32 / votes.len() as f32;
    let consensus = Consensus {
        level,
        confidence: mean * agreement,
    };

    info!(
        level = %consensus.level,
        confidence = consensus.confidence,
        votes = votes.len(),
        "CEFR consensus"
    );
    consensus
}

#[derive(Deserialize)]
struct RawVote {
    level: String,
    confidence: Value,
    #[serde(default)]
    reasoning: Option<String>,
}

/// Turns a model's raw answer into a vote.
///
/// Accepts `{"level", "confidence", "reasoning"}` JSON, optionally wrapped
/// in a markdown code fence and preceded by a `<think>` block.
pub fn parse_vote(model_id: &str, response: &str) -> Result<CefrVote> {
    let body = extract_json(response);
    let raw: RawVote = serde_json::from_str(body).map_err(|e| {
        debug!(model_id, response = %truncate(response, 200), "Unparsable vote");
        DaemonError::invalid_vote(model_id, format!("not a JSON vote: {}", e))
    })?;

    let level = CefrLevel::parse(&raw.level)
        .ok_or_else(|| {
            DaemonError::invalid_vote(model_id, format!("unknown level {:?}", raw.level))
        })?;

    let confidence = match &raw.confidence {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|c| c.is_finite())
    .ok_or_else(|| {
        DaemonError::invalid_vote(model_id, format!("bad confidence {}", raw.confidence))
    })?;

    let vote = CefrVote {
        model_id: model_id.to_string(),
        level,
        confidence: confidence.clamp(0.0, 1.0) as f32,
        reasoning: raw.reasoning,
    };
    info!(model_id, level = %vote.level, confidence = vote.confidence, "Model voted");
    Ok(vote)
}

/// Drops reasoning blocks and code fences around the JSON object.
fn extract_json(response: &str) -> &str {
    let mut text = match response.rfind("</think>") {
        Some(end) => &response[end + "</think>".len()..],
        None => response,
    };
    text = text.trim();

    if let Some(rest) = text.strip_prefix("```") {
        // Skip the info string, e.g. "json".
        text = rest.split_once('\n').map_or("", |(_, body)| body);
        text = text.trim_end().strip_suffix("```").unwrap_or(text);
    }

    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => text.trim(),
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    fn vote(level: CefrLevel, confidence: f32) -> CefrVote {
        CefrVote {
            model_id: "m".to_string(),
            level,
            confidence,
            reasoning: None,
        }
    }

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    #[test]
    fn no_votes_defaults_to_b1() {
        assert_eq!(calculate_consensus(&[]), NO_VOTES);
    }

    #[test]
    fn weighted_majority_wins() {
        let votes = [
            vote(CefrLevel::B1, 0.9),
            vote(CefrLevel::B1, 0.7),
            vote(CefrLevel::B2, 0.8),
        ];
        let c = calculate_consensus(&votes);
        assert_eq!(c.level, CefrLevel::B1);
        // mean 0.8 * 2/3
        assert!(approx(c.confidence, 0.8 * 2.0 / 3.0));
    }

    #[test]
    fn confident_single_vote_beats_weak_pair() {
        let votes = [
            vote(CefrLevel::A2, 0.2),
            vote(CefrLevel::A2, 0.2),
            vote(CefrLevel::C1, 0.9),
        ];
        let c = calculate_consensus(&votes);
        assert_eq!(c.level, CefrLevel::C1);
        assert!(approx(c.confidence, 0.9 / 3.0));
    }

    #[test]
    fn tie_goes_to_first_voted_level() {
        let votes = [vote(CefrLevel::B2, 0.5), vote(CefrLevel::A1, 0.5)];
        assert_eq!(calculate_consensus(&votes).level, CefrLevel::B2);

        let votes = [vote(CefrLevel::A1, 0.5), vote(CefrLevel::B2, 0.5)];
        assert_eq!(calculate_consensus(&votes).level, CefrLevel::A1);
    }

    #[test]
    fn unanimous_vote_keeps_mean_confidence() {
        let votes = [vote(CefrLevel::A2, 0.6), vote(CefrLevel::A2, 0.8)];
        let c = calculate_consensus(&votes);
        assert_eq!(c.level, CefrLevel::A2);
        assert!(approx(c.confidence, 0.7));
    }

    #[test]
    fn parses_plain_json() {
        let response =
            r#"{"level": "b2", "confidence": 0.75, "reasoning": "subordinate clauses"}"#;
        let v = parse_vote("qwen", response).unwrap();
        assert_eq!(v.level, CefrLevel::B2);
        assert!(approx(v.confidence, 0.75));
        assert_eq!(v.reasoning.as_deref(), Some("subordinate clauses"));
        assert_eq!(v.model_id, "qwen");
    }

    #[test]
    fn strips_think_block_and_fence() {
        let response = concat!(
            "<think>\nThe text uses {simple} words.\n</think>\n",
            "```json\n{\"level\": \"A1\", \"confidence\": \"0.9\"}\n```",
        );
        let v = parse_vote("deepseek", response).unwrap();
        assert_eq!(v.level, CefrLevel::A1);
        assert!(approx(v.confidence, 0.9));
        assert!(v.reasoning.is_none());
    }

    #[test]
    fn clamps_confidence() {
        let v = parse_vote("m", r#"{"level": "C2", "confidence": 1.7}"#).unwrap();
        assert!(approx(v.confidence, 1.0));
        let v = parse_vote("m", r#"{"level": "C2", "confidence": -3}"#).unwrap();
        assert!(approx(v.confidence, 0.0));
    }

    #[test]
    fn rejects_invalid_votes() {
        for response in [
            "I think this is B1.",
            r#"{"level": "D4", "confidence": 0.5}"#,
            r#"{"level": "B1", "confidence": "high"}"#,
            r#"{"confidence": 0.5}"#,
        ] {
            let err = parse_vote("m", response).unwrap_err();
            assert_eq!(err.code, ErrorCode::InvalidVote, "accepted {:?}", response);
        }
    }
}
