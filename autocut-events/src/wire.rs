//! JSON wire encoding for bus messages.
//!
//! Every message is a `{"type": ..., "payload": ...}` envelope with a closed
//! set of tags. Decisions map to two tags (`SWITCH` / `HOLD`) that share one
//! payload schema; the parser rejects anything else.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use autocut_core::{CameraScore, Narration, SwitchAction, SwitchDecision};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum BusMessage {
    #[serde(rename = "SCORE")]
    Score(CameraScore),
    #[serde(rename = "SWITCH")]
    Switch(SwitchDecision),
    #[serde(rename = "HOLD")]
    Hold(SwitchDecision),
    #[serde(rename = "NARRATION")]
    Narration(Narration),
}

impl BusMessage {
    /// Pick the envelope tag from the decision's action.
    pub fn from_decision(decision: SwitchDecision) -> Self {
        match decision.action {
            SwitchAction::Switch => BusMessage::Switch(decision),
            SwitchAction::Hold => BusMessage::Hold(decision),
        }
    }
}

pub fn encode(message: &BusMessage) -> Result<String> {
    Ok(serde_json::to_string(message)?)
}

/// Decode and cross-check: a decision payload whose `action` disagrees with
/// its envelope tag is malformed.
pub fn decode(raw: &str) -> Result<BusMessage> {
    let message: BusMessage = serde_json::from_str(raw)?;
    match &message {
        BusMessage::Switch(d) if d.action != SwitchAction::Switch => {
            bail!("SWITCH envelope with action {:?}", d.action)
        }
        BusMessage::Hold(d) if d.action != SwitchAction::Hold => {
            bail!("HOLD envelope with action {:?}", d.action)
        }
        _ => Ok(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use autocut_core::CameraFeatures;

    fn sample_score() -> CameraScore {
        CameraScore {
            cam_id: "cam-a".into(),
            timestamp: 12.5,
            score: 0.62,
            reason: "face visible, speech detected".into(),
            features: CameraFeatures {
                face_salience: 0.55,
                speech_energy: 0.4,
                tags: vec!["indoor".into()],
                top_objects: vec!["person".into()],
                ..Default::default()
            },
        }
    }

    #[test]
    fn score_round_trip() {
        let msg = BusMessage::Score(sample_score());
        let raw = encode(&msg).unwrap();
        assert_eq!(decode(&raw).unwrap(), msg);
    }

    #[test]
    fn decision_round_trip_picks_tag_from_action() {
        let decision = SwitchDecision {
            timestamp: 1.0,
            action: SwitchAction::Switch,
            from_cam: None,
            to_cam: Some("cam-b".into()),
            delta_score: None,
            rationale: "initial".into(),
            confidence: 1.0,
        };
        let msg = BusMessage::from_decision(decision.clone());
        let raw = encode(&msg).unwrap();
        assert!(raw.contains(r#""type":"SWITCH""#));
        assert_eq!(decode(&raw).unwrap(), msg);

        let hold = SwitchDecision::hold(2.0, Some("cam-b".into()), "same-best");
        let raw = encode(&BusMessage::from_decision(hold)).unwrap();
        assert!(raw.contains(r#""type":"HOLD""#));
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let raw = r#"{"type":"OVERLAY","payload":{}}"#;
        assert!(decode(raw).is_err());
    }

    #[test]
    fn mismatched_action_is_rejected() {
        let hold = SwitchDecision::hold(2.0, None, "same-best");
        let raw = encode(&BusMessage::Switch(hold)).unwrap();
        assert!(decode(&raw).is_err());
    }

    #[test]
    fn narration_round_trip() {
        let msg = BusMessage::Narration(Narration {
            text: "a look at the crowd".into(),
            duration_ms: 180,
            timestamp: 5.0,
            audio_blob_ref: Some("/tmp/narration-1.wav".into()),
        });
        let raw = encode(&msg).unwrap();
        assert!(raw.contains(r#""durationMs":180"#));
        assert_eq!(decode(&raw).unwrap(), msg);
    }
}
