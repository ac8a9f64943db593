use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Stable identifier for a participant acting as a camera. Assigned by the
/// SFU; participants whose identity carries the camera prefix are treated as
/// cameras (see [`is_camera_identity`]).
pub type CamId = String;

pub const DEFAULT_CAMERA_PREFIX: &str = "cam-";

pub fn is_camera_identity(identity: &str, prefix: &str) -> bool {
    identity.starts_with(prefix)
}

/// Axis-aligned bounding box in normalized frame coordinates ([0,1] on both
/// axes, origin top-left).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl BBox {
    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    pub fn area(&self) -> f32 {
        (self.w * self.h).max(0.0)
    }

    pub fn centroid(&self) -> (f32, f32) {
        (self.x + self.w / 2.0, self.y + self.h / 2.0)
    }

    pub fn iou(&self, other: &BBox) -> f32 {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = (self.x + self.w).min(other.x + other.w);
        let y2 = (self.y + self.h).min(other.y + other.h);
        if x2 <= x1 || y2 <= y1 {
            return 0.0;
        }
        let inter = (x2 - x1) * (y2 - y1);
        let union = self.area() + other.area() - inter;
        if union <= 0.0 {
            0.0
        } else {
            inter / union
        }
    }

    /// Which frame quadrant the centroid falls in: 0=TL, 1=TR, 2=BL, 3=BR.
    pub fn quadrant(&self) -> u8 {
        let (cx, cy) = self.centroid();
        match (cx >= 0.5, cy >= 0.5) {
            (false, false) => 0,
            (true, false) => 1,
            (false, true) => 2,
            (true, true) => 3,
        }
    }
}

/// One detected object in a frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Detection {
    pub class: String,
    pub confidence: f32,
    pub bbox: BBox,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub centroid: Option<(f32, f32)>,
    /// Per-frame id if the detection engine provides one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track_id: Option<u64>,
    /// Normalized units per second, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub velocity: Option<[f32; 2]>,
}

impl Detection {
    pub fn new(class: impl Into<String>, confidence: f32, bbox: BBox) -> Self {
        Self {
            class: class.into(),
            confidence,
            bbox,
            centroid: None,
            track_id: None,
            velocity: None,
        }
    }

    pub fn is_person(&self) -> bool {
        matches!(self.class.as_str(), "person" | "face")
    }
}

/// One tracked object on a single camera. Track ids are stable across
/// consecutive frames of the same camera only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub track_id: u64,
    pub class: String,
    pub bbox: BBox,
    /// Ticks this track has been seen.
    pub age: u32,
    pub score: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub velocity: Option<[f32; 2]>,
}

/// High-level scene understanding for one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneDescription {
    pub tags: Vec<String>,
    pub caption: String,
    /// Raw interest level, 1..5.
    pub interest: f32,
    pub confidence: f32,
}

impl SceneDescription {
    /// Interest clipped to [1,5] and normalized to [0,1].
    pub fn normalized_interest(&self) -> f32 {
        (self.interest.clamp(1.0, 5.0) - 1.0) / 4.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordTiming {
    pub word: String,
    pub start_ts: f64,
    pub end_ts: f64,
}

/// One transcribed stretch of speech from a camera's audio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechSegment {
    pub text: String,
    pub start_ts: f64,
    pub end_ts: f64,
    pub word_timings: Vec<WordTiming>,
    pub keywords: Vec<String>,
    pub energy_db: f32,
}

/// Canonical analysis frame: 8-bit RGB at the agreed analysis size.
#[derive(Debug, Clone)]
pub struct Frame {
    pub cam_id: CamId,
    pub ts: f64,
    pub width: u32,
    pub height: u32,
    /// Tightly packed RGB8, `width * height * 3` bytes.
    pub data: std::sync::Arc<Vec<u8>>,
}

/// Canonical audio window: 16-bit PCM mono at 16 kHz.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    pub cam_id: CamId,
    /// Timestamp of the window end.
    pub ts: f64,
    pub sample_rate: u32,
    pub samples: std::sync::Arc<Vec<i16>>,
}

impl AudioChunk {
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// The fixed-width feature vector published with every score, plus the
/// carry-through arrays the narrator consumes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraFeatures {
    pub face_salience: f32,
    pub main_subject_overlap: f32,
    pub motion_salience: f32,
    pub speech_energy: f32,
    pub keyword_boost: f32,
    pub framing_score: f32,
    pub novelty_decay: f32,
    pub continuity_bonus: f32,
    pub interest: f32,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub top_objects: Vec<String>,
    #[serde(default)]
    pub recent_speech_text: String,
}

impl CameraFeatures {
    pub fn all_in_range(&self) -> bool {
        [
            self.face_salience,
            self.main_subject_overlap,
            self.motion_salience,
            self.speech_energy,
            self.keyword_boost,
            self.framing_score,
            self.novelty_decay,
            self.continuity_bonus,
            self.interest,
        ]
        .iter()
        .all(|v| (0.0..=1.0).contains(v))
    }
}

/// One fused ranking sample for one camera at one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraScore {
    pub cam_id: CamId,
    pub timestamp: f64,
    pub score: f32,
    pub reason: String,
    pub features: CameraFeatures,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SwitchAction {
    Switch,
    Hold,
}

/// A single decision-engine output. HOLDs carry a rationale too so the
/// decision stream is self-describing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwitchDecision {
    pub timestamp: f64,
    pub action: SwitchAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_cam: Option<CamId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_cam: Option<CamId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delta_score: Option<f32>,
    pub rationale: String,
    pub confidence: f32,
}

impl SwitchDecision {
    pub fn hold(ts: f64, current: Option<CamId>, rationale: &str) -> Self {
        Self {
            timestamp: ts,
            action: SwitchAction::Hold,
            from_cam: None,
            to_cam: current,
            delta_score: None,
            rationale: rationale.to_string(),
            confidence: 1.0,
        }
    }
}

/// One published narration tied to a switch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Narration {
    pub text: String,
    /// End-to-end synthesis latency.
    pub duration_ms: u64,
    pub timestamp: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_blob_ref: Option<String>,
}

/// The program selection state. Owned exclusively by the decision engine;
/// everyone else sees deep-copy snapshots.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramState {
    pub current_cam: Option<CamId>,
    pub last_switch_ts: Option<f64>,
    pub shot_start_ts: Option<f64>,
    /// Most recent switches, newest last. Bounded by the engine.
    pub history: VecDeque<(CamId, f64)>,
    /// camId -> earliest timestamp at which it may be switched onto again.
    pub cooldowns: std::collections::HashMap<CamId, f64>,
    /// camId -> when it last stopped being program. Used for novelty decay.
    pub last_on_air: std::collections::HashMap<CamId, f64>,
}

impl ProgramState {
    pub fn in_cooldown(&self, cam_id: &str, now: f64) -> bool {
        self.cooldowns.get(cam_id).is_some_and(|&t| t > now)
    }
}
