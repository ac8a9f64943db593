use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid policy: {0}")]
    InvalidPolicy(String),
    #[error("invalid weight {name}: {value} (must be >= 0)")]
    InvalidWeight { name: &'static str, value: f32 },
    #[error("invalid rate {name}: {value} (must be > 0)")]
    InvalidRate { name: &'static str, value: f64 },
}

/// Switching policy. Immutable per run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwitchPolicy {
    pub min_hold_sec: f64,
    pub cooldown_sec: f64,
    pub delta_s_threshold: f32,
    pub max_shot_duration_sec: f64,
    pub enable_hysteresis: bool,
    pub enable_cooldown: bool,
    pub enable_speech_align: bool,
    pub ping_pong_window: usize,
    pub ping_pong_max_revisits: usize,
    pub max_defer_ticks: u32,
    pub staleness_window_sec: f64,
}

impl Default for SwitchPolicy {
    fn default() -> Self {
        Self {
            min_hold_sec: 2.0,
            cooldown_sec: 4.0,
            delta_s_threshold: 0.15,
            max_shot_duration_sec: 15.0,
            enable_hysteresis: true,
            enable_cooldown: true,
            enable_speech_align: true,
            ping_pong_window: 5,
            ping_pong_max_revisits: 2,
            max_defer_ticks: 3,
            staleness_window_sec: 2.0,
        }
    }
}

impl SwitchPolicy {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_hold_sec < 0.0 {
            return Err(ConfigError::InvalidPolicy(format!(
                "minHoldSec {} < 0",
                self.min_hold_sec
            )));
        }
        if self.cooldown_sec < 0.0 {
            return Err(ConfigError::InvalidPolicy(format!(
                "cooldownSec {} < 0",
                self.cooldown_sec
            )));
        }
        if self.max_shot_duration_sec <= 0.0 {
            return Err(ConfigError::InvalidPolicy(format!(
                "maxShotDurationSec {} <= 0",
                self.max_shot_duration_sec
            )));
        }
        if !(0.0..=1.0).contains(&self.delta_s_threshold) {
            return Err(ConfigError::InvalidPolicy(format!(
                "deltaSThreshold {} outside [0,1]",
                self.delta_s_threshold
            )));
        }
        if self.ping_pong_window == 0 || self.ping_pong_max_revisits == 0 {
            return Err(ConfigError::InvalidPolicy(
                "ping-pong window and revisits must be >= 1".into(),
            ));
        }
        if self.staleness_window_sec <= 0.0 {
            return Err(ConfigError::InvalidPolicy(format!(
                "stalenessWindowSec {} <= 0",
                self.staleness_window_sec
            )));
        }
        Ok(())
    }
}

/// Fusion weights. Normalized by the scorer, so only relative magnitudes
/// matter; all must be non-negative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingWeights {
    pub face_salience: f32,
    pub main_subject_overlap: f32,
    pub motion_salience: f32,
    pub speech_energy: f32,
    pub keyword_boost: f32,
    pub framing_score: f32,
    pub novelty_decay: f32,
    pub continuity_bonus: f32,
    pub interest: f32,
}

impl Default for RankingWeights {
    fn default() -> Self {
        Self {
            face_salience: 0.25,
            main_subject_overlap: 0.15,
            motion_salience: 0.15,
            speech_energy: 0.15,
            keyword_boost: 0.10,
            framing_score: 0.10,
            novelty_decay: 0.05,
            continuity_bonus: 0.05,
            interest: 0.10,
        }
    }
}

impl RankingWeights {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in self.named() {
            if value < 0.0 || !value.is_finite() {
                return Err(ConfigError::InvalidWeight { name, value });
            }
        }
        if self.named().iter().map(|(_, v)| v).sum::<f32>() <= 0.0 {
            return Err(ConfigError::InvalidPolicy(
                "all ranking weights are zero".into(),
            ));
        }
        Ok(())
    }

    pub fn named(&self) -> [(&'static str, f32); 9] {
        [
            ("faceSalience", self.face_salience),
            ("mainSubjectOverlap", self.main_subject_overlap),
            ("motionSalience", self.motion_salience),
            ("speechEnergy", self.speech_energy),
            ("keywordBoost", self.keyword_boost),
            ("framingScore", self.framing_score),
            ("noveltyDecay", self.novelty_decay),
            ("continuityBonus", self.continuity_bonus),
            ("interest", self.interest),
        ]
    }
}

/// Per-modality analyzer call deadlines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzerDeadlines {
    pub detector_ms: u64,
    pub scene_ms: u64,
    pub speech_ms: u64,
}

impl Default for AnalyzerDeadlines {
    fn default() -> Self {
        Self {
            detector_ms: 50,
            scene_ms: 1000,
            speech_ms: 800,
        }
    }
}

/// Full run configuration: rates, policy, weights, and the feature-math
/// constants. Read once at startup; nothing is persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectorConfig {
    pub analysis_rate_hz: f64,
    pub ranking_rate_hz: f64,
    pub decision_rate_hz: f64,
    pub policy: SwitchPolicy,
    pub weights: RankingWeights,
    pub deadlines: AnalyzerDeadlines,
    pub max_cameras: usize,
    /// Analyzer worker pool size; 0 means cams * 2.
    pub max_parallel_analyses: usize,
    pub scene_interval_ms: u64,
    pub audio_window_sec: f64,
    pub audio_hop_sec: f64,
    /// Keyword bag matched whole-word, case-insensitive.
    pub keywords: Vec<String>,
    /// K in keywordBoost = min(count / K, 1).
    pub keyword_k: usize,
    /// Track speed treated as full motion, normalized units/sec.
    pub v_max: f32,
    /// Novelty time constant, seconds.
    pub novelty_tau_sec: f64,
    pub max_tts_latency_ms: u64,
    pub max_narration_words: usize,
    pub shutdown_grace_sec: u64,
}

/// Default keyword bag carried over from the speech analyzer's stock set.
pub fn default_keywords() -> Vec<String> {
    [
        "goal",
        "applause",
        "breaking",
        "announcement",
        "look",
        "important",
        "attention",
        "wow",
        "amazing",
        "check",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for DirectorConfig {
    fn default() -> Self {
        Self {
            analysis_rate_hz: 10.0,
            ranking_rate_hz: 10.0,
            decision_rate_hz: 10.0,
            policy: SwitchPolicy::default(),
            weights: RankingWeights::default(),
            deadlines: AnalyzerDeadlines::default(),
            max_cameras: 12,
            max_parallel_analyses: 0,
            scene_interval_ms: 700,
            audio_window_sec: 1.0,
            audio_hop_sec: 0.5,
            keywords: default_keywords(),
            keyword_k: 3,
            v_max: 0.5,
            novelty_tau_sec: 8.0,
            max_tts_latency_ms: 600,
            max_narration_words: 12,
            shutdown_grace_sec: 5,
        }
    }
}

impl DirectorConfig {
    /// Fatal at startup on any invalid value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, rate) in [
            ("analysisRateHz", self.analysis_rate_hz),
            ("rankingRateHz", self.ranking_rate_hz),
            ("decisionRateHz", self.decision_rate_hz),
        ] {
            if rate <= 0.0 || !rate.is_finite() {
                return Err(ConfigError::InvalidRate { name, value: rate });
            }
        }
        self.policy.validate()?;
        self.weights.validate()?;
        if self.max_cameras == 0 {
            return Err(ConfigError::InvalidPolicy("maxCameras must be >= 1".into()));
        }
        if self.keyword_k == 0 {
            return Err(ConfigError::InvalidPolicy("keywordK must be >= 1".into()));
        }
        if self.v_max <= 0.0 {
            return Err(ConfigError::InvalidPolicy(format!(
                "vMax {} <= 0",
                self.v_max
            )));
        }
        if self.novelty_tau_sec <= 0.0 {
            return Err(ConfigError::InvalidPolicy(format!(
                "noveltyTauSec {} <= 0",
                self.novelty_tau_sec
            )));
        }
        if self.audio_window_sec <= 0.0 || self.audio_hop_sec <= 0.0 {
            return Err(ConfigError::InvalidPolicy(
                "audio window and hop must be > 0".into(),
            ));
        }
        Ok(())
    }

    pub fn analyzer_pool_size(&self, live_cams: usize) -> usize {
        if self.max_parallel_analyses > 0 {
            self.max_parallel_analyses
        } else {
            (live_cams.max(1)) * 2
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        DirectorConfig::default().validate().unwrap();
    }

    #[test]
    fn negative_min_hold_is_fatal() {
        let mut cfg = DirectorConfig::default();
        cfg.policy.min_hold_sec = -1.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn negative_weight_is_fatal() {
        let mut cfg = DirectorConfig::default();
        cfg.weights.face_salience = -0.5;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn zero_rate_is_fatal() {
        let mut cfg = DirectorConfig::default();
        cfg.decision_rate_hz = 0.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn pool_size_defaults_to_twice_cams() {
        let cfg = DirectorConfig::default();
        assert_eq!(cfg.analyzer_pool_size(5), 10);
        let mut pinned = cfg.clone();
        pinned.max_parallel_analyses = 4;
        assert_eq!(pinned.analyzer_pool_size(5), 4);
    }
}
