pub mod config;
pub mod keywords;
pub mod safety;
pub mod types;

pub use config::{
    default_keywords, AnalyzerDeadlines, ConfigError, DirectorConfig, RankingWeights, SwitchPolicy,
};
pub use keywords::KeywordBag;
pub use types::{
    is_camera_identity, AudioChunk, BBox, CamId, CameraFeatures, CameraScore, Detection, Frame,
    Narration, ProgramState, SceneDescription, SpeechSegment, SwitchAction, SwitchDecision, Track,
    WordTiming, DEFAULT_CAMERA_PREFIX,
};

/// Wall-clock seconds since the UNIX epoch, the timestamp unit used on the
/// bus and throughout the pipeline.
pub fn now_ts() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
