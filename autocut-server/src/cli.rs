use clap::Parser;

use autocut_core::{ConfigError, DirectorConfig, RankingWeights, SwitchPolicy};

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None, name = "autocut")]
pub struct Cli {
    /// Port for the control/read API
    #[arg(short = 'p', long, default_value_t = 3030)]
    pub port: u16,

    /// SFU room URL. Without it (or with --sim) a synthetic room is used.
    #[arg(long)]
    pub room_url: Option<String>,

    /// SFU access token for the subscribe-only grant
    #[arg(long, default_value = "")]
    pub room_token: String,

    /// Run against the built-in synthetic room
    #[arg(long, default_value_t = false)]
    pub sim: bool,

    /// Cameras generated by the synthetic room
    #[arg(long, default_value_t = 4)]
    pub sim_cameras: usize,

    /// Video analysis sample rate
    #[arg(long, env = "ANALYSIS_RATE_HZ", default_value_t = 10.0)]
    pub analysis_rate_hz: f64,

    /// Score publication rate
    #[arg(long, env = "RANKING_RATE_HZ", default_value_t = 10.0)]
    pub ranking_rate_hz: f64,

    /// Decision evaluation rate
    #[arg(long, env = "DECISION_RATE_HZ", default_value_t = 10.0)]
    pub decision_rate_hz: f64,

    /// Minimum seconds a camera stays program after being selected
    #[arg(long, env = "MIN_HOLD_SEC", default_value_t = 2.0)]
    pub min_hold_sec: f64,

    /// Seconds before a camera may be switched onto again
    #[arg(long, env = "COOLDOWN_SEC", default_value_t = 4.0)]
    pub cooldown_sec: f64,

    /// Score margin required to cut away from the current camera
    #[arg(long, env = "DELTA_S_THRESHOLD", default_value_t = 0.15)]
    pub delta_s_threshold: f32,

    /// Forced-cut shot length cap
    #[arg(long, env = "MAX_SHOT_DURATION_SEC", default_value_t = 15.0)]
    pub max_shot_duration_sec: f64,

    #[arg(long, env = "PING_PONG_WINDOW", default_value_t = 5)]
    pub ping_pong_window: usize,

    #[arg(long, env = "PING_PONG_MAX_REVISITS", default_value_t = 2)]
    pub ping_pong_max_revisits: usize,

    /// Ticks a cut may wait for a word boundary
    #[arg(long, env = "MAX_DEFER_TICKS", default_value_t = 3)]
    pub max_defer_ticks: u32,

    #[arg(long, action = clap::ArgAction::Set, default_value_t = true)]
    pub enable_hysteresis: bool,

    #[arg(long, action = clap::ArgAction::Set, default_value_t = true)]
    pub enable_cooldown: bool,

    #[arg(long, action = clap::ArgAction::Set, default_value_t = true)]
    pub enable_speech_align: bool,

    /// Narrations slower than this are dropped
    #[arg(long, env = "MAX_TTS_LATENCY_MS", default_value_t = 600)]
    pub max_tts_latency_ms: u64,

    #[arg(long, env = "MAX_NARRATION_WORDS", default_value_t = 12)]
    pub max_narration_words: usize,

    /// Cameras admitted to the room model
    #[arg(long, default_value_t = 12)]
    pub max_cameras: usize,

    /// Keyword bag for speech boosting, comma separated
    #[arg(long, value_delimiter = ',')]
    pub keywords: Vec<String>,

    /// YOLO-style detection endpoint
    #[arg(long, env = "DETECTOR_ENDPOINT")]
    pub detector_endpoint: Option<String>,

    /// VLM scene description endpoint
    #[arg(long, env = "SCENE_ENDPOINT")]
    pub scene_endpoint: Option<String>,

    /// ASR transcription endpoint
    #[arg(long, env = "ASR_ENDPOINT")]
    pub asr_endpoint: Option<String>,

    /// Piper-style TTS endpoint; narrations are silent without one
    #[arg(long, env = "TTS_ENDPOINT")]
    pub tts_endpoint: Option<String>,

    #[arg(long, env = "W_FACE_SALIENCE", default_value_t = 0.25)]
    pub w_face_salience: f32,

    #[arg(long, env = "W_MAIN_SUBJECT_OVERLAP", default_value_t = 0.15)]
    pub w_main_subject_overlap: f32,

    #[arg(long, env = "W_MOTION_SALIENCE", default_value_t = 0.15)]
    pub w_motion_salience: f32,

    #[arg(long, env = "W_SPEECH_ENERGY", default_value_t = 0.15)]
    pub w_speech_energy: f32,

    #[arg(long, env = "W_KEYWORD_BOOST", default_value_t = 0.10)]
    pub w_keyword_boost: f32,

    #[arg(long, env = "W_FRAMING_SCORE", default_value_t = 0.10)]
    pub w_framing_score: f32,

    #[arg(long, env = "W_NOVELTY_DECAY", default_value_t = 0.05)]
    pub w_novelty_decay: f32,

    #[arg(long, env = "W_CONTINUITY_BONUS", default_value_t = 0.05)]
    pub w_continuity_bonus: f32,

    #[arg(long, env = "W_INTEREST", default_value_t = 0.10)]
    pub w_interest: f32,

    /// Data directory for logs and narration audio. Default $HOME/.autocut
    #[arg(long)]
    pub data_dir: Option<String>,

    /// Enable debug logging for autocut modules
    #[arg(long)]
    pub debug: bool,
}

impl Cli {
    pub fn director_config(&self) -> Result<DirectorConfig, ConfigError> {
        let mut cfg = DirectorConfig {
            analysis_rate_hz: self.analysis_rate_hz,
            ranking_rate_hz: self.ranking_rate_hz,
            decision_rate_hz: self.decision_rate_hz,
            policy: SwitchPolicy {
                min_hold_sec: self.min_hold_sec,
                cooldown_sec: self.cooldown_sec,
                delta_s_threshold: self.delta_s_threshold,
                max_shot_duration_sec: self.max_shot_duration_sec,
                enable_hysteresis: self.enable_hysteresis,
                enable_cooldown: self.enable_cooldown,
                enable_speech_align: self.enable_speech_align,
                ping_pong_window: self.ping_pong_window,
                ping_pong_max_revisits: self.ping_pong_max_revisits,
                max_defer_ticks: self.max_defer_ticks,
                ..Default::default()
            },
            weights: RankingWeights {
                face_salience: self.w_face_salience,
                main_subject_overlap: self.w_main_subject_overlap,
                motion_salience: self.w_motion_salience,
                speech_energy: self.w_speech_energy,
                keyword_boost: self.w_keyword_boost,
                framing_score: self.w_framing_score,
                novelty_decay: self.w_novelty_decay,
                continuity_bonus: self.w_continuity_bonus,
                interest: self.w_interest,
            },
            max_cameras: self.max_cameras,
            max_tts_latency_ms: self.max_tts_latency_ms,
            max_narration_words: self.max_narration_words,
            ..Default::default()
        };
        if !self.keywords.is_empty() {
            cfg.keywords = self.keywords.clone();
        }
        cfg.validate()?;
        Ok(cfg)
    }
}
